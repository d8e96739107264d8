//! Train small feed-forward classifiers on tabular data.
//! Tiny. Few dependencies. CPU only.
//!
//! # Features
//!
//! - **Auto-grad**: Differentiable operations on [Variable]s record a computation
//! graph that gradients get propagated back through.
//!
//! - **Broadcasting**: Scalars and row vectors get broadcasted
//! to matching dimensions automatically for element-wise operations.
//!
//! - **Generic inner types**: Models can be trained for any inner type that
//! satisfies [scalar::Real].
//!
//! - **Multilayer perceptrons**: Configurable [Mlp](model::Mlp)s with dropout,
//! batch normalization and a choice of activations.
//!
//! - **Training engine**: A [Trainer](engine::Trainer) with epoch handlers, Adam
//! with weight decay, step-decay learning rate schedules and experiment tracking.
//!
//! # Examples
//!
//! Minimizing a function:
//! ```
//! use microtrain::{ ops::*, Tensor, optimize::{ Optimizer, Adam } };
//!
//! // Create trainable variables from tensors
//! let w = Tensor::<f32>::zeros(&[2, 1]).trained();
//!
//! // Use a standard optimizer
//! let mut optimizer = Optimizer::new(0.01, Adam::default());
//!
//! // Basic training loop
//! for _ in 0..100 {
//!   // Track input data for compute operations to be recorded
//!   let x = Tensor::new(&[1, 2], vec![1.0, 2.0]).tracked();
//!
//!   // Compute loss
//!   let loss = (x.mm(&w) - 0.5).sqr().mean();
//!
//!   // Back-prop, optimize and reset gradients
//!   optimizer.minimize(&loss, &loss.parameters()).unwrap();
//! }
//! ```
//!
//! Running a complete training session:
//! ```no_run
//! use microtrain::{ config::RunConfig, run, tracking::MemoryTracker };
//!
//! let tracker = MemoryTracker::new();
//! let summary = run::train(&RunConfig::default(), tracker.clone()).unwrap();
//! println!("{:?} {:?}", summary.metrics, tracker.series("evaluation/accuracy"));
//! ```
//!
//! # Optional features
//!
//! Some features can be toggled in your `Cargo.toml`.
//!
//! - `unsafe` *(default)*: Accelerated matrix math using [matrixmultiply] crate.
//! - `rayon`: Multi-threaded fallback matrix math when `unsafe` is disabled.

mod internal;
mod error;
mod shape;
mod tensor;
mod variable;

pub mod ops;
pub mod scalar;
pub mod data;
pub mod synthetic;
pub mod layer;
pub mod model;
pub mod optimize;
pub mod schedule;
pub mod metrics;
pub mod engine;
pub mod tracking;
pub mod config;
pub mod run;

pub use error::{ Error, Result };
pub use shape::Shape;
pub use tensor::Tensor;
pub use variable::{ Variable, UnaryOp, BinaryOp };
