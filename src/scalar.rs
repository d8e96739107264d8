use rand::distributions::uniform::SampleUniform;
use num_traits::{NumAssignOps, Num, NumCast};


/// All types that may be used in a [Tensor](crate::Tensor).
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Inner: PartialEq + Clone + Copy + std::fmt::Debug {}
impl<T: PartialEq + Clone + Copy + std::fmt::Debug> Inner for T {}


/// All numeric types.
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Numeric: Inner + PartialOrd + Num + NumCast + NumAssignOps + std::iter::Sum {}
impl<T: Inner + PartialOrd + Num + NumCast + NumAssignOps + std::iter::Sum> Numeric for T {}


/// General matrix multiply on row-major buffers.
///
/// `a` is `m x k`, `b` is `k x n` and the product gets written into `c`,
/// which must hold `m x n` elements.

pub trait Gemm: Sized {
  fn gemm(m: usize, k: usize, n: usize, a: &[Self], b: &[Self], c: &mut [Self]);
}


/// All continuous numeric types that can be differentiated.
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Real: Numeric + num_traits::real::Real + SampleUniform + Gemm + 'static {}
impl<T: Numeric + num_traits::real::Real + SampleUniform + Gemm + 'static> Real for T {}
