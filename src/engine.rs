use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::{
  data::{ Dataset, DataLoader },
  error::Result,
  metrics::Metric,
  model::Mlp,
  ops::RealOps,
  optimize::{ Optimizer, Strategy },
  scalar::Real,
};


/// Progress of a [Trainer] run.

#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
  /// Number of completed epochs.
  pub epoch: usize,
  /// Number of processed mini-batches across all epochs.
  pub iteration: usize,
  pub max_epochs: usize,
  /// Loss of the most recent mini-batch.
  pub output: f64,
  /// Latest computed metrics, keyed by name.
  pub metrics: BTreeMap<String, f64>,
}


/// Everything a [Handler] may inspect or modify between epochs.

pub struct Context<'a, T: Real, S: Strategy<T>> {
  pub state: &'a mut State,
  pub model: &'a mut Mlp<T>,
  pub optimizer: &'a mut Optimizer<T, S>,
}


/// Callbacks for the lifecycle events of a [Trainer] run.
///
/// Handlers get invoked in the order they were registered in.

pub trait Handler<T: Real, S: Strategy<T>> {
  fn on_epoch_completed(&mut self, _ctx: &mut Context<T, S>) -> Result<()> {
    Ok(())
  }

  fn on_run_completed(&mut self, _ctx: &mut Context<T, S>) -> Result<()> {
    Ok(())
  }
}


/// Supervised training loop minimizing cross-entropy.

pub struct Trainer<T: Real, S: Strategy<T>> {
  model: Mlp<T>,
  optimizer: Optimizer<T, S>,
  handlers: Vec<Box<dyn Handler<T, S>>>,
  state: State,
}

impl<T: Real, S: Strategy<T>> Trainer<T, S> {
  pub fn new(model: Mlp<T>, optimizer: Optimizer<T, S>) -> Self {
    Self { model, optimizer, handlers: vec![], state: State::default() }
  }

  pub fn add_handler(&mut self, handler: impl Handler<T, S> + 'static) {
    self.handlers.push(Box::new(handler));
  }

  pub fn model(&self) -> &Mlp<T> {
    &self.model
  }

  pub fn optimizer(&self) -> &Optimizer<T, S> {
    &self.optimizer
  }

  pub fn state(&self) -> &State {
    &self.state
  }

  pub fn into_model(self) -> Mlp<T> {
    self.model
  }

  /// Train for `max_epochs` passes over the loader's data.
  ///
  /// The first error returned by a handler aborts the run.

  pub fn run<D>(&mut self, loader: &mut DataLoader<D>, max_epochs: usize) -> Result<&State>
  where
    D: Dataset<Scalar = T>,
  {
    self.state.max_epochs = max_epochs;
    info!(epochs = max_epochs, batches = loader.len(), "Starting training");
    while self.state.epoch < max_epochs {
      self.model.train();
      for batch in loader.batches()? {
        let logits = self.model.forward(&batch.inputs.tracked())?;
        let loss = logits.cross_entropy(&batch.labels);
        self.optimizer.minimize(&loss, &self.model.parameters())?;
        self.state.iteration += 1;
        self.state.output = loss.item().to_f64().unwrap_or(f64::NAN);
        debug!(iteration = self.state.iteration, loss = self.state.output, "Processed batch");
      }
      self.state.epoch += 1;
      self.dispatch(|handler, ctx| handler.on_epoch_completed(ctx) )?;
    }
    self.dispatch(|handler, ctx| handler.on_run_completed(ctx) )?;
    info!(epochs = self.state.epoch, iterations = self.state.iteration, "Training completed");
    Ok(&self.state)
  }

  fn dispatch<F>(&mut self, mut event: F) -> Result<()>
  where
    F: FnMut(&mut dyn Handler<T, S>, &mut Context<T, S>) -> Result<()>,
  {
    let mut ctx = Context {
      state: &mut self.state,
      model: &mut self.model,
      optimizer: &mut self.optimizer,
    };
    for handler in self.handlers.iter_mut() {
      event(handler.as_mut(), &mut ctx)?;
    }
    Ok(())
  }
}


/// Computes metrics over a full pass of a model in eval mode.

pub struct Evaluator<T: Real> {
  metrics: Vec<Box<dyn Metric<T>>>,
}

impl<T: Real> Evaluator<T> {
  pub fn new(metrics: Vec<Box<dyn Metric<T>>>) -> Self {
    Self { metrics }
  }

  pub fn run<D>(&mut self, model: &mut Mlp<T>, loader: &mut DataLoader<D>) -> Result<BTreeMap<String, f64>>
  where
    D: Dataset<Scalar = T>,
  {
    model.eval();
    for metric in self.metrics.iter_mut() {
      metric.reset();
    }
    for batch in loader.batches()? {
      let logits = model.forward(&batch.inputs.tracked())?;
      for metric in self.metrics.iter_mut() {
        metric.update(logits.tensor(), &batch.labels);
      }
    }
    self.metrics.iter()
      .map(|metric| Ok((metric.name().to_string(), metric.compute()?)) )
      .collect()
  }
}
