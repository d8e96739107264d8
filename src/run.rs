use std::collections::BTreeMap;
use std::path::PathBuf;

use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::info;

use crate::{
  config::RunConfig,
  data::{ Dataset, DataLoader, TabularDataset },
  engine::{ Context, Evaluator, Handler, Trainer },
  error::{ Error, Result },
  metrics::{ Accuracy, Loss, Metric },
  model::Mlp,
  optimize::{ Adam, Optimizer, Strategy },
  scalar::Real,
  schedule::{ Scheduler, StepLr },
  synthetic::make_classification,
  tracking::Tracker,
};


/// Outcome of a completed training run.

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
  pub epochs: usize,
  /// Metrics of the final evaluation pass.
  pub metrics: BTreeMap<String, f64>,
  pub learning_rate: f64,
  pub model_path: PathBuf,
}


/// Scores the model on a dataset after every epoch.

pub struct EvaluationHandler<D: Dataset> {
  evaluator: Evaluator<D::Scalar>,
  loader: DataLoader<D>,
}

impl<D: Dataset> EvaluationHandler<D> {
  pub fn new(loader: DataLoader<D>) -> Self {
    let metrics: Vec<Box<dyn Metric<D::Scalar>>> = vec![Box::new(Accuracy::default()), Box::new(Loss::default())];
    Self { evaluator: Evaluator::new(metrics), loader }
  }
}

impl<T, S, D> Handler<T, S> for EvaluationHandler<D>
where
  T: Real,
  S: Strategy<T>,
  D: Dataset<Scalar = T>,
{
  fn on_epoch_completed(&mut self, ctx: &mut Context<T, S>) -> Result<()> {
    let metrics = self.evaluator.run(&mut *ctx.model, &mut self.loader)?;
    info!("Training Results - Epoch: {}  Avg accuracy: {:.2} Avg loss: {:.2}",
      ctx.state.epoch, metrics["accuracy"], metrics["loss"]);
    ctx.state.metrics = metrics;
    Ok(())
  }
}


/// Advances a learning rate [Scheduler] after every epoch.

pub struct SchedulerHandler<L> {
  scheduler: L,
}

impl<L> SchedulerHandler<L> {
  pub fn new(scheduler: L) -> Self {
    Self { scheduler }
  }
}

impl<T, S, L> Handler<T, S> for SchedulerHandler<L>
where
  T: Real,
  S: Strategy<T>,
  L: Scheduler<T>,
{
  fn on_epoch_completed(&mut self, ctx: &mut Context<T, S>) -> Result<()> {
    self.scheduler.step(&mut *ctx.optimizer);
    Ok(())
  }
}


/// Reports evaluation metrics and the learning rate to a [Tracker].
///
/// Closes the tracking session once the run completes.

pub struct TrackerHandler<K: Tracker> {
  tracker: K,
  closed: bool,
}

impl<K: Tracker> TrackerHandler<K> {
  pub fn new(tracker: K) -> Self {
    Self { tracker, closed: false }
  }
}

impl<T, S, K> Handler<T, S> for TrackerHandler<K>
where
  T: Real,
  S: Strategy<T>,
  K: Tracker,
{
  fn on_epoch_completed(&mut self, ctx: &mut Context<T, S>) -> Result<()> {
    let step = ctx.state.epoch;
    for name in ["loss", "accuracy"] {
      let value = ctx.state.metrics.get(name)
        .ok_or_else(|| Error::Tracker(format!("no {} computed for epoch {}", name, step)) )?;
      self.tracker.log_metric(&format!("evaluation/{}", name), *value, step)?;
    }
    let lr = ctx.optimizer.learning_rate.to_f64().unwrap_or(f64::NAN);
    self.tracker.log_metric("lr/group_0", lr, step)
  }

  fn on_run_completed(&mut self, _ctx: &mut Context<T, S>) -> Result<()> {
    if self.closed { return Ok(()) }
    self.closed = true;
    self.tracker.close()
  }
}


/// Train a classifier on a synthetic dataset as described by `config`,
/// reporting progress to `tracker` and saving the final model.

pub fn train<K: Tracker + 'static>(config: &RunConfig, tracker: K) -> Result<RunSummary> {
  let hyper = &config.train;
  let mut rng = match hyper.seed {
    Some(seed) => StdRng::seed_from_u64(seed),
    None => StdRng::from_entropy(),
  };

  let dataset: TabularDataset<f32> = make_classification(&config.data, &mut rng)?;
  info!(samples = dataset.len(), features = dataset.num_features(), "Generated dataset");

  let model = Mlp::from_config(&config.model, &mut rng)?;
  info!(parameters = model.num_parameters(), stages = model.stages().len(), "Built model");
  if model.out_features() < dataset.num_classes() {
    return Err(Error::ShapeMismatch(format!(
      "model scores {} classes, dataset has {}", model.out_features(), dataset.num_classes())))
  }

  let lr = hyper.lr as f32;
  let optimizer = Optimizer::new(lr, Adam::default().with_weight_decay(hyper.weight_decay as f32));
  let scheduler = StepLr::new(lr, hyper.step_size, hyper.gamma as f32)?;

  let mut loader = DataLoader::new(dataset.clone(), hyper.batch_size, true, StdRng::seed_from_u64(rng.gen()))?;
  let eval_loader = DataLoader::new(dataset, hyper.batch_size, false, StdRng::seed_from_u64(rng.gen()))?;

  let mut trainer = Trainer::new(model, optimizer);
  trainer.add_handler(EvaluationHandler::new(eval_loader));
  trainer.add_handler(SchedulerHandler::new(scheduler));
  trainer.add_handler(TrackerHandler::new(tracker));

  let state = trainer.run(&mut loader, hyper.epochs)?.clone();
  let learning_rate = trainer.optimizer().learning_rate as f64;

  trainer.model().save(&config.model_path)?;
  info!(path = %config.model_path.display(), "Saved model");

  Ok(RunSummary {
    epochs: state.epoch,
    metrics: state.metrics,
    learning_rate,
    model_path: config.model_path.clone(),
  })
}
