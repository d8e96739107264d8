use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use microtrain::{
  config::RunConfig,
  run,
  tracking::HttpTracker,
};


fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let config = RunConfig::from_env()?;
  let tracker = HttpTracker::start(&config.tracker, &config.train)
    .with_context(|| format!("could not open a run at {}", config.tracker.url))?;
  info!(run = tracker.run_id(), "Tracking to {}", config.tracker.url);

  let summary = run::train(&config, tracker)?;
  info!(
    epochs = summary.epochs,
    lr = summary.learning_rate,
    path = %summary.model_path.display(),
    "Finished run"
  );
  Ok(())
}
