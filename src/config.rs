use std::path::PathBuf;

use serde::{Serialize, Deserialize};

use crate::{
  error::{ Error, Result },
  layer::Activation,
  synthetic::ClassificationConfig,
};


/// Optimization hyperparameters, fixed for the lifetime of a run.
///
/// Gets sent to the tracking service as the run's parameters.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
  pub batch_size: usize,
  pub epochs: usize,
  pub lr: f64,
  /// Epochs between learning rate decays.
  pub step_size: usize,
  /// Learning rate decay factor.
  pub gamma: f64,
  pub weight_decay: f64,
  /// Seed for data generation, initialization and shuffling.
  /// Runs are not reproducible without one.
  pub seed: Option<u64>,
}

impl Default for TrainConfig {
  fn default() -> Self {
    Self {
      batch_size: 64,
      epochs: 40,
      lr: 0.001,
      step_size: 10,
      gamma: 0.1,
      weight_decay: 0.0001,
      seed: None,
    }
  }
}


/// Architecture of the [Mlp](crate::model::Mlp) to train.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
  /// `(in_features, out_features)` of every linear layer.
  pub layers: Vec<(usize, usize)>,
  pub dropout: f64,
  pub batch_norm: bool,
  pub activation: Activation,
}

impl Default for ModelConfig {
  fn default() -> Self {
    Self {
      layers: vec![(20, 100), (100, 60), (60, 2)],
      dropout: 0.2,
      batch_norm: true,
      activation: Activation::default(),
    }
  }
}


/// Connection settings for the remote tracking service.

#[derive(Clone, PartialEq)]
pub struct TrackerConfig {
  pub url: String,
  pub api_token: String,
  pub project: String,
  pub name: String,
}

impl Default for TrackerConfig {
  fn default() -> Self {
    Self {
      url: "http://localhost:8080/api".to_string(),
      api_token: String::new(),
      project: "sandbox".to_string(),
      name: "Run".to_string(),
    }
  }
}

impl TrackerConfig {
  /// Read `TRACKER_API_TOKEN` (required) and `TRACKER_URL` from the environment.

  pub fn from_env() -> Result<Self> {
    Self::from_vars(|key| std::env::var(key).ok() )
  }

  fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let api_token = var("TRACKER_API_TOKEN")
      .filter(|token| !token.is_empty() )
      .ok_or_else(|| Error::Config("TRACKER_API_TOKEN is not set".to_string()) )?;
    let defaults = Self::default();
    Ok(Self {
      url: var("TRACKER_URL").unwrap_or(defaults.url),
      api_token,
      ..defaults
    })
  }
}

impl std::fmt::Debug for TrackerConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    f.debug_struct("TrackerConfig")
      .field("url", &self.url)
      .field("api_token", &"***")
      .field("project", &self.project)
      .field("name", &self.name)
      .finish()
  }
}


/// Complete description of a training run.

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
  pub train: TrainConfig,
  pub model: ModelConfig,
  pub data: ClassificationConfig,
  pub tracker: TrackerConfig,
  pub model_path: PathBuf,
}

impl Default for RunConfig {
  fn default() -> Self {
    Self {
      train: TrainConfig::default(),
      model: ModelConfig::default(),
      data: ClassificationConfig::default(),
      tracker: TrackerConfig::default(),
      model_path: PathBuf::from("artifacts/test_model.nn"),
    }
  }
}

impl RunConfig {
  /// Default run with tracker credentials taken from the environment.

  pub fn from_env() -> Result<Self> {
    Ok(Self { tracker: TrackerConfig::from_env()?, ..Self::default() })
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter()
      .map(|(k, v)| (k.to_string(), v.to_string()) )
      .collect();
    move |key: &str| map.get(key).cloned()
  }

  #[test]
  fn tracker_from_vars() {
    let config = TrackerConfig::from_vars(vars(&[("TRACKER_API_TOKEN", "secret")])).unwrap();
    assert_eq!(config.api_token, "secret");
    assert_eq!(config.url, "http://localhost:8080/api");

    let config = TrackerConfig::from_vars(vars(&[
      ("TRACKER_API_TOKEN", "secret"),
      ("TRACKER_URL", "https://tracker.test/api"),
    ])).unwrap();
    assert_eq!(config.url, "https://tracker.test/api");
    assert!(!format!("{:?}", config).contains("secret"));
  }

  #[test]
  fn missing_token() {
    assert!(matches!(TrackerConfig::from_vars(vars(&[])), Err(Error::Config(_))));
    assert!(matches!(TrackerConfig::from_vars(vars(&[("TRACKER_API_TOKEN", "")])), Err(Error::Config(_))));
  }

  #[test]
  fn defaults() {
    let config = RunConfig::default();
    assert_eq!(config.train.batch_size, 64);
    assert_eq!(config.train.epochs, 40);
    assert_eq!(config.model.layers.last(), Some(&(60, 2)));
    assert_eq!(config.model.layers[0].0, config.data.n_features);
    let header = serde_json::to_value(&config.train).unwrap();
    assert_eq!(header["step_size"], 10);
    assert_eq!(header["seed"], serde_json::Value::Null);
  }
}
