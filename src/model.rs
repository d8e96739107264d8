use std::path::Path;

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Serialize, Deserialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
  internal::*,
  config::ModelConfig,
  error::{ Error, Result },
  layer::{ Activation, Linear, BatchNorm, Dropout },
  scalar::Real,
  tensor::Tensor,
  variable::Variable,
};


/// Single step of a [Mlp]'s forward pass.

#[derive(Debug)]
pub enum Stage<T: Real> {
  Linear(Linear<T>),
  Activation(Activation),
  Normalize(BatchNorm<T>),
  Dropout(Dropout<T>),
}

impl<T: Real> Stage<T> {
  fn forward(&self, input: &Variable<T>, train: bool) -> Variable<T> {
    match self {
      Self::Linear(linear) => linear.forward(input),
      Self::Activation(activation) => activation.apply(input),
      Self::Normalize(norm) => norm.forward(input, train),
      Self::Dropout(dropout) => dropout.forward(input, train),
    }
  }

  pub fn parameters(&self) -> Vec<Variable<T>> {
    match self {
      Self::Linear(linear) => linear.parameters(),
      Self::Normalize(norm) => norm.parameters(),
      Self::Activation(_) | Self::Dropout(_) => vec![],
    }
  }
}


/// Multilayer perceptron assembled from a chain of linear layer sizes.
///
/// Dropout, if enabled, gets applied to the input. Every hidden layer
/// is followed by the activation and, optionally, batch normalization.

#[derive(Debug)]
pub struct Mlp<T: Real> {
  layers: Vec<(usize, usize)>,
  stages: Vec<Stage<T>>,
  training: bool,
}

impl<T: Real> Mlp<T> {
  pub fn new(
    layers: &[(usize, usize)],
    dropout: f64,
    batch_norm: bool,
    activation: Activation,
    rng: &mut impl Rng,
  ) -> Result<Self> {
    Self::validate(layers, dropout)?;
    let mut stages = vec![];
    if dropout > 0.0 {
      stages.push(Stage::Dropout(Dropout::new(real(dropout), rng)));
    }
    for (i, &(input, output)) in layers.iter().enumerate() {
      stages.push(Stage::Linear(Linear::new(input, output, rng)));
      if i + 1 < layers.len() {
        stages.push(Stage::Activation(activation));
        if batch_norm {
          stages.push(Stage::Normalize(BatchNorm::new(output)));
        }
      }
    }
    Ok(Self { layers: layers.to_vec(), stages, training: true })
  }

  pub fn from_config(config: &ModelConfig, rng: &mut impl Rng) -> Result<Self> {
    Self::new(&config.layers, config.dropout, config.batch_norm, config.activation, rng)
  }

  fn validate(layers: &[(usize, usize)], dropout: f64) -> Result<()> {
    if layers.is_empty() {
      return Err(Error::ShapeMismatch("model needs at least one linear layer".to_string()))
    }
    if let Some(layer) = layers.iter().find(|(input, output)| *input == 0 || *output == 0 ) {
      return Err(Error::ShapeMismatch(format!("layer {:?} has zero width", layer)))
    }
    for (i, pair) in layers.windows(2).enumerate() {
      if pair[0].1 != pair[1].0 {
        return Err(Error::ShapeMismatch(format!(
          "layer {} outputs {} features but layer {} expects {}",
          i, pair[0].1, i + 1, pair[1].0)))
      }
    }
    if !(0.0..1.0).contains(&dropout) {
      return Err(Error::Config(format!("dropout must lie in [0, 1), got {}", dropout)))
    }
    Ok(())
  }

  pub fn stages(&self) -> &[Stage<T>] {
    &self.stages
  }

  pub fn layers(&self) -> &[(usize, usize)] {
    &self.layers
  }

  pub fn in_features(&self) -> usize {
    self.layers[0].0
  }

  pub fn out_features(&self) -> usize {
    self.layers[self.layers.len() - 1].1
  }

  pub fn train(&mut self) {
    self.training = true;
  }

  pub fn eval(&mut self) {
    self.training = false;
  }

  pub fn is_training(&self) -> bool {
    self.training
  }

  /// Compute class scores for a batch of shape `[batch, in_features]`.

  pub fn forward(&self, input: &Variable<T>) -> Result<Variable<T>> {
    let shape = input.tensor().shape();
    if shape.rank() != 2 || shape.dims[1] != self.in_features() {
      return Err(Error::ShapeMismatch(format!(
        "model expects [batch, {}] inputs, got {}", self.in_features(), shape)))
    }
    Ok(self.stages.iter().fold(input.clone(), |x, stage| stage.forward(&x, self.training) ))
  }

  /// Most likely class for every row of `input`.

  pub fn predict(&self, input: &Tensor<T>) -> Result<Vec<usize>> {
    Ok(self.forward(&input.tracked())?.argmax_rows())
  }

  pub fn parameters(&self) -> Vec<Variable<T>> {
    self.stages.iter()
      .flat_map(|stage| stage.parameters() )
      .collect()
  }

  pub fn num_parameters(&self) -> usize {
    self.parameters().iter()
      .map(|param| param.size() )
      .sum()
  }
}

impl<T: Real + Serialize + DeserializeOwned> Mlp<T> {
  /// Write all parameters and running statistics to `path`,
  /// creating missing parent directories.

  pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(dir) = path.parent() {
      std::fs::create_dir_all(dir)?;
    }
    let bytes = postcard::to_allocvec(&self.dump())?;
    std::fs::write(path, bytes)?;
    debug!(path = %path.display(), parameters = self.num_parameters(), "Saved model");
    Ok(())
  }

  /// Restore a model written by [save](Mlp::save). It starts out in eval mode.

  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let bytes = std::fs::read(path)?;
    let dump: ModelDump<T> = postcard::from_bytes(&bytes)?;
    Self::restore(dump, &mut StdRng::from_entropy())
  }

  fn dump(&self) -> ModelDump<T> {
    let stages = self.stages.iter().map(|stage| match stage {
      Stage::Linear(linear) => StageDump::Linear {
        weights: linear.weights.tensor().detach(),
        bias: linear.bias.tensor().detach(),
      },
      Stage::Activation(activation) => StageDump::Activation(*activation),
      Stage::Normalize(norm) => StageDump::Normalize {
        scale: norm.scale.tensor().detach(),
        shift: norm.shift.tensor().detach(),
        running_mean: norm.running_mean.detach(),
        running_var: norm.running_var.detach(),
        momentum: norm.momentum,
        eps: norm.eps,
      },
      Stage::Dropout(dropout) => StageDump::Dropout { probability: dropout.probability() },
    }).collect();
    ModelDump { layers: self.layers.clone(), stages }
  }

  fn restore(dump: ModelDump<T>, rng: &mut impl Rng) -> Result<Self> {
    let stages = dump.stages.into_iter().map(|stage| match stage {
      StageDump::Linear { weights, bias } => Stage::Linear(Linear::from_tensors(weights, bias)),
      StageDump::Activation(activation) => Stage::Activation(activation),
      StageDump::Normalize { scale, shift, running_mean, running_var, momentum, eps } => {
        Stage::Normalize(BatchNorm {
          scale: scale.trained(),
          shift: shift.trained(),
          running_mean,
          running_var,
          momentum,
          eps,
        })
      },
      StageDump::Dropout { probability } => Stage::Dropout(Dropout::new(probability, rng)),
    }).collect::<Vec<_>>();
    let linears = stages.iter().filter_map(|stage| match stage {
      Stage::Linear(linear) => Some((linear.in_features(), linear.out_features())),
      _ => None,
    }).collect::<Vec<_>>();
    if linears != dump.layers {
      return Err(Error::ShapeMismatch(format!(
        "stored layers {:?} don't match their weights {:?}", dump.layers, linears)))
    }
    Ok(Self { layers: dump.layers, stages, training: false })
  }
}


#[derive(Serialize, Deserialize)]
enum StageDump<T: Real> {
  Linear { weights: Tensor<T>, bias: Tensor<T> },
  Activation(Activation),
  Normalize {
    scale: Tensor<T>,
    shift: Tensor<T>,
    running_mean: Tensor<T>,
    running_var: Tensor<T>,
    momentum: T,
    eps: T,
  },
  Dropout { probability: T },
}

#[derive(Serialize, Deserialize)]
struct ModelDump<T: Real> {
  layers: Vec<(usize, usize)>,
  stages: Vec<StageDump<T>>,
}


#[cfg(test)]
mod tests {
  use super::*;

  const LAYERS: [(usize, usize); 3] = [(20, 100), (100, 60), (60, 2)];

  fn mlp(dropout: f64, batch_norm: bool, seed: u64) -> Mlp<f32> {
    Mlp::new(&LAYERS, dropout, batch_norm, Activation::default(), &mut StdRng::seed_from_u64(seed)).unwrap()
  }

  fn kinds(model: &Mlp<f32>) -> String {
    model.stages().iter().map(|stage| match stage {
      Stage::Linear(_) => 'L',
      Stage::Activation(_) => 'A',
      Stage::Normalize(_) => 'N',
      Stage::Dropout(_) => 'D',
    }).collect()
  }

  #[test]
  fn stage_order() {
    assert_eq!(kinds(&mlp(0.2, true, 0)), "DLANLANL");
    assert_eq!(kinds(&mlp(0.0, true, 0)), "LANLANL");
    assert_eq!(kinds(&mlp(0.2, false, 0)), "DLALAL");
    assert_eq!(kinds(&mlp(0.0, false, 0)), "LALAL");
  }

  #[test]
  fn single_layer() {
    let model = Mlp::<f32>::new(&[(4, 3)], 0.0, true, Activation::ReLU, &mut StdRng::seed_from_u64(0)).unwrap();
    assert_eq!(kinds(&model), "L");
  }

  #[test]
  fn normalization_widths() {
    let model = mlp(0.0, true, 0);
    let widths: Vec<usize> = model.stages().iter().filter_map(|stage| match stage {
      Stage::Normalize(norm) => Some(norm.num_features()),
      _ => None,
    }).collect();
    assert_eq!(widths, vec![100, 60]);
  }

  #[test]
  fn output_shape() {
    let mut model = mlp(0.2, true, 0);
    let input = Tensor::randn(&[64, 20], &mut StdRng::seed_from_u64(1)).tracked();
    assert_eq!(model.forward(&input).unwrap().shape().dims, vec![64, 2]);
    model.eval();
    assert_eq!(model.forward(&input).unwrap().shape().dims, vec![64, 2]);
  }

  #[test]
  fn wrong_input_width() {
    let model = mlp(0.0, false, 0);
    let input = Tensor::zeros(&[4, 19]).tracked();
    assert!(matches!(model.forward(&input), Err(Error::ShapeMismatch(_))));
  }

  #[test]
  fn parameter_count() {
    assert_eq!(mlp(0.0, false, 0).num_parameters(), 20 * 100 + 100 + 100 * 60 + 60 + 60 * 2 + 2);
    assert_eq!(mlp(0.0, true, 0).num_parameters(), 8282 + 2 * 100 + 2 * 60);
    assert_eq!(mlp(0.0, true, 0).parameters().len(), 10);
  }

  #[test]
  fn seeded_initialization() {
    let a = mlp(0.2, true, 7);
    let b = mlp(0.2, true, 7);
    for (p, q) in a.parameters().iter().zip(b.parameters().iter()) {
      assert_eq!(p, q);
    }
    let c = mlp(0.2, true, 8);
    assert_ne!(a.parameters()[0], c.parameters()[0]);
  }

  #[test]
  fn invalid_layers() {
    let mut rng = StdRng::seed_from_u64(0);
    let build = |layers: &[(usize, usize)], dropout, rng: &mut StdRng| {
      Mlp::<f32>::new(layers, dropout, false, Activation::ReLU, rng)
    };
    assert!(matches!(build(&[], 0.0, &mut rng), Err(Error::ShapeMismatch(_))));
    assert!(matches!(build(&[(20, 100), (50, 2)], 0.0, &mut rng), Err(Error::ShapeMismatch(_))));
    assert!(matches!(build(&[(20, 0), (0, 2)], 0.0, &mut rng), Err(Error::ShapeMismatch(_))));
    assert!(matches!(build(&[(20, 2)], 1.0, &mut rng), Err(Error::Config(_))));
    assert!(matches!(build(&[(20, 2)], -0.1, &mut rng), Err(Error::Config(_))));
  }

  #[test]
  fn save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("model.nn");
    let mut model = mlp(0.2, true, 3);
    let input = Tensor::randn(&[16, 20], &mut StdRng::seed_from_u64(4));
    // Move running statistics away from their initial values
    model.forward(&input.tracked()).unwrap();
    model.eval();
    model.save(&path).unwrap();
    assert!(std::fs::metadata(&path).unwrap().len() > 0);

    let loaded = Mlp::<f32>::load(&path).unwrap();
    assert!(!loaded.is_training());
    assert_eq!(kinds(&loaded), kinds(&model));
    assert_eq!(
      loaded.forward(&input.tracked()).unwrap().tensor(),
      model.forward(&input.tracked()).unwrap().tensor(),
    );
  }

  #[test]
  fn load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(Mlp::<f32>::load(dir.path().join("missing.nn")), Err(Error::Io(_))));
  }
}
