use std::cell::RefCell;

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Serialize, Deserialize};

use crate::{
  internal::*,
  ops::{ BaseOps, RealOps, Hops },
  scalar::Real,
  tensor::Tensor,
  variable::Variable,
};


/// Element-wise non-linearity inserted between linear layers.

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Activation {
  ReLU,
  LeakyReLU(f64),
  Sigmoid,
  Tanh,
}

impl Default for Activation {
  fn default() -> Self {
    Self::LeakyReLU(0.01)
  }
}

impl Activation {
  pub fn apply<T: Real>(&self, input: &Variable<T>) -> Variable<T> {
    match *self {
      Self::ReLU => input.relu(),
      Self::LeakyReLU(slope) => input.leaky_relu(real(slope)),
      Self::Sigmoid => input.sigmoid(),
      Self::Tanh => input.tanh(),
    }
  }
}


/// Fully connected layer computing `input * weights + bias`.

#[derive(Debug, Clone)]
pub struct Linear<T: Real> {
  pub weights: Variable<T>,
  pub bias: Variable<T>,
}

impl<T: Real> Linear<T> {
  pub fn new(in_features: usize, out_features: usize, rng: &mut impl Rng) -> Self {
    Self {
      weights: Tensor::glorot_uniform(&[in_features, out_features], rng).trained(),
      bias: Tensor::zeros(&[out_features]).trained(),
    }
  }

  pub(crate) fn from_tensors(weights: Tensor<T>, bias: Tensor<T>) -> Self {
    Self { weights: weights.trained(), bias: bias.trained() }
  }

  pub fn in_features(&self) -> usize {
    self.weights.dim(0)
  }

  pub fn out_features(&self) -> usize {
    self.weights.dim(1)
  }

  pub fn forward(&self, input: &Variable<T>) -> Variable<T> {
    input.mm(&self.weights) + &self.bias
  }

  pub fn parameters(&self) -> Vec<Variable<T>> {
    vec![self.weights.clone(), self.bias.clone()]
  }
}


/// Batch normalization over the feature dimension.
///
/// Normalizes with batch statistics while training and keeps exponential
/// running averages of them for use during evaluation.

#[derive(Debug, Clone)]
pub struct BatchNorm<T: Real> {
  pub scale: Variable<T>,
  pub shift: Variable<T>,
  pub(crate) running_mean: Tensor<T>,
  pub(crate) running_var: Tensor<T>,
  pub(crate) momentum: T,
  pub(crate) eps: T,
}

impl<T: Real> BatchNorm<T> {
  pub fn new(num_features: usize) -> Self {
    Self {
      scale: Tensor::ones(&[num_features]).trained(),
      shift: Tensor::zeros(&[num_features]).trained(),
      running_mean: Tensor::zeros(&[num_features]),
      running_var: Tensor::ones(&[num_features]),
      momentum: real(0.1),
      eps: real(1e-5),
    }
  }

  pub fn num_features(&self) -> usize {
    self.scale.size()
  }

  pub fn running_mean(&self) -> &Tensor<T> {
    &self.running_mean
  }

  pub fn running_var(&self) -> &Tensor<T> {
    &self.running_var
  }

  pub fn forward(&self, input: &Variable<T>, train: bool) -> Variable<T> {
    let normalized = if train {
      let mean = input.mean_rows();
      let centered = input - &mean;
      let variance = centered.sqr().mean_rows();
      self.track(mean.tensor(), variance.tensor(), input.dim(0));
      &centered / &(variance + self.eps).sqrt()
    } else {
      let deviation = (&self.running_var + self.eps).powf(real(0.5));
      &(input - &self.running_mean.tracked()) / &deviation.tracked()
    };
    &normalized * &self.scale + &self.shift
  }

  fn track(&self, mean: &Tensor<T>, variance: &Tensor<T>, batch_size: usize) {
    let momentum = self.momentum;
    let keep = T::one() - momentum;
    // Running variance is unbiased
    let correction = if batch_size > 1 {
      real::<T>(batch_size as f64) / real(batch_size as f64 - 1.0)
    } else {
      T::one()
    };
    self.running_mean.assign(&(&self.running_mean * keep + mean * momentum));
    self.running_var.assign(&(&self.running_var * keep + variance * (momentum * correction)));
  }

  pub fn parameters(&self) -> Vec<Variable<T>> {
    vec![self.scale.clone(), self.shift.clone()]
  }
}


/// Randomly zeroes inputs while training, scaling the
/// remaining ones to preserve their expected value.

#[derive(Debug)]
pub struct Dropout<T: Real> {
  probability: T,
  rng: RefCell<StdRng>,
}

impl<T: Real> Dropout<T> {
  pub fn new(probability: T, rng: &mut impl Rng) -> Self {
    Self {
      probability,
      rng: RefCell::new(StdRng::seed_from_u64(rng.gen())),
    }
  }

  pub fn probability(&self) -> T {
    self.probability
  }

  pub fn forward(&self, input: &Variable<T>, train: bool) -> Variable<T> {
    if !train || self.probability == T::zero() { return input.clone() }
    let keep = T::one() - self.probability;
    let mask = Tensor::bernoulli(&input.shape().dims, keep, &mut *self.rng.borrow_mut()) / keep;
    input * &mask.tracked()
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use rand::{SeedableRng, rngs::StdRng};

  #[test]
  fn linear_shape() {
    let layer = Linear::<f32>::new(4, 3, &mut StdRng::seed_from_u64(0));
    let output = layer.forward(&Tensor::ones(&[5, 4]).tracked());
    assert_eq!(output.shape().dims, vec![5, 3]);
    assert_eq!((layer.in_features(), layer.out_features()), (4, 3));
  }

  #[test]
  fn activations() {
    let input = Tensor::vec(&[-1.0, 2.0]).tracked();
    assert_eq!(Activation::ReLU.apply(&input).tensor(), &Tensor::vec(&[0.0, 2.0]));
    assert_eq!(Activation::default().apply(&input).tensor(), &Tensor::vec(&[-0.01, 2.0]));
  }

  #[test]
  fn batchnorm_normalizes() {
    let norm = BatchNorm::<f64>::new(2);
    let input = Tensor::new(&[4, 2], vec![1.0, 10.0, 2.0, 20.0, 3.0, 30.0, 4.0, 40.0]).tracked();
    let output = norm.forward(&input, true);
    let mean = output.tensor().sum_over_rows() / 4.0;
    for &value in mean.raw().iter() {
      assert!(value.abs() < 1e-9);
    }
    // Running statistics moved towards the batch statistics
    assert!((norm.running_mean().raw()[0] - 0.25).abs() < 1e-9);
    assert!((norm.running_var().raw()[0] - (0.9 + 0.1 * 1.25 * 4.0 / 3.0)).abs() < 1e-9);
  }

  #[test]
  fn batchnorm_eval_uses_running_statistics() {
    let norm = BatchNorm::<f64>::new(1);
    let input = Tensor::new(&[2, 1], vec![3.0, -3.0]).tracked();
    let output = norm.forward(&input, false);
    let expected = 3.0 / (1.0 + 1e-5_f64).sqrt();
    assert!((output.tensor().raw()[0] - expected).abs() < 1e-9);
  }

  #[test]
  fn dropout_modes() {
    let dropout = Dropout::new(0.5, &mut StdRng::seed_from_u64(0));
    let input = Tensor::<f64>::ones(&[8, 16]).tracked();
    assert_eq!(dropout.forward(&input, false), input);
    let output = dropout.forward(&input, true);
    assert!(output.tensor().raw().iter().all(|&a| a == 0.0 || a == 2.0 ));
    assert!(output.tensor().raw().iter().any(|&a| a == 0.0 ));
  }
}
