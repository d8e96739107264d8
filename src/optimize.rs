use std::collections::HashMap;

use crate::{
  internal::*,
  error::{ Error, Result },
  scalar::Real,
  tensor::Tensor,
  variable::Variable,
  ops::BaseOps,
};


/// An optimization strategy to be used with [Optimizer].

pub trait Strategy<R: Real> {
  /// Compute the change to apply to `param`, given its current gradient.

  fn update(&mut self, param: &Variable<R>, grad: &Tensor<R>, rate: R, step: usize) -> Tensor<R>;
}


/// Generic optimizer that allows for several optimization [strategies](Strategy) to be used.

#[derive(Debug)]
pub struct Optimizer<R: Real, S: Strategy<R>> {
  strategy: S,
  pub learning_rate: R,
  step: usize,
}

impl<R: Real, S: Strategy<R>> Optimizer<R, S> {
  pub fn new(learning_rate: R, strategy: S) -> Self {
    Self { strategy, learning_rate, step: 1 }
  }

  pub fn strategy(&self) -> &S {
    &self.strategy
  }

  /// Number of updates performed so far.

  pub fn steps(&self) -> usize {
    self.step - 1
  }

  pub fn minimize(&mut self, loss: &Variable<R>, params: &[Variable<R>]) -> Result<()> {
    // Compute gradients
    loss.backward();

    // Optimize individual parameters
    for param in params {
      let grad = param.grad()
        .ok_or_else(|| Error::Config(format!("cannot optimize constant {}", param.shape())) )?;

      // Execute strategy
      let change = self.strategy.update(param, grad, self.learning_rate, self.step);

      // Apply change
      let weights = param.tensor();
      weights.assign(&(weights + change));
    }

    // Reset gradients
    loss.reset();

    self.step += 1;
    Ok(())
  }
}


/// Adaptive Movement Estimation strategy (ADAM)
///
/// A non-zero `weight_decay` adds L2 regularization by
/// folding `weight_decay * weights` into every gradient.

#[derive(Debug, Clone)]
pub struct Adam<R: Real> {
  pub beta1: R,
  pub beta2: R,
  pub epsilon: R,
  pub weight_decay: R,
  m: HashMap<usize, Tensor<R>>,
  v: HashMap<usize, Tensor<R>>,
}

impl<R: Real> Adam<R> {
  pub fn new(beta1: R, beta2: R) -> Self {
    Self {
      beta1,
      beta2,
      epsilon: real(1e-8),
      weight_decay: R::zero(),
      m: HashMap::new(),
      v: HashMap::new(),
    }
  }

  pub fn with_weight_decay(self, weight_decay: R) -> Self {
    Self { weight_decay, ..self }
  }
}

impl<R: Real> Default for Adam<R> {
  fn default() -> Self {
    Self::new(real(0.9), real(0.999))
  }
}

impl<R: Real> Strategy<R> for Adam<R> {
  fn update(&mut self, param: &Variable<R>, grad: &Tensor<R>, rate: R, step: usize) -> Tensor<R> {
    let id = param.id();
    let weights = param.tensor();
    let grad = if self.weight_decay == R::zero() {
      grad.clone()
    } else {
      grad + &(weights * self.weight_decay)
    };
    let shape = &weights.shape().dims;
    let m = self.m.entry(id).or_insert_with(|| Tensor::zeros(shape) );
    m.assign(&(&*m * self.beta1 + &grad * (R::one() - self.beta1)));
    let v = self.v.entry(id).or_insert_with(|| Tensor::zeros(shape) );
    v.assign(&(&*v * self.beta2 + grad.powf(real(2.0)) * (R::one() - self.beta2)));
    let step = real::<R>(step as f64);
    let mt = &self.m[&id] / (R::one() - self.beta1.powf(step));
    let vt = &self.v[&id] / (R::one() - self.beta2.powf(step));
    mt * -rate / (vt.powf(real(0.5)) + self.epsilon)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_abs_diff_eq;
  use crate::ops::Hops;

  #[test]
  fn adam_minimizes() {
    let x = Tensor::vec(&[3.0_f64, -2.0]).trained();
    let mut optimizer = Optimizer::new(0.1, Adam::default());
    for _ in 0..500 {
      let loss = x.sqr().sum();
      optimizer.minimize(&loss, &loss.parameters()).unwrap();
    }
    assert_eq!(optimizer.steps(), 500);
    for &value in x.tensor().raw().iter() {
      assert!(value.abs() < 0.1);
    }
  }

  #[test]
  fn first_step_size() {
    // Bias corrected Adam moves every weight by roughly the learning rate initially
    let x = Tensor::vec(&[1.0, -5.0]).trained();
    let mut optimizer = Optimizer::new(0.01, Adam::default());
    let loss = x.sqr().sum();
    optimizer.minimize(&loss, &loss.parameters()).unwrap();
    assert_abs_diff_eq!(x.tensor().raw()[0], 0.99, epsilon = 1e-6);
    assert_abs_diff_eq!(x.tensor().raw()[1], -4.99, epsilon = 1e-6);
    assert_eq!(x.grad(), Some(&Tensor::zeros(&[2])));
  }

  #[test]
  fn weight_decay_shrinks() {
    // Without any loss gradient, decay alone pulls weights towards zero
    let x = Tensor::vec(&[2.0]).trained();
    let mut optimizer = Optimizer::new(0.01, Adam::default().with_weight_decay(0.1));
    let loss = (&x * 0.0).sum();
    optimizer.minimize(&loss, &[x.clone()]).unwrap();
    assert!(x.tensor().item() < 2.0);
  }

  #[test]
  fn constant_parameter() {
    let x = Tensor::vec(&[1.0]).trained();
    let c = Tensor::vec(&[1.0]).tracked();
    let loss = (&x * &c).sum();
    let mut optimizer = Optimizer::new(0.01, Adam::default());
    assert!(matches!(optimizer.minimize(&loss, &[c]), Err(Error::Config(_))));
  }
}
