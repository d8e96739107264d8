use crate::{
  internal::*,
  error::{ Error, Result },
  optimize::{ Optimizer, Strategy },
  scalar::Real,
};


/// Adjusts an [Optimizer]'s learning rate once per epoch.

pub trait Scheduler<R: Real> {
  fn step<S: Strategy<R>>(&mut self, optimizer: &mut Optimizer<R, S>);

  /// Learning rate for the current epoch.

  fn learning_rate(&self) -> R;
}


/// Decays the learning rate by `gamma` every `step_size` epochs.

#[derive(Debug, Clone)]
pub struct StepLr<R: Real> {
  base_lr: R,
  step_size: usize,
  gamma: R,
  epoch: usize,
}

impl<R: Real> StepLr<R> {
  pub fn new(base_lr: R, step_size: usize, gamma: R) -> Result<Self> {
    if step_size == 0 {
      return Err(Error::Config("scheduler step size must be positive".to_string()))
    }
    Ok(Self { base_lr, step_size, gamma, epoch: 0 })
  }

  pub fn epoch(&self) -> usize {
    self.epoch
  }
}

impl<R: Real> Scheduler<R> for StepLr<R> {
  fn step<S: Strategy<R>>(&mut self, optimizer: &mut Optimizer<R, S>) {
    self.epoch += 1;
    optimizer.learning_rate = self.learning_rate();
  }

  fn learning_rate(&self) -> R {
    let decays = (self.epoch / self.step_size) as f64;
    self.base_lr * self.gamma.powf(real(decays))
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;
  use crate::optimize::Adam;

  #[test]
  fn step_decay() {
    let mut optimizer = Optimizer::new(0.001, Adam::<f64>::default());
    let mut scheduler = StepLr::new(0.001, 10, 0.1).unwrap();
    let mut rates = vec![];
    for _ in 0..40 {
      scheduler.step(&mut optimizer);
      rates.push(optimizer.learning_rate);
    }
    assert_relative_eq!(rates[0], 0.001, max_relative = 1e-9);
    assert_relative_eq!(rates[8], 0.001, max_relative = 1e-9);
    assert_relative_eq!(rates[9], 0.0001, max_relative = 1e-9);
    assert_relative_eq!(rates[19], 0.00001, max_relative = 1e-9);
    assert_relative_eq!(rates[39], 0.0000001, max_relative = 1e-9);
    assert_eq!(scheduler.epoch(), 40);
  }

  #[test]
  fn zero_step_size() {
    assert!(matches!(StepLr::new(0.1_f32, 0, 0.5), Err(Error::Config(_))));
  }
}
