use itertools::Itertools;

use crate::{
  error::{ Error, Result },
  ops::RealOps,
  scalar::Real,
  tensor::Tensor,
};


/// Running aggregate over the batches of one evaluation pass.

pub trait Metric<T: Real> {
  fn name(&self) -> &'static str;
  fn reset(&mut self);

  /// Accumulate a batch of class scores and their true labels.

  fn update(&mut self, logits: &Tensor<T>, labels: &[usize]);

  fn compute(&self) -> Result<f64>;
}


/// Fraction of samples whose highest score belongs to the true class.

#[derive(Debug, Clone, Default)]
pub struct Accuracy {
  correct: usize,
  total: usize,
}

impl<T: Real> Metric<T> for Accuracy {
  fn name(&self) -> &'static str {
    "accuracy"
  }

  fn reset(&mut self) {
    *self = Self::default();
  }

  fn update(&mut self, logits: &Tensor<T>, labels: &[usize]) {
    self.correct += logits.argmax_rows().into_iter()
      .zip_eq(labels)
      .filter(|(predicted, label)| predicted == *label )
      .count();
    self.total += labels.len();
  }

  fn compute(&self) -> Result<f64> {
    if self.total == 0 { return Err(Error::EmptyMetric("accuracy")) }
    Ok(self.correct as f64 / self.total as f64)
  }
}


/// Mean cross-entropy per sample.

#[derive(Debug, Clone, Default)]
pub struct Loss {
  sum: f64,
  total: usize,
}

impl<T: Real> Metric<T> for Loss {
  fn name(&self) -> &'static str {
    "loss"
  }

  fn reset(&mut self) {
    *self = Self::default();
  }

  fn update(&mut self, logits: &Tensor<T>, labels: &[usize]) {
    let loss = logits.cross_entropy(labels).item().to_f64().unwrap_or(f64::NAN);
    self.sum += loss * labels.len() as f64;
    self.total += labels.len();
  }

  fn compute(&self) -> Result<f64> {
    if self.total == 0 { return Err(Error::EmptyMetric("loss")) }
    Ok(self.sum / self.total as f64)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_abs_diff_eq;

  fn logits() -> Tensor<f64> {
    Tensor::new(&[4, 2], vec![2.0, 0.0, 0.0, 2.0, 1.0, 0.0, 0.0, 0.0])
  }

  #[test]
  fn accuracy() {
    let mut metric = Accuracy::default();
    Metric::<f64>::update(&mut metric, &logits(), &[0, 1, 1, 0]);
    assert_abs_diff_eq!(Metric::<f64>::compute(&metric).unwrap(), 0.75);
    Metric::<f64>::update(&mut metric, &logits(), &[1, 0, 1, 1]);
    assert_abs_diff_eq!(Metric::<f64>::compute(&metric).unwrap(), 0.375);
    Metric::<f64>::reset(&mut metric);
    assert!(matches!(Metric::<f64>::compute(&metric), Err(Error::EmptyMetric(_))));
  }

  #[test]
  fn loss_weights_batches() {
    let mut metric = Loss::default();
    let small = Tensor::<f64>::new(&[1, 2], vec![0.0, 0.0]);
    metric.update(&small, &[0]);
    metric.update(&logits(), &[0, 1, 0, 1]);
    let ln2 = 2.0_f64.ln();
    let big = logits().cross_entropy(&[0, 1, 0, 1]).item();
    let expected = (ln2 + 4.0 * big) / 5.0;
    assert_abs_diff_eq!(Metric::<f64>::compute(&metric).unwrap(), expected, epsilon = 1e-12);
  }

  #[test]
  #[should_panic]
  fn mismatched_labels() {
    let mut metric = Accuracy::default();
    Metric::<f64>::update(&mut metric, &logits(), &[0, 1]);
  }
}
