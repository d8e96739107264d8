use std::ops::{ Add, Sub, Mul, Div };

use crate::internal::*;
use crate::Shape;
use crate::scalar::Real;


/// Arithmetic operators between references and with scalars.
///
/// Gets implemented automatically for every type that
/// provides all of the dependent operators.

pub trait Arithmetic<R, I, O>:
  Add<R, Output = O> + Sub<R, Output = O> + Mul<R, Output = O> + Div<R, Output = O> +
  Add<I, Output = O> + Sub<I, Output = O> + Mul<I, Output = O> + Div<I, Output = O>
{}

impl<R, I, O, T> Arithmetic<R, I, O> for T
where
  T: Add<R, Output = O> + Sub<R, Output = O> + Mul<R, Output = O> + Div<R, Output = O> +
     Add<I, Output = O> + Sub<I, Output = O> + Mul<I, Output = O> + Div<I, Output = O>
{}


/// Mid-level operations, implemented for both [Tensor](crate::Tensor)s
/// and [Variable](crate::Variable)s. On the latter, they are differentiable.

pub trait BaseOps<I: Real>: Clone + Sized {
  fn scalar(item: I) -> Self;
  fn shape(&self) -> &Shape;
  fn sum(&self) -> Self;
  fn sum_rows(&self) -> Self;
  fn mm(&self, rhs: &Self) -> Self;
  fn powf(&self, exp: I) -> Self;
}


/// Differentiable activation and loss functions.

pub trait RealOps<I: Real> {
  fn relu(&self) -> Self;
  fn leaky_relu(&self, slope: I) -> Self;
  fn sigmoid(&self) -> Self;
  fn tanh(&self) -> Self;

  /// Mean negative log-likelihood of the given class labels
  /// under the row-wise softmax of these scores.

  fn cross_entropy(&self, labels: &[usize]) -> Self;
}


/// High-level operations, implemented exclusively on top of
/// mid-level operations and arithmetic. As a result, these are all
/// differentiable when called on a [Variable](crate::Variable).

pub trait Hops<I>: BaseOps<I>
where
  I: Real,
  for<'a> &'a Self: Arithmetic<&'a Self, I, Self>,
{
  fn sqr(&self) -> Self {
    self * self
  }

  fn sqrt(&self) -> Self {
    self.powf(real(0.5))
  }

  fn mean(&self) -> Self {
    let n = I::from(self.shape().size()).unwrap();
    &self.sum() / n
  }

  /// Average over the leading dimension of a matrix.

  fn mean_rows(&self) -> Self {
    let n = I::from(self.shape().rows()).unwrap();
    &self.sum_rows() / n
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::Tensor;

  #[test]
  fn mean() {
    let a = Tensor::new(&[3, 2], vec![1., 2., 3., 4., 5., 6.]).trained();
    assert_eq!(a.mean().tensor(), &Tensor::new(&[], vec![3.5]));
    assert_eq!(a.mean_rows().tensor(), &Tensor::vec(&[3.0, 4.0]));
  }

  #[test]
  fn cross_entropy() {
    let scores = Tensor::new(&[2, 2], vec![0.0, 0.0, 0.0, 0.0]);
    let loss = scores.cross_entropy(&[0, 1]).item();
    assert!((loss - 2.0_f64.ln()).abs() < 1e-12);
  }
}
