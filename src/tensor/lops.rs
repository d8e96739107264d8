use crate::{
  internal::*,
  shape::Shape,
  tensor::Tensor,
  scalar::{ Numeric, Real },
  ops::{ BaseOps, RealOps, Hops },
};


impl<T: Real> BaseOps<T> for Tensor<T> {
  fn scalar(item: T) -> Self {
    Self::new(&[], vec![item])
  }

  fn shape(&self) -> &Shape {
    &self.shape
  }

  fn sum(&self) -> Self {
    self.sum_all()
  }

  fn sum_rows(&self) -> Self {
    self.sum_over_rows()
  }

  fn mm(&self, rhs: &Self) -> Self {
    assert!(self.rank() == 2 && rhs.rank() == 2,
      "Matrix multiply requires matrices, got {} and {}", self.shape, rhs.shape);
    let (m, k) = (self.shape.dims[0], self.shape.dims[1]);
    let n = rhs.shape.dims[1];
    assert_eq!(k, rhs.shape.dims[0],
      "Dimension mismatch: cannot multiply {} with {}", self.shape, rhs.shape);
    let mut data = vec![T::zero(); m * n];
    T::gemm(m, k, n, &self.raw(), &rhs.raw(), &mut data);
    Tensor::new(&[m, n], data)
  }

  fn powf(&self, exp: T) -> Self {
    self.vectorize(|a| a.powf(exp) )
  }
}

impl<T: Real> RealOps<T> for Tensor<T> {
  fn relu(&self) -> Self {
    self.vectorize(|a| if a > T::zero() { a } else { T::zero() })
  }

  fn leaky_relu(&self, slope: T) -> Self {
    self.vectorize(|a| if a > T::zero() { a } else { a * slope })
  }

  fn sigmoid(&self) -> Self {
    self.vectorize(|a| T::one() / (T::one() + (-a).exp()) )
  }

  fn tanh(&self) -> Self {
    self.vectorize(|a| a.tanh() )
  }

  fn cross_entropy(&self, labels: &[usize]) -> Self {
    let rows = self.shape.rows();
    let cols = self.shape.cols();
    assert_eq!(rows, labels.len(),
      "Dimension mismatch: {} scores for {} labels", self.shape, labels.len());
    let data = self.raw();
    let total: T = data
      .chunks(cols)
      .zip(labels)
      .map(|(row, &label)| {
        assert!(label < cols, "Label {label} out of range for {cols} classes");
        let max = row.iter().copied().fold(T::min_value(), T::max);
        let log_sum = row.iter().map(|&a| (a - max).exp() ).sum::<T>().ln() + max;
        log_sum - row[label]
      })
      .sum();
    Self::scalar(total / real::<T>(rows as f64))
  }
}

impl<T: Real> Hops<T> for Tensor<T> {}


macro_rules! add_operator {
  ($op:ident, $meth:ident, $symbol:tt) => {
    impl<T: Numeric> std::ops::$op for &Tensor<T> { // &tensor * &other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Self) -> Tensor<T> {
        self.zip(rhs, |(a, b)| a $symbol b )
      }
    }

    impl<T: Numeric> std::ops::$op for Tensor<T> { // tensor * other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Self) -> Tensor<T> {
        &self $symbol &rhs
      }
    }

    impl<T: Numeric> std::ops::$op<Tensor<T>> for &Tensor<T> { // &tensor * other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Tensor<T>) -> Tensor<T> {
        self $symbol &rhs
      }
    }

    impl<T: Numeric> std::ops::$op<&Tensor<T>> for Tensor<T> { // tensor * &other
      type Output = Tensor<T>;

      fn $meth(self, rhs: &Tensor<T>) -> Tensor<T> {
        &self $symbol rhs
      }
    }

    impl<T: Numeric> std::ops::$op<T> for &Tensor<T> { // &tensor * T
      type Output = Tensor<T>;

      fn $meth(self, rhs: T) -> Tensor<T> {
        self.vectorize(|a| a $symbol rhs )
      }
    }

    impl<T: Numeric> std::ops::$op<T> for Tensor<T> { // tensor * T
      type Output = Tensor<T>;

      fn $meth(self, rhs: T) -> Tensor<T> {
        &self $symbol rhs
      }
    }
  };
}

add_operator!(Add, add, +);
add_operator!(Sub, sub, -);
add_operator!(Mul, mul, *);
add_operator!(Div, div, /);

impl<T: Real> std::ops::Neg for &Tensor<T> {
  type Output = Tensor<T>;

  fn neg(self) -> Self::Output {
    self.vectorize(|a| -a )
  }
}

impl<T: Real> std::ops::Neg for Tensor<T> {
  type Output = Tensor<T>;

  fn neg(self) -> Self::Output {
    -&self
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mm() {
    let a = Tensor::arrange(&[2, 3], 1.0, 1.0);
    let b = Tensor::arrange(&[3, 2], 1.0, 1.0);
    assert_eq!(a.mm(&b), Tensor::new(&[2, 2], vec![22.0, 28.0, 49.0, 64.0]));
  }

  #[test]
  #[should_panic(expected = "Dimension mismatch")]
  fn mm_mismatch() {
    let a = Tensor::<f32>::ones(&[2, 3]);
    a.mm(&Tensor::ones(&[2, 3]));
  }

  #[test]
  fn operators() {
    let a = Tensor::new(&[2, 2], vec![1.0, 2.0, 3.0, 4.0]);
    let b = Tensor::vec(&[1.0, 2.0]);
    assert_eq!(&a - &b, Tensor::new(&[2, 2], vec![0.0, 0.0, 2.0, 2.0]));
    assert_eq!(&a * 2.0, Tensor::new(&[2, 2], vec![2.0, 4.0, 6.0, 8.0]));
    assert_eq!(-a, Tensor::new(&[2, 2], vec![-1.0, -2.0, -3.0, -4.0]));
  }

  #[test]
  fn activations() {
    let a = Tensor::vec(&[-2.0, 0.0, 3.0]);
    assert_eq!(a.relu(), Tensor::vec(&[0.0, 0.0, 3.0]));
    assert_eq!(a.leaky_relu(0.5), Tensor::vec(&[-1.0, 0.0, 3.0]));
    assert_eq!(a.sigmoid().raw()[1], 0.5);
  }
}
