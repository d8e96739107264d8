use serde::{Serialize, Deserialize};

use crate::internal::*;


/// The shape of a [Tensor](crate::Tensor).
///
/// Tensors are always stored contiguously in row-major order,
/// so the dimensions alone describe the layout.

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
  pub dims: Vec<usize>,
}

impl Shape {
  pub fn new(dims: &[usize]) -> Self {
    Self { dims: dims.to_vec() }
  }

  pub fn scalar() -> Self {
    Self { dims: vec![] }
  }

  pub fn size(&self) -> usize {
    self.dims.iter().product()
  }

  pub fn rank(&self) -> usize {
    self.dims.len()
  }

  /// Number of rows when viewed as a matrix.
  /// Vectors and scalars count as a single row.

  pub fn rows(&self) -> usize {
    if self.rank() < 2 { 1 } else { self.dims[..self.rank() - 1].iter().product() }
  }

  /// Width of the innermost dimension.

  pub fn cols(&self) -> usize {
    self.dims.last().copied().unwrap_or(1)
  }

  pub fn is_scalar(&self) -> bool {
    self.size() == 1 && self.rank() <= 1
  }

  /// Check whether a tensor of shape `other` may be broadcast onto this one.
  ///
  /// Only scalars and vectors matching the innermost dimension broadcast.

  pub fn accepts(&self, other: &Self) -> bool {
    self == other
      || other.is_scalar()
      || (other.rank() == 1 && other.dims[0] == self.cols())
  }

  pub fn transpose(&self) -> Self {
    assert_eq!(self.rank(), 2, "Can only transpose matrices, got {}", self);
    Self::new(&[self.dims[1], self.dims[0]])
  }
}

impl std::ops::Index<isize> for Shape {
  type Output = usize;

  fn index(&self, idx: isize) -> &Self::Output {
    &self.dims[negative_index(idx, self.rank(), false)]
  }
}

impl std::fmt::Display for Shape {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Shape{:?}", self.dims)
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rows_cols() {
    let shape = Shape::new(&[4, 3]);
    assert_eq!(shape.rows(), 4);
    assert_eq!(shape.cols(), 3);
    assert_eq!(shape[-1], 3);
    assert_eq!(Shape::new(&[7]).rows(), 1);
  }

  #[test]
  fn accepts() {
    let shape = Shape::new(&[4, 3]);
    assert!(shape.accepts(&Shape::new(&[3])));
    assert!(shape.accepts(&Shape::scalar()));
    assert!(shape.accepts(&Shape::new(&[1])));
    assert!(!shape.accepts(&Shape::new(&[4])));
  }
}
