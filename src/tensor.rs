use std::rc::Rc;
use std::cell::{Ref, RefMut, RefCell};

use rand::Rng;
use serde::{Serialize, Deserialize};

mod cops;
mod lops;

use crate::{
  internal::*,
  shape::Shape,
  variable::Variable,
  scalar::{ Inner, Numeric, Real },
};


/// Dense, row-major multidimensional array.
///
/// Tensors may contain any type that satisfies [Inner], but
/// additional methods are available for [Numeric] and [Real] inner types.
///
/// Cloning a tensor is cheap and shares its storage, which allows
/// parameters to be updated in place through any of their handles.
/// Use [detach](Tensor::detach) for an independent copy.
///
/// [Real] tensor types can be wrapped in a [Variable] by
/// calling [tracked](Tensor::tracked) or [trained](Tensor::trained).

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tensor<T: Inner> {
  shape: Shape,
  data: Rc<RefCell<Vec<T>>>,
}

impl<T: Inner> PartialEq for Tensor<T> {
  fn eq(&self, rhs: &Self) -> bool {
    self.shape == rhs.shape && *self.data.borrow() == *rhs.data.borrow()
  }
}

impl<T: Inner> Tensor<T> {
  pub fn from_shape(shape: Shape, data: Vec<T>) -> Self {
    assert_eq!(shape.size(), data.len(),
      "{} doesn't match data length {}", shape, data.len());
    Self { shape, data: Rc::new(RefCell::new(data)) }
  }

  pub fn new(shape: &[usize], data: Vec<T>) -> Self {
    Self::from_shape(Shape::new(shape), data)
  }

  pub fn vec(vec: &[T]) -> Self {
    Self::new(&[vec.len()], vec.to_vec())
  }

  pub fn fill(shape: &[usize], filler: T) -> Self {
    Self::new(shape, vec![filler; shape.iter().product()])
  }

  pub fn init(shape: &[usize], mut cb: impl FnMut(usize) -> T) -> Self {
    let shape = Shape::new(shape);
    let data = (0..shape.size()).map(|i| cb(i) ).collect();
    Self::from_shape(shape, data)
  }

  /// Stack equally shaped tensors along a new leading dimension.

  pub fn rows(rows: &[Tensor<T>]) -> Self {
    assert!(!rows.is_empty(), "Cannot stack an empty list of tensors");
    let mut dims = rows[0].shape.dims.clone();
    for row in rows {
      assert_eq!(row.shape, rows[0].shape,
        "Cannot stack {} with {}", row.shape, rows[0].shape);
    }
    dims.insert(0, rows.len());
    let data = rows.iter()
      .flat_map(|row| row.raw().clone() )
      .collect();
    Self::new(&dims, data)
  }

  pub fn shape(&self) -> &Shape {
    &self.shape
  }

  pub fn raw(&self) -> Ref<Vec<T>> {
    self.data.borrow()
  }

  pub fn raw_mut(&self) -> RefMut<Vec<T>> {
    self.data.borrow_mut()
  }

  pub fn to_vec(&self) -> Vec<T> {
    self.raw().clone()
  }

  pub fn into_raw(self) -> Vec<T> {
    Rc::unwrap_or_clone(self.data).into_inner()
  }

  pub fn size(&self) -> usize {
    self.shape.size()
  }

  pub fn rank(&self) -> usize {
    self.shape.rank()
  }

  pub fn dim(&self, idx: isize) -> usize {
    self.shape[idx]
  }

  pub fn shared_with(&self, other: &Self) -> bool {
    Rc::ptr_eq(&self.data, &other.data)
  }

  /// Overwrite this tensor's storage with the contents of `other`.
  ///
  /// All clones of this tensor observe the change.

  pub fn assign(&self, other: &Self) {
    assert_eq!(self.size(), other.size(),
      "Could not assign {} tensor to {} tensor", other.shape, self.shape);
    if self.shared_with(other) { return }
    self.raw_mut().copy_from_slice(&other.raw());
  }

  pub fn refill(&self, filler: T) {
    for value in self.raw_mut().iter_mut() {
      *value = filler;
    }
  }

  pub fn op_assign(&self, other: &Self, cb: impl Fn(&mut T, T)) {
    assert!(self.shape.accepts(&other.shape),
      "Could not combine {} tensor into {} tensor", other.shape, self.shape);
    let other = if self.shared_with(other) { other.detach() } else { other.clone() };
    let mut data = self.raw_mut();
    let other_data = other.raw();
    let index = broadcast_index(&self.shape, &other.shape);
    for (i, value) in data.iter_mut().enumerate() {
      cb(value, other_data[index(i)]);
    }
  }

  pub fn detach(&self) -> Self {
    Self::new(&self.shape.dims, self.to_vec())
  }

  /// View the same storage under different dimensions.

  pub fn reshape(&self, dims: &[usize]) -> Self {
    let shape = Shape::new(dims);
    assert_eq!(shape.size(), self.size(),
      "Cannot reshape {} into {}", self.shape, shape);
    Self { shape, data: self.data.clone() }
  }

  pub fn item(&self) -> T {
    assert!(self.size() == 1,
      "Can't extract item from non-scalar {}", self.shape);
    self.raw()[0]
  }

  /// Copy the `index`th row out of a matrix.

  pub fn row(&self, index: usize) -> Self {
    let rows = self.shape.rows();
    let cols = self.shape.cols();
    assert!(index < rows, "Row {index} out of range for {}", self.shape);
    let data = self.raw()[index * cols .. (index + 1) * cols].to_vec();
    Self::new(&[cols], data)
  }

  pub fn transpose(&self) -> Self {
    let shape = self.shape.transpose();
    let (rows, cols) = (self.shape.dims[0], self.shape.dims[1]);
    let data = self.raw();
    let transposed = (0..rows * cols)
      .map(|i| data[(i % rows) * cols + i / rows] )
      .collect();
    Self::from_shape(shape, transposed)
  }

  pub fn vectorize<O, F>(&self, cb: F) -> Tensor<O>
  where
    O: Inner,
    F: FnMut(T) -> O,
  {
    let data = self.raw().iter().copied().map(cb).collect();
    Tensor::new(&self.shape.dims, data)
  }

  /// Combine two tensors element-wise.
  ///
  /// Either side may be a scalar or a vector matching
  /// the other side's innermost dimension.

  pub fn zip<O, F>(&self, rhs: &Self, cb: F) -> Tensor<O>
  where
    O: Inner,
    F: Fn((T, T)) -> O,
  {
    let shape = if self.shape.accepts(&rhs.shape) {
      self.shape.clone()
    } else if rhs.shape.accepts(&self.shape) {
      rhs.shape.clone()
    } else {
      panic!("Dimension mismatch: cannot broadcast {} with {}", self.shape, rhs.shape)
    };
    let index_l = broadcast_index(&shape, &self.shape);
    let index_r = broadcast_index(&shape, &rhs.shape);
    let data_l = self.raw();
    let data_r = rhs.raw();
    let data = (0..shape.size())
      .map(|i| cb((data_l[index_l(i)], data_r[index_r(i)])) )
      .collect();
    Tensor::from_shape(shape, data)
  }
}

/// Map an index into a tensor of shape `target` onto the storage
/// of a tensor with (broadcastable) shape `source`.

fn broadcast_index(target: &Shape, source: &Shape) -> impl Fn(usize) -> usize {
  let cols = source.cols();
  let mode = if source.size() == target.size() {
    0
  } else if source.is_scalar() {
    1
  } else {
    2
  };
  move |i| match mode {
    0 => i,
    1 => 0,
    _ => i % cols,
  }
}

impl<T: Numeric> Tensor<T> {
  pub fn ones(shape: &[usize]) -> Self {
    Self::fill(shape, T::one())
  }

  pub fn zeros(shape: &[usize]) -> Self {
    Self::fill(shape, T::zero())
  }

  pub fn arrange(shape: &[usize], start: T, step: T) -> Self {
    Self::init(shape, |i| T::from(i).unwrap() * step + start )
  }

  pub fn hot_encode(idx: usize, size: usize) -> Self {
    Self::init(&[size], |i| if i == idx { T::one() } else { T::zero() })
  }

  /// Sum all elements into a scalar.

  pub fn sum_all(&self) -> Self {
    let sum = self.raw().iter().copied().sum();
    Self::new(&[], vec![sum])
  }

  /// Collapse all rows of a matrix into a single vector.

  pub fn sum_over_rows(&self) -> Self {
    let cols = self.shape.cols();
    let mut sums = vec![T::zero(); cols];
    for (i, &value) in self.raw().iter().enumerate() {
      sums[i % cols] += value;
    }
    Self::new(&[cols], sums)
  }

  /// Reduce a broadcast result back onto the shape it was broadcast from.

  pub fn reduce_to(&self, shape: &Shape) -> Self {
    if &self.shape == shape {
      self.clone()
    } else if shape.is_scalar() {
      self.sum_all().reshape(&shape.dims)
    } else {
      self.sum_over_rows().reshape(&shape.dims)
    }
  }

  /// Index of the greatest value in every row.

  pub fn argmax_rows(&self) -> Vec<usize> {
    let cols = self.shape.cols();
    self.raw()
      .chunks(cols)
      .map(|row| {
        let mut index = 0;
        for (i, &value) in row.iter().enumerate() {
          if value > row[index] { index = i }
        }
        index
      })
      .collect()
  }

  pub fn clamp(&self, min: T, max: T) -> Self {
    self.vectorize(|a| if a < min { min } else if a > max { max } else { a } )
  }

  pub fn cast<I: Numeric>(&self) -> Tensor<I> {
    self.vectorize(|a| I::from(a).unwrap() )
  }
}

impl<T: Real> Tensor<T> {
  pub fn uniform(shape: &[usize], low: T, high: T, rng: &mut impl Rng) -> Self {
    Self::init(shape, |_| rng.gen_range(low, high) )
  }

  pub fn randn(shape: &[usize], rng: &mut impl Rng) -> Self {
    let len = shape.iter().product();
    let mut data = vec![T::zero(); len];
    for i in 0..(len + 1) / 2 {
      let j = i * 2;
      let (r1, r2): (T, T) = randn(rng);
      data[j] = r1;
      if j + 1 < len { data[j + 1] = r2 }
    }
    Self::new(shape, data)
  }

  pub fn glorot_uniform(shape: &[usize], rng: &mut impl Rng) -> Self {
    let fan_in = shape[0];
    let fan_out = shape[shape.len() - 1];
    let limit = (real::<T>(6.0) / real::<T>((fan_in + fan_out) as f64)).sqrt();
    Self::uniform(shape, -limit, limit, rng)
  }

  /// Sample ones with the given probability, zeros otherwise.

  pub fn bernoulli(shape: &[usize], probability: T, rng: &mut impl Rng) -> Self {
    Self::init(shape, |_| if rng.gen_range(T::zero(), T::one()) < probability {
      T::one()
    } else {
      T::zero()
    })
  }

  pub fn trained(&self) -> Variable<T> {
    Variable::from_tensor(self.clone(), true)
  }

  pub fn tracked(&self) -> Variable<T> {
    Variable::from_tensor(self.clone(), false)
  }

  pub fn exp(&self) -> Self {
    self.vectorize(|a| a.exp() )
  }

  pub fn log(&self) -> Self {
    self.vectorize(|a| a.ln() )
  }

  /// Row-wise softmax of a matrix of scores.

  pub fn softmax_rows(&self) -> Self {
    let cols = self.shape.cols();
    let data: Vec<T> = self.raw()
      .chunks(cols)
      .flat_map(|row| {
        let max = row.iter().copied().fold(T::min_value(), T::max);
        let exp: Vec<T> = row.iter().map(|&a| (a - max).exp() ).collect();
        let sum: T = exp.iter().copied().sum();
        exp.into_iter().map(move |a| a / sum )
      })
      .collect();
    Self::new(&self.shape.dims, data)
  }
}

impl<T: Inner> std::fmt::Display for Tensor<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Tensor{:?} ", self.shape.dims)?;
    print_chunks(0, &self.shape, &self.raw(), f)?;
    Ok(())
  }
}

fn print_chunks<T: std::fmt::Debug>(idx: usize, shape: &Shape, vec: &[T], f: &mut std::fmt::Formatter) -> std::fmt::Result {
  let indent = (0..idx * 2).map(|_| " ").collect::<String>();
  if shape.rank() == 0 {
    write!(f, "{indent}{:?}", vec[0])?;
  } else if idx == shape.rank() - 1 {
    write!(f, "{indent}{:?}\n", vec)?;
  } else {
    let chunks = vec.chunks(vec.len() / shape.dims[idx]);
    write!(f, "{indent}[\n")?;
    for chunk in chunks {
      print_chunks(idx + 1, shape, chunk, f)?;
    }
    write!(f, "{indent}]\n")?;
  }
  Ok(())
}


#[cfg(test)]
mod tests {
  use super::*;
  use rand::{SeedableRng, rngs::StdRng};

  #[test]
  fn row() {
    let x = Tensor::new(&[3, 2], vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(x.row(0), Tensor::vec(&[1, 2]));
    assert_eq!(x.row(2), Tensor::vec(&[5, 6]));
  }

  #[test]
  fn stack_rows() {
    let x = Tensor::rows(&[Tensor::vec(&[1, 2]), Tensor::vec(&[3, 4])]);
    assert_eq!(x, Tensor::new(&[2, 2], vec![1, 2, 3, 4]));
  }

  #[test]
  fn transpose() {
    let a = Tensor::arrange(&[2, 3], 0, 1).transpose();
    assert_eq!(a, Tensor::new(&[3, 2], vec![0, 3, 1, 4, 2, 5]));
  }

  #[test]
  fn broadcast() {
    let x = Tensor::new(&[2, 3], vec![1, 2, 3, 4, 5, 6]);

    let y = Tensor::new(&[1], vec![1]);
    assert_eq!(x.zip(&y, |(a, b)| a + b ), Tensor::new(&[2, 3], vec![2, 3, 4, 5, 6, 7]));

    let y = Tensor::vec(&[1, 2, 3]);
    assert_eq!(x.zip(&y, |(a, b)| a + b ), Tensor::new(&[2, 3], vec![2, 4, 6, 5, 7, 9]));
    assert_eq!(y.zip(&x, |(a, b)| a + b ), Tensor::new(&[2, 3], vec![2, 4, 6, 5, 7, 9]));
  }

  #[test]
  #[should_panic(expected = "Dimension mismatch")]
  fn broadcast_mismatch() {
    let x = Tensor::new(&[2, 3], vec![1, 2, 3, 4, 5, 6]);
    x.zip(&Tensor::vec(&[1, 2]), |(a, b)| a + b );
  }

  #[test]
  fn sum_over_rows() {
    let a = Tensor::arrange(&[3, 2], 0, 1).sum_over_rows();
    assert_eq!(a, Tensor::vec(&[6, 9]));
  }

  #[test]
  fn shared_storage() {
    let a = Tensor::zeros(&[2]);
    let b = a.clone();
    b.assign(&Tensor::vec(&[1.0, 2.0]));
    assert_eq!(a, Tensor::vec(&[1.0, 2.0]));
    assert_ne!(a.detach().raw().as_ptr(), a.raw().as_ptr());
  }

  #[test]
  fn argmax() {
    let a = Tensor::new(&[2, 3], vec![0.1, 0.7, 0.2, -1.0, -3.0, -2.0]);
    assert_eq!(a.argmax_rows(), vec![1, 0]);
  }

  #[test]
  fn softmax() {
    let a = Tensor::arrange(&[3, 2], 1.0, 1.0).softmax_rows();
    for i in 0..3 {
      assert!((a.row(i).sum_all().item() - 1.0_f64).abs() < 1e-12);
    }
  }

  #[test]
  fn seeded() {
    let a = Tensor::<f32>::randn(&[5], &mut StdRng::seed_from_u64(1));
    let b = Tensor::<f32>::randn(&[5], &mut StdRng::seed_from_u64(1));
    assert_eq!(a, b);
  }
}
