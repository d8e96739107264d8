use itertools::Itertools;
use rand::{rngs::StdRng, seq::SliceRandom};

use crate::{
  error::{ Error, Result },
  scalar::Real,
  tensor::Tensor,
};


/// Indexable collection of labelled samples.

pub trait Dataset {
  type Scalar: Real;

  fn len(&self) -> usize;

  /// Return the feature vector and class label stored at `index`.

  fn item_at(&self, index: usize) -> Result<(Tensor<Self::Scalar>, usize)>;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Alias of [len](Dataset::len).

  fn size(&self) -> usize {
    self.len()
  }
}


/// Table of equally sized feature vectors with one class label per row.
///
/// Clones share their storage.

#[derive(Debug, Clone)]
pub struct TabularDataset<T: Real> {
  features: Tensor<T>,
  labels: Vec<usize>,
}

impl<T: Real> TabularDataset<T> {
  pub fn new(features: Tensor<T>, labels: Vec<usize>) -> Result<Self> {
    if features.rank() != 2 {
      return Err(Error::ShapeMismatch(format!(
        "features must form a matrix, got {}", features.shape())))
    }
    if features.dim(0) != labels.len() {
      return Err(Error::ShapeMismatch(format!(
        "{} feature rows for {} labels", features.dim(0), labels.len())))
    }
    Ok(Self { features, labels })
  }

  pub fn from_rows(rows: &[Vec<T>], labels: Vec<usize>) -> Result<Self> {
    let width = rows.first().map(|row| row.len() ).unwrap_or(0);
    if let Some(row) = rows.iter().find(|row| row.len() != width ) {
      return Err(Error::ShapeMismatch(format!(
        "feature rows of width {} and {}", width, row.len())))
    }
    let data = rows.iter().flatten().copied().collect_vec();
    Self::new(Tensor::new(&[rows.len(), width], data), labels)
  }

  pub fn features(&self) -> &Tensor<T> {
    &self.features
  }

  pub fn labels(&self) -> &[usize] {
    &self.labels
  }

  pub fn num_features(&self) -> usize {
    self.features.dim(1)
  }

  pub fn num_classes(&self) -> usize {
    self.labels.iter().max().map(|max| max + 1 ).unwrap_or(0)
  }
}

impl<T: Real> Dataset for TabularDataset<T> {
  type Scalar = T;

  fn len(&self) -> usize {
    self.labels.len()
  }

  fn item_at(&self, index: usize) -> Result<(Tensor<T>, usize)> {
    if index >= self.len() {
      return Err(Error::IndexOutOfRange { index, len: self.len() })
    }
    Ok((self.features.row(index), self.labels[index]))
  }
}


/// A mini-batch of stacked feature vectors and their labels.

#[derive(Debug, Clone)]
pub struct Batch<T: Real> {
  pub inputs: Tensor<T>,
  pub labels: Vec<usize>,
}

impl<T: Real> Batch<T> {
  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }
}


/// Splits a [Dataset] into mini-batches, optionally reshuffling
/// the sample order for every epoch.

#[derive(Debug)]
pub struct DataLoader<D: Dataset> {
  dataset: D,
  batch_size: usize,
  shuffle: bool,
  rng: StdRng,
}

impl<D: Dataset> DataLoader<D> {
  pub fn new(dataset: D, batch_size: usize, shuffle: bool, rng: StdRng) -> Result<Self> {
    if batch_size == 0 {
      return Err(Error::Config("batch size must be positive".to_string()))
    }
    Ok(Self { dataset, batch_size, shuffle, rng })
  }

  pub fn dataset(&self) -> &D {
    &self.dataset
  }

  pub fn batch_size(&self) -> usize {
    self.batch_size
  }

  /// Number of batches per epoch.

  pub fn len(&self) -> usize {
    (self.dataset.len() + self.batch_size - 1) / self.batch_size
  }

  pub fn is_empty(&self) -> bool {
    self.dataset.is_empty()
  }

  /// Assemble one epoch worth of batches.

  pub fn batches(&mut self) -> Result<Vec<Batch<D::Scalar>>> {
    let mut order = (0..self.dataset.len()).collect_vec();
    if self.shuffle {
      order.shuffle(&mut self.rng);
    }
    order
      .chunks(self.batch_size)
      .map(|indices| {
        let (rows, labels): (Vec<_>, Vec<_>) = indices.iter()
          .map(|&index| self.dataset.item_at(index) )
          .collect::<Result<Vec<_>>>()?
          .into_iter()
          .unzip();
        Ok(Batch { inputs: Tensor::rows(&rows), labels })
      })
      .collect()
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use rand::SeedableRng;

  fn table() -> TabularDataset<f32> {
    let rows: Vec<Vec<f32>> = (0..10).map(|i| vec![i as f32, -(i as f32)] ).collect();
    let labels = (0..10).map(|i| i % 3 ).collect();
    TabularDataset::from_rows(&rows, labels).unwrap()
  }

  #[test]
  fn item_at() {
    let data = table();
    assert_eq!(data.len(), 10);
    assert_eq!(data.size(), data.features().dim(0));
    for i in 0..data.len() {
      let (features, label) = data.item_at(i).unwrap();
      assert_eq!(features, Tensor::vec(&[i as f32, -(i as f32)]));
      assert_eq!(label, i % 3);
    }
    assert_eq!(data.num_classes(), 3);
    assert_eq!(data.num_features(), 2);
  }

  #[test]
  fn out_of_range() {
    let data = table();
    assert!(matches!(data.item_at(10), Err(Error::IndexOutOfRange { index: 10, len: 10 })));
    assert!(data.item_at(11).is_err());
  }

  #[test]
  fn mismatched_lengths() {
    let result = TabularDataset::<f32>::new(Tensor::zeros(&[3, 2]), vec![0, 1]);
    assert!(matches!(result, Err(Error::ShapeMismatch(_))));
    let result = TabularDataset::<f32>::from_rows(&[vec![1.0], vec![1.0, 2.0]], vec![0, 1]);
    assert!(matches!(result, Err(Error::ShapeMismatch(_))));
  }

  #[test]
  fn batches_cover_dataset() {
    let mut loader = DataLoader::new(table(), 4, true, StdRng::seed_from_u64(3)).unwrap();
    assert_eq!(loader.len(), 3);
    let batches = loader.batches().unwrap();
    assert_eq!(batches.iter().map(|batch| batch.len() ).collect_vec(), vec![4, 4, 2]);
    assert_eq!(batches[0].inputs.shape().dims, vec![4, 2]);
    let mut seen = batches.iter()
      .flat_map(|batch| (0..batch.len()).map(move |i| batch.inputs.row(i).to_vec()[0] as usize ) )
      .collect_vec();
    seen.sort();
    assert_eq!(seen, (0..10).collect_vec());
  }

  #[test]
  fn batches_keep_pairs() {
    let mut loader = DataLoader::new(table(), 3, true, StdRng::seed_from_u64(9)).unwrap();
    for batch in loader.batches().unwrap() {
      for (i, &label) in batch.labels.iter().enumerate() {
        assert_eq!(batch.inputs.row(i).to_vec()[0] as usize % 3, label);
      }
    }
  }

  #[test]
  fn zero_batch_size() {
    assert!(DataLoader::new(table(), 0, false, StdRng::seed_from_u64(0)).is_err());
  }
}
