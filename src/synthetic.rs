use std::collections::HashSet;

use rand::{Rng, seq::SliceRandom};
use serde::{Serialize, Deserialize};

use crate::{
  internal::*,
  data::TabularDataset,
  error::{ Error, Result },
  ops::BaseOps,
  scalar::Real,
  tensor::Tensor,
};


/// Parameters of a random n-class classification problem.
///
/// Samples of each class are drawn from normally distributed clusters
/// placed on the vertices of a hypercube in an informative subspace.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationConfig {
  pub n_samples: usize,
  pub n_features: usize,
  pub n_informative: usize,
  pub n_redundant: usize,
  pub n_classes: usize,
  pub n_clusters_per_class: usize,
  /// Fraction of labels that get reassigned at random.
  pub flip_y: f64,
  /// Half the side length of the hypercube.
  pub class_sep: f64,
  pub shuffle: bool,
}

impl Default for ClassificationConfig {
  fn default() -> Self {
    Self {
      n_samples: 1000,
      n_features: 20,
      n_informative: 10,
      n_redundant: 2,
      n_classes: 2,
      n_clusters_per_class: 2,
      flip_y: 0.01,
      class_sep: 1.0,
      shuffle: true,
    }
  }
}

impl ClassificationConfig {
  fn n_clusters(&self) -> usize {
    self.n_classes * self.n_clusters_per_class
  }

  fn validate(&self) -> Result<()> {
    if self.n_informative == 0 || self.n_classes == 0 || self.n_clusters_per_class == 0 {
      return Err(Error::Config("need at least one informative feature, class and cluster".to_string()))
    }
    if self.n_informative + self.n_redundant > self.n_features {
      return Err(Error::Config(format!(
        "{} informative and {} redundant features exceed {} features",
        self.n_informative, self.n_redundant, self.n_features)))
    }
    let vertices = 1usize.checked_shl(self.n_informative as u32).unwrap_or(usize::MAX);
    if self.n_clusters() > vertices {
      return Err(Error::Config(format!(
        "{} clusters don't fit onto the {} vertices of a {}-dimensional hypercube",
        self.n_clusters(), vertices, self.n_informative)))
    }
    if !(0.0..=1.0).contains(&self.flip_y) {
      return Err(Error::Config(format!("flip_y must be a fraction, got {}", self.flip_y)))
    }
    Ok(())
  }
}


/// Generate a random classification dataset.

pub fn make_classification<T: Real>(config: &ClassificationConfig, rng: &mut impl Rng) -> Result<TabularDataset<T>> {
  config.validate()?;
  let n_informative = config.n_informative;
  let n_noise = config.n_features - n_informative - config.n_redundant;
  let n_clusters = config.n_clusters();
  let class_sep = real::<T>(config.class_sep);

  // Distinct hypercube vertices as cluster centroids
  let mut vertices = HashSet::new();
  let mut centroids = vec![];
  while centroids.len() < n_clusters {
    let bits: Vec<bool> = (0..n_informative).map(|_| rng.gen() ).collect();
    if vertices.insert(bits.clone()) {
      let centroid: Vec<T> = bits.into_iter()
        .map(|bit| if bit { class_sep } else { -class_sep })
        .collect();
      centroids.push(Tensor::vec(&centroid));
    }
  }

  let redundancy = Tensor::uniform(&[n_informative, config.n_redundant], -T::one(), T::one(), rng);

  let mut rows = Vec::with_capacity(config.n_samples);
  let mut labels = Vec::with_capacity(config.n_samples);
  for (k, centroid) in centroids.iter().enumerate() {
    let count = config.n_samples / n_clusters + if k < config.n_samples % n_clusters { 1 } else { 0 };
    if count == 0 { continue }

    // Correlate the informative features within each cluster
    let covariance = Tensor::uniform(&[n_informative, n_informative], -T::one(), T::one(), rng);
    let informative = &Tensor::<T>::randn(&[count, n_informative], rng).mm(&covariance) + centroid;
    let redundant = informative.mm(&redundancy);
    let noise = Tensor::<T>::randn(&[count, n_noise], rng);

    for i in 0..count {
      let mut row = informative.row(i).into_raw();
      if config.n_redundant > 0 { row.extend(redundant.row(i).into_raw()) }
      if n_noise > 0 { row.extend(noise.row(i).into_raw()) }
      rows.push(row);
      labels.push(k % config.n_classes);
    }
  }

  for label in labels.iter_mut() {
    if rng.gen_range(0.0, 1.0) < config.flip_y {
      *label = rng.gen_range(0, config.n_classes);
    }
  }

  if config.shuffle {
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.shuffle(rng);
    let shuffled: Vec<Vec<T>> = order.iter().map(|&i| std::mem::take(&mut rows[i]) ).collect();
    labels = order.iter().map(|&i| labels[i] ).collect();
    rows = shuffled;
  }

  TabularDataset::from_rows(&rows, labels)
}
