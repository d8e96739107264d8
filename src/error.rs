/// Errors surfaced by model construction, data access, tracking and persistence.
///
/// None of these are recovered from inside the crate. They propagate
/// to the caller, which is expected to abort the run.

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("Dimension mismatch: {0}")]
  ShapeMismatch(String),

  #[error("Index {index} out of range for dataset of length {len}")]
  IndexOutOfRange { index: usize, len: usize },

  #[error("Invalid configuration: {0}")]
  Config(String),

  #[error("Metric {0} has not seen any samples")]
  EmptyMetric(&'static str),

  #[error("Tracking service error: {0}")]
  Tracker(String),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Serialization error: {0}")]
  Serialize(#[from] postcard::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
