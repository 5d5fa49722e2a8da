//! Error types for `tally-core`.

use thiserror::Error;

use crate::record::Owner;

#[derive(Debug, Error)]
pub enum Error {
  #[error("no uploaded input data for {0}")]
  NoInputData(Owner),

  #[error("no merged dataset for {0}")]
  NotFound(Owner),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

/// A filter option whose value could not be interpreted. Produced during
/// filter validation and recovered there by dropping the option.
#[derive(Debug, Error)]
#[error("invalid value {value:?} for filter option `{option}`")]
pub struct InvalidFilterValue {
  pub option: &'static str,
  pub value:  String,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
