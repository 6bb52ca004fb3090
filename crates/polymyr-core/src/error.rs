//! Error types for `polymyr-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown account kind: {0:?}")]
  UnknownAccountKind(String),

  #[error("invalid pricing: {0}")]
  InvalidPricing(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
