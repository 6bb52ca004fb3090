//! Error type for `polymyr-payments`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The processor answered with an error object.
  #[error("processor rejected request ({status}): {message}")]
  Api {
    status:  u16,
    message: String,
    body:    serde_json::Value,
  },

  #[error("processor request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("unexpected processor response: {0}")]
  Decode(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
