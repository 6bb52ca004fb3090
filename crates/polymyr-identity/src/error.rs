//! Error type for `polymyr-identity`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("malformed identity token: {0}")]
  MalformedToken(String),

  #[error("no signing key with id {0:?}")]
  UnknownSigningKey(String),

  #[error("identity token signature did not verify")]
  SignatureVerificationFailed,

  #[error("identity token claims rejected: {0}")]
  ClaimsVerificationFailed(String),

  #[error("failed to fetch signing keys: {0}")]
  KeyFetch(String),

  #[error("invalid signing key: {0}")]
  InvalidKey(String),
}

impl From<reqwest::Error> for Error {
  fn from(e: reqwest::Error) -> Self { Error::KeyFetch(e.to_string()) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
