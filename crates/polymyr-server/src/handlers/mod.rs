//! Axum handlers, one module per resource.

pub mod accounts;
pub mod addresses;
pub mod authentication;
pub mod campaigns;
pub mod orders;
pub mod payment;
pub mod products;

use axum::http::StatusCode;
use polymyr_core::store::Removal;

use crate::error::ApiError;

/// Map a store delete onto `204`, `404` or `409`.
pub(super) fn removal_status(removal: Removal, what: &str) -> Result<StatusCode, ApiError> {
  match removal {
    Removal::Removed => Ok(StatusCode::NO_CONTENT),
    Removal::Missing => Err(ApiError::NotFound(what.to_owned())),
    Removal::Referenced => Err(ApiError::Conflict(format!("{what} is still referenced"))),
  }
}
