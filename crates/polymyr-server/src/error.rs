//! Error types and axum `IntoResponse` implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use polymyr_core::access::AccessError;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

// ─── Authentication ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AuthError {
  /// Unknown login, wrong password and unusable tokens all look the same.
  #[error("invalid credentials")]
  InvalidCredentials,

  #[error("not authenticated")]
  NotAuthenticated,

  #[error("unsupported credential type: {0}")]
  UnsupportedCredentialType(String),

  #[error("an account with this email already exists")]
  AccountExists,

  #[error(transparent)]
  Federation(#[from] polymyr_identity::Error),

  #[error("store error: {0}")]
  Store(#[source] BoxError),
}

// ─── Orders ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum OrderError {
  #[error("{0} not found")]
  NotFound(String),

  #[error("product {0} has no campaign")]
  MissingCampaign(Uuid),

  #[error("campaign is malformed: {0}")]
  MalformedCampaign(String),

  #[error("campaign {0} has ended")]
  CampaignEnded(Uuid),

  #[error("campaign {0} is sold out")]
  CampaignSoldOut(Uuid),

  #[error("missing payment account: {0}")]
  MissingPaymentAccount(String),

  #[error(transparent)]
  Access(#[from] AccessError),

  #[error("payment processor error: {0}")]
  PaymentProcessor(#[from] polymyr_payments::Error),

  #[error("store error: {0}")]
  Store(#[source] BoxError),
}

// ─── HTTP ────────────────────────────────────────────────────────────────────

/// An error returned by an HTTP handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Auth(#[from] AuthError),

  #[error(transparent)]
  Order(#[from] OrderError),

  #[error(transparent)]
  Access(#[from] AccessError),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("missing payment account: {0}")]
  MissingPaymentAccount(String),

  #[error("payment processor error: {0}")]
  PaymentProcessor(#[from] polymyr_payments::Error),

  #[error("store error: {0}")]
  Store(#[source] BoxError),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Auth(e) => match e {
        AuthError::InvalidCredentials | AuthError::NotAuthenticated => StatusCode::UNAUTHORIZED,
        AuthError::UnsupportedCredentialType(_) => StatusCode::BAD_REQUEST,
        AuthError::AccountExists => StatusCode::CONFLICT,
        AuthError::Federation(
          polymyr_identity::Error::KeyFetch(_) | polymyr_identity::Error::InvalidKey(_),
        ) => StatusCode::INTERNAL_SERVER_ERROR,
        AuthError::Federation(_) => StatusCode::UNAUTHORIZED,
        AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
      },
      ApiError::Order(e) => match e {
        OrderError::NotFound(_) | OrderError::MissingCampaign(_) => StatusCode::NOT_FOUND,
        OrderError::CampaignEnded(_) | OrderError::CampaignSoldOut(_) => StatusCode::CONFLICT,
        OrderError::MissingPaymentAccount(_) => StatusCode::UNPROCESSABLE_ENTITY,
        OrderError::Access(e) => access_status(e),
        OrderError::PaymentProcessor(_) => StatusCode::BAD_GATEWAY,
        OrderError::MalformedCampaign(_) | OrderError::Store(_) => {
          StatusCode::INTERNAL_SERVER_ERROR
        }
      },
      ApiError::Access(e) => access_status(e),
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::MissingPaymentAccount(_) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::PaymentProcessor(_) => StatusCode::BAD_GATEWAY,
      ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  /// Text shown to the client. Upstream and storage details stay in the log.
  fn public_message(&self) -> String {
    match self {
      ApiError::PaymentProcessor(_) | ApiError::Order(OrderError::PaymentProcessor(_)) => {
        "payment processor error".to_owned()
      }
      ApiError::Store(_)
      | ApiError::Auth(AuthError::Store(_))
      | ApiError::Order(OrderError::Store(_)) => "internal server error".to_owned(),
      ApiError::Auth(AuthError::Federation(
        polymyr_identity::Error::KeyFetch(_) | polymyr_identity::Error::InvalidKey(_),
      )) => "identity provider unavailable".to_owned(),
      other => other.to_string(),
    }
  }
}

fn access_status(e: &AccessError) -> StatusCode {
  match e {
    AccessError::NotAuthenticated(..) => StatusCode::UNAUTHORIZED,
    AccessError::Forbidden { .. } => StatusCode::FORBIDDEN,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      match &self {
        ApiError::PaymentProcessor(polymyr_payments::Error::Api { status, body, .. })
        | ApiError::Order(OrderError::PaymentProcessor(polymyr_payments::Error::Api {
          status,
          body,
          ..
        })) => {
          tracing::error!(upstream_status = status, %body, "payment processor rejected request");
        }
        other => tracing::error!(error = %other, "request failed"),
      }
    }

    let mut res = (status, Json(json!({ "error": self.public_message() }))).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Bearer realm=\"polymyr\""),
      );
    }
    res
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_table() {
    let id = Uuid::new_v4();
    let cases: Vec<(ApiError, StatusCode)> = vec![
      (AuthError::InvalidCredentials.into(), StatusCode::UNAUTHORIZED),
      (AuthError::UnsupportedCredentialType("Digest".into()).into(), StatusCode::BAD_REQUEST),
      (
        AuthError::Federation(polymyr_identity::Error::SignatureVerificationFailed).into(),
        StatusCode::UNAUTHORIZED,
      ),
      (
        AuthError::Federation(polymyr_identity::Error::KeyFetch("down".into())).into(),
        StatusCode::INTERNAL_SERVER_ERROR,
      ),
      (OrderError::MissingCampaign(id).into(), StatusCode::NOT_FOUND),
      (OrderError::CampaignSoldOut(id).into(), StatusCode::CONFLICT),
      (OrderError::CampaignEnded(id).into(), StatusCode::CONFLICT),
      (OrderError::MissingPaymentAccount("x".into()).into(), StatusCode::UNPROCESSABLE_ENTITY),
      (OrderError::MalformedCampaign("x".into()).into(), StatusCode::INTERNAL_SERVER_ERROR),
      (
        OrderError::PaymentProcessor(polymyr_payments::Error::Decode("x".into())).into(),
        StatusCode::BAD_GATEWAY,
      ),
      (
        AccessError::Forbidden {
          actor:      "customer x".into(),
          owner_kind: polymyr_core::account::AccountKind::Maker,
          owner_id:   id,
        }
        .into(),
        StatusCode::FORBIDDEN,
      ),
      (ApiError::Conflict("dup".into()), StatusCode::CONFLICT),
      (ApiError::Forbidden("makers only".into()), StatusCode::FORBIDDEN),
    ];

    for (err, expected) in cases {
      assert_eq!(err.status(), expected, "{err}");
    }
  }

  #[test]
  fn processor_details_are_not_exposed() {
    let err = ApiError::PaymentProcessor(polymyr_payments::Error::Api {
      status:  402,
      message: "card declined for customer cus_secret".into(),
      body:    json!({}),
    });
    assert_eq!(err.public_message(), "payment processor error");
  }
}
