//! Sign-in and sign-out.

use axum::{
  extract::State,
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use polymyr_core::{
  account::{Account, AccountKind},
  store::MarketStore,
};
use serde::{Deserialize, Serialize};

use crate::{
  AppState,
  auth::{
    Credential, Flow, RequestAuth, SessionIssuer,
    cookies::{clear_session_cookie, session_cookie},
    credentials::verify,
  },
  error::{ApiError, AuthError},
  extract::{Json, Query},
};

#[derive(Debug, Deserialize)]
pub struct KindQuery {
  #[serde(rename = "type")]
  pub kind: AccountKind,
}

#[derive(Debug, Deserialize)]
pub struct FederatedLogin {
  #[serde(rename = "type")]
  pub kind:      AccountKind,
  pub assertion: String,
  pub subject:   String,
  /// Create the account if the subject is unknown.
  #[serde(default)]
  pub create:    bool,
}

#[derive(Debug, Serialize)]
pub struct SessionBody {
  pub token:      String,
  pub account:    Account,
  pub expires_at: Option<DateTime<Utc>>,
}

/// JSON body plus the `Set-Cookie` header for a live session.
fn session_response<S>(
  state: &AppState<S>,
  status: StatusCode,
  token: String,
  account: Account,
  expires_at: Option<DateTime<Utc>>,
) -> Response {
  let max_age = state.config.session_ttl().num_seconds();
  let cookie = session_cookie(&token, max_age, state.config.cookie_secure);
  let mut res = (status, Json(SessionBody { token, account, expires_at })).into_response();
  if let Some(cookie) = cookie {
    res.headers_mut().insert(header::SET_COOKIE, cookie);
  }
  res
}

/// `POST /authentication?type=customer|maker` with `Authorization: Basic`.
///
/// A request that already carries a live session cookie for the same account
/// gets that session back instead of a new one.
pub async fn login<S>(
  State(state): State<AppState<S>>,
  Query(query): Query<KindQuery>,
  auth: RequestAuth,
  headers: HeaderMap,
) -> Result<Response, ApiError>
where
  S: MarketStore + 'static,
{
  let credential = Credential::from_authorization(&headers, query.kind)?;
  let account = verify(&state, credential).await?;

  if auth.from_cookie
    && let (Some(current), Some(session), Some(token)) = (&auth.account, &auth.session, &auth.token)
    && current.kind == account.kind
    && current.account_id == account.account_id
  {
    return Ok(session_response(
      &state,
      StatusCode::OK,
      token.clone(),
      account,
      session.expires_at,
    ));
  }

  let issued = SessionIssuer::new(state.store.as_ref(), state.config.session_ttl())
    .issue(&account)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(session_response(&state, StatusCode::OK, issued.token, account, issued.session.expires_at))
}

/// `POST /authentication/federated`.
pub async fn federated<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<FederatedLogin>,
) -> Result<Response, ApiError>
where
  S: MarketStore + 'static,
{
  let flow = if body.create { Flow::CreateIfAbsent } else { Flow::LoginOnly };
  let account = verify(&state, Credential::Federated {
    kind: body.kind,
    assertion: body.assertion,
    subject: body.subject,
    flow,
  })
  .await?;

  let issued = SessionIssuer::new(state.store.as_ref(), state.config.session_ttl())
    .issue(&account)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(session_response(&state, StatusCode::OK, issued.token, account, issued.session.expires_at))
}

/// `DELETE /authentication`: revoke the presented session and clear the cookie.
pub async fn logout<S>(
  State(state): State<AppState<S>>,
  auth: RequestAuth,
) -> Result<Response, ApiError>
where
  S: MarketStore + 'static,
{
  let token = auth.token.ok_or(AuthError::NotAuthenticated)?;
  SessionIssuer::new(state.store.as_ref(), state.config.session_ttl())
    .revoke(&token)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  if let Some(account) = &auth.account {
    tracing::info!(kind = %account.kind, account_id = %account.account_id, "logged out");
  }
  Ok(
    (
      StatusCode::NO_CONTENT,
      [(header::SET_COOKIE, clear_session_cookie(state.config.cookie_secure))],
    )
      .into_response(),
  )
}
