//! Registration and profile updates.

use argon2::{Argon2, PasswordHasher as _, password_hash::SaltString};
use axum::{extract::State, http::StatusCode};
use polymyr_core::{
  access::{Owner, authorize},
  account::{Account, AccountKind, AccountPatch, NewAccount},
  store::MarketStore,
};
use rand_core::OsRng;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState,
  auth::{CurrentAccount, RequestAuth},
  error::ApiError,
  extract::{Json, Path},
};

#[derive(Debug, Deserialize)]
pub struct Registration {
  pub email:    String,
  pub name:     String,
  pub password: String,
}

/// Fields a customer may change about themselves.
#[derive(Debug, Deserialize)]
pub struct CustomerPatch {
  pub name:  Option<String>,
  pub email: Option<String>,
}

/// `GET /me`
pub async fn me(CurrentAccount(account): CurrentAccount) -> Json<Account> { Json(account) }

pub async fn register_customer<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<Registration>,
) -> Result<(StatusCode, Json<Account>), ApiError>
where
  S: MarketStore + 'static,
{
  register(&state, AccountKind::Customer, body).await
}

pub async fn register_maker<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<Registration>,
) -> Result<(StatusCode, Json<Account>), ApiError>
where
  S: MarketStore + 'static,
{
  register(&state, AccountKind::Maker, body).await
}

async fn register<S: MarketStore>(
  state: &AppState<S>,
  kind: AccountKind,
  body: Registration,
) -> Result<(StatusCode, Json<Account>), ApiError> {
  let email = body.email.trim().to_owned();
  if email.is_empty() || !email.contains('@') {
    return Err(ApiError::BadRequest("a valid email is required".into()));
  }
  if body.password.is_empty() {
    return Err(ApiError::BadRequest("password must not be empty".into()));
  }
  ensure_email_free(state, kind, &email, None).await?;

  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(body.password.as_bytes(), &salt)
    .map_err(|e| ApiError::Store(format!("argon2 error: {e}").into()))?
    .to_string();

  let name = if body.name.trim().is_empty() { email.clone() } else { body.name };
  let account = state
    .store
    .create_account(NewAccount::with_password(kind, email, name, hash))
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  tracing::info!(%kind, account_id = %account.account_id, "account registered");
  Ok((StatusCode::CREATED, Json(account)))
}

/// Emails are unique per kind, ignoring case.
async fn ensure_email_free<S: MarketStore>(
  state: &AppState<S>,
  kind: AccountKind,
  email: &str,
  except: Option<Uuid>,
) -> Result<(), ApiError> {
  let existing = state
    .store
    .find_account_by_email(kind, email.to_owned())
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  match existing {
    Some(a) if Some(a.account_id) != except => {
      Err(ApiError::Conflict(format!("{kind} with this email already exists")))
    }
    _ => Ok(()),
  }
}

pub async fn update_customer<S>(
  State(state): State<AppState<S>>,
  auth: RequestAuth,
  Path(id): Path<Uuid>,
  Json(body): Json<CustomerPatch>,
) -> Result<Json<Account>, ApiError>
where
  S: MarketStore + 'static,
{
  let patch = AccountPatch { name: body.name, email: body.email, ..AccountPatch::default() };
  update(&state, &auth, Owner::customer(id), patch).await
}

pub async fn update_maker<S>(
  State(state): State<AppState<S>>,
  auth: RequestAuth,
  Path(id): Path<Uuid>,
  Json(patch): Json<AccountPatch>,
) -> Result<Json<Account>, ApiError>
where
  S: MarketStore + 'static,
{
  update(&state, &auth, Owner::maker(id), patch).await
}

async fn update<S: MarketStore>(
  state: &AppState<S>,
  auth: &RequestAuth,
  owner: Owner,
  mut patch: AccountPatch,
) -> Result<Json<Account>, ApiError> {
  authorize(&auth.principal(), owner)?;

  if let Some(email) = patch.email.as_mut() {
    *email = email.trim().to_owned();
    if email.is_empty() || !email.contains('@') {
      return Err(ApiError::BadRequest("a valid email is required".into()));
    }
    ensure_email_free(state, owner.kind, email, Some(owner.id)).await?;
  }

  let account = state
    .store
    .update_account(owner.kind, owner.id, patch)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("{} {}", owner.kind, owner.id)))?;
  Ok(Json(account))
}
