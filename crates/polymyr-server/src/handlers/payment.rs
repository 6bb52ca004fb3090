//! The customer's card wallet on the platform processor account, and makers'
//! connected accounts.
//!
//! | Method | Path                              | Notes                         |
//! |--------|-----------------------------------|-------------------------------|
//! | GET    | `/payment/sources`                | empty without a wallet        |
//! | POST   | `/payment/sources`                | first card creates the wallet |
//! | DELETE | `/payment/sources/{id}`           | 204                           |
//! | POST   | `/payment/sources/{id}/default`   | returns the card list         |
//! | POST   | `/makers/{id}/processor-account`  | 409 if one is already linked  |

use axum::{extract::State, http::StatusCode};
use polymyr_core::{
  access::{Owner, authorize},
  account::{Account, AccountKind, AccountPatch},
  store::MarketStore,
};
use polymyr_payments::{Card, NewConnectedAccount, NewCustomer};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState,
  auth::{CurrentCustomer, RequestAuth},
  error::ApiError,
  extract::{Json, Path},
};

#[derive(Debug, Deserialize)]
pub struct NewSource {
  /// A processor token from the client-side card form.
  pub source: String,
}

fn platform_key<S>(state: &AppState<S>) -> Result<&str, ApiError> {
  let key = state.config.processor.secret_key.as_str();
  if key.is_empty() {
    return Err(ApiError::MissingPaymentAccount("platform processor key is not configured".into()));
  }
  Ok(key)
}

fn wallet(customer: &Account) -> Result<&str, ApiError> {
  customer.processor_id.as_deref().ok_or_else(|| {
    ApiError::MissingPaymentAccount(format!("customer {} has no card wallet", customer.account_id))
  })
}

/// The customer's cards, failing with 404 unless `source` is among them.
async fn owned_cards<S>(
  state: &AppState<S>,
  key: &str,
  processor_id: &str,
  source: &str,
) -> Result<Vec<Card>, ApiError> {
  let cards = state.processor.list_cards(key, processor_id).await?;
  if !cards.iter().any(|c| c.id == source) {
    return Err(ApiError::NotFound(format!("card {source}")));
  }
  Ok(cards)
}

pub async fn list_sources<S>(
  State(state): State<AppState<S>>,
  CurrentCustomer(customer): CurrentCustomer,
) -> Result<Json<Vec<Card>>, ApiError>
where
  S: MarketStore + 'static,
{
  let Some(processor_id) = customer.processor_id.as_deref() else {
    return Ok(Json(Vec::new()));
  };
  let cards = state.processor.list_cards(platform_key(&state)?, processor_id).await?;
  Ok(Json(cards))
}

/// `POST /payment/sources`. The first card also creates the customer's
/// platform wallet.
pub async fn add_source<S>(
  State(state): State<AppState<S>>,
  CurrentCustomer(customer): CurrentCustomer,
  Json(body): Json<NewSource>,
) -> Result<(StatusCode, Json<Vec<Card>>), ApiError>
where
  S: MarketStore + 'static,
{
  let key = platform_key(&state)?;
  if body.source.trim().is_empty() {
    return Err(ApiError::BadRequest("source must not be empty".into()));
  }

  let processor_id = match customer.processor_id.clone() {
    Some(id) => {
      state.processor.attach_source(key, &id, &body.source).await?;
      id
    }
    None => {
      let created = state
        .processor
        .create_customer(key, &NewCustomer {
          source:   body.source,
          email:    Some(customer.email.clone()),
          local_id: customer.account_id.to_string(),
        })
        .await?;
      state
        .store
        .update_account(AccountKind::Customer, customer.account_id, AccountPatch {
          processor_id: Some(created.id.clone()),
          ..AccountPatch::default()
        })
        .await
        .map_err(|e| ApiError::Store(Box::new(e)))?
        .ok_or_else(|| ApiError::NotFound(format!("customer {}", customer.account_id)))?;
      tracing::info!(
        customer_id = %customer.account_id,
        processor_id = %created.id,
        "platform wallet created"
      );
      created.id
    }
  };

  let cards = state.processor.list_cards(key, &processor_id).await?;
  Ok((StatusCode::CREATED, Json(cards)))
}

pub async fn delete_source<S>(
  State(state): State<AppState<S>>,
  CurrentCustomer(customer): CurrentCustomer,
  Path(source): Path<String>,
) -> Result<StatusCode, ApiError>
where
  S: MarketStore + 'static,
{
  let key = platform_key(&state)?;
  let processor_id = wallet(&customer)?;
  owned_cards(&state, key, processor_id, &source).await?;

  state.processor.delete_source(key, processor_id, &source).await?;
  tracing::info!(customer_id = %customer.account_id, %source, "card removed");
  Ok(StatusCode::NO_CONTENT)
}

pub async fn set_default_source<S>(
  State(state): State<AppState<S>>,
  CurrentCustomer(customer): CurrentCustomer,
  Path(source): Path<String>,
) -> Result<Json<Vec<Card>>, ApiError>
where
  S: MarketStore + 'static,
{
  let key = platform_key(&state)?;
  let processor_id = wallet(&customer)?;
  let cards = owned_cards(&state, key, processor_id, &source).await?;

  state.processor.set_default_source(key, processor_id, &source).await?;
  Ok(Json(cards))
}

// ─── Makers ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct NewProcessorAccount {
  #[serde(default = "default_country")]
  pub country: String,
}

fn default_country() -> String { "US".to_owned() }

/// `POST /makers/{id}/processor-account`. Opens a connected account under the
/// platform key and stores its id and keys on the maker.
pub async fn create_processor_account<S>(
  State(state): State<AppState<S>>,
  auth: RequestAuth,
  Path(id): Path<Uuid>,
  Json(body): Json<NewProcessorAccount>,
) -> Result<(StatusCode, Json<Account>), ApiError>
where
  S: MarketStore + 'static,
{
  authorize(&auth.principal(), Owner::maker(id))?;
  let key = platform_key(&state)?;

  let maker = state
    .store
    .get_account(AccountKind::Maker, id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("maker {id}")))?;
  if maker.processor_id.is_some() {
    return Err(ApiError::Conflict(format!("maker {id} already has a processor account")));
  }

  let country = body.country.trim().to_ascii_uppercase();
  if country.len() != 2 || !country.bytes().all(|b| b.is_ascii_alphabetic()) {
    return Err(ApiError::BadRequest("country must be a two-letter code".into()));
  }

  let created = state
    .processor
    .create_connected_account(key, &NewConnectedAccount {
      email: maker.email.clone(),
      country,
      local_id: id.to_string(),
    })
    .await?;

  let (secret_key, publishable_key) = match created.keys {
    Some(keys) => (Some(keys.secret), Some(keys.publishable)),
    None => (None, None),
  };
  let maker = state
    .store
    .update_account(AccountKind::Maker, id, AccountPatch {
      processor_id: Some(created.id.clone()),
      secret_key,
      publishable_key,
      ..AccountPatch::default()
    })
    .await
    .map_err(|e| {
      tracing::error!(
        maker_id = %id,
        account = %created.id,
        error = %e,
        "connected account created but not stored"
      );
      ApiError::Store(Box::new(e))
    })?
    .ok_or_else(|| ApiError::NotFound(format!("maker {id}")))?;

  tracing::info!(maker_id = %id, account = %created.id, "connected account created");
  Ok((StatusCode::CREATED, Json(maker)))
}
