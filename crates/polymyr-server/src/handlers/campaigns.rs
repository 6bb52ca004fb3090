//! Campaigns: time-boxed discounted pre-orders on a product.

use axum::{extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use polymyr_core::{
  access::authorize_owned,
  catalog::{Campaign, NewCampaign, Product},
  session::Principal,
  store::MarketStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState,
  auth::{CurrentMaker, RequestAuth},
  error::ApiError,
  extract::{Json, Path},
  handlers::removal_status,
};

/// The maker-chosen part of a campaign.
#[derive(Debug, Clone, Deserialize)]
pub struct CampaignTerms {
  pub units:            i64,
  pub end_date:         DateTime<Utc>,
  #[serde(default)]
  pub amount_off_cents: i64,
}

impl CampaignTerms {
  pub fn validate(&self, price_cents: i64, now: DateTime<Utc>) -> Result<(), ApiError> {
    if self.units <= 0 {
      return Err(ApiError::BadRequest("units must be positive".into()));
    }
    if !(0..=price_cents).contains(&self.amount_off_cents) {
      return Err(ApiError::BadRequest(format!(
        "amount_off_cents must be between 0 and {price_cents}"
      )));
    }
    if self.end_date <= now {
      return Err(ApiError::BadRequest("end_date must be in the future".into()));
    }
    Ok(())
  }

  pub fn for_product(self, product: &Product) -> NewCampaign {
    NewCampaign {
      product_id:       product.product_id,
      maker_id:         product.maker_id,
      units:            self.units,
      end_date:         self.end_date,
      amount_off_cents: self.amount_off_cents,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct CreateCampaign {
  pub product_id: Uuid,
  #[serde(flatten)]
  pub terms:      CampaignTerms,
}

pub async fn create<S>(
  State(state): State<AppState<S>>,
  CurrentMaker(maker): CurrentMaker,
  Json(body): Json<CreateCampaign>,
) -> Result<(StatusCode, Json<Campaign>), ApiError>
where
  S: MarketStore + 'static,
{
  let product = state
    .store
    .get_product(body.product_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("product {}", body.product_id)))?;
  authorize_owned(&Principal::for_account(&maker), &product)?;

  let existing = state
    .store
    .campaign_for_product(product.product_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  if existing.is_some() {
    return Err(ApiError::Conflict(format!("product {} already has a campaign", product.product_id)));
  }

  body.terms.validate(product.price_cents, Utc::now())?;
  let campaign = state
    .store
    .create_campaign(body.terms.for_product(&product))
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  tracing::info!(
    campaign_id = %campaign.campaign_id,
    product_id = %product.product_id,
    units = campaign.units,
    "campaign created"
  );
  Ok((StatusCode::CREATED, Json(campaign)))
}

pub async fn delete_one<S>(
  State(state): State<AppState<S>>,
  auth: RequestAuth,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: MarketStore + 'static,
{
  let campaign = state
    .store
    .get_campaign(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("campaign {id}")))?;
  authorize_owned(&auth.principal(), &campaign)?;

  let removal = state
    .store
    .delete_campaign(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  removal_status(removal, &format!("campaign {id}"))
}
