//! Handlers for `/products` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/products` | Public. `?campaign=true` pairs each product with its campaign |
//! | `GET`    | `/products/{id}` | Public. 404 if not found |
//! | `POST`   | `/products` | Makers only. Optional inline `campaign` |
//! | `DELETE` | `/products/{id}` | Owner only. 409 while orders reference it |

use axum::{
  extract::State,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use chrono::Utc;
use polymyr_core::{
  access::authorize_owned,
  catalog::{Campaign, NewProduct, Product},
  store::MarketStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  AppState,
  auth::{CurrentMaker, RequestAuth},
  error::ApiError,
  extract::{Json, Path, Query},
  handlers::{campaigns::CampaignTerms, removal_status},
};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
  /// Pair each product with its campaign.
  #[serde(default)]
  pub campaign: bool,
}

#[derive(Debug, Serialize)]
pub struct ProductWithCampaign {
  pub product:  Product,
  pub campaign: Option<Campaign>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProduct {
  pub name:        String,
  #[serde(default)]
  pub description: String,
  pub price_cents: i64,
  pub campaign:    Option<CampaignTerms>,
}

pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(query): Query<ListQuery>,
) -> Result<Response, ApiError>
where
  S: MarketStore + 'static,
{
  let products = state
    .store
    .list_products()
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  if !query.campaign {
    return Ok(Json(products).into_response());
  }

  let mut paired = Vec::with_capacity(products.len());
  for product in products {
    let campaign = state
      .store
      .campaign_for_product(product.product_id)
      .await
      .map_err(|e| ApiError::Store(Box::new(e)))?;
    paired.push(ProductWithCampaign { product, campaign });
  }
  Ok(Json(paired).into_response())
}

pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<ProductWithCampaign>, ApiError>
where
  S: MarketStore + 'static,
{
  let product = state
    .store
    .get_product(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("product {id}")))?;
  let campaign = state
    .store
    .campaign_for_product(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(ProductWithCampaign { product, campaign }))
}

/// `POST /products`, optionally launching its campaign in the same request.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  CurrentMaker(maker): CurrentMaker,
  Json(body): Json<CreateProduct>,
) -> Result<(StatusCode, Json<ProductWithCampaign>), ApiError>
where
  S: MarketStore + 'static,
{
  let name = body.name.trim().to_owned();
  if name.is_empty() {
    return Err(ApiError::BadRequest("name must not be empty".into()));
  }
  if body.price_cents <= 0 {
    return Err(ApiError::BadRequest("price_cents must be positive".into()));
  }

  if let Some(terms) = &body.campaign {
    terms.validate(body.price_cents, Utc::now())?;
  }

  let product = state
    .store
    .create_product(NewProduct {
      maker_id: maker.account_id,
      name,
      description: body.description,
      price_cents: body.price_cents,
    })
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  let Some(terms) = body.campaign else {
    tracing::info!(product_id = %product.product_id, "product created");
    return Ok((StatusCode::CREATED, Json(ProductWithCampaign { product, campaign: None })));
  };

  let campaign = match state.store.create_campaign(terms.for_product(&product)).await {
    Ok(campaign) => campaign,
    Err(e) => {
      // No half-created listings.
      if let Err(cleanup) = state.store.delete_product(product.product_id).await {
        tracing::error!(product_id = %product.product_id, error = %cleanup, "failed to remove product");
      }
      return Err(ApiError::Store(Box::new(e)));
    }
  };

  tracing::info!(
    product_id = %product.product_id,
    campaign_id = %campaign.campaign_id,
    "product created with campaign"
  );
  Ok((StatusCode::CREATED, Json(ProductWithCampaign { product, campaign: Some(campaign) })))
}

pub async fn delete_one<S>(
  State(state): State<AppState<S>>,
  auth: RequestAuth,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: MarketStore + 'static,
{
  let product = state
    .store
    .get_product(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("product {id}")))?;
  authorize_owned(&auth.principal(), &product)?;

  let removal = state
    .store
    .delete_product(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  removal_status(removal, &format!("product {id}"))
}
