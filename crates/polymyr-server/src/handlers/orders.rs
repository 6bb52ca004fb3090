//! Handlers for `/orders` endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/orders` | Customers see purchases, makers see sales (`?fulfilled=`) |
//! | `POST`  | `/orders` | Customers only. Body: `{"product_id", "card", "address_id"}` |
//! | `PATCH` | `/orders/{id}/fulfilled` | Selling maker only. Body: `{"fulfilled": true}` |

use axum::{extract::State, http::StatusCode};
use polymyr_core::{
  access::{Owner, authorize},
  account::AccountKind,
  order::{Order, OrderQuery},
  store::MarketStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState,
  auth::{CurrentAccount, CurrentCustomer, RequestAuth},
  error::ApiError,
  extract::{Json, Path, Query},
  orders::{NewOrderRequest, create_order},
};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
  pub fulfilled: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct Fulfilment {
  pub fulfilled: bool,
}

/// `GET /orders`: a customer's purchases, or a maker's sales.
pub async fn list<S>(
  State(state): State<AppState<S>>,
  CurrentAccount(account): CurrentAccount,
  Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Order>>, ApiError>
where
  S: MarketStore + 'static,
{
  let filter = match account.kind {
    AccountKind::Customer => {
      OrderQuery { customer_id: Some(account.account_id), ..OrderQuery::default() }
    }
    AccountKind::Maker => OrderQuery {
      maker_id: Some(account.account_id),
      fulfilled: query.fulfilled,
      ..OrderQuery::default()
    },
  };
  let orders = state
    .store
    .list_orders(&filter)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(orders))
}

pub async fn create<S>(
  State(state): State<AppState<S>>,
  CurrentCustomer(customer): CurrentCustomer,
  Json(body): Json<NewOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError>
where
  S: MarketStore + 'static,
{
  let order = create_order(&state, &customer, body).await?;
  Ok((StatusCode::CREATED, Json(order)))
}

/// `PATCH /orders/{id}/fulfilled`: only the selling maker may mark shipment.
pub async fn set_fulfilled<S>(
  State(state): State<AppState<S>>,
  auth: RequestAuth,
  Path(id): Path<Uuid>,
  Json(body): Json<Fulfilment>,
) -> Result<Json<Order>, ApiError>
where
  S: MarketStore + 'static,
{
  let order = state
    .store
    .get_order(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("order {id}")))?;
  authorize(&auth.principal(), Owner::maker(order.maker_id))?;

  let order = state
    .store
    .set_order_fulfilled(id, body.fulfilled)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("order {id}")))?;
  tracing::info!(order_id = %id, fulfilled = order.fulfilled, "order fulfilment updated");
  Ok(Json(order))
}
