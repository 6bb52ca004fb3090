//! Customer shipping addresses.

use axum::{extract::State, http::StatusCode};
use polymyr_core::{
  access::authorize_owned,
  order::{CustomerAddress, NewAddress},
  store::MarketStore,
};
use uuid::Uuid;

use crate::{
  AppState,
  auth::{CurrentCustomer, RequestAuth},
  error::ApiError,
  extract::{Json, Path},
  handlers::removal_status,
};

pub async fn list<S>(
  State(state): State<AppState<S>>,
  CurrentCustomer(customer): CurrentCustomer,
) -> Result<Json<Vec<CustomerAddress>>, ApiError>
where
  S: MarketStore + 'static,
{
  let addresses = state
    .store
    .list_addresses(customer.account_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(addresses))
}

pub async fn create<S>(
  State(state): State<AppState<S>>,
  CurrentCustomer(customer): CurrentCustomer,
  Json(mut input): Json<NewAddress>,
) -> Result<(StatusCode, Json<CustomerAddress>), ApiError>
where
  S: MarketStore + 'static,
{
  input.customer_id = customer.account_id;
  let address = state
    .store
    .create_address(input)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok((StatusCode::CREATED, Json(address)))
}

pub async fn delete_one<S>(
  State(state): State<AppState<S>>,
  auth: RequestAuth,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: MarketStore + 'static,
{
  let address = state
    .store
    .get_address(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("address {id}")))?;
  authorize_owned(&auth.principal(), &address)?;

  let removal = state
    .store
    .delete_address(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  removal_status(removal, &format!("address {id}"))
}
