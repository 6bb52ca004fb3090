//! Order creation: reserve a unit, charge the customer on the maker's
//! connected account, then record the order.
//!
//! An order row is only written after its charge succeeded. Every failure
//! before the charge gives the reserved unit back, so a failed checkout
//! leaves the campaign exactly as it found it. Once the processor has taken
//! the money the unit stays sold, even if the order row cannot be written.

use chrono::Utc;
use polymyr_core::{
  access::authorize_owned,
  account::{Account, AccountKind},
  catalog::{Campaign, Product},
  order::{NewOrder, NewPaymentLink, Order},
  pricing::{self, ChargeQuote},
  session::Principal,
  store::MarketStore,
};
use polymyr_payments::{Charge, ChargeRequest, NewCustomer};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, error::OrderError};

/// Body of `POST /orders`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrderRequest {
  pub product_id: Uuid,
  /// Id of a card in the customer's platform wallet.
  pub card:       String,
  pub address_id: Uuid,
}

fn store_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> OrderError {
  OrderError::Store(Box::new(e))
}

/// Everything resolved and validated before any money or stock moves.
struct Checkout {
  product:  Product,
  campaign: Campaign,
  maker:    Account,
  quote:    ChargeQuote,
}

pub async fn create_order<S: MarketStore>(
  state: &AppState<S>,
  customer: &Account,
  request: NewOrderRequest,
) -> Result<Order, OrderError> {
  let checkout = prepare(state, customer, &request).await?;
  let campaign_id = checkout.campaign.campaign_id;

  if !state.store.reserve_unit(campaign_id).await.map_err(store_err)? {
    return Err(OrderError::CampaignSoldOut(campaign_id));
  }

  let (charge, source) = match take_payment(state, customer, &request, &checkout).await {
    Ok(charged) => charged,
    Err(e) => {
      if let Err(release) = state.store.release_unit(campaign_id).await {
        tracing::error!(%campaign_id, error = %release, "failed to release reserved unit");
      }
      return Err(e);
    }
  };

  let order = record(state, customer, &request, &checkout, &charge, source).await?;
  tracing::info!(
    order_id = %order.order_id,
    customer_id = %customer.account_id,
    maker_id = %order.maker_id,
    charge_id = %order.charge_id,
    amount_cents = checkout.quote.amount_cents,
    fee_cents = checkout.quote.application_fee_cents,
    "order created"
  );
  Ok(order)
}

async fn prepare<S: MarketStore>(
  state: &AppState<S>,
  customer: &Account,
  request: &NewOrderRequest,
) -> Result<Checkout, OrderError> {
  let store = state.store.as_ref();

  let product = store
    .get_product(request.product_id)
    .await
    .map_err(store_err)?
    .ok_or_else(|| OrderError::NotFound(format!("product {}", request.product_id)))?;

  let campaign = store
    .campaign_for_product(product.product_id)
    .await
    .map_err(store_err)?
    .ok_or(OrderError::MissingCampaign(product.product_id))?;

  if campaign.product_id != product.product_id || campaign.maker_id != product.maker_id {
    return Err(OrderError::MalformedCampaign(format!(
      "campaign {} does not match product {}",
      campaign.campaign_id, product.product_id
    )));
  }

  let maker = store
    .get_account(AccountKind::Maker, product.maker_id)
    .await
    .map_err(store_err)?
    .ok_or_else(|| OrderError::MalformedCampaign(format!("maker {} not found", product.maker_id)))?;
  let cut = maker.maker.as_ref().map(|m| m.cut).unwrap_or_default();

  let quote = pricing::quote(
    state.config.fee_formula,
    product.price_cents,
    campaign.amount_off_cents,
    cut,
  )
  .map_err(|e| OrderError::MalformedCampaign(e.to_string()))?;

  let address = store
    .get_address(request.address_id)
    .await
    .map_err(store_err)?
    .ok_or_else(|| OrderError::NotFound(format!("address {}", request.address_id)))?;
  authorize_owned(&Principal::for_account(customer), &address)?;

  if campaign.has_ended(Utc::now()) {
    return Err(OrderError::CampaignEnded(campaign.campaign_id));
  }

  Ok(Checkout { product, campaign, maker, quote })
}

/// Charge the customer on the maker's account. Returns the charge and the
/// card it was taken from.
async fn take_payment<S: MarketStore>(
  state: &AppState<S>,
  customer: &Account,
  request: &NewOrderRequest,
  checkout: &Checkout,
) -> Result<(Charge, String), OrderError> {
  let platform_customer = customer.processor_id.as_deref().ok_or_else(|| {
    OrderError::MissingPaymentAccount("customer has no saved payment methods".into())
  })?;
  let maker_key = checkout
    .maker
    .maker
    .as_ref()
    .and_then(|m| m.secret_key.as_deref())
    .filter(|k| !k.is_empty())
    .ok_or_else(|| {
      OrderError::MissingPaymentAccount("maker has not connected a processor account".into())
    })?;

  let (connect_customer, source) =
    connected_source(state, customer, &checkout.maker, platform_customer, maker_key, &request.card)
      .await?;

  let charge = state
    .processor
    .create_charge(maker_key, &ChargeRequest {
      amount_cents:          checkout.quote.amount_cents,
      application_fee_cents: checkout.quote.application_fee_cents,
      currency:              state.config.processor.currency.clone(),
      customer:              connect_customer,
      source:                source.clone(),
      description:           Some(checkout.product.name.clone()),
    })
    .await?;

  Ok((charge, source))
}

/// Write the order row for a successful charge. Failure here leaves the unit
/// reserved; the charge id is logged for reconciliation.
async fn record<S: MarketStore>(
  state: &AppState<S>,
  customer: &Account,
  request: &NewOrderRequest,
  checkout: &Checkout,
  charge: &Charge,
  source: String,
) -> Result<Order, OrderError> {
  let inserted = state
    .store
    .insert_order(NewOrder {
      product_id:  checkout.product.product_id,
      campaign_id: checkout.campaign.campaign_id,
      maker_id:    checkout.maker.account_id,
      customer_id: customer.account_id,
      address_id:  request.address_id,
      card:        source,
      charge_id:   charge.id.clone(),
    })
    .await;

  inserted.map_err(|e| {
    tracing::error!(
      charge_id = %charge.id,
      campaign_id = %checkout.campaign.campaign_id,
      customer_id = %customer.account_id,
      error = %e,
      "charge succeeded but the order could not be recorded; unit kept reserved"
    );
    store_err(e)
  })
}

/// The customer's id on the maker's connected account and a payment source
/// usable there, creating either as needed.
async fn connected_source<S: MarketStore>(
  state: &AppState<S>,
  customer: &Account,
  maker: &Account,
  platform_customer: &str,
  maker_key: &str,
  card: &str,
) -> Result<(String, String), OrderError> {
  let processor = state.processor.as_ref();

  let link = state
    .store
    .find_payment_link(maker.account_id, customer.account_id)
    .await
    .map_err(store_err)?;

  if let Some(link) = link {
    let connect_customer = link.processor_customer_id;
    let cards = processor.list_cards(maker_key, &connect_customer).await?;
    if cards.iter().any(|c| c.id == card) {
      return Ok((connect_customer, card.to_owned()));
    }
    let token = processor.create_token(maker_key, platform_customer, card).await?;
    let attached = processor.attach_source(maker_key, &connect_customer, &token.id).await?;
    return Ok((connect_customer, attached.id));
  }

  let token = processor.create_token(maker_key, platform_customer, card).await?;
  let created = processor
    .create_customer(maker_key, &NewCustomer {
      source:   token.id.clone(),
      email:    Some(customer.email.clone()),
      local_id: customer.account_id.to_string(),
    })
    .await?;

  let link = state
    .store
    .upsert_payment_link(NewPaymentLink {
      maker_id:              maker.account_id,
      customer_id:           customer.account_id,
      processor_customer_id: created.id.clone(),
    })
    .await
    .map_err(store_err)?;
  tracing::debug!(
    maker_id = %maker.account_id,
    customer_id = %customer.account_id,
    processor_customer_id = %link.processor_customer_id,
    "payment link ready"
  );

  if link.processor_customer_id == created.id {
    let source = created
      .default_source
      .or_else(|| token.card.map(|c| c.id))
      .ok_or_else(|| OrderError::MissingPaymentAccount("processor returned no card".into()))?;
    return Ok((created.id, source));
  }

  // Another request linked this pair first; use its customer instead.
  let token = processor.create_token(maker_key, platform_customer, card).await?;
  let attached =
    processor.attach_source(maker_key, &link.processor_customer_id, &token.id).await?;
  Ok((link.processor_customer_id, attached.id))
}
