//! Orders, shipping addresses and maker–customer payment links.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Shipping ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerAddress {
  pub address_id:  Uuid,
  pub customer_id: Uuid,
  pub first_name:  String,
  pub last_name:   String,
  pub address:     String,
  pub apartment:   Option<String>,
  pub city:        String,
  pub state:       String,
  pub zip:         String,
  pub phone:       Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAddress {
  #[serde(skip)]
  pub customer_id: Uuid,
  pub first_name:  String,
  pub last_name:   String,
  pub address:     String,
  pub apartment:   Option<String>,
  pub city:        String,
  pub state:       String,
  pub zip:         String,
  pub phone:       Option<String>,
}

// ─── Payment links ───────────────────────────────────────────────────────────

/// A customer's processor sub-account on one maker's connected account.
///
/// At most one link exists per (maker, customer) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLink {
  pub link_id:               Uuid,
  pub maker_id:              Uuid,
  pub customer_id:           Uuid,
  pub processor_customer_id: String,
  pub created_at:            DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPaymentLink {
  pub maker_id:              Uuid,
  pub customer_id:           Uuid,
  pub processor_customer_id: String,
}

// ─── Orders ──────────────────────────────────────────────────────────────────

/// A paid pre-order. Only ever written after its charge succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
  pub order_id:    Uuid,
  pub product_id:  Uuid,
  pub campaign_id: Uuid,
  pub maker_id:    Uuid,
  pub customer_id: Uuid,
  pub address_id:  Uuid,
  /// Payment-method reference the customer paid with.
  pub card:        String,
  pub charge_id:   String,
  pub fulfilled:   bool,
  pub created_at:  DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
  pub product_id:  Uuid,
  pub campaign_id: Uuid,
  pub maker_id:    Uuid,
  pub customer_id: Uuid,
  pub address_id:  Uuid,
  pub card:        String,
  pub charge_id:   String,
}

/// Filter for [`MarketStore::list_orders`](crate::store::MarketStore::list_orders).
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
  pub customer_id: Option<Uuid>,
  pub maker_id:    Option<Uuid>,
  pub fulfilled:   Option<bool>,
}
