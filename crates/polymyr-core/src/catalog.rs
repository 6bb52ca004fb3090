//! Products and the campaigns that discount them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Something a maker sells. Prices are in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
  pub product_id:  Uuid,
  pub maker_id:    Uuid,
  pub name:        String,
  pub description: String,
  pub price_cents: i64,
  pub created_at:  DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
  pub maker_id:    Uuid,
  pub name:        String,
  #[serde(default)]
  pub description: String,
  pub price_cents: i64,
}

/// A time-boxed pre-order offer on a single product.
///
/// A product has at most one campaign (UNIQUE on `product_id`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
  pub campaign_id:      Uuid,
  pub product_id:       Uuid,
  pub maker_id:         Uuid,
  pub units:            i64,
  pub purchased_units:  i64,
  pub end_date:         DateTime<Utc>,
  pub amount_off_cents: i64,
  pub created_at:       DateTime<Utc>,
}

impl Campaign {
  pub fn remaining_units(&self) -> i64 { (self.units - self.purchased_units).max(0) }

  pub fn has_ended(&self, now: DateTime<Utc>) -> bool { self.end_date <= now }
}

#[derive(Debug, Clone)]
pub struct NewCampaign {
  pub product_id:       Uuid,
  pub maker_id:         Uuid,
  pub units:            i64,
  pub end_date:         DateTime<Utc>,
  pub amount_off_cents: i64,
}
