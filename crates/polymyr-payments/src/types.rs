//! Processor objects, trimmed to the fields the marketplace reads.

use serde::{Deserialize, Serialize};

/// A stored card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
  pub id:        String,
  #[serde(default)]
  pub brand:     Option<String>,
  #[serde(default)]
  pub last4:     Option<String>,
  #[serde(default)]
  pub exp_month: Option<u32>,
  #[serde(default)]
  pub exp_year:  Option<u32>,
}

/// A single-use token standing in for a card.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Token {
  pub id:   String,
  #[serde(default)]
  pub card: Option<Card>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProcessorCustomer {
  pub id:             String,
  #[serde(default)]
  pub default_source: Option<String>,
  #[serde(default)]
  pub email:          Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Charge {
  pub id:                     String,
  pub amount:                 i64,
  #[serde(default)]
  pub application_fee_amount: Option<i64>,
  #[serde(default)]
  pub currency:               Option<String>,
  #[serde(default)]
  pub status:                 Option<String>,
}

/// Keys a managed connected account is issued at creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountKeys {
  pub secret:      String,
  pub publishable: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectedAccount {
  pub id:    String,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default)]
  pub keys:  Option<AccountKeys>,
}

/// Reply to detaching a source from a customer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeletedSource {
  pub id:      String,
  #[serde(default)]
  pub deleted: bool,
}

/// A page of a list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct List<T> {
  pub data: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCustomer {
  /// Token or card to make the customer's default source.
  pub source:   String,
  pub email:    Option<String>,
  /// Local account id, stored as `metadata[id]`.
  pub local_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConnectedAccount {
  pub email:    String,
  /// ISO 3166-1 alpha-2.
  pub country:  String,
  /// Local maker id, stored as `metadata[id]`.
  pub local_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
  pub amount_cents:          i64,
  pub application_fee_cents: i64,
  pub currency:              String,
  /// Customer on the charging account.
  pub customer:              String,
  /// Card of `customer` to charge.
  pub source:                String,
  pub description:           Option<String>,
}
