//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings and UUIDs are hyphenated lowercase strings.
//! Each table has a `Raw*` row struct holding exactly what SQLite returned,
//! converted to the domain type outside the connection thread.

use chrono::{DateTime, Utc};
use polymyr_core::{
  account::{Account, AccountKind, MakerSettings},
  catalog::{Campaign, Product},
  order::{CustomerAddress, Order, PaymentLink},
  session::Session,
  store::Removal,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_kind(s: &str) -> Result<AccountKind> { Ok(s.parse()?) }

/// Map a DELETE outcome, treating a foreign-key failure as "still referenced".
pub fn removal(result: rusqlite::Result<usize>) -> rusqlite::Result<Removal> {
  match result {
    Ok(0) => Ok(Removal::Missing),
    Ok(_) => Ok(Removal::Removed),
    Err(rusqlite::Error::SqliteFailure(e, _))
      if e.code == rusqlite::ErrorCode::ConstraintViolation =>
    {
      Ok(Removal::Referenced)
    }
    Err(e) => Err(e),
  }
}

// ─── Accounts ────────────────────────────────────────────────────────────────

pub const ACCOUNT_COLUMNS: &str = "account_id, kind, email, name, password_hash, processor_id,
   federated_subject, created_at, maker_cut, secret_key, publishable_key";

pub struct RawAccount {
  pub account_id:        String,
  pub kind:              String,
  pub email:             String,
  pub name:              String,
  pub password_hash:     Option<String>,
  pub processor_id:      Option<String>,
  pub federated_subject: Option<String>,
  pub created_at:        String,
  pub maker_cut:         Option<f64>,
  pub secret_key:        Option<String>,
  pub publishable_key:   Option<String>,
}

impl RawAccount {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      account_id:        row.get(0)?,
      kind:              row.get(1)?,
      email:             row.get(2)?,
      name:              row.get(3)?,
      password_hash:     row.get(4)?,
      processor_id:      row.get(5)?,
      federated_subject: row.get(6)?,
      created_at:        row.get(7)?,
      maker_cut:         row.get(8)?,
      secret_key:        row.get(9)?,
      publishable_key:   row.get(10)?,
    })
  }

  pub fn into_account(self) -> Result<Account> {
    let kind = decode_kind(&self.kind)?;
    let maker = match kind {
      AccountKind::Customer => None,
      AccountKind::Maker => Some(MakerSettings {
        cut:             self.maker_cut.unwrap_or(polymyr_core::account::DEFAULT_MAKER_CUT),
        secret_key:      self.secret_key,
        publishable_key: self.publishable_key,
      }),
    };

    Ok(Account {
      account_id: decode_uuid(&self.account_id)?,
      kind,
      email: self.email,
      name: self.name,
      password_hash: self.password_hash,
      processor_id: self.processor_id,
      federated_subject: self.federated_subject,
      created_at: decode_dt(&self.created_at)?,
      maker,
    })
  }
}

// ─── Sessions ────────────────────────────────────────────────────────────────

pub struct RawSession {
  pub token_digest: String,
  pub account_kind: String,
  pub account_id:   String,
  pub created_at:   String,
  pub expires_at:   Option<String>,
}

impl RawSession {
  pub fn into_session(self) -> Result<Session> {
    Ok(Session {
      token_digest: self.token_digest,
      account_kind: decode_kind(&self.account_kind)?,
      account_id:   decode_uuid(&self.account_id)?,
      created_at:   decode_dt(&self.created_at)?,
      expires_at:   self.expires_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

pub const PRODUCT_COLUMNS: &str =
  "product_id, maker_id, name, description, price_cents, created_at";

pub struct RawProduct {
  pub product_id:  String,
  pub maker_id:    String,
  pub name:        String,
  pub description: String,
  pub price_cents: i64,
  pub created_at:  String,
}

impl RawProduct {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      product_id:  row.get(0)?,
      maker_id:    row.get(1)?,
      name:        row.get(2)?,
      description: row.get(3)?,
      price_cents: row.get(4)?,
      created_at:  row.get(5)?,
    })
  }

  pub fn into_product(self) -> Result<Product> {
    Ok(Product {
      product_id:  decode_uuid(&self.product_id)?,
      maker_id:    decode_uuid(&self.maker_id)?,
      name:        self.name,
      description: self.description,
      price_cents: self.price_cents,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

pub const CAMPAIGN_COLUMNS: &str = "campaign_id, product_id, maker_id, units, purchased_units,
   end_date, amount_off_cents, created_at";

pub struct RawCampaign {
  pub campaign_id:      String,
  pub product_id:       String,
  pub maker_id:         String,
  pub units:            i64,
  pub purchased_units:  i64,
  pub end_date:         String,
  pub amount_off_cents: i64,
  pub created_at:       String,
}

impl RawCampaign {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      campaign_id:      row.get(0)?,
      product_id:       row.get(1)?,
      maker_id:         row.get(2)?,
      units:            row.get(3)?,
      purchased_units:  row.get(4)?,
      end_date:         row.get(5)?,
      amount_off_cents: row.get(6)?,
      created_at:       row.get(7)?,
    })
  }

  pub fn into_campaign(self) -> Result<Campaign> {
    Ok(Campaign {
      campaign_id:      decode_uuid(&self.campaign_id)?,
      product_id:       decode_uuid(&self.product_id)?,
      maker_id:         decode_uuid(&self.maker_id)?,
      units:            self.units,
      purchased_units:  self.purchased_units,
      end_date:         decode_dt(&self.end_date)?,
      amount_off_cents: self.amount_off_cents,
      created_at:       decode_dt(&self.created_at)?,
    })
  }
}

// ─── Addresses ───────────────────────────────────────────────────────────────

pub const ADDRESS_COLUMNS: &str = "address_id, customer_id, first_name, last_name, address,
   apartment, city, state, zip, phone";

pub struct RawAddress {
  pub address_id:  String,
  pub customer_id: String,
  pub first_name:  String,
  pub last_name:   String,
  pub address:     String,
  pub apartment:   Option<String>,
  pub city:        String,
  pub state:       String,
  pub zip:         String,
  pub phone:       Option<String>,
}

impl RawAddress {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      address_id:  row.get(0)?,
      customer_id: row.get(1)?,
      first_name:  row.get(2)?,
      last_name:   row.get(3)?,
      address:     row.get(4)?,
      apartment:   row.get(5)?,
      city:        row.get(6)?,
      state:       row.get(7)?,
      zip:         row.get(8)?,
      phone:       row.get(9)?,
    })
  }

  pub fn into_address(self) -> Result<CustomerAddress> {
    Ok(CustomerAddress {
      address_id:  decode_uuid(&self.address_id)?,
      customer_id: decode_uuid(&self.customer_id)?,
      first_name:  self.first_name,
      last_name:   self.last_name,
      address:     self.address,
      apartment:   self.apartment,
      city:        self.city,
      state:       self.state,
      zip:         self.zip,
      phone:       self.phone,
    })
  }
}

// ─── Payment links ───────────────────────────────────────────────────────────

pub struct RawPaymentLink {
  pub link_id:               String,
  pub maker_id:              String,
  pub customer_id:           String,
  pub processor_customer_id: String,
  pub created_at:            String,
}

impl RawPaymentLink {
  pub fn into_link(self) -> Result<PaymentLink> {
    Ok(PaymentLink {
      link_id:               decode_uuid(&self.link_id)?,
      maker_id:              decode_uuid(&self.maker_id)?,
      customer_id:           decode_uuid(&self.customer_id)?,
      processor_customer_id: self.processor_customer_id,
      created_at:            decode_dt(&self.created_at)?,
    })
  }
}

// ─── Orders ──────────────────────────────────────────────────────────────────

pub const ORDER_COLUMNS: &str = "order_id, product_id, campaign_id, maker_id, customer_id,
   address_id, card, charge_id, fulfilled, created_at";

pub struct RawOrder {
  pub order_id:    String,
  pub product_id:  String,
  pub campaign_id: String,
  pub maker_id:    String,
  pub customer_id: String,
  pub address_id:  String,
  pub card:        String,
  pub charge_id:   String,
  pub fulfilled:   bool,
  pub created_at:  String,
}

impl RawOrder {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      order_id:    row.get(0)?,
      product_id:  row.get(1)?,
      campaign_id: row.get(2)?,
      maker_id:    row.get(3)?,
      customer_id: row.get(4)?,
      address_id:  row.get(5)?,
      card:        row.get(6)?,
      charge_id:   row.get(7)?,
      fulfilled:   row.get(8)?,
      created_at:  row.get(9)?,
    })
  }

  pub fn into_order(self) -> Result<Order> {
    Ok(Order {
      order_id:    decode_uuid(&self.order_id)?,
      product_id:  decode_uuid(&self.product_id)?,
      campaign_id: decode_uuid(&self.campaign_id)?,
      maker_id:    decode_uuid(&self.maker_id)?,
      customer_id: decode_uuid(&self.customer_id)?,
      address_id:  decode_uuid(&self.address_id)?,
      card:        self.card,
      charge_id:   self.charge_id,
      fulfilled:   self.fulfilled,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}
