//! Accounts: the two kinds of principal that can sign in.
//!
//! Customers and makers share one record shape. Maker-only terms (platform
//! cut and processor keys) live in [`MakerSettings`].

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// Platform cut applied to makers that do not negotiate their own.
pub const DEFAULT_MAKER_CUT: f64 = 0.08;

/// Which side of the marketplace an account belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
  Customer,
  Maker,
}

impl AccountKind {
  pub fn as_str(self) -> &'static str {
    match self {
      AccountKind::Customer => "customer",
      AccountKind::Maker => "maker",
    }
  }
}

impl fmt::Display for AccountKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for AccountKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "customer" => Ok(AccountKind::Customer),
      "maker" => Ok(AccountKind::Maker),
      other => Err(Error::UnknownAccountKind(other.to_owned())),
    }
  }
}

/// Processor credentials a maker uses to charge on their connected account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MakerSettings {
  /// Fraction of each charge the platform keeps on top of the reward share.
  pub cut:             f64,
  #[serde(skip_serializing)]
  pub secret_key:      Option<String>,
  pub publishable_key: Option<String>,
}

impl MakerSettings {
  pub fn with_default_cut() -> Self {
    Self { cut: DEFAULT_MAKER_CUT, ..Self::default() }
  }
}

/// A persisted customer or maker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
  pub account_id:        Uuid,
  pub kind:              AccountKind,
  pub email:             String,
  pub name:              String,
  /// argon2 PHC string; `None` for accounts created through federation.
  #[serde(skip_serializing, default)]
  pub password_hash:     Option<String>,
  /// Customer: platform processor customer. Maker: connected account.
  pub processor_id:      Option<String>,
  pub federated_subject: Option<String>,
  pub created_at:        DateTime<Utc>,
  /// Present iff `kind == Maker`.
  pub maker:             Option<MakerSettings>,
}

/// Input for creating an account. The store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewAccount {
  pub kind:              AccountKind,
  pub email:             String,
  pub name:              String,
  pub password_hash:     Option<String>,
  pub federated_subject: Option<String>,
  pub maker:             Option<MakerSettings>,
}

impl NewAccount {
  /// An account that signs in with a password.
  pub fn with_password(
    kind: AccountKind,
    email: impl Into<String>,
    name: impl Into<String>,
    password_hash: impl Into<String>,
  ) -> Self {
    Self {
      kind,
      email: email.into(),
      name: name.into(),
      password_hash: Some(password_hash.into()),
      federated_subject: None,
      maker: (kind == AccountKind::Maker).then(MakerSettings::with_default_cut),
    }
  }

  /// An account that only exists through an external identity provider.
  pub fn federated(
    kind: AccountKind,
    email: impl Into<String>,
    name: impl Into<String>,
    subject: impl Into<String>,
  ) -> Self {
    Self {
      kind,
      email: email.into(),
      name: name.into(),
      password_hash: None,
      federated_subject: Some(subject.into()),
      maker: (kind == AccountKind::Maker).then(MakerSettings::with_default_cut),
    }
  }
}

/// Profile fields an owner may change. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountPatch {
  pub name:            Option<String>,
  pub email:           Option<String>,
  pub processor_id:    Option<String>,
  /// Makers only; ignored for customers.
  pub secret_key:      Option<String>,
  pub publishable_key: Option<String>,
}
