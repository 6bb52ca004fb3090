//! Sessions and the principal a request acts as.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::{Account, AccountKind};

/// A persisted login. Only the digest of the bearer token is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub token_digest: String,
  pub account_kind: AccountKind,
  pub account_id:   Uuid,
  pub created_at:   DateTime<Utc>,
  /// `None` means the session never expires on its own.
  pub expires_at:   Option<DateTime<Utc>>,
}

impl Session {
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    self.expires_at.is_some_and(|at| at <= now)
  }
}

/// Who the current request is acting as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Principal {
  #[default]
  Anonymous,
  Customer(Uuid),
  Maker(Uuid),
}

impl Principal {
  pub fn for_account(account: &Account) -> Self {
    match account.kind {
      AccountKind::Customer => Principal::Customer(account.account_id),
      AccountKind::Maker => Principal::Maker(account.account_id),
    }
  }

  pub fn kind(&self) -> Option<AccountKind> {
    match self {
      Principal::Anonymous => None,
      Principal::Customer(_) => Some(AccountKind::Customer),
      Principal::Maker(_) => Some(AccountKind::Maker),
    }
  }

  pub fn account_id(&self) -> Option<Uuid> {
    match self {
      Principal::Anonymous => None,
      Principal::Customer(id) | Principal::Maker(id) => Some(*id),
    }
  }

  pub fn is_authenticated(&self) -> bool { !matches!(self, Principal::Anonymous) }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;

  #[test]
  fn expiry_is_inclusive_of_the_deadline() {
    let now = Utc::now();
    let mut session = Session {
      token_digest: "digest".into(),
      account_kind: AccountKind::Customer,
      account_id:   Uuid::new_v4(),
      created_at:   now,
      expires_at:   Some(now),
    };
    assert!(session.is_expired(now));

    session.expires_at = Some(now + Duration::seconds(1));
    assert!(!session.is_expired(now));

    session.expires_at = None;
    assert!(!session.is_expired(now + Duration::days(3650)));
  }
}
