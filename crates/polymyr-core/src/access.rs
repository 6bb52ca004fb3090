//! Ownership-based access control.
//!
//! There is no role hierarchy and no administrator override: a principal may
//! mutate a resource only if it is signed in as the exact account that owns
//! it.

use thiserror::Error;
use uuid::Uuid;

use crate::{
  account::{Account, AccountKind},
  catalog::{Campaign, Product},
  order::{CustomerAddress, Order},
  session::Principal,
};

/// The account a resource belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
  pub kind: AccountKind,
  pub id:   Uuid,
}

impl Owner {
  pub fn customer(id: Uuid) -> Self { Self { kind: AccountKind::Customer, id } }

  pub fn maker(id: Uuid) -> Self { Self { kind: AccountKind::Maker, id } }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
  #[error("must authenticate as {0} {1}")]
  NotAuthenticated(AccountKind, Uuid),

  #[error("{actor} may not access {owner_kind} {owner_id}")]
  Forbidden {
    actor:      String,
    owner_kind: AccountKind,
    owner_id:   Uuid,
  },
}

/// Allow the request iff `principal` is the owning account.
pub fn authorize(principal: &Principal, owner: Owner) -> Result<(), AccessError> {
  match (principal.kind(), principal.account_id()) {
    (Some(kind), Some(id)) if kind == owner.kind && id == owner.id => Ok(()),
    (Some(kind), Some(id)) => Err(AccessError::Forbidden {
      actor:      format!("{kind} {id}"),
      owner_kind: owner.kind,
      owner_id:   owner.id,
    }),
    _ => Err(AccessError::NotAuthenticated(owner.kind, owner.id)),
  }
}

/// Resources that belong to exactly one account.
pub trait Owned {
  fn owner(&self) -> Owner;
}

impl Owned for Account {
  fn owner(&self) -> Owner { Owner { kind: self.kind, id: self.account_id } }
}

impl Owned for Product {
  fn owner(&self) -> Owner { Owner::maker(self.maker_id) }
}

impl Owned for Campaign {
  fn owner(&self) -> Owner { Owner::maker(self.maker_id) }
}

impl Owned for CustomerAddress {
  fn owner(&self) -> Owner { Owner::customer(self.customer_id) }
}

impl Owned for Order {
  fn owner(&self) -> Owner { Owner::customer(self.customer_id) }
}

/// Shorthand for `authorize(principal, resource.owner())`.
pub fn authorize_owned<R: Owned>(principal: &Principal, resource: &R) -> Result<(), AccessError> {
  authorize(principal, resource.owner())
}
