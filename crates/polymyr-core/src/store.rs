//! The `MarketStore` trait: the system of record.
//!
//! The trait is implemented by storage backends (e.g. `polymyr-store-sqlite`).
//! The server depends on this abstraction, not on any concrete backend, and
//! never keeps authoritative copies across requests.

use std::future::Future;

use uuid::Uuid;

use crate::{
  account::{Account, AccountKind, AccountPatch, NewAccount},
  catalog::{Campaign, NewCampaign, NewProduct, Product},
  order::{
    CustomerAddress, NewAddress, NewOrder, NewPaymentLink, Order, OrderQuery,
    PaymentLink,
  },
  session::Session,
};

/// Outcome of a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
  Removed,
  Missing,
  /// Other rows still point at the target, so it was kept.
  Referenced,
}

/// Abstraction over a Polymyr storage backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait MarketStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Accounts ──────────────────────────────────────────────────────────

  /// Persist a new account. Fails if `(kind, email)` or
  /// `(kind, federated_subject)` is already taken.
  fn create_account(
    &self,
    input: NewAccount,
  ) -> impl Future<Output = Result<Account, Self::Error>> + Send + '_;

  fn get_account(
    &self,
    kind: AccountKind,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + '_;

  fn find_account_by_email(
    &self,
    kind: AccountKind,
    email: String,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + '_;

  fn find_account_by_subject(
    &self,
    kind: AccountKind,
    subject: String,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + '_;

  /// Apply `patch` and return the updated account, or `None` if absent.
  fn update_account(
    &self,
    kind: AccountKind,
    id: Uuid,
    patch: AccountPatch,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + '_;

  // ── Sessions ──────────────────────────────────────────────────────────

  fn insert_session(
    &self,
    session: Session,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn find_session(
    &self,
    token_digest: String,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + '_;

  /// Returns `true` if a session was deleted.
  fn delete_session(
    &self,
    token_digest: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Catalog ───────────────────────────────────────────────────────────

  fn create_product(
    &self,
    input: NewProduct,
  ) -> impl Future<Output = Result<Product, Self::Error>> + Send + '_;

  fn get_product(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Product>, Self::Error>> + Send + '_;

  fn list_products(&self) -> impl Future<Output = Result<Vec<Product>, Self::Error>> + Send + '_;

  fn delete_product(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Removal, Self::Error>> + Send + '_;

  /// Fails if the product already has a campaign.
  fn create_campaign(
    &self,
    input: NewCampaign,
  ) -> impl Future<Output = Result<Campaign, Self::Error>> + Send + '_;

  fn get_campaign(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Campaign>, Self::Error>> + Send + '_;

  fn campaign_for_product(
    &self,
    product_id: Uuid,
  ) -> impl Future<Output = Result<Option<Campaign>, Self::Error>> + Send + '_;

  fn delete_campaign(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Removal, Self::Error>> + Send + '_;

  /// Atomically claim one unit. Returns `false` when the campaign is sold out
  /// or does not exist.
  fn reserve_unit(
    &self,
    campaign_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Give back a unit claimed by [`reserve_unit`](Self::reserve_unit).
  fn release_unit(
    &self,
    campaign_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Shipping addresses ────────────────────────────────────────────────

  fn create_address(
    &self,
    input: NewAddress,
  ) -> impl Future<Output = Result<CustomerAddress, Self::Error>> + Send + '_;

  fn get_address(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<CustomerAddress>, Self::Error>> + Send + '_;

  fn list_addresses(
    &self,
    customer_id: Uuid,
  ) -> impl Future<Output = Result<Vec<CustomerAddress>, Self::Error>> + Send + '_;

  fn delete_address(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Removal, Self::Error>> + Send + '_;

  // ── Payment links ─────────────────────────────────────────────────────

  fn find_payment_link(
    &self,
    maker_id: Uuid,
    customer_id: Uuid,
  ) -> impl Future<Output = Result<Option<PaymentLink>, Self::Error>> + Send + '_;

  /// Insert a link unless one already exists for the pair; either way return
  /// the link that is stored afterwards.
  fn upsert_payment_link(
    &self,
    input: NewPaymentLink,
  ) -> impl Future<Output = Result<PaymentLink, Self::Error>> + Send + '_;

  // ── Orders ────────────────────────────────────────────────────────────

  fn insert_order(
    &self,
    input: NewOrder,
  ) -> impl Future<Output = Result<Order, Self::Error>> + Send + '_;

  fn get_order(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Order>, Self::Error>> + Send + '_;

  fn list_orders<'a>(
    &'a self,
    query: &'a OrderQuery,
  ) -> impl Future<Output = Result<Vec<Order>, Self::Error>> + Send + 'a;

  fn set_order_fulfilled(
    &self,
    id: Uuid,
    fulfilled: bool,
  ) -> impl Future<Output = Result<Option<Order>, Self::Error>> + Send + '_;
}
