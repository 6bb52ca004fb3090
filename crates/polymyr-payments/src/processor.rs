//! The [`PaymentProcessor`] trait.

use async_trait::async_trait;

use crate::{
  Result,
  types::{
    Card, Charge, ChargeRequest, ConnectedAccount, DeletedSource, NewConnectedAccount,
    NewCustomer, ProcessorCustomer, Token,
  },
};

/// Operations the marketplace needs from a card processor.
///
/// `secret_key` selects the account acted on: the platform's key for the
/// customer's platform-level card wallet, a maker's key for their connected
/// account.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
  /// Mint a single-use token for `card`, which is stored on the platform
  /// customer `platform_customer`.
  async fn create_token(
    &self,
    secret_key: &str,
    platform_customer: &str,
    card: &str,
  ) -> Result<Token>;

  async fn create_customer(
    &self,
    secret_key: &str,
    input: &NewCustomer,
  ) -> Result<ProcessorCustomer>;

  /// Attach a token or card to an existing customer.
  async fn attach_source(&self, secret_key: &str, customer: &str, source: &str) -> Result<Card>;

  async fn list_cards(&self, secret_key: &str, customer: &str) -> Result<Vec<Card>>;

  async fn create_charge(&self, secret_key: &str, request: &ChargeRequest) -> Result<Charge>;

  /// Open a managed connected account for a maker. Only meaningful under the
  /// platform key.
  async fn create_connected_account(
    &self,
    secret_key: &str,
    input: &NewConnectedAccount,
  ) -> Result<ConnectedAccount>;

  async fn delete_source(
    &self,
    secret_key: &str,
    customer: &str,
    source: &str,
  ) -> Result<DeletedSource>;

  async fn set_default_source(
    &self,
    secret_key: &str,
    customer: &str,
    source: &str,
  ) -> Result<ProcessorCustomer>;
}
