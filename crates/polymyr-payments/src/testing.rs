//! In-process processor for tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
  Error, Result,
  processor::PaymentProcessor,
  types::{
    AccountKeys, Card, Charge, ChargeRequest, ConnectedAccount, DeletedSource,
    NewConnectedAccount, NewCustomer, ProcessorCustomer, Token,
  },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
  CreateToken,
  CreateCustomer,
  AttachSource,
  ListCards,
  CreateCharge,
  CreateConnectedAccount,
  DeleteSource,
  SetDefaultSource,
}

/// A recorded call: the operation and the secret key it ran under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
  pub operation:  Operation,
  pub secret_key: String,
}

#[derive(Default)]
struct Ledger {
  next_id:   u32,
  cards:     HashMap<String, Vec<Card>>,
  defaults:  HashMap<String, String>,
  calls:     Vec<Call>,
  charges:   Vec<ChargeRequest>,
  customers: Vec<NewCustomer>,
  accounts:  Vec<NewConnectedAccount>,
}

impl Ledger {
  fn mint(&mut self, prefix: &str) -> String {
    self.next_id += 1;
    format!("{prefix}_{}", self.next_id)
  }

  fn card(&mut self) -> Card {
    Card {
      id:        self.mint("card"),
      brand:     Some("Visa".into()),
      last4:     Some("4242".into()),
      exp_month: Some(12),
      exp_year:  Some(2030),
    }
  }

  fn has_card(&self, customer: &str, source: &str) -> bool {
    self.cards.get(customer).is_some_and(|cards| cards.iter().any(|c| c.id == source))
  }
}

fn no_such_source(source: &str) -> Error {
  Error::Api {
    status:  404,
    message: format!("No such source: {source}"),
    body:    serde_json::json!({ "error": { "message": "No such source" } }),
  }
}

/// Records every call and answers with synthetic objects.
#[derive(Default)]
pub struct MockProcessor {
  ledger:  RwLock<Ledger>,
  failing: RwLock<HashSet<Operation>>,
}

impl MockProcessor {
  pub fn new() -> Self { Self::default() }

  pub async fn set_failing(&self, operation: Operation, fail: bool) {
    let mut failing = self.failing.write().await;
    if fail {
      failing.insert(operation);
    } else {
      failing.remove(&operation);
    }
  }

  /// Put a card with a known id on `customer`.
  pub async fn add_card(&self, customer: &str, card_id: &str) {
    let mut ledger = self.ledger.write().await;
    let mut card = ledger.card();
    card.id = card_id.to_owned();
    ledger.cards.entry(customer.to_owned()).or_default().push(card);
  }

  pub async fn calls(&self) -> Vec<Call> { self.ledger.read().await.calls.clone() }

  pub async fn count(&self, operation: Operation) -> usize {
    self.ledger.read().await.calls.iter().filter(|c| c.operation == operation).count()
  }

  pub async fn charges(&self) -> Vec<ChargeRequest> { self.ledger.read().await.charges.clone() }

  pub async fn customers(&self) -> Vec<NewCustomer> {
    self.ledger.read().await.customers.clone()
  }

  pub async fn connected_accounts(&self) -> Vec<NewConnectedAccount> {
    self.ledger.read().await.accounts.clone()
  }

  pub async fn default_source(&self, customer: &str) -> Option<String> {
    self.ledger.read().await.defaults.get(customer).cloned()
  }

  async fn record(&self, operation: Operation, secret_key: &str) -> Result<()> {
    self.ledger.write().await.calls.push(Call { operation, secret_key: secret_key.to_owned() });
    if self.failing.read().await.contains(&operation) {
      return Err(Error::Api {
        status:  402,
        message: format!("mock {operation:?} failure"),
        body:    serde_json::json!({ "error": { "message": "mock failure" } }),
      });
    }
    Ok(())
  }
}

#[async_trait]
impl PaymentProcessor for MockProcessor {
  async fn create_token(&self, secret_key: &str, _customer: &str, _card: &str) -> Result<Token> {
    self.record(Operation::CreateToken, secret_key).await?;
    let mut ledger = self.ledger.write().await;
    let card = ledger.card();
    Ok(Token { id: ledger.mint("tok"), card: Some(card) })
  }

  async fn create_customer(
    &self,
    secret_key: &str,
    input: &NewCustomer,
  ) -> Result<ProcessorCustomer> {
    self.record(Operation::CreateCustomer, secret_key).await?;
    let mut ledger = self.ledger.write().await;
    let id = ledger.mint("cus");
    let card = ledger.card();
    let default_source = Some(card.id.clone());
    ledger.defaults.insert(id.clone(), card.id.clone());
    ledger.cards.entry(id.clone()).or_default().push(card);
    ledger.customers.push(input.clone());
    Ok(ProcessorCustomer { id, default_source, email: input.email.clone() })
  }

  async fn attach_source(&self, secret_key: &str, customer: &str, _source: &str) -> Result<Card> {
    self.record(Operation::AttachSource, secret_key).await?;
    let mut ledger = self.ledger.write().await;
    let card = ledger.card();
    ledger.cards.entry(customer.to_owned()).or_default().push(card.clone());
    Ok(card)
  }

  async fn list_cards(&self, secret_key: &str, customer: &str) -> Result<Vec<Card>> {
    self.record(Operation::ListCards, secret_key).await?;
    Ok(self.ledger.read().await.cards.get(customer).cloned().unwrap_or_default())
  }

  async fn create_charge(&self, secret_key: &str, request: &ChargeRequest) -> Result<Charge> {
    self.record(Operation::CreateCharge, secret_key).await?;
    let mut ledger = self.ledger.write().await;
    ledger.charges.push(request.clone());
    Ok(Charge {
      id:                     ledger.mint("ch"),
      amount:                 request.amount_cents,
      application_fee_amount: Some(request.application_fee_cents),
      currency:               Some(request.currency.clone()),
      status:                 Some("succeeded".into()),
    })
  }

  async fn create_connected_account(
    &self,
    secret_key: &str,
    input: &NewConnectedAccount,
  ) -> Result<ConnectedAccount> {
    self.record(Operation::CreateConnectedAccount, secret_key).await?;
    let mut ledger = self.ledger.write().await;
    let id = ledger.mint("acct");
    ledger.accounts.push(input.clone());
    Ok(ConnectedAccount {
      keys: Some(AccountKeys { secret: format!("sk_{id}"), publishable: format!("pk_{id}") }),
      email: Some(input.email.clone()),
      id,
    })
  }

  async fn delete_source(
    &self,
    secret_key: &str,
    customer: &str,
    source: &str,
  ) -> Result<DeletedSource> {
    self.record(Operation::DeleteSource, secret_key).await?;
    let mut ledger = self.ledger.write().await;
    if !ledger.has_card(customer, source) {
      return Err(no_such_source(source));
    }
    if let Some(cards) = ledger.cards.get_mut(customer) {
      cards.retain(|c| c.id != source);
    }
    if ledger.defaults.get(customer).is_some_and(|d| d == source) {
      ledger.defaults.remove(customer);
    }
    Ok(DeletedSource { id: source.to_owned(), deleted: true })
  }

  async fn set_default_source(
    &self,
    secret_key: &str,
    customer: &str,
    source: &str,
  ) -> Result<ProcessorCustomer> {
    self.record(Operation::SetDefaultSource, secret_key).await?;
    let mut ledger = self.ledger.write().await;
    if !ledger.has_card(customer, source) {
      return Err(no_such_source(source));
    }
    ledger.defaults.insert(customer.to_owned(), source.to_owned());
    Ok(ProcessorCustomer {
      id:             customer.to_owned(),
      default_source: Some(source.to_owned()),
      email:          None,
    })
  }
}
