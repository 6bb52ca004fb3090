//! [`StripeClient`]: form-encoded Stripe v1 REST calls.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};

use crate::{
  Error, Result,
  processor::PaymentProcessor,
  types::{
    Card, Charge, ChargeRequest, ConnectedAccount, DeletedSource, List, NewConnectedAccount,
    NewCustomer, ProcessorCustomer, Token,
  },
};

// ─── Config ──────────────────────────────────────────────────────────────────

/// The `[processor]` configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorConfig {
  #[serde(default = "default_api_base")]
  pub api_base:     String,
  /// Platform secret key; holds customers' platform-level cards.
  #[serde(default)]
  pub secret_key:   String,
  #[serde(default = "default_currency")]
  pub currency:     String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_api_base() -> String { "https://api.stripe.com/v1/".to_owned() }
fn default_currency() -> String { "usd".to_owned() }
fn default_timeout_secs() -> u64 { 30 }

impl Default for ProcessorConfig {
  fn default() -> Self {
    Self {
      api_base:     default_api_base(),
      secret_key:   String::new(),
      currency:     default_currency(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct StripeClient {
  client:   Client,
  api_base: String,
}

impl StripeClient {
  pub fn new(config: &ProcessorConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self { client, api_base: config.api_base.clone() })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/{}", self.api_base.trim_end_matches('/'), path.trim_start_matches('/'))
  }

  async fn send<T: DeserializeOwned>(&self, req: RequestBuilder, secret_key: &str) -> Result<T> {
    let resp = req.bearer_auth(secret_key).send().await?;
    let status = resp.status();
    let body: serde_json::Value = resp
      .json()
      .await
      .map_err(|e| Error::Decode(format!("non-JSON body ({status}): {e}")))?;
    interpret(status, body)
  }
}

/// Turn a processor reply into `T`, or an [`Error::Api`] when the status is
/// not a success or the body carries an `error` object.
pub(crate) fn interpret<T: DeserializeOwned>(
  status: StatusCode,
  body: serde_json::Value,
) -> Result<T> {
  if let Some(error) = body.get("error") {
    let message = error
      .get("message")
      .and_then(|m| m.as_str())
      .unwrap_or("unknown processor error")
      .to_owned();
    return Err(Error::Api { status: status.as_u16(), message, body });
  }
  if !status.is_success() {
    return Err(Error::Api { status: status.as_u16(), message: status.to_string(), body });
  }
  serde_json::from_value(body).map_err(|e| Error::Decode(e.to_string()))
}

#[async_trait]
impl PaymentProcessor for StripeClient {
  async fn create_token(
    &self,
    secret_key: &str,
    platform_customer: &str,
    card: &str,
  ) -> Result<Token> {
    let req = self
      .client
      .post(self.url("tokens"))
      .form(&[("customer", platform_customer), ("card", card)]);
    self.send(req, secret_key).await
  }

  async fn create_customer(
    &self,
    secret_key: &str,
    input: &NewCustomer,
  ) -> Result<ProcessorCustomer> {
    let mut form = vec![
      ("source", input.source.as_str()),
      ("metadata[id]", input.local_id.as_str()),
    ];
    if let Some(email) = &input.email {
      form.push(("email", email.as_str()));
    }
    let req = self.client.post(self.url("customers")).form(&form);
    self.send(req, secret_key).await
  }

  async fn attach_source(&self, secret_key: &str, customer: &str, source: &str) -> Result<Card> {
    let req = self
      .client
      .post(self.url(&format!("customers/{customer}/sources")))
      .form(&[("source", source)]);
    self.send(req, secret_key).await
  }

  async fn list_cards(&self, secret_key: &str, customer: &str) -> Result<Vec<Card>> {
    let req = self
      .client
      .get(self.url(&format!("customers/{customer}/sources")))
      .query(&[("object", "card")]);
    let list: List<Card> = self.send(req, secret_key).await?;
    Ok(list.data)
  }

  async fn create_charge(&self, secret_key: &str, request: &ChargeRequest) -> Result<Charge> {
    let amount = request.amount_cents.to_string();
    let fee = request.application_fee_cents.to_string();
    let mut form = vec![
      ("amount", amount.as_str()),
      ("currency", request.currency.as_str()),
      ("application_fee_amount", fee.as_str()),
      ("customer", request.customer.as_str()),
      ("source", request.source.as_str()),
    ];
    if let Some(description) = &request.description {
      form.push(("description", description.as_str()));
    }
    let req = self.client.post(self.url("charges")).form(&form);
    self.send(req, secret_key).await
  }

  async fn create_connected_account(
    &self,
    secret_key: &str,
    input: &NewConnectedAccount,
  ) -> Result<ConnectedAccount> {
    let req = self.client.post(self.url("accounts")).form(&[
      ("type", "custom"),
      ("business_type", "company"),
      ("country", input.country.as_str()),
      ("email", input.email.as_str()),
      ("metadata[id]", input.local_id.as_str()),
    ]);
    self.send(req, secret_key).await
  }

  async fn delete_source(
    &self,
    secret_key: &str,
    customer: &str,
    source: &str,
  ) -> Result<DeletedSource> {
    let req = self.client.delete(self.url(&format!("customers/{customer}/sources/{source}")));
    self.send(req, secret_key).await
  }

  async fn set_default_source(
    &self,
    secret_key: &str,
    customer: &str,
    source: &str,
  ) -> Result<ProcessorCustomer> {
    let req = self
      .client
      .post(self.url(&format!("customers/{customer}")))
      .form(&[("default_source", source)]);
    self.send(req, secret_key).await
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn url_joins_cleanly() {
    let client = StripeClient::new(&ProcessorConfig::default()).unwrap();
    assert_eq!(client.url("charges"), "https://api.stripe.com/v1/charges");
    assert_eq!(client.url("/tokens"), "https://api.stripe.com/v1/tokens");
  }

  #[test]
  fn error_object_is_an_error_even_with_200() {
    let body = json!({ "error": { "type": "card_error", "message": "Your card was declined." } });
    let result: Result<Charge> = interpret(StatusCode::OK, body);
    match result {
      Err(Error::Api { status, message, .. }) => {
        assert_eq!(status, 200);
        assert_eq!(message, "Your card was declined.");
      }
      other => panic!("expected Api error, got {other:?}"),
    }
  }

  #[test]
  fn failure_status_without_error_object() {
    let result: Result<Charge> = interpret(StatusCode::BAD_GATEWAY, json!({}));
    assert!(matches!(result, Err(Error::Api { status: 502, .. })));
  }

  #[test]
  fn success_body_decodes() {
    let body = json!({
      "id": "ch_1",
      "object": "charge",
      "amount": 10000,
      "application_fee_amount": 2800,
      "currency": "usd",
      "status": "succeeded",
    });
    let charge: Charge = interpret(StatusCode::OK, body).unwrap();
    assert_eq!(charge.id, "ch_1");
    assert_eq!(charge.application_fee_amount, Some(2800));
  }

  #[test]
  fn card_list_decodes() {
    let body = json!({
      "object": "list",
      "data": [{ "id": "card_1", "brand": "Visa", "last4": "4242", "exp_month": 12, "exp_year": 2030 }],
    });
    let list: List<Card> = interpret(StatusCode::OK, body).unwrap();
    assert_eq!(list.data[0].last4.as_deref(), Some("4242"));
  }

  #[test]
  fn managed_account_keys_decode() {
    let body = json!({
      "id": "acct_1",
      "object": "account",
      "email": "maker@example.com",
      "keys": { "secret": "sk_live_x", "publishable": "pk_live_x" },
    });
    let account: ConnectedAccount = interpret(StatusCode::OK, body).unwrap();
    assert_eq!(account.keys.map(|k| k.secret).as_deref(), Some("sk_live_x"));

    let bare: ConnectedAccount = interpret(StatusCode::OK, json!({ "id": "acct_2" })).unwrap();
    assert_eq!(bare.keys, None);
  }

  #[test]
  fn deleted_source_decodes() {
    let body = json!({ "id": "card_1", "object": "card", "deleted": true });
    let deleted: DeletedSource = interpret(StatusCode::OK, body).unwrap();
    assert!(deleted.deleted);
  }

  #[test]
  fn mismatched_shape_is_decode_error() {
    let result: Result<Charge> = interpret(StatusCode::OK, json!({ "id": 7 }));
    assert!(matches!(result, Err(Error::Decode(_))));
  }
}
