//! HTTP API for the Polymyr crowdfunding marketplace.
//!
//! Exposes an axum [`Router`] backed by any [`MarketStore`], a
//! [`FederationBridge`] for third-party sign-in and a [`PaymentProcessor`]
//! for charging customers on makers' connected accounts.

pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod orders;

pub use error::{ApiError, AuthError, OrderError};

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  middleware,
  routing::{delete, get, patch, post},
};
use polymyr_core::{pricing::FeeFormula, store::MarketStore};
use polymyr_identity::{FederationBridge, IdentityConfig};
use polymyr_payments::{PaymentProcessor, ProcessorConfig};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use handlers::{accounts, addresses, authentication, campaigns, payment, products};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and the
/// `POLYMYR__*` environment.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:             String,
  pub port:             u16,
  pub store_path:       PathBuf,
  #[serde(default = "default_session_ttl_days")]
  pub session_ttl_days: i64,
  /// Marks the session cookie `Secure`. Only turn off for plain-HTTP local use.
  #[serde(default = "default_cookie_secure")]
  pub cookie_secure:    bool,
  #[serde(default)]
  pub fee_formula:      FeeFormula,
  pub identity:         IdentityConfig,
  #[serde(default)]
  pub processor:        ProcessorConfig,
}

fn default_session_ttl_days() -> i64 { 7 }
fn default_cookie_secure() -> bool { true }

impl ServerConfig {
  pub fn session_ttl(&self) -> chrono::Duration { chrono::Duration::days(self.session_ttl_days) }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store:     Arc<S>,
  pub config:    Arc<ServerConfig>,
  pub identity:  Arc<FederationBridge>,
  pub processor: Arc<dyn PaymentProcessor>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:     self.store.clone(),
      config:    self.config.clone(),
      identity:  self.identity.clone(),
      processor: self.processor.clone(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the marketplace API.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: MarketStore + 'static,
{
  Router::new()
    // Sessions
    .route(
      "/authentication",
      post(authentication::login::<S>).delete(authentication::logout::<S>),
    )
    .route("/authentication/federated", post(authentication::federated::<S>))
    .route("/me", get(accounts::me))
    // Accounts
    .route("/customers", post(accounts::register_customer::<S>))
    .route("/customers/{id}", patch(accounts::update_customer::<S>))
    .route("/makers", post(accounts::register_maker::<S>))
    .route("/makers/{id}", patch(accounts::update_maker::<S>))
    .route("/makers/{id}/processor-account", post(payment::create_processor_account::<S>))
    // Catalog
    .route("/products", get(products::list::<S>).post(products::create::<S>))
    .route("/products/{id}", get(products::get_one::<S>).delete(products::delete_one::<S>))
    .route("/campaigns", post(campaigns::create::<S>))
    .route("/campaigns/{id}", delete(campaigns::delete_one::<S>))
    // Shipping
    .route("/customer-addresses", get(addresses::list::<S>).post(addresses::create::<S>))
    .route("/customer-addresses/{id}", delete(addresses::delete_one::<S>))
    // Orders
    .route("/orders", get(handlers::orders::list::<S>).post(handlers::orders::create::<S>))
    .route("/orders/{id}/fulfilled", patch(handlers::orders::set_fulfilled::<S>))
    // Payment methods
    .route("/payment/sources", get(payment::list_sources::<S>).post(payment::add_source::<S>))
    .route("/payment/sources/{id}", delete(payment::delete_source::<S>))
    .route("/payment/sources/{id}/default", post(payment::set_default_source::<S>))
    .layer(middleware::from_fn_with_state(state.clone(), auth::extract::resolve_session::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Test support ─────────────────────────────────────────────────────────────


// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests;
