//! Payment-processor access for Polymyr.
//!
//! [`PaymentProcessor`] is the seam the order flow charges through;
//! [`StripeClient`] implements it against the Stripe v1 REST API. Every call
//! takes the secret key to act under, so one client serves the platform
//! account and every maker's connected account.

pub mod error;
pub mod processor;
pub mod stripe;
pub mod types;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use error::{Error, Result};
pub use processor::PaymentProcessor;
pub use stripe::{ProcessorConfig, StripeClient};
pub use types::{
  AccountKeys, Card, Charge, ChargeRequest, ConnectedAccount, DeletedSource, NewConnectedAccount,
  NewCustomer, ProcessorCustomer, Token,
};
