//! Core types and trait definitions for the Polymyr marketplace.
//!
//! No HTTP or database dependencies. Storage backends implement
//! [`store::MarketStore`] and the server only sees that trait.

// Store futures carry explicit `Send` bounds; silence the advisory lint.
#![allow(async_fn_in_trait)]

pub mod access;
pub mod account;
pub mod catalog;
pub mod error;
pub mod order;
pub mod pricing;
pub mod session;
pub mod store;

pub use error::{Error, Result};
