//! Identity federation for Polymyr.
//!
//! Verifies RS256-signed identity assertions issued by an external provider
//! (Firebase-style secure tokens) and yields the verified subject. Signing keys
//! are fetched from the provider and cached in a [`KeyCache`].

pub mod assertion;
pub mod bridge;
pub mod error;
pub mod keys;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use bridge::{FederationBridge, IdentityConfig, VerifiedIdentity};
pub use error::{Error, Result};
pub use keys::{HttpKeySource, KeyCache, KeySource};
