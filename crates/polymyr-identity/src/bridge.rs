//! [`FederationBridge`]: turns an identity assertion into a verified subject.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use rsa::{
  pkcs1v15::{Signature, VerifyingKey},
  signature::Verifier as _,
};
use serde::Deserialize;
use sha2::Sha256;

use crate::{
  Error, Result,
  assertion::{Claims, ParsedAssertion},
  keys::{DEFAULT_MIN_REFRESH, HttpKeySource, KeyCache, KeySource},
};

pub const DEFAULT_KEY_URL: &str =
  "https://www.googleapis.com/robot/v1/metadata/x509/securetoken@system.gserviceaccount.com";

const ISSUER_PREFIX: &str = "https://securetoken.google.com/";

// ─── Config ──────────────────────────────────────────────────────────────────

/// The `[identity]` configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
  /// Provider project; the expected `aud` and the suffix of the issuer.
  pub project_id:       String,
  #[serde(default = "default_key_url")]
  pub key_url:          String,
  /// Clock skew tolerated on `exp` and `iat`.
  #[serde(default = "default_leeway_secs")]
  pub leeway_secs:      u64,
  #[serde(default = "default_key_ttl_secs")]
  pub key_ttl_secs:     u64,
  /// Minimum gap between refreshes triggered by an unknown key id.
  #[serde(default = "default_min_refresh_secs")]
  pub min_refresh_secs: u64,
}

fn default_key_url() -> String { DEFAULT_KEY_URL.to_owned() }
fn default_leeway_secs() -> u64 { 60 }
fn default_key_ttl_secs() -> u64 { 3600 }
fn default_min_refresh_secs() -> u64 { DEFAULT_MIN_REFRESH.as_secs() }

impl IdentityConfig {
  pub fn new(project_id: impl Into<String>) -> Self {
    Self {
      project_id:       project_id.into(),
      key_url:          default_key_url(),
      leeway_secs:      default_leeway_secs(),
      key_ttl_secs:     default_key_ttl_secs(),
      min_refresh_secs: default_min_refresh_secs(),
    }
  }
}

// ─── Bridge ──────────────────────────────────────────────────────────────────

/// What a successful verification establishes about the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
  pub subject: String,
  pub email:   Option<String>,
  pub name:    Option<String>,
}

pub struct FederationBridge {
  project_id: String,
  issuer:     String,
  leeway:     i64,
  keys:       KeyCache,
}

impl FederationBridge {
  pub fn new(config: &IdentityConfig, source: Arc<dyn KeySource>) -> Self {
    Self {
      project_id: config.project_id.clone(),
      issuer:     format!("{ISSUER_PREFIX}{}", config.project_id),
      leeway:     i64::try_from(config.leeway_secs).unwrap_or(i64::MAX),
      keys:       KeyCache::new(source, Duration::from_secs(config.key_ttl_secs))
        .with_min_refresh(Duration::from_secs(config.min_refresh_secs)),
    }
  }

  /// Build a bridge that fetches keys over HTTPS from `config.key_url`.
  pub fn from_config(config: &IdentityConfig, timeout: Duration) -> Result<Self> {
    let source = HttpKeySource::new(config.key_url.clone(), timeout)?;
    Ok(Self::new(config, Arc::new(source)))
  }

  /// Verify `token` as an assertion about `subject`, as of now.
  pub async fn verify(&self, token: &str, subject: &str) -> Result<VerifiedIdentity> {
    self.verify_at(token, subject, Utc::now()).await
  }

  /// Verify `token` as of `now`.
  ///
  /// The signature is checked before any claim, so a forged token never has
  /// its claims interpreted.
  pub async fn verify_at(
    &self,
    token: &str,
    subject: &str,
    now: DateTime<Utc>,
  ) -> Result<VerifiedIdentity> {
    let parsed = ParsedAssertion::parse(token)?;
    let kid = parsed
      .header
      .kid
      .as_deref()
      .ok_or_else(|| Error::MalformedToken("missing kid".into()))?;

    let key = self.keys.get(kid).await?;
    let signature = Signature::try_from(parsed.signature.as_slice())
      .map_err(|_| Error::SignatureVerificationFailed)?;
    VerifyingKey::<Sha256>::new(key)
      .verify(parsed.signing_input.as_bytes(), &signature)
      .map_err(|_| Error::SignatureVerificationFailed)?;

    self.check_claims(&parsed.claims, subject, now)?;

    let Claims { sub, email, name, .. } = parsed.claims;
    Ok(VerifiedIdentity { subject: sub, email, name })
  }

  fn check_claims(&self, claims: &Claims, subject: &str, now: DateTime<Utc>) -> Result<()> {
    let now = now.timestamp();
    let reject = |reason: &str| Err(Error::ClaimsVerificationFailed(reason.to_owned()));

    if claims.exp.saturating_add(self.leeway) <= now {
      return reject("token has expired");
    }
    if claims.iat.saturating_sub(self.leeway) > now {
      return reject("token was issued in the future");
    }
    if claims.iss != self.issuer {
      return reject("unexpected issuer");
    }
    if !claims.aud.contains(&self.project_id) {
      return reject("unexpected audience");
    }
    if claims.sub.is_empty() {
      return reject("empty subject");
    }
    if claims.sub != subject {
      return reject("subject does not match");
    }
    Ok(())
  }
}
