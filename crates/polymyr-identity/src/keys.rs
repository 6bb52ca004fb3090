//! Signing-key retrieval and caching.
//!
//! The provider publishes its current keys as a JSON object mapping key id to
//! a PEM-encoded X.509 certificate. Keys rotate, so the cache is refreshed
//! when it is older than its TTL or when an unknown key id shows up. Misses
//! trigger at most one refresh per [`DEFAULT_MIN_REFRESH`] so a stream of
//! bogus key ids cannot hammer the provider.

use std::{
  collections::HashMap,
  sync::Arc,
  time::{Duration, Instant},
};

use async_trait::async_trait;
use rsa::{
  RsaPublicKey,
  pkcs1::DecodeRsaPublicKey as _,
  pkcs8::DecodePublicKey as _,
};
use tokio::sync::RwLock;
use x509_cert::{
  Certificate,
  der::{DecodePem as _, Encode as _},
};

use crate::{Error, Result};

// ─── Sources ─────────────────────────────────────────────────────────────────

/// Somewhere the current set of signing keys can be fetched from.
#[async_trait]
pub trait KeySource: Send + Sync {
  /// Return every currently valid key as `kid → PEM`.
  async fn fetch(&self) -> Result<HashMap<String, String>>;
}

/// Fetches keys with an HTTPS GET of a JSON `kid → PEM` map.
pub struct HttpKeySource {
  client: reqwest::Client,
  url:    String,
}

impl HttpKeySource {
  pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self { client, url: url.into() })
  }
}

#[async_trait]
impl KeySource for HttpKeySource {
  async fn fetch(&self) -> Result<HashMap<String, String>> {
    let resp = self.client.get(&self.url).send().await?;
    let status = resp.status();
    if !status.is_success() {
      return Err(Error::KeyFetch(format!("{} returned {status}", self.url)));
    }
    Ok(resp.json().await?)
  }
}

/// Decode an RSA public key from a PEM certificate, SPKI public key or
/// PKCS#1 public key.
pub fn parse_public_key(pem: &str) -> Result<RsaPublicKey> {
  if pem.contains("BEGIN CERTIFICATE") {
    let cert = Certificate::from_pem(pem.as_bytes())
      .map_err(|e| Error::InvalidKey(format!("certificate: {e}")))?;
    let spki = cert
      .tbs_certificate
      .subject_public_key_info
      .to_der()
      .map_err(|e| Error::InvalidKey(format!("certificate key: {e}")))?;
    return RsaPublicKey::from_public_key_der(&spki)
      .map_err(|e| Error::InvalidKey(format!("certificate key: {e}")));
  }

  if pem.contains("BEGIN RSA PUBLIC KEY") {
    return RsaPublicKey::from_pkcs1_pem(pem)
      .map_err(|e| Error::InvalidKey(format!("pkcs1: {e}")));
  }

  RsaPublicKey::from_public_key_pem(pem).map_err(|e| Error::InvalidKey(format!("spki: {e}")))
}

// ─── Cache ───────────────────────────────────────────────────────────────────

pub const DEFAULT_MIN_REFRESH: Duration = Duration::from_secs(30);

#[derive(Default)]
struct CachedKeys {
  keys:       HashMap<String, RsaPublicKey>,
  fetched_at: Option<Instant>,
  /// Bumped on every refresh so waiters can tell someone else refreshed.
  generation: u64,
}

impl CachedKeys {
  fn is_fresh(&self, ttl: Duration) -> bool {
    self.fetched_at.is_some_and(|at| at.elapsed() < ttl)
  }

  /// Fresh, and refreshed too recently for a miss to justify another fetch.
  fn holds_misses(&self, ttl: Duration, min_refresh: Duration) -> bool {
    self.is_fresh(ttl) && self.fetched_at.is_some_and(|at| at.elapsed() < min_refresh)
  }
}

/// Signing keys by id, refreshed from a [`KeySource`].
pub struct KeyCache {
  source:      Arc<dyn KeySource>,
  ttl:         Duration,
  min_refresh: Duration,
  state:       RwLock<CachedKeys>,
}

impl KeyCache {
  pub fn new(source: Arc<dyn KeySource>, ttl: Duration) -> Self {
    Self {
      source,
      ttl,
      min_refresh: DEFAULT_MIN_REFRESH,
      state: RwLock::new(CachedKeys::default()),
    }
  }

  /// Minimum time between refreshes caused by an unknown key id.
  pub fn with_min_refresh(mut self, min_refresh: Duration) -> Self {
    self.min_refresh = min_refresh;
    self
  }

  /// Look up the key for `kid`, refreshing the set at most once.
  pub async fn get(&self, kid: &str) -> Result<RsaPublicKey> {
    let seen = {
      let state = self.state.read().await;
      if state.is_fresh(self.ttl)
        && let Some(key) = state.keys.get(kid)
      {
        return Ok(key.clone());
      }
      if state.holds_misses(self.ttl, self.min_refresh) {
        return Err(Error::UnknownSigningKey(kid.to_owned()));
      }
      state.generation
    };

    let mut state = self.state.write().await;
    // Another task may have refreshed while we waited for the write lock.
    if state.generation == seen && !state.holds_misses(self.ttl, self.min_refresh) {
      let fetched = self.source.fetch().await?;
      state.keys = decode_key_set(fetched);
      state.fetched_at = Some(Instant::now());
      state.generation += 1;
      tracing::info!(keys = state.keys.len(), "refreshed identity signing keys");
    }

    state
      .keys
      .get(kid)
      .cloned()
      .ok_or_else(|| Error::UnknownSigningKey(kid.to_owned()))
  }
}

fn decode_key_set(pems: HashMap<String, String>) -> HashMap<String, RsaPublicKey> {
  pems
    .into_iter()
    .filter_map(|(kid, pem)| match parse_public_key(&pem) {
      Ok(key) => Some((kid, key)),
      Err(e) => {
        tracing::warn!(%kid, error = %e, "skipping unusable signing key");
        None
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::Ordering;

  use super::*;
  use crate::testing::{StaticKeySource, TEST_CERT_PEM, TEST_KID, TEST_PUBLIC_KEY_PEM};

  #[test]
  fn certificate_and_spki_yield_same_key() {
    let from_cert = parse_public_key(TEST_CERT_PEM).unwrap();
    let from_spki = parse_public_key(TEST_PUBLIC_KEY_PEM).unwrap();
    assert_eq!(from_cert, from_spki);
  }

  #[test]
  fn garbage_is_invalid_key() {
    assert!(matches!(parse_public_key("not a key"), Err(Error::InvalidKey(_))));
  }

  #[tokio::test]
  async fn fetches_once_while_fresh() {
    let source = Arc::new(StaticKeySource::with_test_key());
    let cache = KeyCache::new(source.clone(), Duration::from_secs(3600));

    cache.get(TEST_KID).await.unwrap();
    cache.get(TEST_KID).await.unwrap();
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn unknown_kid_refreshes_then_fails() {
    let source = Arc::new(StaticKeySource::with_test_key());
    let cache =
      KeyCache::new(source.clone(), Duration::from_secs(3600)).with_min_refresh(Duration::ZERO);
    cache.get(TEST_KID).await.unwrap();

    let err = cache.get("rotated-away").await.unwrap_err();
    assert!(matches!(err, Error::UnknownSigningKey(kid) if kid == "rotated-away"));
    assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn unknown_kids_within_min_refresh_do_not_fetch() {
    let source = Arc::new(StaticKeySource::with_test_key());
    let cache = KeyCache::new(source.clone(), Duration::from_secs(3600));
    cache.get(TEST_KID).await.unwrap();

    for kid in ["bogus-1", "bogus-2", "bogus-3"] {
      let err = cache.get(kid).await.unwrap_err();
      assert!(matches!(err, Error::UnknownSigningKey(k) if k == kid));
    }
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    // Known keys are still served.
    cache.get(TEST_KID).await.unwrap();
  }

  #[tokio::test]
  async fn unknown_kid_on_cold_cache_fetches() {
    let source = Arc::new(StaticKeySource::with_test_key());
    let cache = KeyCache::new(source.clone(), Duration::from_secs(3600));

    assert!(matches!(cache.get("bogus").await, Err(Error::UnknownSigningKey(_))));
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
  async fn concurrent_misses_fetch_once() {
    let source = Arc::new(StaticKeySource::with_test_key());
    let cache = Arc::new(
      KeyCache::new(source.clone(), Duration::from_secs(3600)).with_min_refresh(Duration::ZERO),
    );

    let tasks: Vec<_> = (0..32)
      .map(|_| {
        let cache = cache.clone();
        tokio::spawn(async move { cache.get(TEST_KID).await })
      })
      .collect();
    for task in tasks {
      task.await.unwrap().unwrap();
    }
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn stale_cache_is_refreshed() {
    let source = Arc::new(StaticKeySource::with_test_key());
    let cache = KeyCache::new(source.clone(), Duration::ZERO);

    cache.get(TEST_KID).await.unwrap();
    cache.get(TEST_KID).await.unwrap();
    assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn fetch_failure_is_reported() {
    let source = Arc::new(StaticKeySource::failing());
    let cache = KeyCache::new(source, Duration::from_secs(3600));
    assert!(matches!(cache.get(TEST_KID).await, Err(Error::KeyFetch(_))));
  }
}
