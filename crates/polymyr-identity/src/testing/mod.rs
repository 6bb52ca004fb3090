//! Test support: a fixed RSA signer and an in-memory [`KeySource`].
//!
//! Enabled for this crate's tests and, through the `test-util` feature, for
//! dependants that need to mint valid assertions.

use std::{
  collections::HashMap,
  sync::{
    OnceLock,
    atomic::{AtomicUsize, Ordering},
  },
};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use rsa::{
  RsaPrivateKey,
  pkcs1v15::SigningKey,
  pkcs8::DecodePrivateKey as _,
  signature::{SignatureEncoding as _, Signer as _},
};
use serde_json::{Value, json};
use sha2::Sha256;

use crate::{Error, Result, keys::KeySource};

pub const PROJECT_ID: &str = "polymyr-test";
pub const TEST_KID: &str = "test-key-1";

pub const TEST_PRIVATE_KEY_PEM: &str = include_str!("signing_key.pem");
pub const TEST_PUBLIC_KEY_PEM: &str = include_str!("signing_pub.pem");
/// Self-signed certificate wrapping the test public key.
pub const TEST_CERT_PEM: &str = include_str!("signing_cert.pem");

pub struct TestSigner {
  key: SigningKey<Sha256>,
}

/// The process-wide test signer.
pub fn signer() -> &'static TestSigner {
  static SIGNER: OnceLock<TestSigner> = OnceLock::new();
  SIGNER.get_or_init(|| {
    let key = RsaPrivateKey::from_pkcs8_pem(TEST_PRIVATE_KEY_PEM).expect("test private key");
    TestSigner { key: SigningKey::new(key) }
  })
}

impl TestSigner {
  /// Sign `claims` under [`TEST_KID`].
  pub fn sign_claims(&self, claims: &Value) -> String { self.sign_with_kid(TEST_KID, claims) }

  pub fn sign_with_kid(&self, kid: &str, claims: &Value) -> String {
    self.sign_raw(&json!({ "alg": "RS256", "kid": kid, "typ": "JWT" }), claims)
  }

  pub fn sign_raw(&self, header: &Value, claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(header.to_string());
    let claims = URL_SAFE_NO_PAD.encode(claims.to_string());
    let input = format!("{header}.{claims}");
    let signature = self.key.sign(input.as_bytes()).to_bytes();
    format!("{input}.{}", URL_SAFE_NO_PAD.encode(signature))
  }
}

/// Claims for `subject` issued at `issued_at`, valid for one hour.
pub fn claims_for(subject: &str, issued_at: DateTime<Utc>) -> Value {
  json!({
    "iss":   format!("https://securetoken.google.com/{PROJECT_ID}"),
    "aud":   PROJECT_ID,
    "sub":   subject,
    "iat":   issued_at.timestamp(),
    "exp":   (issued_at + Duration::hours(1)).timestamp(),
    "email": format!("{subject}@example.com"),
    "name":  format!("User {subject}"),
  })
}

/// Serves a fixed key set and counts how often it was asked.
pub struct StaticKeySource {
  keys:        HashMap<String, String>,
  fail:        bool,
  pub fetches: AtomicUsize,
}

impl StaticKeySource {
  pub fn new(keys: HashMap<String, String>) -> Self {
    Self { keys, fail: false, fetches: AtomicUsize::new(0) }
  }

  /// Publishes the test certificate under [`TEST_KID`].
  pub fn with_test_key() -> Self {
    Self::new(HashMap::from([(TEST_KID.to_owned(), TEST_CERT_PEM.to_owned())]))
  }

  /// Every fetch fails as if the provider were unreachable.
  pub fn failing() -> Self { Self { fail: true, ..Self::new(HashMap::new()) } }
}

#[async_trait]
impl KeySource for StaticKeySource {
  async fn fetch(&self) -> Result<HashMap<String, String>> {
    self.fetches.fetch_add(1, Ordering::SeqCst);
    if self.fail {
      return Err(Error::KeyFetch("key source unavailable".into()));
    }
    Ok(self.keys.clone())
  }
}
