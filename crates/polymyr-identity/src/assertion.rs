//! Parsing of compact JWS identity assertions.
//!
//! Parsing never checks the signature or the claims; it only splits the token
//! and decodes its parts. See [`FederationBridge`](crate::FederationBridge)
//! for verification.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Deserialize;

use crate::{Error, Result};

/// The only signature algorithm accepted.
pub const ALGORITHM: &str = "RS256";

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
  pub alg: String,
  pub kid: Option<String>,
}

/// `aud` may be a single string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Audience {
  One(String),
  Many(Vec<String>),
}

impl Audience {
  pub fn contains(&self, audience: &str) -> bool {
    match self {
      Audience::One(a) => a == audience,
      Audience::Many(all) => all.iter().any(|a| a == audience),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
  #[serde(default)]
  pub sub:   String,
  pub iss:   String,
  pub aud:   Audience,
  /// Seconds since the Unix epoch.
  pub exp:   i64,
  pub iat:   i64,
  pub name:  Option<String>,
  pub email: Option<String>,
}

/// A token split into its decoded parts.
#[derive(Debug, Clone)]
pub struct ParsedAssertion {
  pub header:        Header,
  pub claims:        Claims,
  /// `base64url(header) "." base64url(claims)`, the bytes that were signed.
  pub signing_input: String,
  pub signature:     Vec<u8>,
}

impl ParsedAssertion {
  pub fn parse(token: &str) -> Result<Self> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(claims_b64), Some(sig_b64), None) =
      (parts.next(), parts.next(), parts.next(), parts.next())
    else {
      return Err(Error::MalformedToken("expected three dot-separated segments".into()));
    };

    let header: Header = serde_json::from_slice(&decode_segment(header_b64, "header")?)
      .map_err(|e| Error::MalformedToken(format!("header: {e}")))?;
    if header.alg != ALGORITHM {
      return Err(Error::MalformedToken(format!("unsupported algorithm {:?}", header.alg)));
    }

    let claims: Claims = serde_json::from_slice(&decode_segment(claims_b64, "claims")?)
      .map_err(|e| Error::MalformedToken(format!("claims: {e}")))?;
    let signature = decode_segment(sig_b64, "signature")?;

    Ok(Self {
      header,
      claims,
      signing_input: format!("{header_b64}.{claims_b64}"),
      signature,
    })
  }
}

fn decode_segment(segment: &str, what: &str) -> Result<Vec<u8>> {
  URL_SAFE_NO_PAD
    .decode(segment)
    .map_err(|e| Error::MalformedToken(format!("{what}: {e}")))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn encode(value: serde_json::Value) -> String {
    URL_SAFE_NO_PAD.encode(serde_json::to_vec(&value).unwrap())
  }

  fn claims() -> serde_json::Value {
    serde_json::json!({
      "sub": "uid-1",
      "iss": "https://securetoken.google.com/polymyr",
      "aud": "polymyr",
      "exp": 2_000_000_000,
      "iat": 1_000_000_000,
    })
  }

  #[test]
  fn parses_well_formed_token() {
    let header = encode(serde_json::json!({ "alg": "RS256", "kid": "k1" }));
    let token = format!("{header}.{}.{}", encode(claims()), URL_SAFE_NO_PAD.encode(b"sig"));

    let parsed = ParsedAssertion::parse(&token).unwrap();
    assert_eq!(parsed.header.kid.as_deref(), Some("k1"));
    assert_eq!(parsed.claims.sub, "uid-1");
    assert!(parsed.claims.aud.contains("polymyr"));
    assert_eq!(parsed.signature, b"sig");
    assert!(parsed.signing_input.starts_with(&header));
  }

  #[test]
  fn rejects_other_algorithms() {
    let header = encode(serde_json::json!({ "alg": "none" }));
    let token = format!("{header}.{}.", encode(claims()));
    assert!(matches!(ParsedAssertion::parse(&token), Err(Error::MalformedToken(_))));
  }

  #[test]
  fn rejects_wrong_segment_count() {
    assert!(matches!(ParsedAssertion::parse("a.b"), Err(Error::MalformedToken(_))));
    assert!(matches!(ParsedAssertion::parse("a.b.c.d"), Err(Error::MalformedToken(_))));
    assert!(matches!(ParsedAssertion::parse("!!.??.**"), Err(Error::MalformedToken(_))));
  }

  #[test]
  fn audience_accepts_string_or_array() {
    let one: Audience = serde_json::from_str(r#""p""#).unwrap();
    let many: Audience = serde_json::from_str(r#"["x", "p"]"#).unwrap();
    assert!(one.contains("p"));
    assert!(many.contains("p"));
    assert!(!many.contains("q"));
  }
}
