//! Opaque bearer tokens backed by stored sessions.
//!
//! A token is 32 random bytes, base64url-encoded. Only its SHA-256 digest is
//! persisted, so a leaked session table cannot be replayed.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use polymyr_core::{account::Account, session::Session, store::MarketStore};
use rand_core::{OsRng, RngCore as _};
use sha2::{Digest as _, Sha256};

/// A freshly minted session and the only copy of its token.
#[derive(Debug, Clone)]
pub struct IssuedSession {
  pub token:   String,
  pub session: Session,
}

pub fn generate_token() -> String {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  URL_SAFE_NO_PAD.encode(bytes)
}

pub fn token_digest(token: &str) -> String { hex::encode(Sha256::digest(token.as_bytes())) }

/// Issues, resolves and revokes sessions in a [`MarketStore`].
pub struct SessionIssuer<'a, S> {
  store: &'a S,
  ttl:   Duration,
}

impl<'a, S: MarketStore> SessionIssuer<'a, S> {
  pub fn new(store: &'a S, ttl: Duration) -> Self { Self { store, ttl } }

  pub async fn issue(&self, account: &Account) -> Result<IssuedSession, S::Error> {
    self.issue_at(account, Utc::now()).await
  }

  pub async fn issue_at(
    &self,
    account: &Account,
    now: DateTime<Utc>,
  ) -> Result<IssuedSession, S::Error> {
    let token = generate_token();
    let session = Session {
      token_digest: token_digest(&token),
      account_kind: account.kind,
      account_id:   account.account_id,
      created_at:   now,
      expires_at:   Some(now + self.ttl),
    };
    self.store.insert_session(session.clone()).await?;
    tracing::debug!(account_id = %account.account_id, kind = %account.kind, "session issued");
    Ok(IssuedSession { token, session })
  }

  /// The live session for `token` and its account. Expired sessions are
  /// deleted on sight.
  pub async fn resolve(&self, token: &str) -> Result<Option<(Session, Account)>, S::Error> {
    self.resolve_at(token, Utc::now()).await
  }

  pub async fn resolve_at(
    &self,
    token: &str,
    now: DateTime<Utc>,
  ) -> Result<Option<(Session, Account)>, S::Error> {
    let digest = token_digest(token);
    let Some(session) = self.store.find_session(digest.clone()).await? else {
      return Ok(None);
    };
    if session.is_expired(now) {
      self.store.delete_session(digest).await?;
      return Ok(None);
    }
    let account = self.store.get_account(session.account_kind, session.account_id).await?;
    Ok(account.map(|a| (session, a)))
  }

  /// Delete the session for `token`. Revoking twice is not an error.
  pub async fn revoke(&self, token: &str) -> Result<(), S::Error> {
    self.store.delete_session(token_digest(token)).await?;
    Ok(())
  }
}
