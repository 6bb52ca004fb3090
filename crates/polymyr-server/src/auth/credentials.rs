//! Credential verification.
//!
//! Every way of proving identity is a [`Credential`] variant, and [`verify`]
//! turns any of them into the [`Account`] it proves.

use std::sync::OnceLock;

use argon2::{
  Argon2, PasswordHash, PasswordHasher as _, PasswordVerifier as _, password_hash::SaltString,
};
use axum::http::{HeaderMap, header};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use polymyr_core::{
  account::{Account, AccountKind, NewAccount},
  store::MarketStore,
};
use rand_core::OsRng;

use crate::{AppState, auth::sessions::SessionIssuer, error::AuthError};

/// What to do when a verified federated subject has no local account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
  LoginOnly,
  CreateIfAbsent,
}

#[derive(Debug, Clone)]
pub enum Credential {
  /// Login (email) and password against the stored argon2 hash.
  Password {
    kind:     AccountKind,
    login:    String,
    password: String,
  },
  /// A session token issued earlier. `kind` restricts which accounts match.
  Token {
    kind:  Option<AccountKind>,
    token: String,
  },
  /// An identity provider's signed assertion about `subject`.
  Federated {
    kind:      AccountKind,
    assertion: String,
    subject:   String,
    flow:      Flow,
  },
}

impl Credential {
  /// Read a `Basic` or `Bearer` credential from the `Authorization` header.
  pub fn from_authorization(headers: &HeaderMap, kind: AccountKind) -> Result<Self, AuthError> {
    let value = headers
      .get(header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .ok_or(AuthError::NotAuthenticated)?;

    let (scheme, rest) = value.split_once(' ').unwrap_or((value, ""));
    let rest = rest.trim();

    if scheme.eq_ignore_ascii_case("basic") {
      let decoded = B64
        .decode(rest)
        .map_err(|_| AuthError::UnsupportedCredentialType("malformed Basic payload".into()))?;
      let creds = String::from_utf8(decoded)
        .map_err(|_| AuthError::UnsupportedCredentialType("malformed Basic payload".into()))?;
      let (login, password) = creds
        .split_once(':')
        .ok_or_else(|| AuthError::UnsupportedCredentialType("expected login:password".into()))?;
      return Ok(Credential::Password {
        kind,
        login: login.trim().to_owned(),
        password: password.to_owned(),
      });
    }

    if scheme.eq_ignore_ascii_case("bearer") && !rest.is_empty() {
      return Ok(Credential::Token { kind: Some(kind), token: rest.to_owned() });
    }

    Err(AuthError::UnsupportedCredentialType(scheme.to_owned()))
  }
}

/// Check `credential` and return the account it proves.
///
/// Has no side effects on failure. A federated credential with
/// [`Flow::CreateIfAbsent`] may create the account on success.
pub async fn verify<S: MarketStore>(
  state: &AppState<S>,
  credential: Credential,
) -> Result<Account, AuthError> {
  match credential {
    Credential::Password { kind, login, password } => {
      verify_password(state.store.as_ref(), kind, login, &password).await
    }
    Credential::Token { kind, token } => {
      let issuer = SessionIssuer::new(state.store.as_ref(), state.config.session_ttl());
      let resolved = issuer
        .resolve(&token)
        .await
        .map_err(|e| AuthError::Store(Box::new(e)))?;
      match resolved {
        Some((_, account)) if kind.is_none_or(|k| k == account.kind) => Ok(account),
        _ => Err(AuthError::InvalidCredentials),
      }
    }
    Credential::Federated { kind, assertion, subject, flow } => {
      let identity = state.identity.verify(&assertion, &subject).await?;
      resolve_federated(state.store.as_ref(), kind, identity, flow).await
    }
  }
}

async fn verify_password<S: MarketStore>(
  store: &S,
  kind: AccountKind,
  login: String,
  password: &str,
) -> Result<Account, AuthError> {
  let account = store
    .find_account_by_email(kind, login)
    .await
    .map_err(|e| AuthError::Store(Box::new(e)))?;

  // Unknown logins and password-less accounts still pay for one argon2
  // verification, so timing does not reveal which accounts exist.
  let stored = account.as_ref().and_then(|a| a.password_hash.as_deref());
  let has_hash = stored.is_some();
  let verified = stored
    .or_else(|| dummy_hash())
    .and_then(|hash| PasswordHash::new(hash).ok())
    .is_some_and(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok());

  let account = match account {
    Some(account) if verified && has_hash => account,
    Some(account) => {
      tracing::warn!(%kind, account_id = %account.account_id, "login failed");
      return Err(AuthError::InvalidCredentials);
    }
    None => {
      tracing::warn!(%kind, "login failed for unknown account");
      return Err(AuthError::InvalidCredentials);
    }
  };

  tracing::info!(%kind, account_id = %account.account_id, "login succeeded");
  Ok(account)
}

fn dummy_hash() -> Option<&'static str> {
  static DUMMY: OnceLock<Option<String>> = OnceLock::new();
  DUMMY
    .get_or_init(|| {
      let salt = SaltString::generate(&mut OsRng);
      Argon2::default()
        .hash_password(b"polymyr-timing-equaliser", &salt)
        .ok()
        .map(|h| h.to_string())
    })
    .as_deref()
}

async fn resolve_federated<S: MarketStore>(
  store: &S,
  kind: AccountKind,
  identity: polymyr_identity::VerifiedIdentity,
  flow: Flow,
) -> Result<Account, AuthError> {
  let existing = store
    .find_account_by_subject(kind, identity.subject.clone())
    .await
    .map_err(|e| AuthError::Store(Box::new(e)))?;

  if let Some(account) = existing {
    tracing::info!(%kind, account_id = %account.account_id, "federated login succeeded");
    return Ok(account);
  }
  if flow == Flow::LoginOnly {
    return Err(AuthError::NotAuthenticated);
  }

  let email = identity.email.filter(|e| !e.is_empty()).ok_or_else(|| {
    polymyr_identity::Error::ClaimsVerificationFailed("assertion carries no email".into())
  })?;
  let taken = store
    .find_account_by_email(kind, email.clone())
    .await
    .map_err(|e| AuthError::Store(Box::new(e)))?;
  if taken.is_some() {
    return Err(AuthError::AccountExists);
  }

  let name = identity.name.filter(|n| !n.is_empty()).unwrap_or_else(|| email.clone());
  create_federated(store, kind, email, name, identity.subject).await
}

/// Create the account for a first federated login. A concurrent first login
/// for the same subject may win the insert; its account is returned instead.
async fn create_federated<S: MarketStore>(
  store: &S,
  kind: AccountKind,
  email: String,
  name: String,
  subject: String,
) -> Result<Account, AuthError> {
  let created = store
    .create_account(NewAccount::federated(kind, email.clone(), name, subject.clone()))
    .await;
  let err = match created {
    Ok(account) => {
      tracing::info!(
        %kind,
        account_id = %account.account_id,
        "account created from federated identity"
      );
      return Ok(account);
    }
    Err(e) => e,
  };

  let winner = store
    .find_account_by_subject(kind, subject)
    .await
    .map_err(|e| AuthError::Store(Box::new(e)))?;
  if let Some(account) = winner {
    tracing::info!(
      %kind,
      account_id = %account.account_id,
      "federated sign-up lost a race; using the existing account"
    );
    return Ok(account);
  }
  let taken = store
    .find_account_by_email(kind, email)
    .await
    .map_err(|e| AuthError::Store(Box::new(e)))?;
  if taken.is_some() {
    return Err(AuthError::AccountExists);
  }
  Err(AuthError::Store(Box::new(err)))
}
