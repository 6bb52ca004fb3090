//! Session resolution middleware and the extractors handlers use to learn who
//! is calling.

use axum::{
  extract::{FromRequestParts, Request, State},
  http::{HeaderMap, header, request::Parts},
  middleware::Next,
  response::{IntoResponse, Response},
};
use polymyr_core::{
  account::{Account, AccountKind},
  session::{Principal, Session},
  store::MarketStore,
};

use crate::{
  AppState,
  auth::{cookies, sessions::SessionIssuer},
  error::{ApiError, AuthError},
};

/// What the middleware learned about the caller. Always present on requests
/// that went through [`resolve_session`].
#[derive(Debug, Clone, Default)]
pub struct RequestAuth {
  pub account:     Option<Account>,
  pub session:     Option<Session>,
  /// The presented token, whether or not it resolved.
  pub token:       Option<String>,
  pub from_cookie: bool,
}

impl RequestAuth {
  pub fn principal(&self) -> Principal {
    self.account.as_ref().map(Principal::for_account).unwrap_or_default()
  }

  fn require_account(self) -> Result<Account, ApiError> {
    match (self.account, self.token) {
      (Some(account), _) => Ok(account),
      (None, Some(_)) => Err(AuthError::InvalidCredentials.into()),
      (None, None) => Err(AuthError::NotAuthenticated.into()),
    }
  }
}

/// `Bearer` token from the `Authorization` header, else the session cookie.
fn presented_token(headers: &HeaderMap) -> Option<(String, bool)> {
  let bearer = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.split_once(' '))
    .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
    .map(|(_, token)| token.trim().to_owned())
    .filter(|token| !token.is_empty());

  match bearer {
    Some(token) => Some((token, false)),
    None => cookies::read_cookie(headers, cookies::SESSION_COOKIE)
      .filter(|t| !t.is_empty())
      .map(|t| (t, true)),
  }
}

/// Resolve the caller's session before routing and attach a [`RequestAuth`].
///
/// A cookie that no longer resolves is cleared on the way out, unless the
/// handler set a new one.
pub async fn resolve_session<S: MarketStore + 'static>(
  State(state): State<AppState<S>>,
  mut req: Request,
  next: Next,
) -> Response {
  let mut auth = RequestAuth::default();

  if let Some((token, from_cookie)) = presented_token(req.headers()) {
    let issuer = SessionIssuer::new(state.store.as_ref(), state.config.session_ttl());
    match issuer.resolve(&token).await {
      Ok(Some((session, account))) => {
        auth.session = Some(session);
        auth.account = Some(account);
      }
      Ok(None) => tracing::debug!(from_cookie, "presented session token did not resolve"),
      Err(e) => return ApiError::Store(Box::new(e)).into_response(),
    }
    auth.token = Some(token);
    auth.from_cookie = from_cookie;
  }

  let stale_cookie = auth.from_cookie && auth.account.is_none();
  req.extensions_mut().insert(auth);

  let mut res = next.run(req).await;
  if stale_cookie && !cookies::sets_session_cookie(res.headers()) {
    res
      .headers_mut()
      .append(header::SET_COOKIE, cookies::clear_session_cookie(state.config.cookie_secure));
  }
  res
}

impl<St: Send + Sync> FromRequestParts<St> for RequestAuth {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
    Ok(parts.extensions.get::<RequestAuth>().cloned().unwrap_or_default())
  }
}

/// Any signed-in account.
pub struct CurrentAccount(pub Account);

impl<St: Send + Sync> FromRequestParts<St> for CurrentAccount {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &St) -> Result<Self, Self::Rejection> {
    let auth = RequestAuth::from_request_parts(parts, state).await?;
    Ok(CurrentAccount(auth.require_account()?))
  }
}

/// A signed-in customer. Makers are refused with 403.
pub struct CurrentCustomer(pub Account);

impl<St: Send + Sync> FromRequestParts<St> for CurrentCustomer {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &St) -> Result<Self, Self::Rejection> {
    let CurrentAccount(account) = CurrentAccount::from_request_parts(parts, state).await?;
    match account.kind {
      AccountKind::Customer => Ok(CurrentCustomer(account)),
      AccountKind::Maker => Err(ApiError::Forbidden("customers only".into())),
    }
  }
}

/// A signed-in maker. Customers are refused with 403.
pub struct CurrentMaker(pub Account);

impl<St: Send + Sync> FromRequestParts<St> for CurrentMaker {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &St) -> Result<Self, Self::Rejection> {
    let CurrentAccount(account) = CurrentAccount::from_request_parts(parts, state).await?;
    match account.kind {
      AccountKind::Maker => Ok(CurrentMaker(account)),
      AccountKind::Customer => Err(ApiError::Forbidden("makers only".into())),
    }
  }
}
