//! The session cookie.

use axum::http::{HeaderMap, HeaderValue, header};

pub const SESSION_COOKIE: &str = "polymyr-session";

/// Value of cookie `name` in the request's `Cookie` headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
  headers
    .get_all(header::COOKIE)
    .iter()
    .filter_map(|v| v.to_str().ok())
    .flat_map(|v| v.split(';'))
    .filter_map(|pair| pair.trim().split_once('='))
    .find(|(k, _)| *k == name)
    .map(|(_, v)| v.to_owned())
}

/// `Set-Cookie` value carrying a session token.
pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> Option<HeaderValue> {
  let secure = if secure { "; Secure" } else { "" };
  HeaderValue::from_str(&format!(
    "{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age_secs}{secure}"
  ))
  .ok()
}

/// `Set-Cookie` value that makes the client drop the session cookie.
pub fn clear_session_cookie(secure: bool) -> HeaderValue {
  if secure {
    HeaderValue::from_static(
      "polymyr-session=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0; Secure",
    )
  } else {
    HeaderValue::from_static("polymyr-session=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
  }
}

/// Does the response already set the session cookie?
pub fn sets_session_cookie(headers: &HeaderMap) -> bool {
  headers
    .get_all(header::SET_COOKIE)
    .iter()
    .filter_map(|v| v.to_str().ok())
    .any(|v| v.starts_with(&format!("{SESSION_COOKIE}=")))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reads_named_cookie_among_others() {
    let mut headers = HeaderMap::new();
    headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; polymyr-session=abc; x=1"));
    assert_eq!(read_cookie(&headers, SESSION_COOKIE).as_deref(), Some("abc"));
    assert_eq!(read_cookie(&headers, "missing"), None);
  }

  #[test]
  fn session_cookie_attributes() {
    let value = session_cookie("tok", 604_800, true).unwrap();
    let value = value.to_str().unwrap();
    assert!(value.starts_with("polymyr-session=tok;"));
    assert!(value.contains("HttpOnly"));
    assert!(value.contains("SameSite=Lax"));
    assert!(value.contains("Max-Age=604800"));
    assert!(value.ends_with("; Secure"));

    let insecure = session_cookie("tok", 60, false).unwrap();
    assert!(!insecure.to_str().unwrap().contains("Secure"));
  }

  #[test]
  fn clearing_cookie_expires_it() {
    let value = clear_session_cookie(true);
    assert!(value.to_str().unwrap().contains("Max-Age=0"));
  }
}
