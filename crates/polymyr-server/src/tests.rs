//! Router-level tests driven through `tower::ServiceExt::oneshot`.

use axum::{
  body::Body,
  http::{HeaderMap, Request, StatusCode, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use chrono::{Duration, Utc};
use polymyr_core::{account::AccountKind, store::MarketStore as _};
use polymyr_identity::testing::{claims_for, signer};
use polymyr_payments::testing::Operation;
use polymyr_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{
  AppState, router,
  test_support::{PLATFORM_KEY, customer, make_state, maker, paying_customer},
};

struct Reply {
  status:  StatusCode,
  headers: HeaderMap,
  body:    Value,
}

async fn send(
  state: &AppState<SqliteStore>,
  method: &str,
  uri: &str,
  headers: Vec<(header::HeaderName, String)>,
  body: Option<Value>,
) -> Reply {
  let mut builder = Request::builder().method(method).uri(uri);
  for (k, v) in headers {
    builder = builder.header(k, v);
  }
  let req = match body {
    Some(json) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(json.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };

  dispatch(state, req).await
}

/// Send `body` verbatim as `application/json`, well-formed or not.
async fn send_raw(state: &AppState<SqliteStore>, method: &str, uri: &str, body: &str) -> Reply {
  let req = Request::builder()
    .method(method)
    .uri(uri)
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from(body.to_owned()))
    .unwrap();
  dispatch(state, req).await
}

async fn dispatch(state: &AppState<SqliteStore>, req: Request<Body>) -> Reply {
  let resp = router(state.clone()).oneshot(req).await.unwrap();
  let status = resp.status();
  let headers = resp.headers().clone();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let body = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap_or(Value::String(String::from_utf8_lossy(&bytes).into()))
  };
  Reply { status, headers, body }
}

fn basic(login: &str, password: &str) -> (header::HeaderName, String) {
  (header::AUTHORIZATION, format!("Basic {}", B64.encode(format!("{login}:{password}"))))
}

fn bearer(token: &str) -> (header::HeaderName, String) {
  (header::AUTHORIZATION, format!("Bearer {token}"))
}

fn cookie(token: &str) -> (header::HeaderName, String) {
  (header::COOKIE, format!("polymyr-session={token}"))
}

fn set_cookie(headers: &HeaderMap) -> Option<String> {
  headers
    .get(header::SET_COOKIE)
    .and_then(|v| v.to_str().ok())
    .map(str::to_owned)
}

async fn login(state: &AppState<SqliteStore>, kind: &str, email: &str, password: &str) -> String {
  let reply = send(
    state,
    "POST",
    &format!("/authentication?type={kind}"),
    vec![basic(email, password)],
    None,
  )
  .await;
  assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
  reply.body["token"].as_str().unwrap().to_owned()
}

// ── Accounts & sessions ─────────────────────────────────────────────────────

#[tokio::test]
async fn register_then_duplicate_email_conflicts() {
  let (state, _) = make_state().await;
  let body = json!({ "email": "ada@example.com", "name": "Ada", "password": "pw" });

  let first = send(&state, "POST", "/customers", vec![], Some(body)).await;
  assert_eq!(first.status, StatusCode::CREATED);
  assert_eq!(first.body["email"], "ada@example.com");
  assert!(first.body.get("password_hash").is_none());

  let again = json!({ "email": "ADA@example.com", "name": "Ada", "password": "pw" });
  let second = send(&state, "POST", "/customers", vec![], Some(again.clone())).await;
  assert_eq!(second.status, StatusCode::CONFLICT);

  // Emails are only unique per kind.
  let maker = send(&state, "POST", "/makers", vec![], Some(again)).await;
  assert_eq!(maker.status, StatusCode::CREATED);
}

#[tokio::test]
async fn login_sets_cookie_and_token_resolves() {
  let (state, _) = make_state().await;
  let account = customer(&state, "ada@example.com", "hunter22").await;

  let reply = send(
    &state,
    "POST",
    "/authentication?type=customer",
    vec![basic("ada@example.com", "hunter22")],
    None,
  )
  .await;
  assert_eq!(reply.status, StatusCode::OK);
  let token = reply.body["token"].as_str().unwrap().to_owned();
  let cookie_header = set_cookie(&reply.headers).unwrap();
  assert!(cookie_header.starts_with(&format!("polymyr-session={token};")));
  assert!(cookie_header.contains("HttpOnly"));

  let me = send(&state, "GET", "/me", vec![bearer(&token)], None).await;
  assert_eq!(me.status, StatusCode::OK);
  assert_eq!(me.body["account_id"], account.account_id.to_string());

  let via_cookie = send(&state, "GET", "/me", vec![cookie(&token)], None).await;
  assert_eq!(via_cookie.status, StatusCode::OK);
}

#[tokio::test]
async fn login_with_live_cookie_reuses_session() {
  let (state, _) = make_state().await;
  customer(&state, "ada@example.com", "hunter22").await;
  let token = login(&state, "customer", "ada@example.com", "hunter22").await;

  let reply = send(
    &state,
    "POST",
    "/authentication?type=customer",
    vec![basic("ada@example.com", "hunter22"), cookie(&token)],
    None,
  )
  .await;
  assert_eq!(reply.status, StatusCode::OK);
  assert_eq!(reply.body["token"], token.as_str());
}

#[tokio::test]
async fn bad_password_is_401_with_challenge() {
  let (state, _) = make_state().await;
  customer(&state, "ada@example.com", "hunter22").await;

  let reply = send(
    &state,
    "POST",
    "/authentication?type=customer",
    vec![basic("ada@example.com", "wrong")],
    None,
  )
  .await;
  assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
  assert_eq!(reply.body, json!({ "error": "invalid credentials" }));
  assert!(reply.headers.contains_key(header::WWW_AUTHENTICATE));

  let unsupported = send(
    &state,
    "POST",
    "/authentication?type=customer",
    vec![(header::AUTHORIZATION, "Digest x".to_owned())],
    None,
  )
  .await;
  assert_eq!(unsupported.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn logout_revokes_and_clears_cookie() {
  let (state, _) = make_state().await;
  customer(&state, "ada@example.com", "hunter22").await;
  let token = login(&state, "customer", "ada@example.com", "hunter22").await;

  let out = send(&state, "DELETE", "/authentication", vec![cookie(&token)], None).await;
  assert_eq!(out.status, StatusCode::NO_CONTENT);
  assert!(set_cookie(&out.headers).unwrap().contains("Max-Age=0"));

  let me = send(&state, "GET", "/me", vec![bearer(&token)], None).await;
  assert_eq!(me.status, StatusCode::UNAUTHORIZED);

  let anonymous = send(&state, "DELETE", "/authentication", vec![], None).await;
  assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn stale_cookie_is_cleared() {
  let (state, _) = make_state().await;

  let reply = send(&state, "GET", "/products", vec![cookie("long-gone")], None).await;
  assert_eq!(reply.status, StatusCode::OK);
  assert!(set_cookie(&reply.headers).unwrap().contains("Max-Age=0"));

  let me = send(&state, "GET", "/me", vec![cookie("long-gone")], None).await;
  assert_eq!(me.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn federated_sign_up_then_login() {
  let (state, _) = make_state().await;
  let assertion = signer().sign_claims(&claims_for("uid-7", Utc::now()));

  let unknown = send(
    &state,
    "POST",
    "/authentication/federated",
    vec![],
    Some(json!({ "type": "customer", "assertion": assertion, "subject": "uid-7" })),
  )
  .await;
  assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);

  let created = send(
    &state,
    "POST",
    "/authentication/federated",
    vec![],
    Some(json!({ "type": "customer", "assertion": assertion, "subject": "uid-7", "create": true })),
  )
  .await;
  assert_eq!(created.status, StatusCode::OK);
  assert_eq!(created.body["account"]["email"], "uid-7@example.com");
  assert!(set_cookie(&created.headers).is_some());

  let again = send(
    &state,
    "POST",
    "/authentication/federated",
    vec![],
    Some(json!({ "type": "customer", "assertion": assertion, "subject": "uid-7" })),
  )
  .await;
  assert_eq!(again.status, StatusCode::OK);
  assert_eq!(again.body["account"]["account_id"], created.body["account"]["account_id"]);
}

#[tokio::test]
async fn federated_wrong_subject_is_401() {
  let (state, _) = make_state().await;
  let assertion = signer().sign_claims(&claims_for("uid-7", Utc::now()));

  let reply = send(
    &state,
    "POST",
    "/authentication/federated",
    vec![],
    Some(json!({ "type": "maker", "assertion": assertion, "subject": "uid-8", "create": true })),
  )
  .await;
  assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

// ── Ownership ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn only_the_owner_may_change_things() {
  let (state, _) = make_state().await;
  let alice = maker(&state, "alice@example.com").await;
  maker(&state, "bob@example.com").await;
  customer(&state, "cus@example.com", "password").await;
  let alice_token = login(&state, "maker", "alice@example.com", "password").await;
  let bob_token = login(&state, "maker", "bob@example.com", "password").await;
  let cus_token = login(&state, "customer", "cus@example.com", "password").await;

  let created = send(
    &state,
    "POST",
    "/products",
    vec![bearer(&alice_token)],
    Some(json!({ "name": "Lamp", "price_cents": 5000 })),
  )
  .await;
  assert_eq!(created.status, StatusCode::CREATED);
  let product_id = created.body["product"]["product_id"].as_str().unwrap().to_owned();

  let as_customer = send(
    &state,
    "POST",
    "/products",
    vec![bearer(&cus_token)],
    Some(json!({ "name": "Lamp", "price_cents": 5000 })),
  )
  .await;
  assert_eq!(as_customer.status, StatusCode::FORBIDDEN);

  let path = format!("/products/{product_id}");
  let anonymous = send(&state, "DELETE", &path, vec![], None).await;
  assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
  let by_bob = send(&state, "DELETE", &path, vec![bearer(&bob_token)], None).await;
  assert_eq!(by_bob.status, StatusCode::FORBIDDEN);

  let rename = send(
    &state,
    "PATCH",
    &format!("/makers/{}", alice.account_id),
    vec![bearer(&bob_token)],
    Some(json!({ "name": "Mallory" })),
  )
  .await;
  assert_eq!(rename.status, StatusCode::FORBIDDEN);

  let by_alice = send(&state, "DELETE", &path, vec![bearer(&alice_token)], None).await;
  assert_eq!(by_alice.status, StatusCode::NO_CONTENT);
  let gone = send(&state, "GET", &path, vec![], None).await;
  assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn maker_updates_own_profile_and_keys_stay_private() {
  let (state, _) = make_state().await;
  let alice = maker(&state, "alice@example.com").await;
  let token = login(&state, "maker", "alice@example.com", "password").await;

  let reply = send(
    &state,
    "PATCH",
    &format!("/makers/{}", alice.account_id),
    vec![bearer(&token)],
    Some(json!({ "name": "Alice's Workshop", "secret_key": "sk_new" })),
  )
  .await;
  assert_eq!(reply.status, StatusCode::OK);
  assert_eq!(reply.body["name"], "Alice's Workshop");
  assert!(!reply.body.to_string().contains("sk_new"));
}

// ── Checkout ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_checkout_flow() {
  let (state, processor) = make_state().await;
  maker(&state, "alice@example.com").await;
  let maker_token = login(&state, "maker", "alice@example.com", "password").await;

  let created = send(
    &state,
    "POST",
    "/products",
    vec![bearer(&maker_token)],
    Some(json!({
      "name": "Lamp",
      "price_cents": 100,
      "campaign": {
        "units": 2,
        "end_date": (Utc::now() + Duration::days(10)).to_rfc3339(),
        "amount_off_cents": 20
      }
    })),
  )
  .await;
  assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
  let product_id = created.body["product"]["product_id"].as_str().unwrap().to_owned();

  let reg = json!({ "email": "cus@example.com", "name": "Cus", "password": "pw" });
  assert_eq!(send(&state, "POST", "/customers", vec![], Some(reg)).await.status, StatusCode::CREATED);
  let cus_token = login(&state, "customer", "cus@example.com", "pw").await;

  let wallet = send(
    &state,
    "POST",
    "/payment/sources",
    vec![bearer(&cus_token)],
    Some(json!({ "source": "tok_visa" })),
  )
  .await;
  assert_eq!(wallet.status, StatusCode::CREATED);
  let card = wallet.body[0]["id"].as_str().unwrap().to_owned();

  let address = send(
    &state,
    "POST",
    "/customer-addresses",
    vec![bearer(&cus_token)],
    Some(json!({
      "first_name": "Cus", "last_name": "Tomer", "address": "1 Main St",
      "city": "Springfield", "state": "IL", "zip": "62701"
    })),
  )
  .await;
  assert_eq!(address.status, StatusCode::CREATED);
  let address_id = address.body["address_id"].as_str().unwrap().to_owned();

  let order = send(
    &state,
    "POST",
    "/orders",
    vec![bearer(&cus_token)],
    Some(json!({ "product_id": product_id, "card": card, "address_id": address_id })),
  )
  .await;
  assert_eq!(order.status, StatusCode::CREATED, "{}", order.body);
  let order_id = order.body["order_id"].as_str().unwrap().to_owned();

  let charges = processor.charges().await;
  assert_eq!(charges.len(), 1);
  assert_eq!((charges[0].amount_cents, charges[0].application_fee_cents), (100, 28));

  let listing = send(&state, "GET", "/products?campaign=true", vec![], None).await;
  assert_eq!(listing.body[0]["campaign"]["purchased_units"], 1);

  let unfulfilled =
    send(&state, "GET", "/orders?fulfilled=false", vec![bearer(&maker_token)], None).await;
  assert_eq!(unfulfilled.body.as_array().unwrap().len(), 1);

  let path = format!("/orders/{order_id}/fulfilled");
  let by_customer =
    send(&state, "PATCH", &path, vec![bearer(&cus_token)], Some(json!({ "fulfilled": true }))).await;
  assert_eq!(by_customer.status, StatusCode::FORBIDDEN);
  let by_maker =
    send(&state, "PATCH", &path, vec![bearer(&maker_token)], Some(json!({ "fulfilled": true }))).await;
  assert_eq!(by_maker.status, StatusCode::OK);
  assert_eq!(by_maker.body["fulfilled"], true);

  let mine = send(&state, "GET", "/orders", vec![bearer(&cus_token)], None).await;
  assert_eq!(mine.body[0]["fulfilled"], true);
}

#[tokio::test]
async fn declined_charge_is_502_and_records_nothing() {
  let (state, processor) = make_state().await;
  maker(&state, "alice@example.com").await;
  let maker_token = login(&state, "maker", "alice@example.com", "password").await;
  let created = send(
    &state,
    "POST",
    "/products",
    vec![bearer(&maker_token)],
    Some(json!({
      "name": "Lamp",
      "price_cents": 100,
      "campaign": { "units": 1, "end_date": (Utc::now() + Duration::days(1)).to_rfc3339() }
    })),
  )
  .await;
  let product_id = created.body["product"]["product_id"].as_str().unwrap().to_owned();

  customer(&state, "cus@example.com", "pw").await;
  let cus_token = login(&state, "customer", "cus@example.com", "pw").await;
  send(&state, "POST", "/payment/sources", vec![bearer(&cus_token)], Some(json!({ "source": "tok" })))
    .await;
  let address = send(
    &state,
    "POST",
    "/customer-addresses",
    vec![bearer(&cus_token)],
    Some(json!({
      "first_name": "C", "last_name": "T", "address": "1 Main St",
      "city": "X", "state": "Y", "zip": "1"
    })),
  )
  .await;

  processor.set_failing(Operation::CreateCharge, true).await;
  let order = send(
    &state,
    "POST",
    "/orders",
    vec![bearer(&cus_token)],
    Some(json!({
      "product_id": product_id,
      "card": "card_1",
      "address_id": address.body["address_id"]
    })),
  )
  .await;
  assert_eq!(order.status, StatusCode::BAD_GATEWAY);
  assert_eq!(order.body, json!({ "error": "payment processor error" }));

  let mine = send(&state, "GET", "/orders", vec![bearer(&cus_token)], None).await;
  assert_eq!(mine.body, json!([]));
  let listing = send(&state, "GET", "/products?campaign=true", vec![], None).await;
  assert_eq!(listing.body[0]["campaign"]["purchased_units"], 0);
}

#[tokio::test]
async fn campaign_on_foreign_product_is_forbidden() {
  let (state, _) = make_state().await;
  maker(&state, "alice@example.com").await;
  maker(&state, "bob@example.com").await;
  let alice = login(&state, "maker", "alice@example.com", "password").await;
  let bob = login(&state, "maker", "bob@example.com", "password").await;

  let created = send(
    &state,
    "POST",
    "/products",
    vec![bearer(&alice)],
    Some(json!({ "name": "Lamp", "price_cents": 100 })),
  )
  .await;
  let product_id = created.body["product"]["product_id"].as_str().unwrap().to_owned();
  let terms = json!({
    "product_id": product_id,
    "units": 3,
    "end_date": (Utc::now() + Duration::days(1)).to_rfc3339(),
    "amount_off_cents": 10
  });

  let by_bob = send(&state, "POST", "/campaigns", vec![bearer(&bob)], Some(terms.clone())).await;
  assert_eq!(by_bob.status, StatusCode::FORBIDDEN);

  let by_alice = send(&state, "POST", "/campaigns", vec![bearer(&alice)], Some(terms.clone())).await;
  assert_eq!(by_alice.status, StatusCode::CREATED);
  let twice = send(&state, "POST", "/campaigns", vec![bearer(&alice)], Some(terms)).await;
  assert_eq!(twice.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn invalid_campaign_terms_create_nothing() {
  let (state, _) = make_state().await;
  maker(&state, "alice@example.com").await;
  let alice = login(&state, "maker", "alice@example.com", "password").await;

  let reply = send(
    &state,
    "POST",
    "/products",
    vec![bearer(&alice)],
    Some(json!({
      "name": "Lamp",
      "price_cents": 100,
      "campaign": { "units": 3, "end_date": (Utc::now() + Duration::days(1)).to_rfc3339(), "amount_off_cents": 150 }
    })),
  )
  .await;
  assert_eq!(reply.status, StatusCode::BAD_REQUEST);
  let listing = send(&state, "GET", "/products", vec![], None).await;
  assert_eq!(listing.body, json!([]));
}

#[tokio::test]
async fn wallet_listing_without_processor_account_is_empty() {
  let (state, processor) = make_state().await;
  customer(&state, "cus@example.com", "pw").await;
  let token = login(&state, "customer", "cus@example.com", "pw").await;

  let reply = send(&state, "GET", "/payment/sources", vec![bearer(&token)], None).await;
  assert_eq!(reply.status, StatusCode::OK);
  assert_eq!(reply.body, json!([]));
  assert!(processor.calls().await.is_empty());
}

#[tokio::test]
async fn cards_can_be_removed_and_made_default() {
  let (state, processor) = make_state().await;
  paying_customer(&state, "cus@example.com").await;
  processor.add_card("cus_platform", "card_a").await;
  processor.add_card("cus_platform", "card_b").await;
  let token = login(&state, "customer", "cus@example.com", "password").await;

  let reply =
    send(&state, "POST", "/payment/sources/card_b/default", vec![bearer(&token)], None).await;
  assert_eq!(reply.status, StatusCode::OK);
  assert_eq!(processor.default_source("cus_platform").await.as_deref(), Some("card_b"));

  let reply = send(&state, "DELETE", "/payment/sources/card_a", vec![bearer(&token)], None).await;
  assert_eq!(reply.status, StatusCode::NO_CONTENT);
  let listing = send(&state, "GET", "/payment/sources", vec![bearer(&token)], None).await;
  let ids: Vec<_> = listing.body.as_array().unwrap().iter().map(|c| c["id"].clone()).collect();
  assert_eq!(ids, vec![json!("card_b")]);

  // Cards not in the caller's wallet are not touched.
  let reply = send(&state, "DELETE", "/payment/sources/card_a", vec![bearer(&token)], None).await;
  assert_eq!(reply.status, StatusCode::NOT_FOUND);
  assert!(reply.body["error"].is_string());
  assert_eq!(processor.count(Operation::DeleteSource).await, 1);
  assert!(processor.calls().await.iter().all(|c| c.secret_key == PLATFORM_KEY));
}

#[tokio::test]
async fn card_changes_need_a_wallet_and_a_customer() {
  let (state, processor) = make_state().await;
  customer(&state, "cus@example.com", "pw").await;
  maker(&state, "mak@example.com").await;
  let cus = login(&state, "customer", "cus@example.com", "pw").await;
  let mak = login(&state, "maker", "mak@example.com", "password").await;

  let reply = send(&state, "DELETE", "/payment/sources/card_a", vec![bearer(&cus)], None).await;
  assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);

  let reply =
    send(&state, "POST", "/payment/sources/card_a/default", vec![bearer(&mak)], None).await;
  assert_eq!(reply.status, StatusCode::FORBIDDEN);

  let reply = send(&state, "DELETE", "/payment/sources/card_a", vec![], None).await;
  assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
  assert!(processor.calls().await.is_empty());
}

#[tokio::test]
async fn maker_opens_processor_account_once() {
  let (state, processor) = make_state().await;
  let body = json!({ "email": "new@example.com", "name": "New", "password": "pw" });
  let created = send(&state, "POST", "/makers", vec![], Some(body)).await;
  let maker_id = created.body["account_id"].as_str().unwrap().to_owned();
  let token = login(&state, "maker", "new@example.com", "pw").await;
  let uri = format!("/makers/{maker_id}/processor-account");

  let reply = send(&state, "POST", &uri, vec![bearer(&token)], Some(json!({}))).await;
  assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
  assert_eq!(reply.body["processor_id"], "acct_1");
  assert!(!reply.body.to_string().contains("sk_acct_1"));

  let opened = processor.connected_accounts().await;
  assert_eq!(opened.len(), 1);
  assert_eq!(opened[0].email, "new@example.com");
  assert_eq!(opened[0].country, "US");
  assert_eq!(opened[0].local_id, maker_id);
  assert_eq!(processor.calls().await[0].secret_key, PLATFORM_KEY);

  let stored = state
    .store
    .get_account(AccountKind::Maker, maker_id.parse().unwrap())
    .await
    .unwrap()
    .unwrap();
  let settings = stored.maker.unwrap();
  assert_eq!(settings.secret_key.as_deref(), Some("sk_acct_1"));
  assert_eq!(settings.publishable_key.as_deref(), Some("pk_acct_1"));

  let again = send(&state, "POST", &uri, vec![bearer(&token)], Some(json!({}))).await;
  assert_eq!(again.status, StatusCode::CONFLICT);
  assert_eq!(processor.count(Operation::CreateConnectedAccount).await, 1);
}

#[tokio::test]
async fn processor_account_is_guarded() {
  let (state, processor) = make_state().await;
  let alice = maker(&state, "alice@example.com").await;
  maker(&state, "bob@example.com").await;
  let bob = login(&state, "maker", "bob@example.com", "password").await;

  let reply = send(
    &state,
    "POST",
    &format!("/makers/{}/processor-account", alice.account_id),
    vec![bearer(&bob)],
    Some(json!({ "country": "GB" })),
  )
  .await;
  assert_eq!(reply.status, StatusCode::FORBIDDEN);
  assert!(processor.calls().await.is_empty());
}

// ── Malformed requests ──────────────────────────────────────────────────────

#[tokio::test]
async fn missing_query_is_a_json_400() {
  let (state, _) = make_state().await;
  customer(&state, "ada@example.com", "hunter22").await;

  let reply =
    send(&state, "POST", "/authentication", vec![basic("ada@example.com", "hunter22")], None)
      .await;
  assert_eq!(reply.status, StatusCode::BAD_REQUEST);
  assert!(reply.body["error"].is_string(), "{}", reply.body);
}

#[tokio::test]
async fn malformed_body_is_a_json_400() {
  let (state, _) = make_state().await;

  let reply = send_raw(&state, "POST", "/customers", "{\"email\": ").await;
  assert_eq!(reply.status, StatusCode::BAD_REQUEST);
  assert!(reply.body["error"].is_string(), "{}", reply.body);

  let reply = send_raw(&state, "POST", "/customers", r#"{"email": "a@example.com"}"#).await;
  assert_eq!(reply.status, StatusCode::BAD_REQUEST);
  assert!(reply.body["error"].is_string(), "{}", reply.body);
}

#[tokio::test]
async fn unparsable_path_id_is_a_json_400() {
  let (state, _) = make_state().await;

  let reply = send(&state, "GET", "/products/not-a-uuid", vec![], None).await;
  assert_eq!(reply.status, StatusCode::BAD_REQUEST);
  assert!(reply.body["error"].is_string(), "{}", reply.body);
}
