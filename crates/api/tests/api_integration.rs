//! Integration tests for the API server.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use api::AppState;
use api::config::Config;
use axum::body::Body;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, Request, StatusCode};
use cart_store::InMemoryCartStore;
use common::{Money, UserId, VariantId};
use domain::SessionIdentity;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const USER_TOKEN: &str = "user-token";
const UNKNOWN_SIGNED: &str = "eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiJ4In0.c2ln";

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    store: InMemoryCartStore,
    user: UserId,
    _state: Arc<AppState<InMemoryCartStore>>,
}

fn setup() -> TestApp {
    let store = InMemoryCartStore::new();
    let user = UserId::new();
    let config = Config {
        auth_tokens: HashMap::from([(USER_TOKEN.to_string(), user)]),
        ..Config::default()
    };
    let state = api::create_state(store.clone(), &config);
    let app = api::create_app(state.clone(), get_metrics_handle());
    TestApp {
        app,
        store,
        user,
        _state: state,
    }
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    json: Value,
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        Reply {
            status,
            headers,
            json,
        }
    }

    async fn cart(&self, auth: &[(&str, &str)], body: Value) -> Reply {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/cart")
            .header("content-type", "application/json");
        for (name, value) in auth {
            builder = builder.header(*name, *value);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn variant(&self, name: &str, cents: i64, stock: u32) -> VariantId {
        self.store
            .add_variant(name, Money::from_cents(cents), stock)
            .await
    }
}

fn guest(token: &str) -> [(&'static str, &str); 1] {
    [("x-guest-token", token)]
}

fn set_cookie(reply: &Reply) -> Option<String> {
    reply
        .headers
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[tokio::test]
async fn test_health_check() {
    let t = setup();
    let reply = t
        .send(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json["status"], "ok");
}

#[tokio::test]
async fn test_no_identity_is_unauthorized() {
    let t = setup();
    let reply = t.cart(&[], json!({ "action": "get" })).await;

    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json["success"], false);
    assert_eq!(reply.json["code"], "AUTH_REQUIRED");
}

#[tokio::test]
async fn test_guest_add_and_get() {
    let t = setup();
    let mug = t.variant("Mug", 500, 10).await;

    let reply = t
        .cart(
            &guest("guest-1"),
            json!({ "action": "add", "variant_id": mug, "quantity": 2 }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json["success"], true);
    assert_eq!(reply.json["cart"]["item_count"], 2);
    assert_eq!(reply.json["cart"]["subtotal_cents"], 1000);
    assert!(set_cookie(&reply).is_some_and(|c| c.starts_with("guest_cart_token=guest-1;")));

    let reply = t
        .cart(
            &[("cookie", "guest_cart_token=guest-1")],
            json!({ "action": "get" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json["cart"]["item_count"], 2);
    assert!(set_cookie(&reply).is_none());
}

#[tokio::test]
async fn test_missing_field_is_bad_request() {
    let t = setup();
    let reply = t
        .cart(&guest("guest-1"), json!({ "action": "add", "quantity": 1 }))
        .await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json["code"], "VALIDATION_FAILED");
    assert!(
        reply.json["message"]
            .as_str()
            .is_some_and(|m| m.contains("variant_id"))
    );
}

#[tokio::test]
async fn test_unknown_action_is_bad_request() {
    let t = setup();
    let reply = t
        .cart(&guest("guest-1"), json!({ "action": "teleport" }))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_insufficient_stock_is_conflict() {
    let t = setup();
    let mug = t.variant("Mug", 500, 1).await;

    let reply = t
        .cart(
            &guest("guest-1"),
            json!({ "action": "add", "variant_id": mug, "quantity": 3 }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.json["code"], "INSUFFICIENT_STOCK");
}

#[tokio::test]
async fn test_combo_in_cart_and_removal_by_row() {
    let t = setup();
    let apron = t.variant("Apron", 500, 10).await;
    let tea = t.variant("Tea", 300, 10).await;
    let pot = t.variant("Pot", 700, 10).await;

    let reply = t
        .send(
            Request::builder()
                .method("POST")
                .uri("/combos")
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {USER_TOKEN}"))
                .body(Body::from(
                    json!({
                        "name": "Tea set",
                        "combo_price_cents": 800,
                        "constituents": [
                            { "variant_id": tea, "product_name": "Tea", "unit_price_cents": 300, "quantity": 1 },
                            { "variant_id": pot, "product_name": "Pot", "unit_price_cents": 700, "quantity": 1 }
                        ]
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.json["savings_cents"], 200);
    let combo_id = reply.json["combo"]["id"].clone();

    t.cart(
        &guest("guest-2"),
        json!({ "action": "add", "variant_id": apron, "quantity": 2 }),
    )
    .await;
    let reply = t
        .cart(
            &guest("guest-2"),
            json!({ "action": "add_combo", "combo_id": combo_id }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json["cart"]["items"].as_array().map(Vec::len), Some(3));
    assert_eq!(reply.json["cart"]["subtotal_cents"], 1800);
    let group = reply.json["combo_group_id"].clone();
    assert!(group.is_string());

    let row = reply.json["cart"]["items"]
        .as_array()
        .and_then(|items| items.iter().find(|i| i["combo_group_id"] == group))
        .map(|i| i["id"].clone())
        .unwrap();
    let reply = t
        .cart(
            &guest("guest-2"),
            json!({ "action": "remove", "item_id": row }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json["cart"]["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(reply.json["cart"]["subtotal_cents"], 1000);
}

#[tokio::test]
async fn test_combo_creation_rules() {
    let t = setup();
    let tea = t.variant("Tea", 300, 10).await;
    let pot = t.variant("Pot", 700, 10).await;
    let draft = json!({
        "name": "No deal",
        "combo_price_cents": 1000,
        "constituents": [
            { "variant_id": tea, "product_name": "Tea", "unit_price_cents": 300, "quantity": 1 },
            { "variant_id": pot, "product_name": "Pot", "unit_price_cents": 700, "quantity": 1 }
        ]
    });

    let request = |auth: Option<&str>| {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/combos")
            .header("content-type", "application/json");
        if let Some(auth) = auth {
            builder = builder.header("authorization", auth);
        }
        builder.body(Body::from(draft.to_string())).unwrap()
    };

    let reply = t.send(request(None)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = t.send(request(Some("Bearer user-token"))).await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.json["code"], "INVALID_COMBO");
}

#[tokio::test]
async fn test_combo_availability() {
    let t = setup();
    let combo = t.store.seed_demo_catalog().await.unwrap();

    let reply = t
        .send(
            Request::builder()
                .uri(format!("/combos/{}/availability", combo.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json["available"], true);
    assert_eq!(
        reply.json["availability"]["constituents"]
            .as_array()
            .map(Vec::len),
        Some(2)
    );

    let reply = t
        .send(
            Request::builder()
                .uri("/combos/not-a-uuid/availability")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_sign_in_merge_clamps_and_clears_cookie() {
    let t = setup();
    let bowl = t.variant("Bowl", 400, 10).await;
    t.cart(
        &guest("guest-3"),
        json!({ "action": "add", "variant_id": bowl, "quantity": 5 }),
    )
    .await;
    t.store.set_stock(bowl, 2).await;

    let reply = t
        .send(
            Request::builder()
                .method("POST")
                .uri("/session/merge")
                .header("authorization", format!("Bearer {USER_TOKEN}"))
                .header("cookie", "guest_cart_token=guest-3")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json["merge"], "merged");
    assert_eq!(reply.json["result"]["clamped_items"], 1);
    assert!(set_cookie(&reply).is_some_and(|c| c.contains("Max-Age=0")));

    let reply = t
        .cart(
            &[("authorization", "Bearer user-token")],
            json!({ "action": "get" }),
        )
        .await;
    assert_eq!(reply.json["cart"]["items"][0]["quantity"], 2);
    let cart = t
        .store
        .peek_cart(&SessionIdentity::authenticated(t.user))
        .await;
    assert_eq!(cart.item_count, 2);
}

#[tokio::test]
async fn test_merge_requires_sign_in() {
    let t = setup();
    let reply = t
        .send(
            Request::builder()
                .method("POST")
                .uri("/session/merge")
                .header("x-guest-token", "guest-4")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unverifiable_signed_token_degrades_to_guest() {
    let t = setup();
    let bearer = format!("Bearer {UNKNOWN_SIGNED}");
    let reply = t
        .cart(
            &[
                ("authorization", bearer.as_str()),
                ("x-guest-token", "guest-5"),
            ],
            json!({ "action": "get" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json["success"], true);
}

#[tokio::test]
async fn test_start_guest_session() {
    let t = setup();
    let reply = t
        .send(
            Request::builder()
                .method("POST")
                .uri("/session/guest")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let token = reply.json["guest_token"].as_str().unwrap().to_string();
    assert!(set_cookie(&reply).is_some_and(|c| c.contains(&token) && c.contains("Max-Age=2592000")));

    let reply = t
        .send(
            Request::builder()
                .method("POST")
                .uri("/session/guest")
                .header("x-guest-token", token.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(reply.json["guest_token"], token.as_str());
    assert!(set_cookie(&reply).is_none());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = setup();
    t.cart(&guest("guest-6"), json!({ "action": "get" })).await;

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("cart_operations_total"));
}

#[tokio::test]
async fn test_signed_in_user_with_malformed_guest_token_is_served() {
    let t = setup();
    let long = "g".repeat(200);
    let reply = t
        .cart(
            &[
                ("authorization", "Bearer user-token"),
                ("x-guest-token", long.as_str()),
            ],
            json!({ "action": "get" }),
        )
        .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json["success"], true);
}

#[tokio::test]
async fn test_failed_action_after_merge_still_clears_cookie() {
    let t = setup();
    let bowl = t.variant("Bowl", 400, 10).await;
    t.cart(
        &guest("guest-7"),
        json!({ "action": "add", "variant_id": bowl, "quantity": 1 }),
    )
    .await;

    let reply = t
        .cart(
            &[
                ("authorization", "Bearer user-token"),
                ("cookie", "guest_cart_token=guest-7"),
            ],
            json!({ "action": "add", "merge_guest_cart": true }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(set_cookie(&reply).is_some_and(|c| c.starts_with("guest_cart_token=;") && c.contains("Max-Age=0")));

    let guest_cart = t
        .store
        .peek_cart(&SessionIdentity::guest(common::GuestToken::parse("guest-7").unwrap()))
        .await;
    assert!(guest_cart.is_empty());
    let user_cart = t
        .store
        .peek_cart(&SessionIdentity::authenticated(t.user))
        .await;
    assert_eq!(user_cart.item_count, 1);
}

#[tokio::test]
async fn test_failed_guest_action_leaves_cookie_alone() {
    let t = setup();
    let reply = t
        .cart(&guest("guest-8"), json!({ "action": "add", "quantity": 1 }))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(set_cookie(&reply).is_none());
}

#[tokio::test]
async fn test_malformed_cookie_gets_a_fresh_guest_session() {
    let t = setup();
    let reply = t
        .send(
            Request::builder()
                .method("POST")
                .uri("/session/guest")
                .header("cookie", "guest_cart_token=bad value")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(reply.status, StatusCode::OK);
    let token = reply.json["guest_token"].as_str().unwrap().to_string();
    assert_ne!(token, "bad value");
    assert!(common::GuestToken::parse(&token).is_ok());
    assert!(set_cookie(&reply).is_some_and(|c| c.starts_with(&format!("guest_cart_token={token};"))));
}
