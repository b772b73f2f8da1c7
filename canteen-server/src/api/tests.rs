use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, LOCATION};
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use super::create_router;
use crate::config::Config;
use crate::db::memory::MemoryStore;
use crate::db::{OrderStore, ProfileStore};
use crate::identity::testing::FakeIdentity;
use crate::payment::signature;
use crate::payment::testing::{FakeGateway, paid_event};
use crate::state::AppState;

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    config: Config,
}

fn test_app() -> TestApp {
    let config = Config::for_tests("http://unused.test");
    let store = Arc::new(MemoryStore::new());
    let provider = FakeIdentity::default()
        .with_user("staff", "ana.cruz@school.edu.ph", "Ana Cruz")
        .with_user("other", "ben@school.edu.ph", "Ben")
        .with_user("boss", "head@school.edu.ph", "Head Cook")
        .with_user("outsider", "someone@gmail.com", "Someone");
    let state = AppState::from_parts(
        &config,
        store.clone(),
        Arc::new(provider),
        Arc::new(FakeGateway::default()),
    );
    TestApp {
        router: create_router(state),
        store,
        config,
    }
}

impl TestApp {
    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn login(&self, code: &str) -> String {
        let (status, body) = self
            .send(Method::GET, &format!("/callback?code={code}"), None, None)
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["token"].as_str().unwrap().to_string()
    }

    async fn webhook(&self, body: &[u8], secret: &str) -> StatusCode {
        let header = signature::sign(body, secret, chrono::Utc::now().timestamp(), false);
        let request = Request::builder()
            .method(Method::POST)
            .uri("/paymongo/webhook")
            .header("paymongo-signature", header)
            .body(Body::from(body.to_vec()))
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap().status()
    }

    /// Rice Meal ₱60 and Juice ₱20 on Monday of 2024-W01; returns (form, rice, juice)
    async fn seed_menu(&self, admin: &str) -> (i64, i64, i64) {
        let mut ids = Vec::new();
        for (name, price) in [("Rice Meal", 60), ("Juice", 20)] {
            let (status, body) = self
                .send(
                    Method::POST,
                    "/api/admin/food-items",
                    Some(admin),
                    Some(json!({"name": name, "price": price, "category": "LUNCH"})),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{body}");
            ids.push(body["data"]["id"].as_i64().unwrap());
        }
        let (status, body) = self
            .send(
                Method::POST,
                "/api/admin/forms",
                Some(admin),
                Some(json!({
                    "category": "LUNCH",
                    "week": "2024-W01",
                    "active": true,
                    "options": [{"weekday": 1, "food_item_ids": [ids[0], ids[1]]}]
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        (body["data"]["id"].as_i64().unwrap(), ids[0], ids[1])
    }

    async fn submit(&self, token: &str, form: i64, items: Value) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/api/orders",
            Some(token),
            Some(json!({"form_id": form, "days": [{"weekday": 1, "items": items}]})),
        )
        .await
    }
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_login_redirects_to_provider() {
    let app = test_app();
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/login").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.status().is_redirection());
    let location = response.headers()[LOCATION].to_str().unwrap();
    assert!(location.starts_with("https://login.example.test/authorize?state="));
}

#[tokio::test]
async fn test_outside_domain_rejected_without_profile() {
    let app = test_app();
    let (status, body) = app
        .send(Method::GET, "/callback?code=outsider", None, None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 1011);
    assert!(app.store.list_profiles().await.unwrap().is_empty());

    let (status, _) = app
        .send(
            Method::GET,
            "/callback?error=access_denied&error_description=cancelled",
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_required() {
    let app = test_app();
    let (status, _) = app.send(Method::GET, "/api/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = app
        .send(Method::GET, "/api/me", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 1004);

    let token = app.login("staff").await;
    let (status, body) = app.send(Method::GET, "/api/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "ana.cruz@school.edu.ph");
    assert_eq!(body["data"]["coins"], 50);
}

#[tokio::test]
async fn test_admin_routes_need_admin() {
    let app = test_app();
    let staff = app.login("staff").await;
    let (status, body) = app
        .send(Method::GET, "/api/admin/forms", Some(&staff), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 2003);

    let admin = app.login("boss").await;
    let (status, _) = app
        .send(Method::GET, "/api/admin/forms", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_weekly_order_example() {
    let app = test_app();
    let admin = app.login("boss").await;
    let (form, rice, juice) = app.seed_menu(&admin).await;
    let staff = app.login("staff").await;

    let (status, body) = app.send(Method::GET, "/api/menu", Some(&staff), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["form_id"], form);
    assert_eq!(body["data"][0]["submitted"], false);

    let (status, body) = app
        .submit(
            &staff,
            form,
            json!([
                {"food_item_id": rice, "quantity": 1},
                {"food_item_id": juice, "quantity": 2}
            ]),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order = &body["data"];
    assert_eq!(order["total"], 100);
    assert_eq!(order["reservations"].as_array().unwrap().len(), 1);
    let subtotal: i64 = order["reservations"][0]["selections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["unit_price"].as_i64().unwrap() * s["quantity"].as_i64().unwrap())
        .sum();
    assert_eq!(subtotal, 100);

    let (status, body) = app.send(Method::GET, "/api/me", Some(&staff), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["coins"], 90);

    let (status, body) = app
        .submit(&staff, form, json!([{"food_item_id": rice, "quantity": 1}]))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 4008);
}

#[tokio::test]
async fn test_item_not_offered_creates_nothing() {
    let app = test_app();
    let admin = app.login("boss").await;
    let (form, rice, _) = app.seed_menu(&admin).await;
    let (status, body) = app
        .send(
            Method::POST,
            "/api/admin/food-items",
            Some(&admin),
            Some(json!({"name": "Pasta", "price": 70, "category": "LUNCH"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let pasta = body["data"]["id"].as_i64().unwrap();

    let staff = app.login("staff").await;
    let (status, body) = app
        .submit(
            &staff,
            form,
            json!([
                {"food_item_id": rice, "quantity": 1},
                {"food_item_id": pasta, "quantity": 1}
            ]),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 4012);

    let (_, body) = app.send(Method::GET, "/api/orders", Some(&staff), None).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_checkout_and_webhook() {
    let app = test_app();
    let admin = app.login("boss").await;
    let (form, rice, _) = app.seed_menu(&admin).await;
    let staff = app.login("staff").await;
    let (_, body) = app
        .submit(&staff, form, json!([{"food_item_id": rice, "quantity": 2}]))
        .await;
    let order_id = body["data"]["id"].as_i64().unwrap();

    // Someone else's order reads as missing
    let other = app.login("other").await;
    let (status, _) = app
        .send(
            Method::POST,
            &format!("/api/orders/{order_id}/checkout"),
            Some(&other),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/orders/{order_id}/checkout"),
            Some(&staff),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["amount"], 120);
    assert_eq!(body["data"]["service_fee"], 300);
    assert_eq!(
        body["data"]["checkout_url"],
        "https://checkout.example.test/cs_test_1"
    );

    let secret = app.config.paymongo_webhook_secret.clone();

    // Forged and unknown deliveries change nothing
    let event = paid_event("evt_1", "cs_test_1");
    assert_eq!(app.webhook(&event, "forged").await, StatusCode::BAD_REQUEST);
    assert_eq!(
        app.webhook(&paid_event("evt_0", "cs_unknown"), &secret).await,
        StatusCode::NOT_FOUND
    );
    assert!(!app.store.find_order(order_id).await.unwrap().unwrap().paid);

    assert_eq!(app.webhook(&event, &secret).await, StatusCode::OK);
    let paid = app.store.find_order(order_id).await.unwrap().unwrap();
    assert!(paid.paid);

    // Redelivery is a no-op
    assert_eq!(app.webhook(&event, &secret).await, StatusCode::OK);
    assert_eq!(app.store.find_order(order_id).await.unwrap().unwrap(), paid);

    let (status, body) = app
        .send(
            Method::DELETE,
            &format!("/api/orders/{order_id}"),
            Some(&staff),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 4002);
}

#[tokio::test]
async fn test_checkout_started_order_is_kept_for_its_webhook() {
    let app = test_app();
    let admin = app.login("boss").await;
    let (form, rice, _) = app.seed_menu(&admin).await;
    let staff = app.login("staff").await;
    let (_, body) = app
        .submit(&staff, form, json!([{"food_item_id": rice, "quantity": 1}]))
        .await;
    let order_id = body["data"]["id"].as_i64().unwrap();

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/api/orders/{order_id}/checkout"),
            Some(&staff),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(
            Method::DELETE,
            &format!("/api/orders/{order_id}"),
            Some(&staff),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 4014);

    // The customer finished paying after the delete attempt
    let secret = app.config.paymongo_webhook_secret.clone();
    assert_eq!(
        app.webhook(&paid_event("evt_1", "cs_test_1"), &secret).await,
        StatusCode::OK
    );
    assert!(app.store.find_order(order_id).await.unwrap().unwrap().paid);
}

#[tokio::test]
async fn test_paid_reservation_settles_order() {
    let app = test_app();
    let admin = app.login("boss").await;
    let (form, rice, juice) = app.seed_menu(&admin).await;
    let staff = app.login("staff").await;
    let (_, body) = app
        .submit(
            &staff,
            form,
            json!([{"food_item_id": rice, "quantity": 1}, {"food_item_id": juice, "quantity": 1}]),
        )
        .await;
    let order_id = body["data"]["id"].as_i64().unwrap();
    let monday = body["data"]["reservations"][0]["id"].as_i64().unwrap();

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/reservations/{monday}/checkout"),
            Some(&staff),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["amount"], 80);
    let secret = app.config.paymongo_webhook_secret.clone();
    assert_eq!(
        app.webhook(&paid_event("evt_1", "cs_test_1"), &secret).await,
        StatusCode::OK
    );

    // Nothing is left to charge for the whole week
    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/orders/{order_id}/checkout"),
            Some(&staff),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 4002);

    let (status, body) = app
        .send(
            Method::DELETE,
            &format!("/api/orders/{order_id}"),
            Some(&staff),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 4002);
    assert!(app.store.find_order(order_id).await.unwrap().unwrap().paid);
}

#[tokio::test]
async fn test_sign_in_limit_ignores_forwarded_header() {
    let app = test_app();
    let login_from = |hop: String| {
        Request::builder()
            .uri("/login")
            .header("x-forwarded-for", hop)
            .body(Body::empty())
            .unwrap()
    };
    for n in 0..10 {
        let response = app
            .router
            .clone()
            .oneshot(login_from(format!("203.0.113.{n}")))
            .await
            .unwrap();
        assert!(response.status().is_redirection());
    }
    let response = app
        .router
        .clone()
        .oneshot(login_from("198.51.100.1".into()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_admin_actions_and_form_delete_guard() {
    let app = test_app();
    let admin = app.login("boss").await;
    let (form, rice, juice) = app.seed_menu(&admin).await;
    let staff = app.login("staff").await;
    let (_, body) = app
        .submit(
            &staff,
            form,
            json!([
                {"food_item_id": rice, "quantity": 1},
                {"food_item_id": juice, "quantity": 3}
            ]),
        )
        .await;
    let order_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/admin/forms/{form}/quantities?paid_only=true"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["days"][0]["items"][0]["quantity"], 0);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/admin/orders/actions",
            Some(&admin),
            Some(json!({"action": "mark_paid", "order_ids": [order_id]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"action": "mark_paid", "updated": 1}));

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/admin/forms/{form}/kitchen-sheet?paid_only=true"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["days"][0]["slips"][0]["name"], "Ana Cruz");

    let (status, body) = app
        .send(Method::GET, "/api/admin/orders?paid=true", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = app
        .send(
            Method::DELETE,
            &format!("/api/admin/forms/{form}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 6011);

    let (status, body) = app
        .send(
            Method::DELETE,
            &format!("/api/admin/food-items/{rice}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 6003);
}
