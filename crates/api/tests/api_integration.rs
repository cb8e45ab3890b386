//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::config::Config;
use api::state::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use checkout::{GatewayConfig, OrderService};
use common::UserId;
use domain::OrderId;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

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

fn config_with_key() -> Config {
    Config {
        gateway: GatewayConfig::new("rzp_test_key"),
        ..Config::default()
    }
}

fn setup_with_config(config: &Config) -> (axum::Router, Arc<AppState>) {
    let state = api::create_default_state(config);
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

fn setup() -> (axum::Router, Arc<AppState>) {
    setup_with_config(&config_with_key())
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn checkout_body(user_id: &UserId, coupon: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "user_id": user_id.to_string(),
        "lines": [
            { "product_id": "501", "unit_price": 2000, "title": "Sunset poster" },
            { "product_id": "502", "unit_price": 499, "title": "Sticker sheet" }
        ],
        "coupon_code": coupon,
    })
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["gateway_configured"], true);
    assert_eq!(json["currency"], "INR");
}

#[tokio::test]
async fn test_health_reports_missing_gateway_key() {
    let (app, _) = setup_with_config(&Config::default());

    let response = app.oneshot(get("/health")).await.unwrap();

    let json = json_body(response).await;
    assert_eq!(json["gateway_configured"], false);
}

#[tokio::test]
async fn test_validate_flat_coupon() {
    let (app, _) = setup();

    let response = app
        .oneshot(post_json(
            "/coupons/validate",
            serde_json::json!({ "code": "FLAT500", "order_amount": 2499 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["valid"], true);
    assert_eq!(json["discount"], 500);
    assert_eq!(json["final_amount"], 1999);
    assert_eq!(json["coupon"]["discount_type"], "flat");
}

#[tokio::test]
async fn test_validate_unknown_coupon_is_invalid() {
    let (app, _) = setup();

    let response = app
        .oneshot(post_json(
            "/coupons/validate",
            serde_json::json!({ "code": "BADCODE", "order_amount": 2499 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["valid"], false);
    assert_eq!(json["discount"], 0);
    assert_eq!(json["final_amount"], 2499);
    assert_eq!(json["message"], "Invalid coupon code");
}

#[tokio::test]
async fn test_validate_blank_code_is_bad_request() {
    let (app, _) = setup();

    let response = app
        .oneshot(post_json(
            "/coupons/validate",
            serde_json::json!({ "code": "   ", "order_amount": 2499 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checkout_and_get_order() {
    let (app, _) = setup();
    let user = UserId::new();

    let response = app
        .clone()
        .oneshot(post_json("/checkout", checkout_body(&user, Some("FLAT500"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    assert_eq!(json["status"], "succeeded");
    assert_eq!(json["route"], "paid");
    assert_eq!(json["subtotal"], 2499);
    assert_eq!(json["discount"], 500);
    assert_eq!(json["final_amount"], 1999);
    assert_eq!(json["state"], "Succeeded");
    let order_id = json["order_id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(get(&format!("/orders/{order_id}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["id"], order_id);
    assert_eq!(json["status"], "success");
    assert_eq!(json["total_amount"], 1999);
    assert_eq!(json["product_ids"], serde_json::json!([501, 502]));
}

#[tokio::test]
async fn test_checkout_anonymous_is_unauthorized() {
    let (app, state) = setup();

    let response = app
        .oneshot(post_json(
            "/checkout",
            serde_json::json!({
                "lines": [{ "product_id": "501", "unit_price": 2000 }]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = json_body(response).await;
    assert_eq!(json["kind"], "validation");
    assert_eq!(state.orchestrator.services().orders.create_calls(), 0);
}

#[tokio::test]
async fn test_checkout_empty_cart_is_unprocessable() {
    let (app, _) = setup();

    let response = app
        .oneshot(post_json(
            "/checkout",
            serde_json::json!({ "user_id": UserId::new().to_string(), "lines": [] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_checkout_negative_price_is_bad_request() {
    let (app, _) = setup();

    let response = app
        .oneshot(post_json(
            "/checkout",
            serde_json::json!({
                "user_id": UserId::new().to_string(),
                "lines": [{ "product_id": "501", "unit_price": -5 }]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checkout_overflowing_subtotal_is_bad_request() {
    let (app, state) = setup();

    let response = app
        .oneshot(post_json(
            "/checkout",
            serde_json::json!({
                "user_id": UserId::new().to_string(),
                "lines": [
                    { "product_id": "501", "unit_price": i64::MAX },
                    { "product_id": "502", "unit_price": 1 }
                ]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(state.orchestrator.services().orders.create_calls(), 0);
}

#[tokio::test]
async fn test_guard_released_after_checkout() {
    let (app, state) = setup();

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(post_json("/checkout", checkout_body(&UserId::new(), None)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    assert_eq!(state.guard_count(), 0);
}

#[tokio::test]
async fn test_checkout_without_merchant_key_is_unavailable() {
    let (app, state) = setup_with_config(&Config::default());

    let response = app
        .oneshot(post_json("/checkout", checkout_body(&UserId::new(), None)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = json_body(response).await;
    assert_eq!(json["kind"], "gateway_config");
    assert_eq!(state.orchestrator.services().orders.create_calls(), 0);
}

#[tokio::test]
async fn test_checkout_entitled_user_gets_free_order() {
    let (app, state) = setup_with_config(&Config::default());
    let user = UserId::new();
    state
        .orchestrator
        .services()
        .entitlements
        .grant_plan(user, "Studio");

    let response = app
        .oneshot(post_json("/checkout", checkout_body(&user, None)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    assert_eq!(json["route"], "entitlement");
    assert_eq!(json["final_amount"], 0);
}

#[tokio::test]
async fn test_checkout_unresolved_capture_is_accepted() {
    let (app, state) = setup();
    state
        .orchestrator
        .services()
        .capture
        .set_behavior(checkout::CaptureBehavior::Timeout);

    let response = app
        .oneshot(post_json("/checkout", checkout_body(&UserId::new(), None)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = json_body(response).await;
    assert_eq!(json["status"], "unresolved");
    assert!(json["message"].as_str().unwrap().contains("check your orders"));

    let order_id = OrderId::new(json["order_id"].as_str().unwrap());
    let order = state
        .orchestrator
        .services()
        .orders
        .order_detail(&order_id)
        .await
        .unwrap();
    assert_eq!(order.status, domain::OrderStatus::Pending);
}

#[tokio::test]
async fn test_checkout_in_progress_is_conflict() {
    let (app, state) = setup();
    let user = UserId::new();
    let _running = state.guard_for(user).try_acquire().unwrap();

    let response = app
        .oneshot(post_json("/checkout", checkout_body(&user, None)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = json_body(response).await;
    assert_eq!(json["kind"], "already_in_progress");
    assert_eq!(state.orchestrator.services().entitlements.check_count(), 0);
}

#[tokio::test]
async fn test_other_user_not_blocked_by_guard() {
    let (app, state) = setup();
    let _running = state.guard_for(UserId::new()).try_acquire().unwrap();

    let response = app
        .oneshot(post_json("/checkout", checkout_body(&UserId::new(), None)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_get_nonexistent_order() {
    let (app, _) = setup();

    let response = app.oneshot(get("/orders/ORD-9999")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_user_id_format() {
    let (app, _) = setup();

    let response = app
        .oneshot(post_json(
            "/checkout",
            serde_json::json!({
                "user_id": "not-a-uuid",
                "lines": [{ "product_id": "501", "unit_price": 2000 }]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_after_checkout() {
    let (app, _) = setup();

    app.clone()
        .oneshot(post_json("/checkout", checkout_body(&UserId::new(), None)))
        .await
        .unwrap();

    let response = app.oneshot(get("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("checkout_started_total"));
}
