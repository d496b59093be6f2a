//! HTTP-level tests for POST /payments/webhook

mod common;

use axum::{body::Body, routing::post, Router};
use common::{MemoryTransactionStore, MockGateway, TEST_WEBHOOK_SECRET};
use http::{Request, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

use paylink_backend::api::webhooks::{handle_webhook, WebhookState, SIGNATURE_HEADER};
use paylink_backend::config::PaymentsConfig;
use paylink_backend::payments::utils::compute_hmac_sha512_hex;
use paylink_backend::services::payment_orchestrator::PaymentOrchestrator;

struct TestApp {
    app: Router,
    store: Arc<MemoryTransactionStore>,
    orchestrator: Arc<PaymentOrchestrator>,
}

fn build_app() -> TestApp {
    let store = Arc::new(MemoryTransactionStore::new());
    let gateway = Arc::new(MockGateway::new());
    let orchestrator = Arc::new(PaymentOrchestrator::new(
        store.clone(),
        gateway,
        PaymentsConfig {
            min_amount: 100,
            idempotency_window: Duration::from_secs(600),
        },
    ));

    let app = Router::new()
        .route("/payments/webhook", post(handle_webhook))
        .with_state(Arc::new(WebhookState {
            orchestrator: orchestrator.clone(),
        }));

    TestApp {
        app,
        store,
        orchestrator,
    }
}

fn webhook_request(body: &str, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/payments/webhook")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn sign(body: &str) -> String {
    compute_hmac_sha512_hex(body.as_bytes(), TEST_WEBHOOK_SECRET).unwrap()
}

#[tokio::test]
async fn valid_webhook_is_acknowledged_and_applies_the_transition() {
    let test = build_app();
    let initiated = test
        .orchestrator
        .initiate(None, 50000, "a@x.com")
        .await
        .unwrap();

    let body = serde_json::json!({
        "event": "charge.success",
        "data": {
            "reference": format!("ps_{}", initiated.reference),
            "status": "success",
            "amount": 50000,
            "paid_at": "2026-02-12T10:30:00Z"
        }
    })
    .to_string();

    let response = test
        .app
        .clone()
        .oneshot(webhook_request(&body, Some(&sign(&body))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], "ok");

    assert_eq!(test.store.get(&initiated.reference).unwrap().status, "success");
}

#[tokio::test]
async fn invalid_signature_is_a_bad_request() {
    let test = build_app();
    let body = r#"{"event":"charge.success","data":{"reference":"ps_x","status":"success"}}"#;

    let response = test
        .app
        .clone()
        .oneshot(webhook_request(body, Some("forged")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_signature_is_a_bad_request() {
    let test = build_app();
    let body = r#"{"event":"charge.success","data":{"reference":"ps_x"}}"#;

    let response = test
        .app
        .clone()
        .oneshot(webhook_request(body, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_payload_with_valid_signature_is_a_bad_request() {
    let test = build_app();
    let body = "this is not json";

    let response = test
        .app
        .clone()
        .oneshot(webhook_request(body, Some(&sign(body))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn webhook_for_unknown_transaction_is_still_acknowledged() {
    let test = build_app();
    let body = serde_json::json!({
        "event": "charge.success",
        "data": {"reference": "ps_unknown", "status": "success", "amount": 1000}
    })
    .to_string();

    let response = test
        .app
        .clone()
        .oneshot(webhook_request(&body, Some(&sign(&body))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
