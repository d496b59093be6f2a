use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{error, info};

use crate::error::AppError;
use crate::services::payment_orchestrator::{OrchestratorError, PaymentOrchestrator};

/// Header the gateway signs its deliveries with
pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

pub struct WebhookState {
    pub orchestrator: Arc<PaymentOrchestrator>,
}

/// POST /payments/webhook
///
/// The signature is checked against the body exactly as received, so the raw
/// string is handed to the orchestrator before any JSON parsing happens.
/// Everything past the signature check is acknowledged with 200, internal
/// failures included, to stop gateway-side retry storms.
pub async fn handle_webhook(
    State(state): State<Arc<WebhookState>>,
    headers: axum::http::HeaderMap,
    body: String,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    match state
        .orchestrator
        .handle_webhook(body.as_bytes(), signature)
        .await
    {
        Ok(outcome) => {
            info!(outcome = ?outcome, "webhook acknowledged");
            ok_response()
        }
        Err(err @ OrchestratorError::InvalidSignature) => AppError::from(err).into_response(),
        Err(err @ OrchestratorError::MalformedWebhook { .. }) => {
            AppError::from(err).into_response()
        }
        Err(err) => {
            error!(error = %err, "webhook processing failed, acknowledging anyway");
            ok_response()
        }
    }
}

fn ok_response() -> Response {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
}
