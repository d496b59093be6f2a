use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, AppErrorKind, ValidationError};
use crate::middleware::error::get_request_id_from_headers;
use crate::services::payment_orchestrator::PaymentOrchestrator;

/// The API accepts amounts in major currency units; everything behind this
/// boundary (orchestrator, store, gateway) speaks the smallest unit.
const MINOR_UNITS_PER_MAJOR: i64 = 100;

/// Gateways require a payer email even for anonymous checkouts.
const FALLBACK_EMAIL: &str = "customer@example.com";

pub struct PaymentsState {
    pub orchestrator: Arc<PaymentOrchestrator>,
}

#[derive(Debug, Deserialize)]
pub struct InitiatePaymentRequest {
    /// Amount in major currency units
    pub amount: i64,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InitiatePaymentResponse {
    pub reference: String,
    pub authorization_url: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub refresh: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct TransactionStatusResponse {
    pub reference: String,
    pub status: String,
    pub amount: i64,
    pub paid_at: Option<DateTime<Utc>>,
}

/// POST /payments/initiate
pub async fn initiate_payment(
    State(state): State<Arc<PaymentsState>>,
    headers: axum::http::HeaderMap,
    Json(payload): Json<InitiatePaymentRequest>,
) -> Result<Json<InitiatePaymentResponse>, AppError> {
    let request_id = get_request_id_from_headers(&headers);

    if payload.amount <= 0 {
        return Err(AppError::new(AppErrorKind::Validation(
            ValidationError::InvalidField {
                field: "amount".to_string(),
                reason: "amount must be a positive number of major currency units".to_string(),
            },
        )));
    }

    let amount = payload
        .amount
        .checked_mul(MINOR_UNITS_PER_MAJOR)
        .ok_or_else(|| {
            AppError::new(AppErrorKind::Validation(ValidationError::InvalidField {
                field: "amount".to_string(),
                reason: "amount is out of range".to_string(),
            }))
        })?;

    let email = payload
        .email
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_EMAIL.to_string());

    let initiated = state
        .orchestrator
        .initiate(None, amount, &email)
        .await
        .map_err(|e| attach(AppError::from(e), &request_id))?;

    Ok(Json(InitiatePaymentResponse {
        reference: initiated.reference,
        authorization_url: initiated.authorization_url,
    }))
}

/// GET /payments/{reference}/status?refresh=bool
pub async fn get_payment_status(
    State(state): State<Arc<PaymentsState>>,
    Path(reference): Path<String>,
    headers: axum::http::HeaderMap,
    Query(query): Query<StatusQuery>,
) -> Result<Json<TransactionStatusResponse>, AppError> {
    let request_id = get_request_id_from_headers(&headers);

    let transaction = state
        .orchestrator
        .get_status(&reference, query.refresh.unwrap_or(false))
        .await
        .map_err(|e| attach(AppError::from(e), &request_id))?;

    Ok(Json(TransactionStatusResponse {
        reference: transaction.reference,
        status: transaction.status,
        amount: transaction.amount,
        paid_at: transaction.paid_at,
    }))
}

fn attach(err: AppError, request_id: &Option<String>) -> AppError {
    match request_id {
        Some(id) => err.with_request_id(id.clone()),
        None => err,
    }
}
