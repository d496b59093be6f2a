//! Payment Orchestrator Service
//!
//! Coordinates the payment-transaction lifecycle: idempotent initiation
//! against the gateway, webhook-driven status updates, and on-demand
//! reconciliation with the gateway's source-of-truth state.

use crate::config::PaymentsConfig;
use crate::database::error::DatabaseError;
use crate::database::transaction_repository::{
    NewTransaction, Transaction, TransactionStatus, TransactionStore,
};
use crate::payments::error::PaymentError;
use crate::payments::gateway::PaymentGateway;
use crate::payments::types::{GatewayState, InitializeRequest, WebhookEvent};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Orchestrator error types
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("amount {amount} is below the minimum payable amount of {minimum}")]
    InvalidAmount { amount: i64, minimum: i64 },

    #[error("payment initiation failed: {0}")]
    InitiationFailed(PaymentError),

    #[error("invalid webhook signature")]
    InvalidSignature,

    #[error("malformed webhook payload: {message}")]
    MalformedWebhook { message: String },

    #[error("transaction {reference} not found")]
    TransactionNotFound { reference: String },

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

impl From<OrchestratorError> for crate::error::AppError {
    fn from(err: OrchestratorError) -> Self {
        use crate::error::{AppError, AppErrorKind, DomainError, ValidationError};

        match err {
            OrchestratorError::InvalidAmount { amount, minimum } => {
                AppError::new(AppErrorKind::Domain(DomainError::InvalidAmount {
                    amount,
                    minimum,
                }))
            }
            OrchestratorError::InitiationFailed(payment_err) => payment_err.into(),
            OrchestratorError::InvalidSignature => {
                AppError::new(AppErrorKind::Domain(DomainError::InvalidWebhookSignature))
            }
            OrchestratorError::MalformedWebhook { message } => {
                AppError::new(AppErrorKind::Validation(ValidationError::InvalidField {
                    field: "payload".to_string(),
                    reason: message,
                }))
            }
            OrchestratorError::TransactionNotFound { reference } => {
                AppError::new(AppErrorKind::Domain(DomainError::TransactionNotFound {
                    reference,
                }))
            }
            OrchestratorError::Store(DatabaseError::Duplicate { message }) => {
                AppError::new(AppErrorKind::Domain(DomainError::DuplicateReference {
                    reference: message,
                }))
            }
            OrchestratorError::Store(db_err) => db_err.into(),
        }
    }
}

/// Result type for orchestrator operations
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// What a successful initiation hands back to the client
#[derive(Debug, Clone, Serialize)]
pub struct InitiatedPayment {
    pub reference: String,
    pub authorization_url: String,
}

/// Internal outcome of a webhook delivery. Both variants are acknowledged to
/// the gateway; the distinction only matters for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed,
    Ignored,
}

/// Payment orchestrator
///
/// Constructed explicitly with its store and gateway; holds no process-wide
/// state. The durable store is the sole coordination point between concurrent
/// requests.
pub struct PaymentOrchestrator {
    store: Arc<dyn TransactionStore>,
    gateway: Arc<dyn PaymentGateway>,
    config: PaymentsConfig,
}

impl PaymentOrchestrator {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        gateway: Arc<dyn PaymentGateway>,
        config: PaymentsConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            config,
        }
    }

    /// Initiate a payment of `amount` (smallest currency unit) for the given
    /// user, idempotently within the configured window.
    pub async fn initiate(
        &self,
        user_id: Option<Uuid>,
        amount: i64,
        email: &str,
    ) -> OrchestratorResult<InitiatedPayment> {
        if amount < self.config.min_amount {
            return Err(OrchestratorError::InvalidAmount {
                amount,
                minimum: self.config.min_amount,
            });
        }

        // A recent pending transaction for the same (user, amount) pair is a
        // double-submitted request: hand back its checkout URL instead of
        // charging again. Best-effort dedup; concurrent initiations may race.
        if let Some(existing) = self
            .store
            .find_recent_pending_for_user(user_id, amount, self.config.idempotency_window)
            .await?
        {
            if let Some(url) = existing.authorization_url.clone() {
                info!(
                    reference = %existing.reference,
                    "reusing pending transaction within idempotency window"
                );
                return Ok(InitiatedPayment {
                    reference: existing.reference,
                    authorization_url: url,
                });
            }
        }

        let reference = generate_reference();
        let metadata = serde_json::json!({ "email": email });

        let response = self
            .gateway
            .initialize_transaction(InitializeRequest {
                email: email.to_string(),
                amount,
                reference: reference.clone(),
                metadata: Some(metadata.clone()),
            })
            .await
            .map_err(OrchestratorError::InitiationFailed)?;

        // Persisted only after the gateway accepted the transaction, so no
        // pending row ever exists without an authorization URL.
        let transaction = self
            .store
            .create(NewTransaction {
                reference: reference.clone(),
                amount,
                authorization_url: response.authorization_url.clone(),
                gateway_reference: Some(response.gateway_reference),
                user_id,
                metadata,
            })
            .await?;

        info!(
            reference = %transaction.reference,
            amount = amount,
            provider = self.gateway.name(),
            "payment initiated"
        );

        Ok(InitiatedPayment {
            reference,
            authorization_url: response.authorization_url,
        })
    }

    /// Process a webhook delivery.
    ///
    /// The signature is checked over `raw_body` exactly as received. Events
    /// with a valid signature are always acknowledged, even when they are
    /// internal no-ops, to stop gateway-side retry storms.
    pub async fn handle_webhook(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> OrchestratorResult<WebhookOutcome> {
        let signature = signature.ok_or(OrchestratorError::InvalidSignature)?;
        if !self.gateway.verify_webhook(raw_body, signature) {
            warn!(provider = self.gateway.name(), "invalid webhook signature");
            return Err(OrchestratorError::InvalidSignature);
        }

        let event = self
            .gateway
            .parse_webhook_event(raw_body)
            .map_err(|e| OrchestratorError::MalformedWebhook {
                message: e.to_string(),
            })?;

        let Some(status) = event_transition(&event) else {
            info!(event_type = %event.event_type, "ignoring unrecognized webhook event");
            return Ok(WebhookOutcome::Ignored);
        };

        let Some(gateway_reference) = event.gateway_reference.as_deref() else {
            warn!(event_type = %event.event_type, "webhook event carries no reference");
            return Ok(WebhookOutcome::Ignored);
        };

        // The payload is gateway-authored, so correlation is by the gateway's
        // own reference. An unknown reference is acknowledged: the row may not
        // be visible yet and the gateway will redeliver.
        let Some(transaction) = self
            .store
            .find_by_gateway_reference(gateway_reference)
            .await?
        else {
            warn!(
                gateway_reference = %gateway_reference,
                "webhook references unknown transaction, acknowledging"
            );
            return Ok(WebhookOutcome::Ignored);
        };

        let paid_at = match status {
            TransactionStatus::Success => Some(event.paid_at.unwrap_or_else(Utc::now)),
            _ => None,
        };

        let updated = self
            .store
            .update_status(&transaction.reference, status, paid_at)
            .await?;

        info!(
            reference = %updated.reference,
            status = %updated.status,
            event_type = %event.event_type,
            "webhook processed"
        );

        Ok(WebhookOutcome::Processed)
    }

    /// Return the transaction for `reference`, reconciling against the
    /// gateway when the caller forces a refresh or the record is still
    /// pending.
    pub async fn get_status(
        &self,
        reference: &str,
        force_refresh: bool,
    ) -> OrchestratorResult<Transaction> {
        let transaction = self
            .store
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| OrchestratorError::TransactionNotFound {
                reference: reference.to_string(),
            })?;

        let current = TransactionStatus::from_db_status(&transaction.status)
            .unwrap_or(TransactionStatus::Pending);
        if !force_refresh && current.is_terminal() {
            return Ok(transaction);
        }

        let Some(gateway_reference) = transaction.gateway_reference.clone() else {
            return Ok(transaction);
        };

        match self.gateway.verify_transaction(&gateway_reference).await {
            Ok(verification) => {
                let mapped = match verification.status {
                    GatewayState::Success => Some(TransactionStatus::Success),
                    GatewayState::Failed => Some(TransactionStatus::Failed),
                    GatewayState::Pending | GatewayState::Unknown => None,
                };

                match mapped {
                    Some(status) => {
                        let paid_at = match status {
                            TransactionStatus::Success => {
                                Some(verification.paid_at.unwrap_or_else(Utc::now))
                            }
                            _ => None,
                        };
                        Ok(self
                            .store
                            .update_status(&transaction.reference, status, paid_at)
                            .await?)
                    }
                    None => Ok(transaction),
                }
            }
            Err(e) => {
                // Stale data beats an error on a pure read path.
                warn!(
                    reference = %reference,
                    error = %e,
                    "reconciliation failed, returning last-known state"
                );
                Ok(transaction)
            }
        }
    }
}

/// Fresh globally-unique transaction reference. UUIDv4 gives ~122 bits of
/// cryptographic randomness, so collisions are negligible.
fn generate_reference() -> String {
    format!("txn_{}", Uuid::new_v4().simple())
}

/// Local transition implied by a webhook event, or `None` when the event type
/// should be ignored.
fn event_transition(event: &WebhookEvent) -> Option<TransactionStatus> {
    match event.event_type.as_str() {
        "charge.success" => match event.status {
            Some(GatewayState::Failed) => Some(TransactionStatus::Failed),
            _ => Some(TransactionStatus::Success),
        },
        "charge.failed" => Some(TransactionStatus::Failed),
        _ => None,
    }
}
