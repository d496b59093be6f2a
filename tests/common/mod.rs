//! Shared test doubles: an in-memory transaction store and a scriptable
//! payment gateway.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use paylink_backend::database::error::DatabaseError;
use paylink_backend::database::transaction_repository::{
    NewTransaction, Transaction, TransactionStatus, TransactionStore,
};
use paylink_backend::payments::error::{PaymentError, PaymentResult};
use paylink_backend::payments::gateway::PaymentGateway;
use paylink_backend::payments::types::{
    GatewayState, InitializeRequest, InitializeResponse, VerifyResponse, WebhookEvent,
};
use paylink_backend::payments::utils::verify_hmac_sha512_hex;

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test";

/// In-memory transaction store mirroring the Postgres store's semantics,
/// including the terminal-absorbing update.
#[derive(Default)]
pub struct MemoryTransactionStore {
    rows: Mutex<Vec<Transaction>>,
}

impl MemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn get(&self, reference: &str) -> Option<Transaction> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.reference == reference)
            .cloned()
    }
}

#[async_trait]
impl TransactionStore for MemoryTransactionStore {
    async fn create(&self, new: NewTransaction) -> Result<Transaction, DatabaseError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|t| t.reference == new.reference) {
            return Err(DatabaseError::Duplicate {
                message: new.reference,
            });
        }

        let now = Utc::now();
        let transaction = Transaction {
            id: Uuid::new_v4(),
            reference: new.reference,
            gateway_reference: new.gateway_reference,
            amount: new.amount,
            status: "pending".to_string(),
            authorization_url: Some(new.authorization_url),
            paid_at: None,
            metadata: new.metadata,
            user_id: new.user_id,
            created_at: now,
            updated_at: now,
        };
        rows.push(transaction.clone());
        Ok(transaction)
    }

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, DatabaseError> {
        Ok(self.get(reference))
    }

    async fn find_by_gateway_reference(
        &self,
        gateway_reference: &str,
    ) -> Result<Option<Transaction>, DatabaseError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.gateway_reference.as_deref() == Some(gateway_reference))
            .cloned())
    }

    async fn find_recent_pending_for_user(
        &self,
        user_id: Option<Uuid>,
        amount: i64,
        window: Duration,
    ) -> Result<Option<Transaction>, DatabaseError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::zero());
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|t| {
                t.user_id == user_id
                    && t.amount == amount
                    && t.status == "pending"
                    && t.created_at > cutoff
            })
            .max_by_key(|t| t.created_at)
            .cloned())
    }

    async fn update_status(
        &self,
        reference: &str,
        status: TransactionStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<Transaction, DatabaseError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|t| t.reference == reference)
            .ok_or(DatabaseError::NotFound {
                entity: format!("transaction {}", reference),
            })?;

        // Only pending rows transition; a terminal row is returned unchanged.
        if row.status == "pending" {
            row.status = status.as_db_status().to_string();
            if paid_at.is_some() {
                row.paid_at = paid_at;
            }
            row.updated_at = Utc::now();
        }
        Ok(row.clone())
    }

    async fn exists(&self, reference: &str) -> Result<bool, DatabaseError> {
        Ok(self.get(reference).is_some())
    }
}

/// Scriptable gateway double. Signature verification uses the real
/// HMAC-SHA512 check so webhook tests exercise the production code path.
pub struct MockGateway {
    pub initialize_calls: AtomicUsize,
    pub verify_calls: AtomicUsize,
    unreachable: AtomicBool,
    verify_response: Mutex<VerifyResponse>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self {
            initialize_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
            unreachable: AtomicBool::new(false),
            verify_response: Mutex::new(VerifyResponse {
                status: GatewayState::Pending,
                amount: 0,
                paid_at: None,
            }),
        }
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent outbound calls fail with a network error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn set_verify_response(&self, response: VerifyResponse) {
        *self.verify_response.lock().unwrap() = response;
    }

    pub fn initialize_call_count(&self) -> usize {
        self.initialize_calls.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> PaymentResult<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(PaymentError::NetworkError {
                message: "connection refused".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn initialize_transaction(
        &self,
        request: InitializeRequest,
    ) -> PaymentResult<InitializeResponse> {
        self.check_reachable()?;
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        Ok(InitializeResponse {
            authorization_url: format!("https://gateway.example.com/pay/{}", request.reference),
            gateway_reference: format!("ps_{}", request.reference),
        })
    }

    async fn verify_transaction(&self, _gateway_reference: &str) -> PaymentResult<VerifyResponse> {
        self.check_reachable()?;
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.verify_response.lock().unwrap().clone())
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> bool {
        verify_hmac_sha512_hex(payload, TEST_WEBHOOK_SECRET, signature)
    }

    fn parse_webhook_event(&self, payload: &[u8]) -> PaymentResult<WebhookEvent> {
        let parsed: serde_json::Value = serde_json::from_slice(payload).map_err(|e| {
            PaymentError::WebhookVerificationError {
                message: format!("invalid webhook JSON payload: {}", e),
            }
        })?;

        let data = parsed.get("data");
        Ok(WebhookEvent {
            event_type: parsed
                .get("event")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string(),
            gateway_reference: data
                .and_then(|v| v.get("reference"))
                .and_then(|v| v.as_str())
                .map(|v| v.to_string()),
            status: data
                .and_then(|v| v.get("status"))
                .and_then(|v| v.as_str())
                .map(GatewayState::from_provider_status),
            amount: data.and_then(|v| v.get("amount")).and_then(|v| v.as_i64()),
            paid_at: data
                .and_then(|v| v.get("paid_at"))
                .and_then(|v| v.as_str())
                .and_then(|v| {
                    chrono::DateTime::parse_from_rfc3339(v)
                        .map(|dt| dt.with_timezone(&Utc))
                        .ok()
                }),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
