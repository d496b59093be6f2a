use crate::database::error::DatabaseError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::time::Duration;
use uuid::Uuid;

const TRANSACTION_COLUMNS: &str = "id, reference, gateway_reference, amount, status, \
     authorization_url, paid_at, metadata, user_id, created_at, updated_at";

/// Payment transaction status
///
/// `Pending` is the initial and only re-enterable state; `Success` and
/// `Failed` are terminal and absorb any further update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Success | TransactionStatus::Failed)
    }

    pub fn from_db_status(status: &str) -> Option<Self> {
        match status.to_lowercase().as_str() {
            "pending" => Some(TransactionStatus::Pending),
            "success" => Some(TransactionStatus::Success),
            "failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }

    pub fn as_db_status(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_db_status())
    }
}

/// Transaction entity
#[derive(Debug, Clone, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub reference: String,
    pub gateway_reference: Option<String>,
    pub amount: i64,
    pub status: String,
    pub authorization_url: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to persist a freshly initiated transaction
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub reference: String,
    pub amount: i64,
    pub authorization_url: String,
    pub gateway_reference: Option<String>,
    pub user_id: Option<Uuid>,
    pub metadata: serde_json::Value,
}

/// Storage contract for payment transactions
///
/// All operations are atomic at single-record granularity. `update_status`
/// only commits a transition out of `pending`; updates against a terminal row
/// return the unchanged record so duplicate webhook deliveries stay no-ops.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn create(&self, new: NewTransaction) -> Result<Transaction, DatabaseError>;

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, DatabaseError>;

    async fn find_by_gateway_reference(
        &self,
        gateway_reference: &str,
    ) -> Result<Option<Transaction>, DatabaseError>;

    /// Most recent pending transaction for the (user, amount) pair created
    /// within `window`, used for idempotent re-initiation.
    async fn find_recent_pending_for_user(
        &self,
        user_id: Option<Uuid>,
        amount: i64,
        window: Duration,
    ) -> Result<Option<Transaction>, DatabaseError>;

    async fn update_status(
        &self,
        reference: &str,
        status: TransactionStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<Transaction, DatabaseError>;

    async fn exists(&self, reference: &str) -> Result<bool, DatabaseError>;
}

/// Postgres-backed transaction store
pub struct PgTransactionRepository {
    pool: PgPool,
}

impl PgTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for PgTransactionRepository {
    async fn create(&self, new: NewTransaction) -> Result<Transaction, DatabaseError> {
        sqlx::query_as::<_, Transaction>(&format!(
            "INSERT INTO transactions \
             (reference, gateway_reference, amount, status, authorization_url, user_id, metadata) \
             VALUES ($1, $2, $3, 'pending', $4, $5, $6) \
             RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(&new.reference)
        .bind(&new.gateway_reference)
        .bind(new.amount)
        .bind(&new.authorization_url)
        .bind(new.user_id)
        .bind(&new.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, DatabaseError> {
        sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn find_by_gateway_reference(
        &self,
        gateway_reference: &str,
    ) -> Result<Option<Transaction>, DatabaseError> {
        sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE gateway_reference = $1"
        ))
        .bind(gateway_reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn find_recent_pending_for_user(
        &self,
        user_id: Option<Uuid>,
        amount: i64,
        window: Duration,
    ) -> Result<Option<Transaction>, DatabaseError> {
        let cutoff =
            Utc::now() - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::zero());

        sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE user_id IS NOT DISTINCT FROM $1 \
               AND amount = $2 \
               AND status = 'pending' \
               AND created_at > $3 \
             ORDER BY created_at DESC \
             LIMIT 1"
        ))
        .bind(user_id)
        .bind(amount)
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn update_status(
        &self,
        reference: &str,
        status: TransactionStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<Transaction, DatabaseError> {
        // Compare-and-swap: only a pending row transitions. Concurrent writers
        // racing on the same reference fall through to the unchanged-row read.
        let updated = sqlx::query_as::<_, Transaction>(&format!(
            "UPDATE transactions \
             SET status = $2, paid_at = COALESCE($3, paid_at), updated_at = NOW() \
             WHERE reference = $1 AND status = 'pending' \
             RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(reference)
        .bind(status.as_db_status())
        .bind(paid_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        match updated {
            Some(transaction) => Ok(transaction),
            // Already terminal (no-op) or unknown reference
            None => self
                .find_by_reference(reference)
                .await?
                .ok_or(DatabaseError::NotFound {
                    entity: format!("transaction {}", reference),
                }),
        }
    }

    async fn exists(&self, reference: &str) -> Result<bool, DatabaseError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE reference = $1")
                .bind(reference)
                .fetch_one(&self.pool)
                .await
                .map_err(DatabaseError::from_sqlx)?;

        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_terminal() {
        assert!(TransactionStatus::Success.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
        assert!(!TransactionStatus::Pending.is_terminal());
    }

    #[test]
    fn status_round_trips_through_db_strings() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Success,
            TransactionStatus::Failed,
        ] {
            assert_eq!(
                TransactionStatus::from_db_status(status.as_db_status()),
                Some(status)
            );
        }
        assert_eq!(TransactionStatus::from_db_status("reversed"), None);
    }
}
