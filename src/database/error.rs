use thiserror::Error;

/// Errors surfaced by the persistence layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Duplicate key: {message}")]
    Duplicate { message: String },

    #[error("{entity} not found")]
    NotFound { entity: String },

    #[error("Database unavailable: {message}")]
    Unavailable { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },
}

impl DatabaseError {
    /// Map an sqlx error into our taxonomy. Unique-constraint violations
    /// (Postgres code 23505) become `Duplicate` so callers can translate them
    /// into a conflict instead of a server error.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound {
                entity: "row".to_string(),
            },
            sqlx::Error::Database(db_err) => {
                if db_err.code().as_deref() == Some("23505") {
                    DatabaseError::Duplicate {
                        message: db_err.message().to_string(),
                    }
                } else {
                    DatabaseError::Query {
                        message: db_err.message().to_string(),
                    }
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::Unavailable {
                    message: err.to_string(),
                }
            }
            _ => DatabaseError::Query {
                message: err.to_string(),
            },
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, DatabaseError::Unavailable { .. })
    }
}

impl From<DatabaseError> for crate::error::AppError {
    fn from(err: DatabaseError) -> Self {
        use crate::error::{AppError, AppErrorKind, InfrastructureError};

        let retryable = err.is_retryable();
        AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database {
            message: err.to_string(),
            is_retryable: retryable,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_errors_are_retryable() {
        let err = DatabaseError::Unavailable {
            message: "pool timed out".to_string(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn duplicate_errors_are_not_retryable() {
        let err = DatabaseError::Duplicate {
            message: "transactions_reference_key".to_string(),
        };
        assert!(!err.is_retryable());
    }
}
