use crate::database::error::DatabaseError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, provider_user_id, email, display_name, avatar_url, \
     email_verified, created_at, updated_at";

/// User entity
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub provider_user_id: String,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a user from an OAuth profile
#[derive(Debug, Clone)]
pub struct NewUser {
    pub provider_user_id: String,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
}

/// Storage contract for users
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_provider_id(
        &self,
        provider_user_id: &str,
    ) -> Result<Option<User>, DatabaseError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;

    async fn create(&self, new: NewUser) -> Result<User, DatabaseError>;

    /// Refresh the profile fields carried by the identity provider.
    async fn update_profile(
        &self,
        id: Uuid,
        display_name: &str,
        avatar_url: Option<&str>,
    ) -> Result<User, DatabaseError>;

    /// Attach a provider identity to an existing account found by email.
    async fn link_provider_id(
        &self,
        id: Uuid,
        provider_user_id: &str,
    ) -> Result<User, DatabaseError>;
}

/// Postgres-backed user store
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserRepository {
    async fn find_by_provider_id(
        &self,
        provider_user_id: &str,
    ) -> Result<Option<User>, DatabaseError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE provider_user_id = $1"
        ))
        .bind(provider_user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn create(&self, new: NewUser) -> Result<User, DatabaseError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users \
             (provider_user_id, email, display_name, avatar_url, email_verified) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&new.provider_user_id)
        .bind(&new.email)
        .bind(&new.display_name)
        .bind(&new.avatar_url)
        .bind(new.email_verified)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        display_name: &str,
        avatar_url: Option<&str>,
    ) -> Result<User, DatabaseError> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users \
             SET display_name = $2, avatar_url = $3, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(display_name)
        .bind(avatar_url)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn link_provider_id(
        &self,
        id: Uuid,
        provider_user_id: &str,
    ) -> Result<User, DatabaseError> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users \
             SET provider_user_id = $2, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(provider_user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
