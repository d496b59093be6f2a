//! OAuth login and identity resolution
//!
//! [`OAuthClient`] drives the authorization-code flow against the provider;
//! [`IdentityResolver`] maps the returned profile onto a local user record
//! with create-or-link-or-update semantics.

use crate::database::error::DatabaseError;
use crate::database::user_repository::{NewUser, User, UserStore};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid authorization code")]
    InvalidAuthorizationCode,

    #[error("identity provider error: {message}")]
    Provider { message: String },

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

impl From<IdentityError> for crate::error::AppError {
    fn from(err: IdentityError) -> Self {
        use crate::error::{AppError, AppErrorKind, DomainError, ExternalError};

        match err {
            IdentityError::InvalidAuthorizationCode => {
                AppError::new(AppErrorKind::Domain(DomainError::InvalidAuthorizationCode))
            }
            IdentityError::Provider { message } => {
                AppError::new(AppErrorKind::External(ExternalError::OAuthProvider {
                    message,
                }))
            }
            IdentityError::Store(db_err) => db_err.into(),
        }
    }
}

/// OAuth provider configuration
///
/// Endpoint defaults target Google; any provider implementing the
/// authorization-code flow with a userinfo endpoint works behind the same
/// configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub timeout_secs: u64,
}

impl OAuthConfig {
    pub fn from_env() -> Result<Self, IdentityError> {
        let require = |key: &str| {
            std::env::var(key).map_err(|_| IdentityError::Provider {
                message: format!("{} environment variable is required", key),
            })
        };

        Ok(Self {
            client_id: require("OAUTH_CLIENT_ID")?,
            client_secret: require("OAUTH_CLIENT_SECRET")?,
            redirect_uri: require("OAUTH_REDIRECT_URI")?,
            auth_url: std::env::var("OAUTH_AUTH_URL")
                .unwrap_or_else(|_| "https://accounts.google.com/o/oauth2/v2/auth".to_string()),
            token_url: std::env::var("OAUTH_TOKEN_URL")
                .unwrap_or_else(|_| "https://oauth2.googleapis.com/token".to_string()),
            userinfo_url: std::env::var("OAUTH_USERINFO_URL")
                .unwrap_or_else(|_| "https://www.googleapis.com/oauth2/v2/userinfo".to_string()),
            timeout_secs: std::env::var("OAUTH_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(15),
        })
    }
}

/// Profile returned by the provider's userinfo endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    #[serde(default)]
    pub verified_email: bool,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// HTTP client for the OAuth provider
pub struct OAuthClient {
    config: OAuthConfig,
    http: reqwest::Client,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig) -> Result<Self, IdentityError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| IdentityError::Provider {
                message: format!("failed to initialize HTTP client: {}", e),
            })?;

        Ok(Self { config, http })
    }

    pub fn from_env() -> Result<Self, IdentityError> {
        Self::new(OAuthConfig::from_env()?)
    }

    /// Build the provider authorization URL the client is redirected to.
    pub fn authorization_url(&self) -> Result<String, IdentityError> {
        let url = reqwest::Url::parse_with_params(
            &self.config.auth_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| IdentityError::Provider {
            message: format!("invalid authorization URL: {}", e),
        })?;

        Ok(url.into())
    }

    /// Exchange an authorization code for an access token and fetch the
    /// user's profile.
    pub async fn exchange_code(&self, code: &str) -> Result<ProviderProfile, IdentityError> {
        let params = [
            ("code", code),
            ("client_id", &self.config.client_id),
            ("client_secret", &self.config.client_secret),
            ("redirect_uri", &self.config.redirect_uri),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| IdentityError::Provider {
                message: format!("token request failed: {}", e),
            })?;

        let status = response.status();
        if status.as_u16() == 400 || status.as_u16() == 401 {
            return Err(IdentityError::InvalidAuthorizationCode);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(IdentityError::Provider {
                message: format!("token exchange failed: HTTP {}: {}", status, text),
            });
        }

        let token: TokenResponse =
            response.json().await.map_err(|e| IdentityError::Provider {
                message: format!("invalid token response: {}", e),
            })?;

        let response = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| IdentityError::Provider {
                message: format!("userinfo request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(IdentityError::Provider {
                message: format!("userinfo fetch failed: HTTP {}: {}", status, text),
            });
        }

        response.json().await.map_err(|e| IdentityError::Provider {
            message: format!("invalid userinfo response: {}", e),
        })
    }
}

/// Maps a provider profile onto a local user
///
/// Lookup precedence is provider id first, then email, then create. The email
/// fallback links the provider identity to an account registered through a
/// different identity, so one human never gets two rows.
pub struct IdentityResolver {
    users: Arc<dyn UserStore>,
}

impl IdentityResolver {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    pub async fn resolve(&self, profile: &ProviderProfile) -> Result<User, DatabaseError> {
        if let Some(user) = self.users.find_by_provider_id(&profile.id).await? {
            return self
                .users
                .update_profile(user.id, &profile.name, profile.picture.as_deref())
                .await;
        }

        if let Some(user) = self.users.find_by_email(&profile.email).await? {
            info!(user_id = %user.id, "linking provider identity to existing account");
            return self.users.link_provider_id(user.id, &profile.id).await;
        }

        info!(email = %profile.email, "creating user from provider profile");
        self.users
            .create(NewUser {
                provider_user_id: profile.id.clone(),
                email: profile.email.clone(),
                display_name: profile.name.clone(),
                avatar_url: profile.picture.clone(),
                email_verified: profile.verified_email,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct MemoryUserStore {
        users: Mutex<Vec<User>>,
    }

    impl MemoryUserStore {
        fn new() -> Self {
            Self {
                users: Mutex::new(Vec::new()),
            }
        }

        fn seed(&self, user: User) {
            self.users.lock().unwrap().push(user);
        }
    }

    #[async_trait]
    impl UserStore for MemoryUserStore {
        async fn find_by_provider_id(
            &self,
            provider_user_id: &str,
        ) -> Result<Option<User>, DatabaseError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.provider_user_id == provider_user_id)
                .cloned())
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.email == email)
                .cloned())
        }

        async fn create(&self, new: NewUser) -> Result<User, DatabaseError> {
            let user = User {
                id: Uuid::new_v4(),
                provider_user_id: new.provider_user_id,
                email: new.email,
                display_name: new.display_name,
                avatar_url: new.avatar_url,
                email_verified: new.email_verified,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            self.users.lock().unwrap().push(user.clone());
            Ok(user)
        }

        async fn update_profile(
            &self,
            id: Uuid,
            display_name: &str,
            avatar_url: Option<&str>,
        ) -> Result<User, DatabaseError> {
            let mut users = self.users.lock().unwrap();
            let user = users
                .iter_mut()
                .find(|u| u.id == id)
                .ok_or(DatabaseError::NotFound {
                    entity: "user".to_string(),
                })?;
            user.display_name = display_name.to_string();
            user.avatar_url = avatar_url.map(|v| v.to_string());
            Ok(user.clone())
        }

        async fn link_provider_id(
            &self,
            id: Uuid,
            provider_user_id: &str,
        ) -> Result<User, DatabaseError> {
            let mut users = self.users.lock().unwrap();
            let user = users
                .iter_mut()
                .find(|u| u.id == id)
                .ok_or(DatabaseError::NotFound {
                    entity: "user".to_string(),
                })?;
            user.provider_user_id = provider_user_id.to_string();
            Ok(user.clone())
        }
    }

    fn profile() -> ProviderProfile {
        ProviderProfile {
            id: "google-123".to_string(),
            email: "a@x.com".to_string(),
            name: "Ada".to_string(),
            picture: Some("https://example.com/ada.png".to_string()),
            verified_email: true,
        }
    }

    fn seeded_user(provider_user_id: &str, email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            provider_user_id: provider_user_id.to_string(),
            email: email.to_string(),
            display_name: "Old Name".to_string(),
            avatar_url: None,
            email_verified: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn creates_user_on_first_login() {
        let store = Arc::new(MemoryUserStore::new());
        let resolver = IdentityResolver::new(store.clone());

        let user = resolver.resolve(&profile()).await.unwrap();

        assert_eq!(user.provider_user_id, "google-123");
        assert_eq!(user.email, "a@x.com");
        assert_eq!(store.users.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn refreshes_profile_for_known_provider_id() {
        let store = Arc::new(MemoryUserStore::new());
        store.seed(seeded_user("google-123", "a@x.com"));
        let resolver = IdentityResolver::new(store.clone());

        let user = resolver.resolve(&profile()).await.unwrap();

        assert_eq!(user.display_name, "Ada");
        assert_eq!(
            user.avatar_url.as_deref(),
            Some("https://example.com/ada.png")
        );
        assert_eq!(store.users.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn links_provider_id_to_existing_email() {
        let store = Arc::new(MemoryUserStore::new());
        store.seed(seeded_user("old-provider-id", "a@x.com"));
        let resolver = IdentityResolver::new(store.clone());

        let user = resolver.resolve(&profile()).await.unwrap();

        assert_eq!(user.provider_user_id, "google-123");
        assert_eq!(store.users.lock().unwrap().len(), 1);
    }
}
