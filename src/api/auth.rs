use axum::{
    extract::{Query, State},
    response::Redirect,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppErrorKind, ValidationError};
use crate::middleware::error::get_request_id_from_headers;
use crate::services::identity::{IdentityResolver, OAuthClient};

pub struct AuthState {
    pub oauth: Arc<OAuthClient>,
    pub resolver: Arc<IdentityResolver>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}

/// GET /auth/login
///
/// Redirects the client to the provider's hosted consent page.
pub async fn login(State(state): State<Arc<AuthState>>) -> Result<Redirect, AppError> {
    let url = state.oauth.authorization_url().map_err(AppError::from)?;
    Ok(Redirect::temporary(&url))
}

/// GET /auth/callback?code=...
///
/// Exchanges the authorization code, resolves the profile to a local user,
/// and returns the user's identity.
pub async fn callback(
    State(state): State<Arc<AuthState>>,
    headers: axum::http::HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<CallbackResponse>, AppError> {
    let request_id = get_request_id_from_headers(&headers);

    let code = query
        .code
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| {
            AppError::new(AppErrorKind::Validation(ValidationError::MissingField {
                field: "code".to_string(),
            }))
        })?;

    let profile = state
        .oauth
        .exchange_code(&code)
        .await
        .map_err(|e| attach(AppError::from(e), &request_id))?;

    let user = state
        .resolver
        .resolve(&profile)
        .await
        .map_err(|e| attach(AppError::from(e), &request_id))?;

    info!(user_id = %user.id, "login completed");

    Ok(Json(CallbackResponse {
        user_id: user.id,
        email: user.email,
        name: user.display_name,
        picture: user.avatar_url,
    }))
}

fn attach(err: AppError, request_id: &Option<String>) -> AppError {
    match request_id {
        Some(id) => err.with_request_id(id.clone()),
        None => err,
    }
}
