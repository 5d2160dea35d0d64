//! Registration, login and identity endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::auth::{hash_password, verify_password, AuthError, CurrentUser};
use crate::server::{ApiError, AppContext};
use crate::users::{NewUser, UserView};

#[derive(Debug, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserView,
}

/// Unwrap a JSON body, reporting any rejection as a 400.
pub(super) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|_| ApiError::BadRequest("invalid request body".to_string()))
}

/// Trimmed, non-empty username.
pub(super) fn require_username(raw: &str) -> Result<String, ApiError> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(ApiError::BadRequest("username is required".to_string()));
    }
    Ok(username.to_string())
}

pub(super) fn check_password(password: &str, min_len: usize) -> Result<(), ApiError> {
    if password.trim().is_empty() {
        return Err(ApiError::BadRequest("password is required".to_string()));
    }
    if password.chars().count() < min_len {
        return Err(ApiError::BadRequest(format!(
            "password must be at least {} characters",
            min_len
        )));
    }
    Ok(())
}

/// Hash on the blocking pool.
pub(super) async fn hash_blocking(password: String) -> Result<String, ApiError> {
    Ok(tokio::task::spawn_blocking(move || hash_password(&password)).await??)
}

/// `POST /api/v1/auth/register`
///
/// The first account ever created becomes an admin.
pub async fn register(
    State(ctx): State<AppContext>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let creds = json_body(body)?;
    let username = require_username(&creds.username)?;
    check_password(&creds.password, ctx.config.min_password_len())?;
    if ctx.users.get_by_username(&username).is_some() {
        return Err(ApiError::Conflict("username already exists".to_string()));
    }

    let password_hash = hash_blocking(creds.password).await?;
    let user = ctx.users.create(NewUser {
        username,
        password_hash,
        role: None,
    })?;
    let token = ctx.tokens.issue(&user)?;

    Ok(Json(AuthResponse {
        token,
        user: UserView::from(&user),
    }))
}

/// `POST /api/v1/auth/login`
pub async fn login(
    State(ctx): State<AppContext>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let creds = json_body(body)?;
    let username = require_username(&creds.username)?;
    if creds.password.is_empty() {
        return Err(ApiError::BadRequest("password is required".to_string()));
    }

    let invalid = || ApiError::Auth(AuthError::InvalidCredentials);
    let user = ctx.users.get_by_username(&username).ok_or_else(invalid)?;

    let hash = user.password_hash.clone();
    let password = creds.password;
    let matches = tokio::task::spawn_blocking(move || verify_password(&hash, &password)).await?;
    if !matches {
        tracing::debug!(username = %username, "Login rejected");
        return Err(invalid());
    }

    let token = ctx.tokens.issue(&user)?;
    tracing::info!(user_id = user.id, "User logged in");
    Ok(Json(AuthResponse {
        token,
        user: UserView::from(&user),
    }))
}

/// `GET /api/v1/auth/me`
pub async fn me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<UserView> {
    Json(UserView::from(&user))
}

/// `POST /api/v1/auth/logout`
///
/// Tokens are stateless; the client discards its copy.
pub async fn logout() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "logged out successfully" }))
}
