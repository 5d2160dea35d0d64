//! Error types and response handling for the HTTP API.
//!
//! Every handler error becomes a JSON body with a single `error` message and
//! a status derived from the variant.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::auth::AuthError;
use crate::backend::RegistryError;
use crate::config::ConfigError;
use crate::users::StoreError;

/// Errors a request handler can return.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed body, missing field or bad value
    #[error("{0}")]
    BadRequest(String),

    /// Authentication or role failures
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Valid identity, but the operation is not allowed
    #[error("{0}")]
    Forbidden(String),

    /// Unknown repository or user
    #[error("{0}")]
    NotFound(String),

    /// Duplicate username or repository
    #[error("{0}")]
    Conflict(String),

    /// No route table installed yet
    #[error("searchgate is not ready")]
    NotReady,

    /// Configuration persistence errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// User store errors other than conflicts
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => ApiError::Conflict("username already exists".to_string()),
            other => ApiError::Storage(other.to_string()),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Duplicate(name) => {
                ApiError::Conflict(format!("Repository {} already exists", name))
            }
            RegistryError::Missing(name) => {
                ApiError::NotFound(format!("No such repository: {}", name))
            }
            RegistryError::Storage(e) => ApiError::Config(e),
            RegistryError::Construction(e) => {
                ApiError::Internal(format!("Failed to create searcher: {}", e))
            }
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl ApiError {
    /// Map error variant to appropriate HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(AuthError::Forbidden) => StatusCode::FORBIDDEN,
            ApiError::Auth(e) if e.is_unauthenticated() => StatusCode::UNAUTHORIZED,
            ApiError::Auth(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable classification, used in logs
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "invalid_request",
            ApiError::Auth(AuthError::Forbidden) => "forbidden",
            ApiError::Auth(e) if e.is_unauthenticated() => "unauthenticated",
            ApiError::Auth(_) => "auth_error",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::NotReady => "not_ready",
            ApiError::Config(_) => "config_error",
            ApiError::Storage(_) => "storage_error",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(error_type = self.error_type(), error = %self, "Request failed");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
