//! Authentication: password hashing, bearer tokens and the request gate.

mod gate;
mod password;
mod token;

use thiserror::Error;

pub use gate::{authenticate, bearer_token, is_public, require_admin, AuthGate, CurrentUser};
pub use password::{hash_password, verify_password};
pub use token::{resolve_secret, Claims, TokenService, ISSUER, SECRET_ENV};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization header required")]
    MissingHeader,

    #[error("invalid authorization header format")]
    MalformedHeader,

    #[error("invalid or expired token: {0}")]
    InvalidToken(String),

    #[error("user not found")]
    UnknownUser,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("insufficient permissions")]
    Forbidden,

    #[error("failed to hash password: {0}")]
    Hashing(String),

    #[error("failed to generate JWT secret: {0}")]
    Secret(String),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl AuthError {
    /// Whether this is an unauthenticated (as opposed to forbidden or internal) failure.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            AuthError::MissingHeader
                | AuthError::MalformedHeader
                | AuthError::InvalidToken(_)
                | AuthError::UnknownUser
                | AuthError::InvalidCredentials
        )
    }
}
