//! Request authorization middleware.
//!
//! [`authenticate`] runs on every routed request. Public routes pass through
//! untouched; everything else needs a valid bearer token for a user that still
//! exists, and gets a [`CurrentUser`] extension for downstream handlers.
//! [`require_admin`] is layered separately on administrative routes.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, Request};
use axum::middleware::Next;
use axum::response::Response;

use super::token::TokenService;
use super::AuthError;
use crate::server::ApiError;
use crate::users::{User, UserStore};

/// The authenticated caller, placed into request extensions.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Routes reachable without a token. Matched by exact method and path.
const PUBLIC_ROUTES: &[(&str, &str)] = &[
    ("GET", "/api/v1/health"),
    ("GET", "/api/v1/repos"),
    ("GET", "/api/v1/search"),
    ("GET", "/api/v1/excludes"),
    ("POST", "/api/v1/auth/register"),
    ("POST", "/api/v1/auth/login"),
];

/// Whether a request bypasses authentication.
///
/// API routes must match the allow-list exactly. Anything outside `/api/`
/// is a static asset and public for reads.
pub fn is_public(method: &Method, path: &str) -> bool {
    if path == "/api" || path.starts_with("/api/") {
        return PUBLIC_ROUTES
            .iter()
            .any(|(m, p)| *m == method.as_str() && *p == path);
    }
    *method == Method::GET || *method == Method::HEAD
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;

    let mut parts = value.splitn(2, ' ');
    match (parts.next(), parts.next()) {
        (Some(scheme), Some(token))
            if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() =>
        {
            Ok(token.trim())
        }
        _ => Err(AuthError::MalformedHeader),
    }
}

/// Resolves bearer tokens to live users.
#[derive(Clone)]
pub struct AuthGate {
    tokens: TokenService,
    users: Arc<dyn UserStore>,
}

impl AuthGate {
    pub fn new(tokens: TokenService, users: Arc<dyn UserStore>) -> Self {
        Self { tokens, users }
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> Result<User, AuthError> {
        let token = bearer_token(headers)?;
        let claims = self.tokens.verify(token)?;
        self.users
            .get(claims.user_id)
            .ok_or(AuthError::UnknownUser)
    }
}

pub async fn authenticate(
    State(gate): State<AuthGate>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if is_public(req.method(), req.uri().path()) {
        return Ok(next.run(req).await);
    }

    match gate.authenticate(req.headers()) {
        Ok(user) => {
            tracing::debug!(user_id = user.id, path = %req.uri().path(), "Authenticated");
            req.extensions_mut().insert(CurrentUser(user));
            Ok(next.run(req).await)
        }
        Err(err) => {
            tracing::debug!(
                method = %req.method(),
                path = %req.uri().path(),
                error = %err,
                "Rejected unauthenticated request"
            );
            Err(err.into())
        }
    }
}

/// Reject callers without the admin role.
pub async fn require_admin(req: Request<Body>, next: Next) -> Result<Response, ApiError> {
    let Some(CurrentUser(user)) = req.extensions().get::<CurrentUser>() else {
        return Err(AuthError::MissingHeader.into());
    };
    if !user.is_admin() {
        tracing::debug!(user_id = user.id, path = %req.uri().path(), "Admin role required");
        return Err(AuthError::Forbidden.into());
    }
    Ok(next.run(req).await)
}
