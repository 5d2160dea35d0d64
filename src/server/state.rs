//! Serving-state machine.
//!
//! The listener comes up before any backend is ready. Until a route table is
//! installed every request except the health check gets a uniform 503; after
//! installation requests go to whichever complete table is current. Tables
//! are swapped whole, so a request sees either the old table or the new one.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use parking_lot::RwLock;
use tower::ServiceExt;
use uuid::Uuid;

use super::error::ApiError;
use super::health::HealthStatus;

/// Response header carrying the per-request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Id assigned to each request entering the gateway.
#[derive(Debug, Clone, Copy)]
pub struct RequestId(pub Uuid);

#[derive(Clone)]
pub struct ServingState {
    health_uri: Arc<str>,
    table: Arc<RwLock<Option<Router>>>,
}

impl ServingState {
    pub fn new(health_uri: impl Into<String>) -> Self {
        Self {
            health_uri: Arc::from(health_uri.into()),
            table: Arc::new(RwLock::new(None)),
        }
    }

    /// Install a complete route table, replacing any previous one.
    pub fn install(&self, router: Router) {
        let replaced = self.table.write().replace(router).is_some();
        tracing::info!(replaced, "Route table installed");
    }

    pub fn is_ready(&self) -> bool {
        self.table.read().is_some()
    }

    /// The installed table, if any.
    pub fn current(&self) -> Option<Router> {
        self.table.read().clone()
    }

    pub fn health_uri(&self) -> &str {
        &self.health_uri
    }

    /// The outer service: answers every path and method.
    pub fn into_router(self) -> Router {
        Router::new().fallback(serve).with_state(self)
    }
}

async fn serve(State(state): State<ServingState>, mut req: Request) -> Response {
    let request_id = Uuid::new_v4();
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(RequestId(request_id));

    let mut response = if path == state.health_uri() {
        Json(HealthStatus::healthy()).into_response()
    } else {
        match state.current() {
            Some(table) => match table.oneshot(req).await {
                Ok(response) => response,
                Err(never) => match never {},
            },
            None => ApiError::NotReady.into_response(),
        }
    };

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        "Request handled"
    );
    response
}
