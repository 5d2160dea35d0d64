use axum::Json;
use serde::{Deserialize, Serialize};

pub const SERVICE_NAME: &str = "searchgate";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
}

impl HealthStatus {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            service: SERVICE_NAME.to_string(),
        }
    }
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus::healthy())
}
