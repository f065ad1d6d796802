//! Health check handler.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

use super::RestState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub services: ServiceStatus,
}

/// Individual service status.
#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub cache: ServiceHealth,
}

/// Service health with optional error message.
#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Health check endpoint - verifies cache connectivity.
///
/// An unreachable cache reports `degraded` with status 200; user requests
/// are still served from the database.
pub async fn health_check(State(state): State<RestState>) -> Response {
    let cache = match state.cache.ping().await {
        Ok(()) => ServiceHealth {
            status: "healthy",
            error: None,
        },
        Err(e) => ServiceHealth {
            status: "unhealthy",
            error: Some(e.to_string()),
        },
    };

    let status = if cache.error.is_none() { "healthy" } else { "degraded" };
    let response = HealthResponse {
        status,
        services: ServiceStatus { cache },
    };

    (StatusCode::OK, Json(response)).into_response()
}
