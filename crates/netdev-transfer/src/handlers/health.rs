//! Health check endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::service::FileService;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Roots downloads may be written under.
    pub allowed_roots: Vec<String>,
}

/// Health check handler.
///
/// ```text
/// GET /health
///
/// Response: 200 OK
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "allowed_roots": ["/tmp", "/var/tmp"]
/// }
/// ```
pub async fn health(State(service): State<Arc<FileService>>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        allowed_roots: service.policy().roots().to_vec(),
    };

    (StatusCode::OK, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_returns_ok() {
        let service = Arc::new(FileService::new(None).unwrap());
        let response = health(State(service)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
