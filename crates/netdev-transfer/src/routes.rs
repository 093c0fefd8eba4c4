//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use netdev_core::wire::paths;
use tower_http::trace::TraceLayer;

use crate::handlers::{file, health};
use crate::service::FileService;

/// Create the responder router.
///
/// # Routes
///
/// - `GET /health` - Health check
/// - `POST /gnoi.file.File/TransferToRemote` - Pull a remote file
/// - `POST /gnoi.file.File/Get` - Unimplemented
/// - `POST /gnoi.file.File/Put` - Unimplemented
/// - `POST /gnoi.file.File/Stat` - Unimplemented
/// - `POST /gnoi.file.File/Remove` - Unimplemented
pub fn create_router(service: Arc<FileService>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route(
            paths::FILE_TRANSFER_TO_REMOTE,
            post(file::transfer_to_remote),
        )
        .route(paths::FILE_GET, post(file::get))
        .route(paths::FILE_PUT, post(file::put))
        .route(paths::FILE_STAT, post(file::stat))
        .route(paths::FILE_REMOVE, post(file::remove))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use netdev_core::wire::DEADLINE_HEADER;
    use netdev_core::{RpcCode, RpcStatus};
    use serde_json::json;
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn router() -> Router {
        create_router(Arc::new(FileService::new(None).unwrap()))
    }

    fn rpc(path: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn status_of(response: axum::response::Response) -> RpcStatus {
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_served() {
        let response = router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn stubs_answer_unimplemented() {
        for path in [paths::FILE_GET, paths::FILE_PUT, paths::FILE_STAT, paths::FILE_REMOVE] {
            let response = router().oneshot(rpc(path, json!({}))).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED, "{path}");
            assert_eq!(status_of(response).await.code, RpcCode::Unimplemented);
        }
    }

    #[tokio::test]
    async fn policy_violation_is_forbidden() {
        let response = router()
            .oneshot(rpc(
                paths::FILE_TRANSFER_TO_REMOTE,
                json!({
                    "localPath": "/tmp/../etc/passwd",
                    "remoteDownload": { "path": "http://images/x.bin", "protocol": "HTTP" }
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let status = status_of(response).await;
        assert_eq!(status.code, RpcCode::PermissionDenied);
        assert!(status.message.contains("/etc/passwd"));
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_argument() {
        let request = Request::post(paths::FILE_TRANSFER_TO_REMOTE)
            .body(Body::from("not json"))
            .unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(response).await.code, RpcCode::InvalidArgument);
    }

    #[tokio::test]
    async fn caller_deadline_bounds_transfer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"slow".to_vec())
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let mut request = rpc(
            paths::FILE_TRANSFER_TO_REMOTE,
            json!({
                "localPath": "/tmp/netdev-deadline-test/image.bin",
                "remoteDownload": { "path": format!("{}/image.bin", server.uri()), "protocol": "HTTP" }
            }),
        );
        request
            .headers_mut()
            .insert(DEADLINE_HEADER, "100".parse().unwrap());

        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(status_of(response).await.code, RpcCode::DeadlineExceeded);
    }
}
