//! File RPC endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use netdev_core::wire::{TransferToRemoteRequest, TransferToRemoteResponse, DEADLINE_HEADER};

use crate::error::{Result, RpcError};
use crate::service::FileService;

/// Read the caller's deadline, if one was sent.
fn deadline(headers: &HeaderMap) -> Result<Option<u64>> {
    let Some(value) = headers.get(DEADLINE_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .map(Some)
        .ok_or_else(|| RpcError::InvalidArgument(format!("invalid {DEADLINE_HEADER} header")))
}

/// `File.TransferToRemote`.
///
/// The transfer is abandoned with `DeadlineExceeded` once the caller's
/// deadline runs out.
pub async fn transfer_to_remote(
    State(service): State<Arc<FileService>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TransferToRemoteResponse>> {
    let request: TransferToRemoteRequest = serde_json::from_slice(&body)
        .map_err(|e| RpcError::InvalidArgument(format!("invalid request body: {e}")))?;

    match deadline(&headers)? {
        Some(ms) => {
            tokio::time::timeout(
                Duration::from_millis(ms),
                service.transfer_to_remote(&request),
            )
            .await
            .map_err(|_| {
                tracing::warn!(
                    local_path = %request.local_path,
                    deadline_ms = ms,
                    "Transfer abandoned at caller deadline"
                );
                RpcError::DeadlineExceeded(ms)
            })??;
        }
        None => {
            service.transfer_to_remote(&request).await?;
        }
    }

    Ok(Json(TransferToRemoteResponse {}))
}

/// `File.Get`.
pub async fn get(State(service): State<Arc<FileService>>) -> Result<Json<()>> {
    service.get().map(Json)
}

/// `File.Put`.
pub async fn put(State(service): State<Arc<FileService>>) -> Result<Json<()>> {
    service.put().map(Json)
}

/// `File.Stat`.
pub async fn stat(State(service): State<Arc<FileService>>) -> Result<Json<()>> {
    service.stat().map(Json)
}

/// `File.Remove`.
pub async fn remove(State(service): State<Arc<FileService>>) -> Result<Json<()>> {
    service.remove().map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn deadline_header_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(deadline(&headers).unwrap(), None);

        headers.insert(DEADLINE_HEADER, HeaderValue::from_static("1500"));
        assert_eq!(deadline(&headers).unwrap(), Some(1500));

        headers.insert(DEADLINE_HEADER, HeaderValue::from_static("soon"));
        assert!(deadline(&headers).is_err());
    }
}
