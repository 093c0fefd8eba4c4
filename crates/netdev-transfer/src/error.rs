//! RPC error types and responses.
//!
//! Every failed call answers with the HTTP status of its code and an
//! [`RpcStatus`] body.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use netdev_core::{PathError, RpcCode, RpcStatus};
use thiserror::Error;

/// A result type using `RpcError`.
pub type Result<T> = std::result::Result<T, RpcError>;

/// RPC error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The request was malformed.
    #[error("{0}")]
    InvalidArgument(String),

    /// The destination violates the download policy.
    #[error("invalid download path: {0}")]
    PermissionDenied(#[from] PathError),

    /// The operation or protocol is not supported.
    #[error("{0}")]
    Unimplemented(String),

    /// The caller's deadline ran out.
    #[error("deadline of {0}ms exceeded")]
    DeadlineExceeded(u64),

    /// Local I/O or HTTP failure while servicing the request.
    #[error("{0}")]
    Internal(String),
}

/// Failure while pulling a file onto the local filesystem.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The HTTP request could not be sent.
    #[error("HTTP request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// The server answered with something other than 200.
    #[error("HTTP request failed with status: {0}")]
    Status(reqwest::StatusCode),

    /// The destination directory could not be created.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        /// Directory that was being created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The destination file could not be opened for writing.
    #[error("failed to create file {}: {source}", path.display())]
    CreateFile {
        /// File that was being created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The response body broke off.
    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),

    /// Writing the destination file failed.
    #[error("failed to write file: {0}")]
    Write(#[source] std::io::Error),
}

impl From<DownloadError> for RpcError {
    fn from(err: DownloadError) -> Self {
        Self::Internal(format!("download failed: {err}"))
    }
}

impl RpcError {
    /// Status code carried on the wire.
    #[must_use]
    pub const fn code(&self) -> RpcCode {
        match self {
            Self::InvalidArgument(_) => RpcCode::InvalidArgument,
            Self::PermissionDenied(_) => RpcCode::PermissionDenied,
            Self::Unimplemented(_) => RpcCode::Unimplemented,
            Self::DeadlineExceeded(_) => RpcCode::DeadlineExceeded,
            Self::Internal(_) => RpcCode::Internal,
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.code().http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// `Unimplemented` for a stub RPC.
    #[must_use]
    pub fn unimplemented(rpc: &str) -> Self {
        Self::Unimplemented(format!("{rpc} is not implemented"))
    }
}

impl From<&RpcError> for RpcStatus {
    fn from(err: &RpcError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if matches!(self, Self::Internal(_)) {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(code = %self.code(), error = %self, "Request rejected");
        }
        (status, Json(RpcStatus::from(&self))).into_response()
    }
}
