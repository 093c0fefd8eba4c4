//! Common error types for netdev.
//!
//! This module provides the RPC status taxonomy used on the device wire
//! and the errors raised by the path policy and configuration resolution.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur throughout netdev.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A destination path was rejected by the download policy.
    #[error("path rejected: {0}")]
    Path(#[from] PathError),

    /// Configuration could not be resolved.
    #[error("configuration error: {0}")]
    Config(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Reasons a download destination path is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The path was the empty string.
    #[error("download path cannot be empty")]
    Empty,

    /// The path contained a NUL byte.
    #[error("download path contains null byte")]
    NullByte,

    /// The path was not absolute.
    #[error("download path must be absolute, got: {0}")]
    NotAbsolute(String),

    /// The cleaned path does not lie strictly inside an allowed root.
    #[error("download path must be inside {allowed} directories, got: {path}")]
    OutsideAllowedRoots {
        /// The cleaned path that was checked.
        path: String,
        /// Human-readable list of the allowed roots.
        allowed: String,
    },
}

/// Status codes carried by a failed device RPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RpcCode {
    /// The request was malformed.
    InvalidArgument,
    /// The request violated a security policy.
    PermissionDenied,
    /// The operation or protocol variant is not supported.
    Unimplemented,
    /// The caller's deadline expired before the operation finished.
    DeadlineExceeded,
    /// The peer is not able to serve the request right now.
    Unavailable,
    /// A local failure while servicing the request.
    Internal,
}

impl RpcCode {
    /// HTTP status used to carry this code on the wire.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::InvalidArgument => 400,
            Self::PermissionDenied => 403,
            Self::Unimplemented => 501,
            Self::DeadlineExceeded => 504,
            Self::Unavailable => 503,
            Self::Internal => 500,
        }
    }

    /// Best-effort mapping from an HTTP status when the body carried no code.
    #[must_use]
    pub const fn from_http_status(status: u16) -> Self {
        match status {
            400 | 404 | 405 | 415 | 422 => Self::InvalidArgument,
            401 | 403 => Self::PermissionDenied,
            501 => Self::Unimplemented,
            408 | 504 => Self::DeadlineExceeded,
            502 | 503 => Self::Unavailable,
            _ => Self::Internal,
        }
    }
}

impl fmt::Display for RpcCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidArgument => "InvalidArgument",
            Self::PermissionDenied => "PermissionDenied",
            Self::Unimplemented => "Unimplemented",
            Self::DeadlineExceeded => "DeadlineExceeded",
            Self::Unavailable => "Unavailable",
            Self::Internal => "Internal",
        };
        f.write_str(name)
    }
}

/// Error body returned by a device RPC that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct RpcStatus {
    /// Status code.
    pub code: RpcCode,
    /// Human-readable description.
    pub message: String,
}

impl RpcStatus {
    /// Create a new status.
    #[must_use]
    pub fn new(code: RpcCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_code_http_mapping() {
        assert_eq!(RpcCode::InvalidArgument.http_status(), 400);
        assert_eq!(RpcCode::PermissionDenied.http_status(), 403);
        assert_eq!(RpcCode::Unimplemented.http_status(), 501);
        assert_eq!(RpcCode::Internal.http_status(), 500);

        for code in [
            RpcCode::InvalidArgument,
            RpcCode::PermissionDenied,
            RpcCode::Unimplemented,
            RpcCode::DeadlineExceeded,
            RpcCode::Unavailable,
            RpcCode::Internal,
        ] {
            assert_eq!(RpcCode::from_http_status(code.http_status()), code);
        }
    }

    #[test]
    fn rpc_status_display() {
        let status = RpcStatus::new(RpcCode::Unimplemented, "Get is not implemented");
        assert_eq!(status.to_string(), "Unimplemented: Get is not implemented");
    }

    #[test]
    fn path_error_messages() {
        assert!(PathError::Empty.to_string().contains("cannot be empty"));
        assert!(PathError::NotAbsolute("a".into())
            .to_string()
            .contains("must be absolute"));
    }
}
