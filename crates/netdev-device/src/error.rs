//! Error types for device RPCs.

use netdev_core::{RpcCode, RpcStatus};
use thiserror::Error;

/// A result type using `DeviceError`.
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Errors that can occur while talking to a device.
#[derive(Debug, Clone, Error)]
pub enum DeviceError {
    /// The device could not be reached.
    #[error("failed to connect to device {endpoint}: {message}")]
    Connect {
        /// Endpoint that was dialled.
        endpoint: String,
        /// Transport error detail.
        message: String,
    },

    /// The call did not finish within the caller's deadline.
    #[error("device call {method} timed out after {timeout_ms}ms")]
    Timeout {
        /// RPC method path.
        method: &'static str,
        /// Deadline that expired.
        timeout_ms: u128,
    },

    /// The device accepted the call and reported a failure.
    #[error("device call {method} failed: {status}")]
    Remote {
        /// RPC method path.
        method: &'static str,
        /// Status returned by the device.
        status: RpcStatus,
    },

    /// A streaming call broke while sending or awaiting the acknowledgement.
    #[error("stream {method} failed: {message}")]
    Stream {
        /// RPC method path.
        method: &'static str,
        /// Failure detail.
        message: String,
    },

    /// The device answered with a body that could not be decoded.
    #[error("invalid response from {method}: {message}")]
    Decode {
        /// RPC method path.
        method: &'static str,
        /// Decode error detail.
        message: String,
    },
}

impl DeviceError {
    /// Whether the failure happened before the device accepted the call.
    #[must_use]
    pub const fn is_connect(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::Timeout { .. })
    }

    /// The remote status code, if the device returned one.
    #[must_use]
    pub const fn remote_code(&self) -> Option<RpcCode> {
        match self {
            Self::Remote { status, .. } => Some(status.code),
            _ => None,
        }
    }

    /// Whether another attempt could succeed without changing the request.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Connect { .. } | Self::Timeout { .. } | Self::Stream { .. } => true,
            Self::Remote { status, .. } => matches!(
                status.code,
                RpcCode::Unavailable | RpcCode::DeadlineExceeded | RpcCode::Internal
            ),
            Self::Decode { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let connect = DeviceError::Connect {
            endpoint: "leaf-01:8080".into(),
            message: "refused".into(),
        };
        assert!(connect.is_connect());
        assert!(connect.is_retriable());

        let denied = DeviceError::Remote {
            method: "/gnoi.file.File/TransferToRemote",
            status: RpcStatus::new(RpcCode::PermissionDenied, "bad path"),
        };
        assert!(!denied.is_connect());
        assert!(!denied.is_retriable());
        assert_eq!(denied.remote_code(), Some(RpcCode::PermissionDenied));
        assert!(denied.to_string().contains("PermissionDenied: bad path"));
    }
}
