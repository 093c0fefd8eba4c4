//! Error types for the agent crate.

use netdev_device::DeviceError;
use thiserror::Error;

/// Errors that can occur while reconciling a device.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Kubernetes API error.
    #[error("Kubernetes API error: {0}")]
    KubeApi(#[from] kube::Error),

    /// The device resource does not exist.
    #[error("NetworkDevice not found: {0}")]
    NotFound(String),

    /// A device call failed.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// A status read or write did not finish in time.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// What was being done.
        operation: &'static str,
        /// Deadline that expired.
        timeout_ms: u128,
    },

    /// A device call was abandoned because the agent is shutting down.
    #[error("{0} cancelled by shutdown")]
    Cancelled(&'static str),

    /// The resource asks for something the agent cannot do.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Check if this error is retriable.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::KubeApi(_) | Self::Timeout { .. } | Self::Cancelled(_) => true,
            Self::Device(e) => e.is_retriable(),
            Self::NotFound(_)
            | Self::InvalidRequest(_)
            | Self::Config(_)
            | Self::Internal(_) => false,
        }
    }
}

/// A specialized Result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
