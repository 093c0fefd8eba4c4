//! Responder configuration.

use std::path::PathBuf;

use netdev_core::{resolve_endpoint, DeviceEndpoint, EndpointSource};

/// Listen endpoint used when configuration cannot be resolved.
pub const FALLBACK_HOST: &str = "localhost";

/// Environment variable naming the host root filesystem mount point.
pub const HOST_ROOT_ENV: &str = "HOST_ROOT_FS";

/// Configuration for the transfer responder.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Address to listen on.
    pub listen: DeviceEndpoint,
    /// Mount point of the host root filesystem, if downloads are written
    /// through one.
    pub host_root: Option<PathBuf>,
}

impl TransferConfig {
    /// Load configuration from the environment.
    ///
    /// The listen endpoint comes from `source`, falling back to
    /// `localhost:8080`.
    #[must_use]
    pub fn from_env<S: EndpointSource + ?Sized>(source: &S) -> Self {
        let listen = resolve_endpoint(
            source,
            DeviceEndpoint::new(FALLBACK_HOST, netdev_core::wire::DEFAULT_DEVICE_PORT),
        );
        let host_root = std::env::var(HOST_ROOT_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Self { listen, host_root }
    }

    /// Socket address string to bind.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        self.listen.to_string()
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            listen: DeviceEndpoint::new(FALLBACK_HOST, netdev_core::wire::DEFAULT_DEVICE_PORT),
            host_root: None,
        }
    }
}
