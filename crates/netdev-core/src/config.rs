//! Device endpoint resolution.
//!
//! Connection settings come from an external source. When that source is
//! unavailable the caller falls back to a fixed default endpoint; this is
//! the only degraded mode visible at startup.

use std::fmt;

use crate::error::{CoreError, Result};
use crate::wire::DEFAULT_DEVICE_PORT;

/// A resolved device RPC endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEndpoint {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Whether to use TLS for the connection.
    pub use_tls: bool,
}

impl DeviceEndpoint {
    /// Create a plaintext endpoint.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            use_tls: false,
        }
    }

    /// Parse `host:port` or a bare host, defaulting the port.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is empty or the port is not a number.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let (host, port) = match value.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| CoreError::Config(format!("invalid port in endpoint {value}")))?;
                (host, port)
            }
            None => (value, DEFAULT_DEVICE_PORT),
        };

        if host.is_empty() {
            return Err(CoreError::Config(format!("empty host in endpoint {value:?}")));
        }

        Ok(Self::new(host, port))
    }

    /// Base URL for RPC calls, e.g. `http://leaf-01:8080`.
    #[must_use]
    pub fn base_url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for DeviceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Source of connection settings.
pub trait EndpointSource {
    /// Resolve the endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the source has no usable settings.
    fn resolve(&self) -> Result<DeviceEndpoint>;
}

/// Reads `GNOI_ENDPOINT` and `GNOI_USE_TLS` from the environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvEndpointSource;

/// Environment variable holding `host:port`.
pub const ENDPOINT_ENV: &str = "GNOI_ENDPOINT";
/// Environment variable holding `true`/`false`.
pub const USE_TLS_ENV: &str = "GNOI_USE_TLS";

impl EndpointSource for EnvEndpointSource {
    fn resolve(&self) -> Result<DeviceEndpoint> {
        let value = std::env::var(ENDPOINT_ENV)
            .map_err(|_| CoreError::Config(format!("{ENDPOINT_ENV} is not set")))?;
        let mut endpoint = DeviceEndpoint::parse(&value)?;
        endpoint.use_tls = std::env::var(USE_TLS_ENV)
            .is_ok_and(|v| v.eq_ignore_ascii_case("true") || v == "1");
        Ok(endpoint)
    }
}

/// Resolve from `source`, falling back to `fallback` on any failure.
pub fn resolve_endpoint<S: EndpointSource + ?Sized>(
    source: &S,
    fallback: DeviceEndpoint,
) -> DeviceEndpoint {
    match source.resolve() {
        Ok(endpoint) => {
            tracing::info!(
                endpoint = %endpoint,
                use_tls = endpoint.use_tls,
                "Resolved device endpoint from configuration"
            );
            endpoint
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                fallback = %fallback,
                "Failed to resolve device endpoint, using fallback"
            );
            fallback
        }
    }
}
