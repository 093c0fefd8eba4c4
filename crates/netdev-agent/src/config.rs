//! Agent configuration.

use std::time::Duration;

use netdev_core::wire::DEFAULT_DEVICE_PORT;
use netdev_core::{resolve_endpoint, DeviceEndpoint, EndpointSource};

use crate::error::{AgentError, Result};

/// Default base URL firmware images are served from.
pub const DEFAULT_FIRMWARE_BASE_URL: &str = "http://10.250.0.1:8888";
/// Default device-side path an upgrade image is written to.
pub const DEFAULT_UPGRADE_DOWNLOAD_PATH: &str = "/tmp/sonic-upgrade.bin";
/// Default device-side path a preloaded image is written to.
pub const DEFAULT_PRELOAD_DOWNLOAD_PATH: &str = "/tmp/sonic-image.bin";

/// Configuration for a single-device agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Name of the `NetworkDevice` resource and of the device host.
    pub device_name: String,
    /// Namespace the resource lives in.
    pub namespace: String,
    /// Interval of the periodic version sync.
    pub sync_interval: Duration,
    /// Base URL for derived firmware URLs.
    pub firmware_base_url: String,
    /// Device-side destination of upgrade images.
    pub upgrade_download_path: String,
    /// Device-side destination of preloaded images.
    pub preload_download_path: String,
    /// Use the simulated device instead of the network.
    pub debug_mode: bool,
    /// Log upgrades the convergence check would start instead of starting them.
    pub dry_run: bool,
    /// Deadline for a preload transfer.
    pub preload_timeout: Duration,
    /// Deadline for each upgrade phase.
    pub upgrade_timeout: Duration,
    /// Deadline for a version query.
    pub query_timeout: Duration,
    /// Deadline for a status read or write.
    pub status_timeout: Duration,
}

impl AgentConfig {
    /// Create a configuration for `device_name` with all defaults.
    #[must_use]
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            namespace: "default".to_string(),
            sync_interval: Duration::from_secs(60),
            firmware_base_url: DEFAULT_FIRMWARE_BASE_URL.to_string(),
            upgrade_download_path: DEFAULT_UPGRADE_DOWNLOAD_PATH.to_string(),
            preload_download_path: DEFAULT_PRELOAD_DOWNLOAD_PATH.to_string(),
            debug_mode: false,
            dry_run: false,
            preload_timeout: Duration::from_secs(300),
            upgrade_timeout: Duration::from_secs(900),
            query_timeout: Duration::from_secs(10),
            status_timeout: Duration::from_secs(5),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Supported environment variables:
    /// - `DEVICE_NAME`: resource and device name (required)
    /// - `NAMESPACE`: resource namespace
    /// - `SYNC_INTERVAL_SECONDS`: periodic sync interval
    /// - `FIRMWARE_BASE_URL`: base URL for derived firmware URLs
    /// - `UPGRADE_DOWNLOAD_PATH`: device-side upgrade image path
    /// - `PRELOAD_DOWNLOAD_PATH`: device-side preload image path
    /// - `DEBUG_MODE`: `true` to simulate the device
    /// - `DRY_RUN`: `true` to only log periodic upgrades
    /// - `PRELOAD_TIMEOUT_SECONDS`, `UPGRADE_TIMEOUT_SECONDS`,
    ///   `QUERY_TIMEOUT_SECONDS`, `STATUS_TIMEOUT_SECONDS`: deadlines
    ///
    /// # Errors
    ///
    /// Returns an error if `DEVICE_NAME` is missing or empty.
    pub fn from_env() -> Result<Self> {
        let device_name = std::env::var("DEVICE_NAME")
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AgentError::Config("DEVICE_NAME environment variable is required".into()))?;

        let mut config = Self::new(device_name);

        if let Ok(val) = std::env::var("NAMESPACE") {
            config.namespace = val;
        }
        if let Ok(val) = std::env::var("FIRMWARE_BASE_URL") {
            config.firmware_base_url = val.trim_end_matches('/').to_string();
        }
        if let Ok(val) = std::env::var("UPGRADE_DOWNLOAD_PATH") {
            config.upgrade_download_path = val;
        }
        if let Ok(val) = std::env::var("PRELOAD_DOWNLOAD_PATH") {
            config.preload_download_path = val;
        }
        config.debug_mode = env_flag("DEBUG_MODE");
        config.dry_run = env_flag("DRY_RUN");

        for (name, field) in [
            ("SYNC_INTERVAL_SECONDS", &mut config.sync_interval),
            ("PRELOAD_TIMEOUT_SECONDS", &mut config.preload_timeout),
            ("UPGRADE_TIMEOUT_SECONDS", &mut config.upgrade_timeout),
            ("QUERY_TIMEOUT_SECONDS", &mut config.query_timeout),
            ("STATUS_TIMEOUT_SECONDS", &mut config.status_timeout),
        ] {
            if let Some(secs) = env_seconds(name) {
                *field = Duration::from_secs(secs);
            }
        }

        Ok(config)
    }

    /// Resolve the device endpoint from `source`, falling back to
    /// `<device_name>:8080`.
    #[must_use]
    pub fn device_endpoint<S: EndpointSource + ?Sized>(&self, source: &S) -> DeviceEndpoint {
        resolve_endpoint(
            source,
            DeviceEndpoint::new(self.device_name.clone(), DEFAULT_DEVICE_PORT),
        )
    }

    /// Firmware URL derived from a version when the resource names none.
    #[must_use]
    pub fn derived_firmware_url(&self, version: &str) -> String {
        format!("{}/sonic-vs-{version}.bin", self.firmware_base_url)
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| v == "true")
}

fn env_seconds(name: &str) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    match val.parse() {
        Ok(secs) if secs > 0 => Some(secs),
        _ => {
            tracing::warn!(variable = name, value = %val, "Ignoring invalid duration");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netdev_core::CoreError;

    struct Unavailable;

    impl EndpointSource for Unavailable {
        fn resolve(&self) -> netdev_core::Result<DeviceEndpoint> {
            Err(CoreError::Config("config store unreachable".into()))
        }
    }

    struct Fixed;

    impl EndpointSource for Fixed {
        fn resolve(&self) -> netdev_core::Result<DeviceEndpoint> {
            Ok(DeviceEndpoint::new("10.0.0.7", 9339))
        }
    }

    #[test]
    fn endpoint_falls_back_to_device_name() {
        let config = AgentConfig::new("leaf-01");
        let endpoint = config.device_endpoint(&Unavailable);
        assert_eq!(endpoint.to_string(), "leaf-01:8080");
        assert!(!endpoint.use_tls);

        assert_eq!(config.device_endpoint(&Fixed).to_string(), "10.0.0.7:9339");
    }

    #[test]
    fn defaults() {
        let config = AgentConfig::new("leaf-01");
        assert_eq!(config.namespace, "default");
        assert_eq!(config.sync_interval, Duration::from_secs(60));
        assert_eq!(config.upgrade_timeout, Duration::from_secs(900));
        assert_eq!(config.query_timeout, Duration::from_secs(10));
        assert_eq!(config.status_timeout, Duration::from_secs(5));
        assert!(!config.debug_mode);
        assert!(!config.dry_run);
    }

    #[test]
    fn derived_firmware_url() {
        let config = AgentConfig::new("leaf-01");
        assert_eq!(
            config.derived_firmware_url("202505.01"),
            "http://10.250.0.1:8888/sonic-vs-202505.01.bin"
        );
    }
}
