//! Simulated device for debug mode.
//!
//! Answers every call with a canned response after a short pause and never
//! opens a connection.

use std::time::Duration;

use async_trait::async_trait;

use crate::client::{DeviceClient, InstallRequest};
use crate::error::Result;
use crate::file::FileTransferClient;

/// Version reported by the simulated device unless overridden.
pub const DEFAULT_SIMULATED_VERSION: &str = "SONiC-OS-20250505.03";

/// A device client that fakes every call.
#[derive(Debug, Clone)]
pub struct SimulatedDeviceClient {
    version: String,
    install_delay: Duration,
    reboot_delay: Duration,
}

impl Default for SimulatedDeviceClient {
    fn default() -> Self {
        Self {
            version: DEFAULT_SIMULATED_VERSION.to_string(),
            install_delay: Duration::from_secs(2),
            reboot_delay: Duration::from_secs(1),
        }
    }
}

impl SimulatedDeviceClient {
    /// Create a simulated device with the default version and delays.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the reported version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Override the simulated processing times.
    #[must_use]
    pub const fn with_delays(mut self, install: Duration, reboot: Duration) -> Self {
        self.install_delay = install;
        self.reboot_delay = reboot;
        self
    }
}

#[async_trait]
impl DeviceClient for SimulatedDeviceClient {
    async fn query_version(&self, _timeout: Duration) -> Result<String> {
        tracing::debug!(version = %self.version, "Simulated version query");
        Ok(self.version.clone())
    }

    async fn install_package(&self, request: &InstallRequest, _timeout: Duration) -> Result<()> {
        tracing::info!(
            source_url = %request.source_url,
            target_version = %request.target_version,
            activate = request.activate,
            "Simulating package install"
        );
        tokio::time::sleep(self.install_delay).await;
        Ok(())
    }

    async fn reboot(&self, _timeout: Duration) -> Result<()> {
        tracing::info!("Simulating reboot");
        tokio::time::sleep(self.reboot_delay).await;
        Ok(())
    }
}

#[async_trait]
impl FileTransferClient for SimulatedDeviceClient {
    async fn transfer_to_remote(
        &self,
        source_url: &str,
        remote_path: &str,
        _timeout: Duration,
    ) -> Result<()> {
        tracing::info!(source_url, remote_path, "Simulating remote transfer");
        tokio::time::sleep(self.install_delay).await;
        Ok(())
    }
}
