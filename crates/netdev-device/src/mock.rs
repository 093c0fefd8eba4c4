//! In-memory device doubles for tests.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::{DeviceClient, InstallRequest};
use crate::error::{DeviceError, Result};
use crate::file::FileTransferClient;

/// A call recorded by a mock client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    /// `query_version`.
    QueryVersion,
    /// `install_package` with its arguments.
    Install(InstallRequest),
    /// `reboot`.
    Reboot,
    /// `transfer_to_remote` with the source URL and destination path.
    Transfer {
        /// Source URL.
        source_url: String,
        /// Destination on the device.
        remote_path: String,
    },
}

#[derive(Default)]
struct Failures {
    query: Option<DeviceError>,
    install: Option<DeviceError>,
    reboot: Option<DeviceError>,
    transfer: Option<DeviceError>,
}

/// A device that records calls and returns scripted results.
///
/// Failures stay in place until cleared, so every call to a failing
/// operation fails the same way.
pub struct MockDeviceClient {
    version: Mutex<String>,
    calls: Mutex<Vec<DeviceCall>>,
    failures: Mutex<Failures>,
    install_delay: Mutex<Duration>,
}

impl Default for MockDeviceClient {
    fn default() -> Self {
        Self::new("")
    }
}

impl MockDeviceClient {
    /// Create a mock device reporting `version`.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: Mutex::new(version.into()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(Failures::default()),
            install_delay: Mutex::new(Duration::ZERO),
        }
    }

    /// Change the reported version.
    pub fn set_version(&self, version: impl Into<String>) {
        *self.version.lock() = version.into();
    }

    /// Make `query_version` fail, or succeed again with `None`.
    pub fn fail_query(&self, error: Option<DeviceError>) {
        self.failures.lock().query = error;
    }

    /// Make `install_package` fail, or succeed again with `None`.
    pub fn fail_install(&self, error: Option<DeviceError>) {
        self.failures.lock().install = error;
    }

    /// Make `reboot` fail, or succeed again with `None`.
    pub fn fail_reboot(&self, error: Option<DeviceError>) {
        self.failures.lock().reboot = error;
    }

    /// Make `transfer_to_remote` fail, or succeed again with `None`.
    pub fn fail_transfer(&self, error: Option<DeviceError>) {
        self.failures.lock().transfer = error;
    }

    /// Hold every install for `delay` before answering.
    pub fn set_install_delay(&self, delay: Duration) {
        *self.install_delay.lock() = delay;
    }

    /// All recorded calls, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().clone()
    }

    /// Recorded installs, oldest first.
    #[must_use]
    pub fn installs(&self) -> Vec<InstallRequest> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                DeviceCall::Install(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of reboots issued.
    #[must_use]
    pub fn reboot_count(&self) -> usize {
        self.count(|call| matches!(call, DeviceCall::Reboot))
    }

    /// Number of remote transfers issued.
    #[must_use]
    pub fn transfer_count(&self) -> usize {
        self.count(|call| matches!(call, DeviceCall::Transfer { .. }))
    }

    /// Number of calls that mutate the device.
    #[must_use]
    pub fn mutating_call_count(&self) -> usize {
        self.count(|call| !matches!(call, DeviceCall::QueryVersion))
    }

    fn count(&self, predicate: impl Fn(&DeviceCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: DeviceCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl DeviceClient for MockDeviceClient {
    async fn query_version(&self, _timeout: Duration) -> Result<String> {
        self.record(DeviceCall::QueryVersion);
        if let Some(error) = self.failures.lock().query.clone() {
            return Err(error);
        }
        Ok(self.version.lock().clone())
    }

    async fn install_package(&self, request: &InstallRequest, _timeout: Duration) -> Result<()> {
        self.record(DeviceCall::Install(request.clone()));
        let delay = *self.install_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match self.failures.lock().install.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn reboot(&self, _timeout: Duration) -> Result<()> {
        self.record(DeviceCall::Reboot);
        match self.failures.lock().reboot.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl FileTransferClient for MockDeviceClient {
    async fn transfer_to_remote(
        &self,
        source_url: &str,
        remote_path: &str,
        _timeout: Duration,
    ) -> Result<()> {
        self.record(DeviceCall::Transfer {
            source_url: source_url.to_string(),
            remote_path: remote_path.to_string(),
        });
        match self.failures.lock().transfer.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
