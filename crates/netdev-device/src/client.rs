//! Device protocol client.
//!
//! This module provides the [`DeviceClient`] trait used by the agent to drive
//! a device, and [`HttpDeviceClient`], the production implementation that
//! speaks the device RPCs over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use netdev_core::wire::{
    frame_messages, paths, Package, RebootRequest, RebootResponse, RemoteDownload,
    SetPackageRequest, SetPackageResponse, VerifyRequest, VerifyResponse,
};
use netdev_core::DeviceEndpoint;

use crate::error::{DeviceError, Result};
use crate::transport::{RpcTransport, NDJSON};

/// Message shown on the device when the agent reboots it.
pub const UPGRADE_REBOOT_MESSAGE: &str = "firmware upgrade reboot";

/// Operations the agent performs against a single device.
///
/// This trait abstracts the wire protocol, allowing for simulated and mock
/// implementations.
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Query the version of the running OS.
    ///
    /// # Errors
    ///
    /// Returns a connect error if the device is unreachable, or a remote
    /// error if the device rejects the call.
    async fn query_version(&self, timeout: Duration) -> Result<String>;

    /// Have the device fetch and install a package.
    ///
    /// The device downloads `source_url` itself; the client only sends the
    /// descriptor and waits for the acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns a connect error if the device is unreachable, or a stream
    /// error if the call breaks or the device reports a failure.
    async fn install_package(&self, request: &InstallRequest, timeout: Duration) -> Result<()>;

    /// Issue an immediate, non-forced cold reboot.
    ///
    /// # Errors
    ///
    /// Returns a connect error if the device is unreachable, or a remote
    /// error if the device refuses to reboot.
    async fn reboot(&self, timeout: Duration) -> Result<()>;
}

/// Arguments of a package installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    /// URL the device downloads the package from.
    pub source_url: String,
    /// Version label of the package.
    pub target_version: String,
    /// Destination path on the device.
    pub dest_path: String,
    /// `false` stages the image only; `true` also makes it the boot default.
    pub activate: bool,
}

impl InstallRequest {
    fn to_message(&self) -> SetPackageRequest {
        SetPackageRequest::Package(Package {
            filename: self.dest_path.clone(),
            version: self.target_version.clone(),
            activate: self.activate,
            remote_download: Some(RemoteDownload::http(&self.source_url)),
        })
    }
}

/// HTTP client for the device RPC endpoint.
#[derive(Debug, Clone)]
pub struct HttpDeviceClient {
    transport: RpcTransport,
}

impl HttpDeviceClient {
    /// Create a client for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(endpoint: DeviceEndpoint) -> Result<Self> {
        Ok(Self {
            transport: RpcTransport::new(endpoint)?,
        })
    }

    /// Create a client with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, endpoint: DeviceEndpoint) -> Self {
        Self {
            transport: RpcTransport::with_client(client, endpoint),
        }
    }

    /// The endpoint this client talks to.
    #[must_use]
    pub const fn endpoint(&self) -> &DeviceEndpoint {
        self.transport.endpoint()
    }
}

#[async_trait]
impl DeviceClient for HttpDeviceClient {
    async fn query_version(&self, timeout: Duration) -> Result<String> {
        let response: VerifyResponse = self
            .transport
            .unary(paths::OS_VERIFY, &VerifyRequest {}, timeout)
            .await?;

        tracing::debug!(
            endpoint = %self.endpoint(),
            version = %response.version,
            "Queried device version"
        );
        Ok(response.version)
    }

    async fn install_package(&self, request: &InstallRequest, timeout: Duration) -> Result<()> {
        let method = paths::SYSTEM_SET_PACKAGE;
        let body = frame_messages(&[request.to_message()]).map_err(|e| DeviceError::Stream {
            method,
            message: format!("failed to send package descriptor: {e}"),
        })?;

        tracing::info!(
            endpoint = %self.endpoint(),
            source_url = %request.source_url,
            target_version = %request.target_version,
            dest_path = %request.dest_path,
            activate = request.activate,
            "Sending package descriptor"
        );

        let result: Result<SetPackageResponse> =
            self.transport.call(method, body, NDJSON, timeout).await;

        match result {
            Ok(_) => {
                tracing::info!(
                    endpoint = %self.endpoint(),
                    target_version = %request.target_version,
                    "Device acknowledged package"
                );
                Ok(())
            }
            Err(DeviceError::Remote { method, status }) => Err(DeviceError::Stream {
                method,
                message: format!("failed to receive response: {status}"),
            }),
            Err(e) => Err(e),
        }
    }

    async fn reboot(&self, timeout: Duration) -> Result<()> {
        let _: RebootResponse = self
            .transport
            .unary(
                paths::SYSTEM_REBOOT,
                &RebootRequest::cold(UPGRADE_REBOOT_MESSAGE),
                timeout,
            )
            .await?;

        tracing::info!(endpoint = %self.endpoint(), "Device accepted reboot");
        Ok(())
    }
}
