//! File transfer client.
//!
//! Asks a device-side responder to pull a file from a URL onto its own
//! filesystem.

use std::time::Duration;

use async_trait::async_trait;
use netdev_core::wire::{paths, RemoteDownload, TransferToRemoteRequest, TransferToRemoteResponse};
use netdev_core::DeviceEndpoint;

use crate::error::Result;
use crate::transport::RpcTransport;

/// Remote file transfer capability.
#[async_trait]
pub trait FileTransferClient: Send + Sync {
    /// Have the responder download `source_url` to `remote_path`.
    ///
    /// # Errors
    ///
    /// Returns a remote error carrying the responder's status code when the
    /// request is rejected or the download fails, or a connect error if the
    /// responder is unreachable.
    async fn transfer_to_remote(
        &self,
        source_url: &str,
        remote_path: &str,
        timeout: Duration,
    ) -> Result<()>;
}

/// HTTP client for the file transfer responder.
#[derive(Debug, Clone)]
pub struct HttpFileTransferClient {
    transport: RpcTransport,
}

impl HttpFileTransferClient {
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

    /// The endpoint this client talks to.
    #[must_use]
    pub const fn endpoint(&self) -> &DeviceEndpoint {
        self.transport.endpoint()
    }
}

#[async_trait]
impl FileTransferClient for HttpFileTransferClient {
    async fn transfer_to_remote(
        &self,
        source_url: &str,
        remote_path: &str,
        timeout: Duration,
    ) -> Result<()> {
        let request = TransferToRemoteRequest {
            local_path: remote_path.to_string(),
            remote_download: Some(RemoteDownload::http(source_url)),
        };

        tracing::info!(
            endpoint = %self.endpoint(),
            source_url,
            remote_path,
            "Requesting remote file transfer"
        );

        let _: TransferToRemoteResponse = self
            .transport
            .unary(paths::FILE_TRANSFER_TO_REMOTE, &request, timeout)
            .await?;
        Ok(())
    }
}
