//! File transfer service.
//!
//! Pulls a remote file onto the local filesystem on behalf of a caller. The
//! destination is checked against the download policy before any network
//! traffic happens.

use std::path::{Path, PathBuf};
use std::time::Instant;

use netdev_core::wire::{Protocol, TransferToRemoteRequest};
use netdev_core::{DownloadPolicy, HostPathTranslator};
use tokio::io::AsyncWriteExt;

use crate::error::{DownloadError, Result, RpcError};

/// Result of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Where the file was written.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes: u64,
}

/// Implementation of the file RPCs.
#[derive(Debug, Clone)]
pub struct FileService {
    client: reqwest::Client,
    policy: DownloadPolicy,
    translator: HostPathTranslator,
}

impl FileService {
    /// Create a service writing through `host_root`, if given.
    ///
    /// The download client has no overall timeout; transfers are bounded
    /// only by the caller's deadline.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(host_root: Option<PathBuf>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| RpcError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self::with_client(client, host_root))
    }

    /// Create a service with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, host_root: Option<PathBuf>) -> Self {
        Self {
            client,
            policy: DownloadPolicy::default(),
            translator: HostPathTranslator::new(host_root),
        }
    }

    /// Replace the download policy.
    #[must_use]
    pub fn with_policy(mut self, policy: DownloadPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The download policy in force.
    #[must_use]
    pub const fn policy(&self) -> &DownloadPolicy {
        &self.policy
    }

    /// Download the requested file to the requested local path.
    ///
    /// Checks run in order and the first failure wins: download descriptor
    /// present, protocol is HTTP, source URL set, local path set, local path
    /// allowed by the policy.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument`, `Unimplemented` or `PermissionDenied` for
    /// rejected requests, and `Internal` when the download fails.
    pub async fn transfer_to_remote(
        &self,
        request: &TransferToRemoteRequest,
    ) -> Result<TransferOutcome> {
        let remote = request
            .remote_download
            .as_ref()
            .ok_or_else(|| RpcError::InvalidArgument("remote_download is required".into()))?;

        if remote.protocol != Protocol::Http {
            return Err(RpcError::Unimplemented(format!(
                "only HTTP protocol is supported, got {:?}",
                remote.protocol
            )));
        }

        if remote.path.is_empty() {
            return Err(RpcError::InvalidArgument(
                "remote URL path is required".into(),
            ));
        }

        if request.local_path.is_empty() {
            return Err(RpcError::InvalidArgument("local path is required".into()));
        }

        let cleaned = self.policy.validate(&request.local_path)?;
        let dest = self.translator.to_host(&cleaned);

        tracing::info!(
            remote_url = %remote.path,
            local_path = %cleaned,
            dest = %dest.display(),
            "Received transfer request"
        );

        let started = Instant::now();
        let bytes = self.download(&remote.path, &dest).await.map_err(|e| {
            tracing::error!(
                remote_url = %remote.path,
                dest = %dest.display(),
                error = %e,
                "Failed to download file"
            );
            RpcError::from(e)
        })?;

        tracing::info!(
            remote_url = %remote.path,
            dest = %dest.display(),
            bytes,
            elapsed_ms = started.elapsed().as_millis(),
            "File transfer completed"
        );

        Ok(TransferOutcome { path: dest, bytes })
    }

    async fn download(&self, url: &str, dest: &Path) -> std::result::Result<u64, DownloadError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(DownloadError::Request)?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(DownloadError::Status(response.status()));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| DownloadError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|source| DownloadError::CreateFile {
                path: dest.to_path_buf(),
                source,
            })?;

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(DownloadError::Body)? {
            file.write_all(&chunk).await.map_err(DownloadError::Write)?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(DownloadError::Write)?;

        Ok(written)
    }

    /// `File.Get` is not supported.
    ///
    /// # Errors
    ///
    /// Always returns `Unimplemented`.
    pub fn get(&self) -> Result<()> {
        Err(RpcError::unimplemented("Get"))
    }

    /// `File.Put` is not supported.
    ///
    /// # Errors
    ///
    /// Always returns `Unimplemented`.
    pub fn put(&self) -> Result<()> {
        Err(RpcError::unimplemented("Put"))
    }

    /// `File.Stat` is not supported.
    ///
    /// # Errors
    ///
    /// Always returns `Unimplemented`.
    pub fn stat(&self) -> Result<()> {
        Err(RpcError::unimplemented("Stat"))
    }

    /// `File.Remove` is not supported.
    ///
    /// # Errors
    ///
    /// Always returns `Unimplemented`.
    pub fn remove(&self) -> Result<()> {
        Err(RpcError::unimplemented("Remove"))
    }
}
