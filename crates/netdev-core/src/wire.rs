//! Device RPC wire messages.
//!
//! Every RPC is a JSON `POST` to a fully-qualified method path. Client
//! streaming calls frame their messages as newline-delimited JSON in the
//! request body; closing the body closes the send side. Failed calls answer
//! with a non-2xx status and an [`RpcStatus`](crate::RpcStatus) body.

use serde::{Deserialize, Serialize};

/// Well-known port the device RPC endpoint listens on.
pub const DEFAULT_DEVICE_PORT: u16 = 8080;

/// Request header carrying the caller's remaining deadline in milliseconds.
pub const DEADLINE_HEADER: &str = "x-deadline-ms";

/// Method paths.
pub mod paths {
    /// `OS.Verify`.
    pub const OS_VERIFY: &str = "/gnoi.os.OS/Verify";
    /// `System.SetPackage` (client streaming).
    pub const SYSTEM_SET_PACKAGE: &str = "/gnoi.system.System/SetPackage";
    /// `System.Reboot`.
    pub const SYSTEM_REBOOT: &str = "/gnoi.system.System/Reboot";
    /// `File.TransferToRemote`.
    pub const FILE_TRANSFER_TO_REMOTE: &str = "/gnoi.file.File/TransferToRemote";
    /// `File.Get`.
    pub const FILE_GET: &str = "/gnoi.file.File/Get";
    /// `File.Put`.
    pub const FILE_PUT: &str = "/gnoi.file.File/Put";
    /// `File.Stat`.
    pub const FILE_STAT: &str = "/gnoi.file.File/Stat";
    /// `File.Remove`.
    pub const FILE_REMOVE: &str = "/gnoi.file.File/Remove";
}

/// Transfer protocol for a remote download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    /// Unspecified.
    #[default]
    Unknown,
    /// SSH file transfer.
    Sftp,
    /// Plain HTTP.
    Http,
    /// HTTP over TLS.
    Https,
    /// Secure copy.
    Scp,
}

/// Where and how the device should fetch a file itself.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDownload {
    /// Source URL.
    #[serde(default)]
    pub path: String,
    /// Transfer protocol.
    #[serde(default)]
    pub protocol: Protocol,
}

impl RemoteDownload {
    /// Create an HTTP download descriptor.
    #[must_use]
    pub fn http(url: impl Into<String>) -> Self {
        Self {
            path: url.into(),
            protocol: Protocol::Http,
        }
    }
}

/// `OS.Verify` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyRequest {}

/// `OS.Verify` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    /// Version of the running OS.
    #[serde(default)]
    pub version: String,
}

/// Package descriptor sent as the first `SetPackage` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    /// Destination path on the device.
    pub filename: String,
    /// Version label of the package.
    pub version: String,
    /// Make the package the boot default once installed.
    pub activate: bool,
    /// Where the device fetches the package from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_download: Option<RemoteDownload>,
}

/// One message of the `SetPackage` client stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SetPackageRequest {
    /// Package descriptor; always the first message.
    Package(Package),
}

/// `SetPackage` acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPackageResponse {}

/// Reboot method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RebootMethod {
    /// Unspecified.
    #[default]
    Unknown,
    /// Full power cycle of the control plane.
    Cold,
    /// Power down without restart.
    Powerdown,
    /// Halt.
    Halt,
    /// Warm restart.
    Warm,
    /// Non-stop forwarding restart.
    Nsf,
    /// Power up.
    Powerup,
}

/// `System.Reboot` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebootRequest {
    /// How to reboot.
    pub method: RebootMethod,
    /// Delay before rebooting, in nanoseconds.
    pub delay: u64,
    /// Reason shown on the device.
    pub message: String,
    /// Reboot even if the device reports it is unsafe.
    pub force: bool,
}

impl RebootRequest {
    /// Immediate, non-forced cold reboot.
    #[must_use]
    pub fn cold(message: impl Into<String>) -> Self {
        Self {
            method: RebootMethod::Cold,
            delay: 0,
            message: message.into(),
            force: false,
        }
    }
}

/// `System.Reboot` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebootResponse {}

/// `File.TransferToRemote` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferToRemoteRequest {
    /// Destination path on the responder's filesystem.
    #[serde(default)]
    pub local_path: String,
    /// Where to pull the file from.
    #[serde(default)]
    pub remote_download: Option<RemoteDownload>,
}

/// `File.TransferToRemote` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferToRemoteResponse {}

/// Frame messages for a client-streaming call as newline-delimited JSON.
///
/// # Errors
///
/// Returns an error if a message fails to serialize.
pub fn frame_messages<T: Serialize>(messages: &[T]) -> serde_json::Result<Vec<u8>> {
    let mut body = Vec::new();
    for message in messages {
        serde_json::to_writer(&mut body, message)?;
        body.push(b'\n');
    }
    Ok(body)
}
