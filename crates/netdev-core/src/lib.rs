//! Core types and utilities for netdev.
//!
//! This crate provides the foundational types shared by the device agent,
//! the device client and the device-side transfer responder:
//!
//! - **Path policy**: lexical cleaning and the download allow-list
//! - **Wire messages**: request/response types for the device RPCs
//! - **Resource schema**: the `NetworkDevice` custom resource
//! - **Endpoint config**: resolution of the device endpoint with fallback
//! - **Error types**: the RPC status taxonomy shared by client and server
//!
//! # Example
//!
//! ```
//! use netdev_core::path::DownloadPolicy;
//!
//! let policy = DownloadPolicy::default();
//! assert_eq!(policy.validate("/tmp/a/../b.bin").unwrap(), "/tmp/b.bin");
//! assert!(policy.validate("/tmp/../etc/passwd").is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod path;
pub mod resource;
pub mod wire;

pub use config::{resolve_endpoint, DeviceEndpoint, EndpointSource, EnvEndpointSource};
pub use error::{CoreError, PathError, Result, RpcCode, RpcStatus};
pub use path::{clean, validate_download_path, DownloadPolicy, HostPathTranslator};
pub use resource::{
    DeviceState, NetworkDevice, NetworkDeviceSpec, NetworkDeviceStatus, PreloadPhase,
    UpgradePhase, UpgradeStatus,
};
