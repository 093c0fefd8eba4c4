//! Device protocol client for netdev.
//!
//! This crate provides the [`DeviceClient`] trait the agent uses to drive a
//! single network device, and its implementations:
//!
//! - [`HttpDeviceClient`]: production client, one connection per call
//! - [`SimulatedDeviceClient`]: canned responses for debug mode
//! - `MockDeviceClient`: call-recording double (feature `test-utils`)
//!
//! It also provides [`FileTransferClient`] for asking a device-side
//! responder to pull a file onto its own filesystem.
//!
//! # Usage
//!
//! ```no_run
//! use std::time::Duration;
//! use netdev_core::DeviceEndpoint;
//! use netdev_device::{DeviceClient, HttpDeviceClient, InstallRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpDeviceClient::new(DeviceEndpoint::new("leaf-01", 8080))?;
//!
//! let version = client.query_version(Duration::from_secs(10)).await?;
//! println!("running {version}");
//!
//! let request = InstallRequest {
//!     source_url: "http://10.250.0.1:8888/sonic-vs-B.bin".into(),
//!     target_version: "B".into(),
//!     dest_path: "/tmp/sonic-upgrade.bin".into(),
//!     activate: true,
//! };
//! client.install_package(&request, Duration::from_secs(900)).await?;
//! client.reboot(Duration::from_secs(10)).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod error;
pub mod file;
pub mod simulated;
mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use client::{DeviceClient, HttpDeviceClient, InstallRequest, UPGRADE_REBOOT_MESSAGE};
pub use error::{DeviceError, Result};
pub use file::{FileTransferClient, HttpFileTransferClient};
pub use simulated::{SimulatedDeviceClient, DEFAULT_SIMULATED_VERSION};

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{DeviceCall, MockDeviceClient};
