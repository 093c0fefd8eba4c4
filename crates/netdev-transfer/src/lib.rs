//! Device-side file transfer responder for netdev.
//!
//! This crate serves the file RPCs a device exposes so that a remote caller
//! can have it pull an image onto its own filesystem. It handles:
//!
//! - Request validation, with the destination checked against the download
//!   allow-list before any network traffic
//! - Streaming the remote file to disk, optionally through a host root mount
//! - Bounding each transfer by the caller's deadline
//! - `Unimplemented` answers for the file RPCs it does not support
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use netdev_transfer::{create_router, FileService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = Arc::new(FileService::new(None)?);
//! let app = create_router(service);
//!
//! let listener = tokio::net::TcpListener::bind("localhost:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod service;

pub use config::TransferConfig;
pub use error::{Result, RpcError};
pub use routes::create_router;
pub use service::{FileService, TransferOutcome};
