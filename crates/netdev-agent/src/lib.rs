//! Single-device firmware reconciliation agent for netdev.
//!
//! One agent runs per network device. It watches that device's
//! `NetworkDevice` resource, polls the device's running version, and drives
//! the device towards the declared state:
//!
//! - Image preloads, deduplicated by request id
//! - Two-phase firmware upgrades (install and activate, then reboot)
//! - Convergence tracking across the reboot, with no persisted state
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐        ┌────────────────────┐
//! │   Watch loop       │        │  Periodic sync     │
//! │ (add/update/del)   │        │  (every interval)  │
//! └─────────┬──────────┘        └─────────┬──────────┘
//!           │                             │
//!           ▼                             ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                  ReconcileEngine                    │
//! │  ┌───────────┐ ┌───────────┐ ┌───────────────────┐  │
//! │  │  Preload  │ │  Upgrade  │ │   Convergence     │  │
//! │  └───────────┘ └───────────┘ └───────────────────┘  │
//! │        OperationLock           UpgradeTracker       │
//! └───────────┬─────────────────────────────┬───────────┘
//!             │                             │
//!             ▼                             ▼
//! ┌──────────────────────┐      ┌──────────────────────┐
//! │    DeviceClient      │      │    ResourceStore     │
//! │  (network device)    │      │  (status subresource)│
//! └──────────────────────┘      └──────────────────────┘
//! ```
//!
//! # Testing
//!
//! The `test-utils` feature exposes `InMemoryResourceStore` and turns on
//! `MockDeviceClient` in `netdev-device`:
//!
//! ```ignore
//! use std::sync::Arc;
//! use netdev_agent::{AgentConfig, InMemoryResourceStore, ReconcileEngine};
//! use netdev_device::MockDeviceClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let device = Arc::new(MockDeviceClient::new("A"));
//! let store = Arc::new(InMemoryResourceStore::new());
//! let engine = ReconcileEngine::new(
//!     AgentConfig::new("leaf-01"),
//!     device.clone(),
//!     device.clone(),
//!     store,
//! );
//!
//! engine.sync_once().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod lock;
pub mod reconcile;
pub mod store;
pub mod sync;
pub mod watch;

pub use config::AgentConfig;
pub use error::{AgentError, Result};
pub use lock::{OperationGuard, OperationLock, UpgradeSnapshot, UpgradeTracker};
pub use reconcile::{DeviceEvent, Outcome, ReconcileEngine, SkipReason};
pub use store::{status_replacement, KubeResourceStore, ResourceStore};
pub use sync::run_periodic_sync;
pub use watch::{run_watch, EventTranslator};

#[cfg(any(test, feature = "test-utils"))]
pub use store::mock::InMemoryResourceStore;
