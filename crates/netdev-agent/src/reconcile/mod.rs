//! The reconciliation engine.
//!
//! Watch events and the periodic sync both feed the same engine. Each entry
//! point evaluates the decision rules against a resource snapshot:
//!
//! - **Preload**: a new `spec.preload.requestId` stages an image on the
//!   device once.
//! - **Upgrade**: a desired version different from the observed one is
//!   installed and activated, then the device is rebooted. The tracked
//!   upgrade stays set until the device reports the target.
//! - **Convergence**: after every version query the observed version is
//!   compared to the desired one; equality clears the tracked upgrade,
//!   a difference starts one.
//!
//! Every mutating operation runs under the [`OperationLock`]. The periodic
//! sync releases it before the convergence check so the check can start an
//! upgrade.
//!
//! Device calls race the engine's shutdown token. Cancelling it abandons the
//! call in flight, which then fails like any other device error.

mod preload;
mod upgrade;

#[cfg(test)]
pub(crate) mod testing;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use netdev_core::resource::FIRMWARE_UPGRADE_CONDITION;
use netdev_core::{DeviceState, NetworkDevice, UpgradePhase};
use netdev_device::{DeviceClient, DeviceError, FileTransferClient};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::lock::{OperationLock, UpgradeTracker};
use crate::store::{ResourceStore, StatusMutation};
use preload::PreloadAttempt;

/// A change to the watched resource.
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// The resource was seen for the first time.
    Add(NetworkDevice),
    /// The resource changed.
    Update {
        /// Previous snapshot.
        old: NetworkDevice,
        /// Current snapshot.
        new: NetworkDevice,
    },
    /// The resource was deleted.
    Delete(NetworkDevice),
}

/// Why a rule did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// `spec.preload.requestId` is empty.
    NoPreloadRequest,
    /// The preload request id was already handled.
    PreloadAlreadyProcessed,
    /// `spec.os.desiredVersion` is empty.
    NoDesiredVersion,
    /// The device already runs the desired version.
    AlreadyAtVersion,
    /// An upgrade to the desired version is already tracked.
    UpgradeInProgress,
    /// The device answered the version query with an empty version.
    NoReportedVersion,
}

/// What a rule evaluation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to do.
    Skipped(SkipReason),
    /// The preload image was staged.
    Preloaded,
    /// The preload failed with this message.
    PreloadFailed(String),
    /// Install and reboot were accepted; waiting for the new version.
    AwaitingVersion,
    /// The upgrade attempt failed with this message.
    UpgradeFailed(String),
    /// The device runs the desired version.
    Converged,
    /// Dry run: an upgrade to this version would have started.
    DryRun {
        /// Version the upgrade would install.
        target_version: String,
    },
}

/// Drives one device towards its declared state.
pub struct ReconcileEngine {
    config: AgentConfig,
    device: Arc<dyn DeviceClient>,
    files: Arc<dyn FileTransferClient>,
    store: Arc<dyn ResourceStore>,
    op_lock: OperationLock,
    upgrades: UpgradeTracker,
    last_preload: Mutex<Option<PreloadAttempt>>,
    shutdown: CancellationToken,
}

impl ReconcileEngine {
    /// Create an engine for the device named in `config`.
    #[must_use]
    pub fn new(
        config: AgentConfig,
        device: Arc<dyn DeviceClient>,
        files: Arc<dyn FileTransferClient>,
        store: Arc<dyn ResourceStore>,
    ) -> Self {
        Self {
            config,
            device,
            files,
            store,
            op_lock: OperationLock::new(),
            upgrades: UpgradeTracker::new(),
            last_preload: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    /// Abandon device calls once `shutdown` is cancelled.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// The token that stops in-flight device calls.
    #[must_use]
    pub const fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// The engine configuration.
    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// The in-flight upgrade tracker.
    #[must_use]
    pub const fn upgrades(&self) -> &UpgradeTracker {
        &self.upgrades
    }

    /// The lock serializing mutating operations.
    #[must_use]
    pub const fn operation_lock(&self) -> &OperationLock {
        &self.op_lock
    }

    fn device_name(&self) -> &str {
        &self.config.device_name
    }

    /// Dispatch a watch event.
    pub async fn handle(&self, event: DeviceEvent) {
        match event {
            DeviceEvent::Add(device) => self.on_add(&device).await,
            DeviceEvent::Update { old, new } => self.on_update(&old, &new).await,
            DeviceEvent::Delete(device) => self.on_delete(&device),
        }
    }

    /// Handle a newly observed resource.
    ///
    /// Only the preload rule runs; the first periodic sync decides about
    /// upgrades from the live device version.
    pub async fn on_add(&self, device: &NetworkDevice) {
        info!(
            device = self.device_name(),
            desired_version = device.desired_version().unwrap_or(""),
            current_version = device.current_version(),
            "NetworkDevice added"
        );
        self.preload(device).await;
    }

    /// Handle a change to the resource.
    pub async fn on_update(&self, old: &NetworkDevice, new: &NetworkDevice) {
        self.preload(new).await;

        let old_desired = old.desired_version();
        let new_desired = new.desired_version();
        if old_desired != new_desired && new_desired.is_some() {
            info!(
                device = self.device_name(),
                old_desired = old_desired.unwrap_or(""),
                new_desired = new_desired.unwrap_or(""),
                "Desired version changed"
            );
            self.upgrade(new).await;
        }
    }

    /// Handle deletion of the resource.
    pub fn on_delete(&self, device: &NetworkDevice) {
        info!(
            device = self.device_name(),
            desired_version = device.desired_version().unwrap_or(""),
            "NetworkDevice deleted"
        );
    }

    /// One pass of the periodic sync: refresh the observed version, check
    /// convergence, and evaluate the preload rule. Unlike a watch event, the
    /// sync retries a preload whose last attempt failed for a transient
    /// reason.
    ///
    /// # Errors
    ///
    /// Returns an error if the version query, the status write or the
    /// resource fetch fails.
    pub async fn sync_once(&self) -> Result<Outcome> {
        let version = self.sync_os_version().await?;
        if version.is_empty() {
            warn!(device = self.device_name(), "Device reported an empty version");
            return Ok(Outcome::Skipped(SkipReason::NoReportedVersion));
        }

        let device = self.fetch().await?;
        let outcome = self.check_convergence(&device, &version).await;
        self.retry_preload(&device).await;
        Ok(outcome)
    }

    /// Query the device version and record it as `status.os.currentVersion`.
    ///
    /// Runs under the operation lock and releases it before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or the status write fails.
    pub async fn sync_os_version(&self) -> Result<String> {
        let _guard = self.op_lock.acquire("version sync").await;

        let version = self
            .until_shutdown("version query", self.device.query_version(self.config.query_timeout))
            .await?;
        debug!(device = self.device_name(), version = %version, "Queried device version");
        if version.is_empty() {
            return Ok(version);
        }

        let observed = version.clone();
        self.write_status(&move |s| s.os.current_version.clone_from(&observed))
            .await?;
        Ok(version)
    }

    /// Compare the observed version to the desired one.
    ///
    /// Equality clears the tracked upgrade. A difference with no upgrade in
    /// flight for the desired version starts one, or only logs it in dry-run
    /// mode. Must be called without the operation lock held.
    pub async fn check_convergence(&self, device: &NetworkDevice, observed: &str) -> Outcome {
        let Some(desired) = device.desired_version() else {
            self.upgrades.clear();
            return Outcome::Skipped(SkipReason::NoDesiredVersion);
        };

        if desired == observed {
            self.upgrades.clear();
            self.mark_converged(device, desired).await;
            return Outcome::Converged;
        }

        if self.upgrades.is_in_progress(desired) {
            if let Some(snapshot) = self.upgrades.snapshot() {
                info!(
                    device = self.device_name(),
                    target_version = desired,
                    observed_version = observed,
                    phase = ?snapshot.phase,
                    waiting_secs = snapshot.elapsed.as_secs(),
                    "Waiting for device to report target version"
                );
            }
            return Outcome::Skipped(SkipReason::UpgradeInProgress);
        }

        if self.config.dry_run {
            info!(
                device = self.device_name(),
                current_version = observed,
                target_version = desired,
                "Dry run: would start upgrade"
            );
            return Outcome::DryRun {
                target_version: desired.to_string(),
            };
        }

        info!(
            device = self.device_name(),
            current_version = observed,
            target_version = desired,
            "Version mismatch, starting upgrade"
        );
        self.upgrade_from(device, desired, observed).await
    }

    async fn mark_converged(&self, device: &NetworkDevice, desired: &str) {
        let status = device.status.clone().unwrap_or_default();
        let settled = status.state == Some(DeviceState::Healthy)
            && status
                .upgrade
                .as_ref()
                .map_or(true, |u| u.phase == UpgradePhase::Completed && u.target_version == desired);
        if settled {
            return;
        }

        info!(device = self.device_name(), version = desired, "Device converged");
        let desired = desired.to_string();
        self.record_status("convergence", &move |s| {
            s.state = Some(DeviceState::Healthy);
            if let Some(upgrade) = s.upgrade.as_mut() {
                upgrade.phase = UpgradePhase::Completed;
                upgrade.target_version.clone_from(&desired);
                upgrade.message = format!("device reports {desired}");
            }
            s.set_condition(
                FIRMWARE_UPGRADE_CONDITION,
                true,
                "UpToDate",
                &format!("running desired version {desired}"),
            );
        })
        .await;
    }

    /// Run a device call unless shutdown is requested first.
    async fn until_shutdown<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = std::result::Result<T, DeviceError>>,
    ) -> Result<T> {
        tokio::select! {
            () = self.shutdown.cancelled() => {
                warn!(device = self.device_name(), operation, "Device call cancelled by shutdown");
                Err(AgentError::Cancelled(operation))
            }
            result = call => result.map_err(AgentError::from),
        }
    }

    async fn fetch(&self) -> Result<NetworkDevice> {
        let timeout = self.config.status_timeout;
        tokio::time::timeout(timeout, self.store.get(self.device_name()))
            .await
            .map_err(|_| timed_out("resource read", timeout))?
    }

    async fn write_status(&self, mutate: StatusMutation<'_>) -> Result<NetworkDevice> {
        let timeout = self.config.status_timeout;
        tokio::time::timeout(timeout, self.store.update_status(self.device_name(), mutate))
            .await
            .map_err(|_| timed_out("status write", timeout))?
    }

    /// Write status, logging a failure instead of returning it.
    async fn record_status(&self, what: &'static str, mutate: StatusMutation<'_>) {
        if let Err(e) = self.write_status(mutate).await {
            warn!(
                device = self.device_name(),
                update = what,
                error = %e,
                "Failed to update status"
            );
        }
    }
}

fn timed_out(operation: &'static str, timeout: Duration) -> AgentError {
    AgentError::Timeout {
        operation,
        timeout_ms: timeout.as_millis(),
    }
}
