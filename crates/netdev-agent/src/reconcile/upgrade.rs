//! Upgrade rule: install and activate the desired version, then reboot.

use chrono::{DateTime, Utc};
use netdev_core::resource::FIRMWARE_UPGRADE_CONDITION;
use netdev_core::{DeviceState, NetworkDevice, UpgradePhase, UpgradeStatus};
use netdev_device::InstallRequest;
use tracing::{debug, error, info};

use super::{Outcome, ReconcileEngine, SkipReason};

impl ReconcileEngine {
    /// Evaluate the upgrade rule against `device`, comparing the desired
    /// version with the version recorded in its status.
    pub async fn upgrade(&self, device: &NetworkDevice) -> Outcome {
        let Some(desired) = device.desired_version() else {
            return Outcome::Skipped(SkipReason::NoDesiredVersion);
        };
        self.upgrade_from(device, desired, device.current_version())
            .await
    }

    /// Run the two-phase upgrade from `current` to `desired`.
    ///
    /// On success the tracked upgrade is left in `AwaitingVersion`; only the
    /// convergence check or a different target clears it. On failure it is
    /// cleared so a later trigger can retry. Shutdown abandons the install or
    /// the reboot in flight and counts as a failure.
    pub(super) async fn upgrade_from(
        &self,
        device: &NetworkDevice,
        desired: &str,
        current: &str,
    ) -> Outcome {
        if desired == current {
            debug!(device = self.device_name(), version = desired, "Already at desired version");
            return Outcome::Skipped(SkipReason::AlreadyAtVersion);
        }
        if self.upgrades.is_in_progress(desired) {
            return Outcome::Skipped(SkipReason::UpgradeInProgress);
        }

        let _guard = self.op_lock.acquire("upgrade").await;

        // Another trigger may have started the same upgrade while we waited.
        if self.upgrades.is_in_progress(desired) {
            return Outcome::Skipped(SkipReason::UpgradeInProgress);
        }
        let started_at = self.upgrades.start(desired);

        let firmware_url = device
            .spec
            .os
            .firmware_url
            .clone()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self.config.derived_firmware_url(desired));

        info!(
            device = self.device_name(),
            current_version = current,
            target_version = desired,
            firmware_url = %firmware_url,
            "Installing firmware"
        );
        self.record_upgrade(
            DeviceState::Upgrading,
            UpgradePhase::Installing,
            desired,
            started_at,
            format!("installing {desired} from {firmware_url}"),
        )
        .await;

        let request = InstallRequest {
            source_url: firmware_url,
            target_version: desired.to_string(),
            dest_path: self.config.upgrade_download_path.clone(),
            activate: true,
        };
        let install = self
            .device
            .install_package(&request, self.config.upgrade_timeout);
        if let Err(e) = self.until_shutdown("install", install).await {
            return self
                .fail_upgrade(desired, started_at, format!("install failed: {e}"))
                .await;
        }

        self.upgrades.set_phase(UpgradePhase::Rebooting);
        info!(device = self.device_name(), target_version = desired, "Firmware installed, rebooting");
        self.record_upgrade(
            DeviceState::Upgrading,
            UpgradePhase::Rebooting,
            desired,
            started_at,
            "reboot requested".to_string(),
        )
        .await;

        let reboot = self.device.reboot(self.config.upgrade_timeout);
        if let Err(e) = self.until_shutdown("reboot", reboot).await {
            return self
                .fail_upgrade(desired, started_at, format!("reboot failed: {e}"))
                .await;
        }

        self.upgrades.set_phase(UpgradePhase::AwaitingVersion);
        info!(
            device = self.device_name(),
            target_version = desired,
            "Reboot accepted, waiting for device to report target version"
        );
        self.record_upgrade(
            DeviceState::Upgrading,
            UpgradePhase::AwaitingVersion,
            desired,
            started_at,
            format!("waiting for device to report {desired}"),
        )
        .await;

        Outcome::AwaitingVersion
    }

    async fn fail_upgrade(
        &self,
        desired: &str,
        started_at: DateTime<Utc>,
        message: String,
    ) -> Outcome {
        error!(
            device = self.device_name(),
            target_version = desired,
            error = %message,
            "Upgrade failed"
        );
        self.upgrades.clear();
        self.record_upgrade(
            DeviceState::UpgradeFailed,
            UpgradePhase::Failed,
            desired,
            started_at,
            message.clone(),
        )
        .await;
        Outcome::UpgradeFailed(message)
    }

    async fn record_upgrade(
        &self,
        state: DeviceState,
        phase: UpgradePhase,
        target_version: &str,
        started_at: DateTime<Utc>,
        message: String,
    ) {
        let upgrade = UpgradeStatus {
            phase,
            target_version: target_version.to_string(),
            message,
            started_at: Some(started_at),
        };
        let reason = match phase {
            UpgradePhase::Failed => "UpgradeFailed",
            UpgradePhase::Completed => "UpToDate",
            _ => "Upgrading",
        };
        self.record_status("upgrade", &move |s| {
            s.state = Some(state);
            s.set_condition(
                FIRMWARE_UPGRADE_CONDITION,
                phase == UpgradePhase::Completed,
                reason,
                &upgrade.message,
            );
            s.upgrade = Some(upgrade.clone());
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{harness, resource, DEVICE};
    use super::*;
    use netdev_device::DeviceError;
    use std::sync::Arc;
    use std::time::Duration;

    fn refused() -> DeviceError {
        DeviceError::Connect {
            endpoint: "leaf-01:8080".into(),
            message: "connection refused".into(),
        }
    }

    #[tokio::test]
    async fn derived_firmware_url_and_upgrade_path() {
        let device = resource("B", "A");
        let h = harness("A", device.clone());

        assert_eq!(h.engine.upgrade(&device).await, Outcome::AwaitingVersion);

        let installs = h.device.installs();
        assert_eq!(installs.len(), 1);
        assert_eq!(installs[0].source_url, "http://10.250.0.1:8888/sonic-vs-B.bin");
        assert_eq!(installs[0].dest_path, "/tmp/sonic-upgrade.bin");
        assert!(installs[0].activate);

        let snapshot = h.engine.upgrades().snapshot().unwrap();
        assert_eq!(snapshot.target_version, "B");
        assert_eq!(snapshot.phase, UpgradePhase::AwaitingVersion);

        let status = h.store.status(DEVICE);
        assert_eq!(status.state, Some(DeviceState::Upgrading));
        let upgrade = status.upgrade.unwrap();
        assert_eq!(upgrade.phase, UpgradePhase::AwaitingVersion);
        assert_eq!(upgrade.target_version, "B");
        assert!(upgrade.started_at.is_some());
        assert_eq!(
            status.conditions[0].status, "False",
            "condition stays false until the device reports the target"
        );
    }

    #[tokio::test]
    async fn explicit_firmware_url_wins() {
        let mut device = resource("B", "A");
        device.spec.os.firmware_url = Some("https://images.example/b.bin".into());
        let h = harness("A", device.clone());

        h.engine.upgrade(&device).await;
        assert_eq!(h.device.installs()[0].source_url, "https://images.example/b.bin");
    }

    #[tokio::test]
    async fn same_target_is_not_installed_twice() {
        let device = resource("B", "A");
        let h = harness("A", device.clone());

        assert_eq!(h.engine.upgrade(&device).await, Outcome::AwaitingVersion);
        assert_eq!(
            h.engine.upgrade(&device).await,
            Outcome::Skipped(SkipReason::UpgradeInProgress)
        );
        assert_eq!(
            h.engine.check_convergence(&device, "A").await,
            Outcome::Skipped(SkipReason::UpgradeInProgress)
        );
        assert_eq!(h.device.installs().len(), 1);
        assert_eq!(h.device.reboot_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_triggers_install_once() {
        let device = resource("B", "A");
        let h = harness("A", device.clone());
        h.device.set_install_delay(Duration::from_millis(50));

        let (event, sync) = tokio::join!(
            h.engine.upgrade(&device),
            h.engine.check_convergence(&device, "A")
        );

        let outcomes = [event, sync];
        assert!(outcomes.contains(&Outcome::AwaitingVersion));
        assert!(outcomes.contains(&Outcome::Skipped(SkipReason::UpgradeInProgress)));
        assert_eq!(h.device.installs().len(), 1);
        assert_eq!(h.device.reboot_count(), 1);
    }

    #[tokio::test]
    async fn different_target_supersedes() {
        let h = harness("A", resource("B", "A"));

        assert_eq!(h.engine.upgrade(&resource("B", "A")).await, Outcome::AwaitingVersion);
        assert_eq!(h.engine.upgrade(&resource("C", "A")).await, Outcome::AwaitingVersion);

        let targets: Vec<_> = h
            .device
            .installs()
            .into_iter()
            .map(|i| i.target_version)
            .collect();
        assert_eq!(targets, ["B", "C"]);
        assert_eq!(h.engine.upgrades().snapshot().unwrap().target_version, "C");
    }

    #[tokio::test]
    async fn install_failure_skips_reboot_and_allows_retry() {
        let device = resource("B", "A");
        let h = harness("A", device.clone());
        h.device.fail_install(Some(DeviceError::Stream {
            method: "SetPackage",
            message: "image download failed".into(),
        }));

        let outcome = h.engine.upgrade(&device).await;
        assert!(matches!(outcome, Outcome::UpgradeFailed(ref m) if m.contains("install failed")));
        assert_eq!(h.device.reboot_count(), 0);
        assert!(h.engine.upgrades().snapshot().is_none());
        assert!(!h.engine.operation_lock().is_locked());

        let status = h.store.status(DEVICE);
        assert_eq!(status.state, Some(DeviceState::UpgradeFailed));
        assert_eq!(status.upgrade.unwrap().phase, UpgradePhase::Failed);

        h.device.fail_install(None);
        assert_eq!(h.engine.upgrade(&device).await, Outcome::AwaitingVersion);
        assert_eq!(h.device.installs().len(), 2);
    }

    #[tokio::test]
    async fn reboot_failure_clears_tracked_upgrade() {
        let device = resource("B", "A");
        let h = harness("A", device.clone());
        h.device.fail_reboot(Some(refused()));

        let outcome = h.engine.upgrade(&device).await;
        assert!(matches!(outcome, Outcome::UpgradeFailed(ref m) if m.contains("reboot failed")));
        assert!(h.engine.upgrades().snapshot().is_none());
        assert_eq!(h.device.installs().len(), 1);
        assert_eq!(h.store.status(DEVICE).state, Some(DeviceState::UpgradeFailed));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_abandons_install_and_skips_reboot() {
        let device = resource("B", "A");
        let h = harness("A", device.clone());
        h.device.set_install_delay(Duration::from_secs(600));

        let engine = Arc::clone(&h.engine);
        let task = tokio::spawn(async move { engine.upgrade(&device).await });
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(h.engine.upgrades().is_in_progress("B"));
        h.engine.shutdown_token().cancel();

        let outcome = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("upgrade should stop promptly")
            .unwrap();
        assert!(matches!(outcome, Outcome::UpgradeFailed(ref m) if m.contains("cancelled")));
        assert!(h.engine.upgrades().snapshot().is_none());
        assert!(!h.engine.operation_lock().is_locked());
        assert_eq!(h.device.reboot_count(), 0);
        assert_eq!(h.store.status(DEVICE).state, Some(DeviceState::UpgradeFailed));
    }

    #[tokio::test]
    async fn status_write_failure_does_not_change_decisions() {
        let device = resource("B", "A");
        let h = harness("A", device.clone());
        h.store.set_fail_writes(true);

        assert_eq!(h.engine.upgrade(&device).await, Outcome::AwaitingVersion);
        assert_eq!(h.device.installs().len(), 1);
        assert_eq!(h.device.reboot_count(), 1);
    }
}
