//! The `NetworkDevice` custom resource.
//!
//! The resource is owned by the API server; the agent reads the spec and
//! writes only the status subresource. Snapshots are decoded once into these
//! types at the watch boundary so the engine never walks untyped paths.

use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Desired state of a network device.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[kube(
    group = "sonic.io",
    version = "v1",
    kind = "NetworkDevice",
    plural = "networkdevices",
    namespaced,
    status = "NetworkDeviceStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDeviceSpec {
    /// Declared operating system target.
    #[serde(default)]
    pub os: OsSpec,
    /// One-shot image staging request.
    #[serde(default)]
    pub preload: PreloadSpec,
}

/// Operating system section of the spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsSpec {
    /// OS flavour, informational.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub os_type: String,
    /// Version the device should run.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub desired_version: String,
    /// Explicit firmware source; overrides the derived URL.
    #[serde(
        default,
        rename = "firmwareURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub firmware_url: Option<String>,
}

/// Preload section of the spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreloadSpec {
    /// Version label of the staged image.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target_version: String,
    /// Source of the image.
    #[serde(default, rename = "imageURL", skip_serializing_if = "String::is_empty")]
    pub image_url: String,
    /// Expected checksum; passed through, not verified by the agent.
    #[serde(default)]
    pub checksum: ChecksumSpec,
    /// Deduplication key; a new id requests a new preload.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub request_id: String,
    /// How to stage the image.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mode: String,
}

/// Checksum of a preload image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumSpec {
    /// MD5 hex digest.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub md5: String,
}

/// Observed state of a network device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDeviceStatus {
    /// Summary state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<DeviceState>,
    /// Observed OS state.
    #[serde(default)]
    pub os: OsStatus,
    /// Progress of the last preload request.
    #[serde(default)]
    pub preload: PreloadStatus,
    /// Progress of the current or last upgrade.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade: Option<UpgradeStatus>,
    /// Standard conditions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// Summary state of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceState {
    /// Running the desired version.
    Healthy,
    /// An upgrade is being applied or awaited.
    Upgrading,
    /// The last upgrade attempt failed.
    UpgradeFailed,
}

/// Observed OS section of the status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsStatus {
    /// Last version reported by the device.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_version: String,
    /// Version last staged by a successful preload.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub preloaded_version: String,
}

/// Preload section of the status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreloadStatus {
    /// Request id of the preload this status describes.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub observed_request_id: String,
    /// Phase of the preload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<PreloadPhase>,
    /// Progress percentage, 0 to 100.
    #[serde(default)]
    pub progress: u8,
    /// Free-text detail, usually the failure reason.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// Phase of a preload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreloadPhase {
    /// Transfer issued, awaiting the device.
    InProgress,
    /// Image staged on the device.
    Succeeded,
    /// Staging failed; see the message.
    Failed,
}

/// Upgrade section of the status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeStatus {
    /// Phase of the upgrade.
    pub phase: UpgradePhase,
    /// Version being installed.
    pub target_version: String,
    /// Free-text detail.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    /// When the attempt started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

/// Phase of a two-phase upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpgradePhase {
    /// Package transfer and activation in flight.
    Installing,
    /// Reboot issued.
    Rebooting,
    /// Reboot accepted; waiting for the device to report the target version.
    AwaitingVersion,
    /// The attempt failed before the reboot was accepted.
    Failed,
    /// The device reports the target version.
    Completed,
}

/// Condition type used for upgrade reporting.
pub const FIRMWARE_UPGRADE_CONDITION: &str = "FirmwareUpgrade";

impl NetworkDeviceStatus {
    /// Insert or update a condition.
    ///
    /// The transition time only moves when the condition's status changes.
    pub fn set_condition(&mut self, type_: &str, status: bool, reason: &str, message: &str) {
        let status = if status { "True" } else { "False" };
        let now = Time(Utc::now());

        if let Some(existing) = self.conditions.iter_mut().find(|c| c.type_ == type_) {
            if existing.status != status {
                existing.last_transition_time = now;
            }
            existing.status = status.to_string();
            existing.reason = reason.to_string();
            existing.message = message.to_string();
            return;
        }

        self.conditions.push(Condition {
            type_: type_.to_string(),
            status: status.to_string(),
            reason: reason.to_string(),
            message: message.to_string(),
            last_transition_time: now,
            observed_generation: None,
        });
    }

    /// Look up a condition by type.
    #[must_use]
    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }
}

impl NetworkDevice {
    /// Desired OS version, if one is declared.
    #[must_use]
    pub fn desired_version(&self) -> Option<&str> {
        Some(self.spec.os.desired_version.as_str()).filter(|v| !v.is_empty())
    }

    /// Last observed OS version from the status, empty when unknown.
    #[must_use]
    pub fn current_version(&self) -> &str {
        self.status
            .as_ref()
            .map_or("", |s| s.os.current_version.as_str())
    }

    /// Request id of the last preload recorded in the status.
    #[must_use]
    pub fn observed_preload_request(&self) -> Option<&str> {
        self.status
            .as_ref()
            .map(|s| s.preload.observed_request_id.as_str())
            .filter(|id| !id.is_empty())
    }

    /// Phase of the last preload recorded in the status.
    #[must_use]
    pub fn preload_phase(&self) -> Option<PreloadPhase> {
        self.status.as_ref().and_then(|s| s.preload.phase)
    }
}
