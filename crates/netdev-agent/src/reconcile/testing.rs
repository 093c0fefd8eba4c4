//! Fixtures shared by the engine tests.

use std::sync::Arc;

use netdev_core::resource::{OsStatus, PreloadSpec};
use netdev_core::{NetworkDevice, NetworkDeviceSpec, NetworkDeviceStatus};
use netdev_device::MockDeviceClient;
use tokio_util::sync::CancellationToken;

use super::ReconcileEngine;
use crate::config::AgentConfig;
use crate::store::mock::InMemoryResourceStore;

pub(crate) const DEVICE: &str = "leaf-01";

/// A resource declaring `desired` whose status reports `current`.
pub(crate) fn resource(desired: &str, current: &str) -> NetworkDevice {
    let mut device = NetworkDevice::new(DEVICE, NetworkDeviceSpec::default());
    device.spec.os.desired_version = desired.to_string();
    if !current.is_empty() {
        device.status = Some(NetworkDeviceStatus {
            os: OsStatus {
                current_version: current.to_string(),
                ..OsStatus::default()
            },
            ..NetworkDeviceStatus::default()
        });
    }
    device
}

/// Attach a preload request to `device`.
pub(crate) fn with_preload(
    mut device: NetworkDevice,
    request_id: &str,
    mode: &str,
    image_url: &str,
) -> NetworkDevice {
    device.spec.preload = PreloadSpec {
        target_version: "C".to_string(),
        image_url: image_url.to_string(),
        request_id: request_id.to_string(),
        mode: mode.to_string(),
        ..PreloadSpec::default()
    };
    device
}

pub(crate) struct Harness {
    pub engine: Arc<ReconcileEngine>,
    pub device: Arc<MockDeviceClient>,
    pub store: Arc<InMemoryResourceStore>,
}

impl Harness {
    /// Replace the engine with one built from an adjusted configuration.
    pub fn rebuild(&mut self, adjust: impl FnOnce(&mut AgentConfig)) {
        let mut config = self.engine.config().clone();
        adjust(&mut config);
        self.engine = Arc::new(engine(config, &self.device, &self.store));
    }

    /// Replace the engine with one stopped by `shutdown`.
    pub fn rebuild_with_shutdown(&mut self, shutdown: CancellationToken) {
        let config = self.engine.config().clone();
        self.engine = Arc::new(engine(config, &self.device, &self.store).with_shutdown(shutdown));
    }
}

fn engine(
    config: AgentConfig,
    device: &Arc<MockDeviceClient>,
    store: &Arc<InMemoryResourceStore>,
) -> ReconcileEngine {
    ReconcileEngine::new(
        config,
        Arc::clone(device) as _,
        Arc::clone(device) as _,
        Arc::clone(store) as _,
    )
}

/// An engine over a mock device reporting `version` and a store holding
/// `resource`.
pub(crate) fn harness(version: &str, resource: NetworkDevice) -> Harness {
    let device = Arc::new(MockDeviceClient::new(version));
    let store = Arc::new(InMemoryResourceStore::new());
    store.insert(resource);

    let engine = Arc::new(engine(AgentConfig::new(DEVICE), &device, &store));
    Harness {
        engine,
        device,
        store,
    }
}
