//! Drives the engine through the public API the `test-utils` feature
//! exposes to other crates.

use std::sync::Arc;

use netdev_agent::{AgentConfig, InMemoryResourceStore, Outcome, ReconcileEngine};
use netdev_core::{NetworkDevice, NetworkDeviceSpec};
use netdev_device::MockDeviceClient;

#[tokio::test]
async fn engine_runs_over_exported_test_doubles() {
    let device = Arc::new(MockDeviceClient::new("A"));
    let store = Arc::new(InMemoryResourceStore::new());

    let mut resource = NetworkDevice::new("leaf-01", NetworkDeviceSpec::default());
    resource.spec.os.desired_version = "B".into();
    store.insert(resource);

    let engine = ReconcileEngine::new(
        AgentConfig::new("leaf-01"),
        device.clone(),
        device.clone(),
        store.clone(),
    );

    assert_eq!(engine.sync_once().await.unwrap(), Outcome::AwaitingVersion);
    assert_eq!(device.reboot_count(), 1);
    assert_eq!(store.status("leaf-01").os.current_version, "A");

    device.set_version("B");
    assert_eq!(engine.sync_once().await.unwrap(), Outcome::Converged);
}
