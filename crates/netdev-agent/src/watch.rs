//! Watch loop for the agent's `NetworkDevice`.

use std::sync::Arc;

use futures::StreamExt;
use kube::api::Api;
use kube::runtime::watcher::{self, watcher, Config as WatcherConfig};
use kube::runtime::WatchStreamExt;
use netdev_core::NetworkDevice;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::reconcile::{DeviceEvent, ReconcileEngine};

/// Turns raw watcher events into add/update/delete events.
///
/// Keeps the last object seen so an `Apply` can be reported together with
/// the snapshot it replaces.
#[derive(Debug, Default)]
pub struct EventTranslator {
    last: Option<NetworkDevice>,
}

impl EventTranslator {
    /// Create a translator that has seen nothing yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate one watcher event. Returns `None` for bookkeeping events.
    pub fn translate(&mut self, event: watcher::Event<NetworkDevice>) -> Option<DeviceEvent> {
        match event {
            watcher::Event::Apply(device) | watcher::Event::InitApply(device) => {
                match self.last.replace(device.clone()) {
                    None => Some(DeviceEvent::Add(device)),
                    Some(old) => Some(DeviceEvent::Update { old, new: device }),
                }
            }
            watcher::Event::Delete(device) => {
                self.last = None;
                Some(DeviceEvent::Delete(device))
            }
            watcher::Event::Init | watcher::Event::InitDone => None,
        }
    }
}

/// Watch the resource named in the engine's configuration and feed its
/// changes to the engine until `shutdown` is cancelled.
pub async fn run_watch(
    engine: Arc<ReconcileEngine>,
    api: Api<NetworkDevice>,
    shutdown: CancellationToken,
) {
    let device_name = engine.config().device_name.clone();
    let config = WatcherConfig::default().fields(&format!("metadata.name={device_name}"));

    let stream = watcher(api, config).default_backoff();
    futures::pin_mut!(stream);

    let mut translator = EventTranslator::new();

    info!(device = %device_name, "Starting NetworkDevice watch");

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                info!(device = %device_name, "Stopping NetworkDevice watch");
                break;
            }
            event = stream.next() => match event {
                Some(Ok(event)) => {
                    if let Some(event) = translator.translate(event) {
                        engine.handle(event).await;
                    }
                }
                Some(Err(e)) => {
                    // The watcher reconnects with backoff.
                    error!(device = %device_name, error = %e, "Watcher error, will retry");
                }
                None => {
                    warn!(device = %device_name, "Watch stream ended");
                    break;
                }
            },
        }
    }

    debug!(device = %device_name, "Watch loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::testing::resource;

    #[test]
    fn first_apply_is_add_then_update() {
        let mut translator = EventTranslator::new();

        let first = translator.translate(watcher::Event::InitApply(resource("A", "A")));
        assert!(matches!(first, Some(DeviceEvent::Add(_))));

        let second = translator.translate(watcher::Event::Apply(resource("B", "A")));
        match second {
            Some(DeviceEvent::Update { old, new }) => {
                assert_eq!(old.desired_version(), Some("A"));
                assert_eq!(new.desired_version(), Some("B"));
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn delete_resets_history() {
        let mut translator = EventTranslator::new();
        translator.translate(watcher::Event::Apply(resource("A", "A")));

        let deleted = translator.translate(watcher::Event::Delete(resource("A", "A")));
        assert!(matches!(deleted, Some(DeviceEvent::Delete(_))));

        let recreated = translator.translate(watcher::Event::Apply(resource("B", "")));
        assert!(matches!(recreated, Some(DeviceEvent::Add(_))));
    }

    #[test]
    fn bookkeeping_events_are_dropped() {
        let mut translator = EventTranslator::new();
        assert!(translator.translate(watcher::Event::Init).is_none());
        assert!(translator.translate(watcher::Event::InitDone).is_none());
    }
}
