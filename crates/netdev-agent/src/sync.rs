//! Periodic version sync.

use std::sync::Arc;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::reconcile::ReconcileEngine;

/// Run [`ReconcileEngine::sync_once`] every `sync_interval` until `shutdown`
/// is cancelled. The first pass runs immediately.
pub async fn run_periodic_sync(engine: Arc<ReconcileEngine>, shutdown: CancellationToken) {
    let period = engine.config().sync_interval;
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        device = %engine.config().device_name,
        interval_secs = period.as_secs(),
        "Starting periodic sync"
    );

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                info!("Stopping periodic sync");
                break;
            }
            _ = ticker.tick() => {}
        }

        match engine.sync_once().await {
            Ok(outcome) => debug!(?outcome, "Periodic sync complete"),
            Err(e) => warn!(
                error = %e,
                retriable = e.is_retriable(),
                "Periodic sync failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::testing::{harness, resource};
    use netdev_device::DeviceCall;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn syncs_on_interval_until_shutdown() {
        let h = harness("A", resource("A", "A"));
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(run_periodic_sync(Arc::clone(&h.engine), shutdown.clone()));

        // Immediate pass plus the passes at 60s and 120s.
        tokio::time::sleep(Duration::from_secs(150)).await;
        shutdown.cancel();
        task.await.unwrap();

        let queries = h
            .device
            .calls()
            .into_iter()
            .filter(|c| *c == DeviceCall::QueryVersion)
            .count();
        assert_eq!(queries, 3);
        assert_eq!(h.device.mutating_call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_a_pass_in_flight() {
        let mut h = harness("A", resource("B", "A"));
        let shutdown = CancellationToken::new();
        h.rebuild_with_shutdown(shutdown.clone());
        h.device.set_install_delay(Duration::from_secs(3600));

        let task = tokio::spawn(run_periodic_sync(Arc::clone(&h.engine), shutdown.clone()));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(h.device.installs().len(), 1);

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("sync loop should stop promptly")
            .unwrap();
        assert_eq!(h.device.reboot_count(), 0);
        assert!(h.engine.upgrades().snapshot().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn drives_upgrade_to_convergence() {
        let h = harness("A", resource("B", "A"));
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_periodic_sync(Arc::clone(&h.engine), shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(h.device.installs().len(), 1);
        assert_eq!(h.device.reboot_count(), 1);
        assert!(h.engine.upgrades().snapshot().is_some());

        h.device.set_version("B");
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(h.engine.upgrades().snapshot().is_none());
        assert_eq!(h.device.mutating_call_count(), 2);

        shutdown.cancel();
        task.await.unwrap();
    }
}
