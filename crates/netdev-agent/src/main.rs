//! Netdev agent - single-device firmware reconciliation service
//!
//! Reconciles the `NetworkDevice` named by `DEVICE_NAME` against the device
//! it describes. The device endpoint comes from `GNOI_ENDPOINT`/`GNOI_USE_TLS`,
//! falling back to `<DEVICE_NAME>:8080`. Set `DEBUG_MODE=true` to simulate
//! the device and `DRY_RUN=true` to only log periodic upgrades.

use std::sync::Arc;

use kube::api::Api;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use netdev_agent::{run_periodic_sync, run_watch, AgentConfig, KubeResourceStore, ReconcileEngine};
use netdev_core::{EnvEndpointSource, NetworkDevice};
use netdev_device::{
    DeviceClient, FileTransferClient, HttpDeviceClient, HttpFileTransferClient,
    SimulatedDeviceClient,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,netdev=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AgentConfig::from_env()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        device = %config.device_name,
        namespace = %config.namespace,
        sync_interval_secs = config.sync_interval.as_secs(),
        debug_mode = config.debug_mode,
        dry_run = config.dry_run,
        "Starting netdev agent"
    );

    let (device, files): (Arc<dyn DeviceClient>, Arc<dyn FileTransferClient>) =
        if config.debug_mode {
            tracing::warn!("Debug mode enabled, device calls are simulated");
            let simulated = Arc::new(SimulatedDeviceClient::new());
            (Arc::clone(&simulated) as Arc<dyn DeviceClient>, simulated as Arc<dyn FileTransferClient>)
        } else {
            let endpoint = config.device_endpoint(&EnvEndpointSource);
            (
                Arc::new(HttpDeviceClient::new(endpoint.clone())?) as Arc<dyn DeviceClient>,
                Arc::new(HttpFileTransferClient::new(endpoint)?) as Arc<dyn FileTransferClient>,
            )
        };

    let client = kube::Client::try_default().await?;
    tracing::info!("Connected to Kubernetes cluster");
    let api: Api<NetworkDevice> = Api::namespaced(client, &config.namespace);
    let store = Arc::new(KubeResourceStore::new(api.clone()));

    let shutdown = CancellationToken::new();
    let engine = Arc::new(
        ReconcileEngine::new(config, device, files, store).with_shutdown(shutdown.clone()),
    );

    let watch_task = tokio::spawn(run_watch(Arc::clone(&engine), api, shutdown.clone()));
    let sync_task = tokio::spawn(run_periodic_sync(Arc::clone(&engine), shutdown.clone()));

    shutdown_signal().await;
    // Also abandons any install, reboot or transfer still in flight.
    shutdown.cancel();

    let (watch_result, sync_result) = tokio::join!(watch_task, sync_task);
    watch_result?;
    sync_result?;

    tracing::info!("Agent stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl-C, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
