//! Netdev transfer server - device-side file transfer responder
//!
//! Resolves its listen endpoint from `GNOI_ENDPOINT`/`GNOI_USE_TLS`, falling
//! back to `localhost:8080`. Set `HOST_ROOT_FS` when the host filesystem is
//! mounted at another location inside the container.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use netdev_core::EnvEndpointSource;
use netdev_transfer::{create_router, FileService, TransferConfig};

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

    let config = TransferConfig::from_env(&EnvEndpointSource);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.listen,
        host_root = ?config.host_root,
        "Starting netdev transfer server"
    );

    let service = Arc::new(FileService::new(config.host_root.clone())?);
    let app = create_router(service);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(listen = %config.listen, "Transfer server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Transfer server stopped");
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
