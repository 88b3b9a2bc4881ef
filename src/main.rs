use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use dumpyard_finder::{build_router, init_tracing, AppConfig, AppState, HttpMapsClient, Orchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = AppConfig::from_env();
    if config.maps_api_key.is_none() {
        warn!("MAPS_API_KEY is not set; provider calls will be rejected");
    }

    let maps = HttpMapsClient::new(&config).context("failed to build maps http client")?;
    let state = AppState {
        orchestrator: Arc::new(Orchestrator::new(Arc::new(maps), &config)),
        config: Arc::new(config.public_profile()),
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "dumpyard finder listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(?err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(?err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("received shutdown signal, starting graceful shutdown");
}
