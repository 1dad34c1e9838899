mod auth;
mod config;
mod dto;
mod error;
mod routes;
mod state;
mod store;

use std::sync::Arc;

use csm_driver::{RegionTable, SshKeyBootstrap};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::routes::api_router;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let regions = RegionTable::default();
    let config = AppConfig::from_env(&regions).expect("invalid configuration");

    let client = Arc::new(csm_driver::cloudshare::client(&config.driver.credentials));
    tracing::info!(
        api_id = %config.driver.credentials.api_id,
        region = %config.driver.region.name,
        store = %config.driver.store_path.display(),
        "cloudshare driver ready"
    );

    let shutdown = CancellationToken::new();
    let state = AppState::new(
        config.clone(),
        regions,
        client,
        Arc::new(SshKeyBootstrap::new()),
        shutdown.clone(),
    );

    let app = api_router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .expect("failed to bind listener");

    tracing::info!(addr = %config.listen_addr, "starting machine server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .expect("server error");
}

/// Resolve on Ctrl-C, cancelling every in-flight wait.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        return;
    }
    tracing::info!("shutting down, cancelling in-flight waits");
    shutdown.cancel();
}
