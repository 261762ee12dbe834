//! Billing API server
//!
//! # Usage
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/billing cargo run --bin billing-api
//! API_PORT=9000 API_LOG_JSON=true cargo run --bin billing-api
//! ```
//!
//! See [`interface_api::config`] for every setting.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::net::TcpListener;

use interface_api::{
    bootstrap::connect_service, config::ApiConfig, create_router, telemetry::init_tracing, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = ApiConfig::load().context("failed to load configuration")?;
    init_tracing(&config);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        currency = %config.billing.currency.code(),
        "Starting billing API server"
    );

    let service = connect_service(&config).await?;
    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .with_context(|| format!("invalid server address {}", config.server_addr()))?;
    let app = create_router(AppState::new(service));

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM so in-flight requests can complete
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
