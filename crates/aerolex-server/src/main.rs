//! Aerolex Server - Main entry point

use anyhow::Result;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tracing::info;

use aerolex_common::logging::{init_logging, LogConfig};
use aerolex_server::{
    api,
    config::Config,
    context::AppContext,
    middleware::{self, rate_limit},
};

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::from_env()?.with_prefix("aerolex-server");
    init_logging(&log_config)?;

    info!("Starting Aerolex Server");

    let config = Config::load()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        "Configuration loaded"
    );

    let shutdown_timeout = config.server.shutdown_timeout_secs;
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let cors = middleware::cors_layer(&config.cors);
    let requests_per_minute = config.server.rate_limit_per_minute;
    let dimension = config.embedding.dimension;

    let state = AppContext::build(config)?;

    // The store is the single durable state; make sure the collection
    // and its payload indexes exist before serving.
    state.ctx.store.ensure_collection(dimension, false).await?;
    info!(collection = state.ctx.store.collection(), "Vector store ready");

    let app = api::router(state)
        .layer(CompressionLayer::new())
        .layer(middleware::trace_requests())
        .layer(cors);
    let app = rate_limit::throttle(app, requests_per_minute)?;

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_timeout))
    .await?;

    info!("Server shut down gracefully");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
