// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use axum::{http::header, http::StatusCode, response::IntoResponse, routing::get, Router};
use clap::Parser;
use clusterdns::{
    config::{Config, LogFormat},
    constants::{METRICS_PATH, TOKIO_WORKER_THREADS},
    errors::SyncError,
    metrics, watch,
    zone::MemoryZone,
};
use kube::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info};

fn main() -> Result<()> {
    let config = Config::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("clusterdns")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

async fn async_main(config: Config) -> Result<()> {
    // Respects RUST_LOG if set, otherwise defaults to INFO level
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match config.log_format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!(zone = %config.zone, ttl = config.ttl, "Starting cluster DNS synchronizer");
    debug!("Logging initialized with file and line number tracking");

    // Fail fast on a bad zone origin, before touching the API server
    config.naming_policy()?;

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await.map_err(SyncError::Kube)?;
    debug!("Kubernetes client initialized successfully");

    if let Some(addr) = config.metrics_addr {
        tokio::spawn(async move {
            if let Err(e) = serve_metrics(addr).await {
                error!(error = %e, "Metrics server exited");
            }
        });
    }

    let zone = Arc::new(MemoryZone::new());

    tokio::select! {
        result = watch::run(client, &config, Arc::clone(&zone)) => {
            error!("CRITICAL: watch loop exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("watch loop exited unexpectedly without error")
        }
        () = shutdown_signal() => {
            info!("Shutdown signal received, stopping");
            Ok(())
        }
    }
}

/// Serve the Prometheus registry on `addr`.
async fn serve_metrics(addr: SocketAddr) -> Result<(), SyncError> {
    let router = Router::new().route(METRICS_PATH, get(metrics_handler));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, path = METRICS_PATH, "Serving metrics");
    axum::serve(listener, router).await?;
    Ok(())
}

async fn metrics_handler() -> impl IntoResponse {
    match metrics::gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
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
                error!(error = %e, "Failed to listen for SIGTERM");
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
}
