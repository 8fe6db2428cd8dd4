// Copyright (c) 2025 Cyberun, cyberun.cloud
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use kube::Client;
use simplegslb::{
    config::ControllerConfig,
    constants::{
        METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PATH, METRICS_SERVER_PORT,
        TOKIO_WORKER_THREADS,
    },
    controller::ControlLoop,
    metrics,
    store::SpecStore,
    watch,
};
use std::sync::Arc;
use tracing::{error, info};

fn main() -> Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("simplegslb-controller")
        .enable_all()
        .build()
        .context("failed to build Tokio runtime")?
        .block_on(run())
}

/// Set up `tracing` output.
///
/// The filter comes from `RUST_LOG` (default `info`). Setting
/// `RUST_LOG_FORMAT=json` switches to JSON lines for log collectors;
/// anything else gets the compact human-readable format.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = std::env::var("RUST_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_thread_names(true);

    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

/// Prometheus exposition handler backing `/metrics`.
async fn metrics_endpoint() -> String {
    metrics::gather_metrics().unwrap_or_else(|err| {
        error!(error = %err, "Failed to encode metrics");
        String::from("# metrics encoding failed\n")
    })
}

/// Serve the metrics endpoint until the process exits.
///
/// A bind failure only loses observability, so it is logged rather than
/// treated as fatal.
async fn serve_metrics() {
    let bind_addr = format!("{METRICS_SERVER_BIND_ADDRESS}:{METRICS_SERVER_PORT}");
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%bind_addr, error = %err, "Metrics server failed to bind");
            return;
        }
    };

    info!("Serving metrics on http://{bind_addr}{METRICS_SERVER_PATH}");
    let router = Router::new().route(METRICS_SERVER_PATH, get(metrics_endpoint));
    if let Err(err) = axum::serve(listener, router).await {
        error!(error = %err, "Metrics server terminated");
    }
}

/// Resolve once SIGINT or SIGTERM arrives.
///
/// Kubernetes delivers SIGTERM on pod deletion; SIGINT covers interactive
/// runs. On non-Unix targets only Ctrl+C is wired up.
async fn shutdown_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return "SIGINT";
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        "SIGINT"
    }
}

async fn run() -> Result<()> {
    init_tracing();
    info!("Starting SimpleGSLB controller");

    let config = ControllerConfig::from_env().context("invalid process configuration")?;
    info!(
        interval_secs = config.interval.as_secs(),
        timeout_secs = config.timeout.as_secs(),
        geoip_enabled = config.geoip.enabled,
        output_dir = %config.output_dir.display(),
        "Configuration loaded"
    );

    let client = Client::try_default()
        .await
        .context("failed to initialize Kubernetes client")?;

    let store = Arc::new(SpecStore::new());
    let control_loop = ControlLoop::new(config, store.clone(), client.clone())?;

    tokio::spawn(serve_metrics());

    // The watch consumer and the control loop run until a signal arrives;
    // either of them returning on its own is a controller failure.
    tokio::select! {
        signal = shutdown_signal() => {
            info!(signal, "Shutdown signal received, stopping controller");
            Ok(())
        }
        result = watch::run_watch(client, store) => {
            error!("GslbConfig watch exited unexpectedly: {result:?}");
            result.and(Err(anyhow::anyhow!("GslbConfig watch exited unexpectedly")))
        }
        result = control_loop.run() => {
            error!("Control loop exited unexpectedly: {result:?}");
            result.and(Err(anyhow::anyhow!("control loop exited unexpectedly")))
        }
    }
}
