// Copyright (c) 2025 Cyberun, cyberun.cloud
// SPDX-License-Identifier: MIT

//! Common test utilities for integration tests.

use simplegslb::config::ControllerConfig;
use simplegslb::crd::{GslbConfig, GslbConfigSpec, NameserverSpec, ProbeProtocol, RecordSpec, TargetSpec};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;

/// Controller configuration suitable for probing loopback listeners.
pub fn test_config(output_dir: &std::path::Path) -> ControllerConfig {
    ControllerConfig {
        interval: Duration::from_secs(5),
        timeout: Duration::from_secs(1),
        probe_concurrency: 8,
        output_dir: output_dir.to_path_buf(),
        ..ControllerConfig::default()
    }
}

/// A TCP probe target pointed at a local socket address.
pub fn tcp_target(addr: SocketAddr, location: &str, weight: u32) -> TargetSpec {
    TargetSpec {
        address: addr.ip().to_string(),
        location: location.to_string(),
        weight,
        protocol: ProbeProtocol::Tcp,
        port: addr.port(),
        path: "/".to_string(),
    }
}

/// An HTTP probe target pointed at a local socket address.
pub fn http_target(addr: SocketAddr, path: &str) -> TargetSpec {
    TargetSpec {
        address: addr.ip().to_string(),
        location: String::new(),
        weight: 1,
        protocol: ProbeProtocol::Http,
        port: addr.port(),
        path: path.to_string(),
    }
}

/// Build a namespaced `GslbConfig` object.
pub fn make_config(
    namespace: &str,
    name: &str,
    domain: &str,
    records: Vec<(&str, Vec<TargetSpec>)>,
) -> GslbConfig {
    let spec = GslbConfigSpec {
        domain: domain.to_string(),
        nameservers: vec![NameserverSpec {
            hostname: format!("ns1.{domain}"),
            address: "127.0.0.53".to_string(),
        }],
        records: records
            .into_iter()
            .map(|(record_name, targets)| RecordSpec {
                name: record_name.to_string(),
                targets,
            })
            .collect(),
    };
    let mut obj = GslbConfig::new(name, spec);
    obj.metadata.namespace = Some(namespace.to_string());
    obj
}

/// Bind a loopback listener that accepts (and keeps accepting) connections.
///
/// The listener stays alive as long as the returned handle is held.
pub async fn spawn_tcp_listener() -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        loop {
            let _ = listener.accept().await;
        }
    });
    (addr, handle)
}

/// A loopback address nothing is listening on (connections are refused).
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Spawn a small HTTP server with healthy, failing and redirecting routes.
pub async fn spawn_http_server() -> SocketAddr {
    use axum::http::StatusCode;
    use axum::response::Redirect;
    use axum::{routing::get, Router};

    let app = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route(
            "/fail",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route("/redirect", get(|| async { Redirect::temporary("/healthz") }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}
