// Copyright (c) 2025 Cyberun, cyberun.cloud
// SPDX-License-Identifier: MIT

//! Concurrent health probing of spec'd targets.
//!
//! Each tick the prober takes a Spec Store snapshot, reconciles the health
//! table against it, then dispatches one probe per `(record, target)` pair
//! with a bounded fan-out. Probes carry independent deadlines; a probe that
//! times out or fails marks its target `down` and never aborts the tick.
//!
//! Probe kinds:
//! - `tcp` - connection handshake within the deadline, closed immediately
//! - `http` - GET with redirects disabled; healthy iff status is in [200, 300)
//! - `https` - same over TLS; the certificate is not validated (targets are
//!   IP-addressed load balancers, often with self-signed certificates)

use crate::config::ControllerConfig;
use crate::crd::ProbeProtocol;
use crate::health::{HealthTable, TargetKey};
use crate::metrics;
use crate::store::{ValidatedConfig, ValidatedTarget};
use anyhow::{Context, Result};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Summary of one completed probe tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Probes dispatched this tick.
    pub probed: usize,
    /// Probes that succeeded.
    pub up: usize,
    /// Probes that failed or timed out.
    pub down: usize,
    /// Samples created for newly appeared targets.
    pub targets_added: usize,
    /// Samples garbage-collected for vanished targets.
    pub targets_removed: usize,
}

/// Dispatches health probes and folds their outcomes into the health table.
pub struct Prober {
    http: reqwest::Client,
    timeout: Duration,
    concurrency: usize,
}

impl Prober {
    /// Build a prober from the controller configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &ControllerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(true)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .context("failed to build probe HTTP client")?;

        Ok(Self {
            http,
            timeout: config.timeout,
            concurrency: config.probe_concurrency,
        })
    }

    /// Run one probe tick over the given spec snapshot.
    ///
    /// Reconciles the table against the snapshot, probes every target with
    /// bounded concurrency, and records each outcome. Returns once every
    /// probe has completed or timed out.
    pub async fn run_tick(
        &self,
        table: &mut HealthTable,
        specs: &[Arc<ValidatedConfig>],
    ) -> TickStats {
        let (targets_added, targets_removed) = table.sync_targets(specs);
        if targets_added > 0 || targets_removed > 0 {
            debug!(
                added = targets_added,
                removed = targets_removed,
                "Health table reconciled against spec snapshot"
            );
        }

        let mut probes = Vec::new();
        for config in specs {
            for (record_index, record) in config.records.iter().enumerate() {
                for (target_index, target) in record.targets.iter().enumerate() {
                    probes.push((
                        TargetKey {
                            object: config.id.clone(),
                            record: record_index,
                            target: target_index,
                        },
                        target.clone(),
                    ));
                }
            }
        }

        let mut stats = TickStats {
            probed: probes.len(),
            targets_added,
            targets_removed,
            ..TickStats::default()
        };

        let outcomes: Vec<(TargetKey, bool)> = stream::iter(probes)
            .map(|(key, target)| async move {
                let healthy = self.probe_target(&target).await;
                (key, healthy)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let now = Utc::now();
        for (key, healthy) in outcomes {
            if healthy {
                stats.up += 1;
                table.record_success(&key, now);
            } else {
                stats.down += 1;
                table.record_failure(&key, now);
            }
        }

        metrics::set_target_gauges(table.len(), stats.up);
        stats
    }

    /// Probe one target according to its declared protocol.
    async fn probe_target(&self, target: &ValidatedTarget) -> bool {
        let started = Instant::now();
        let healthy = match target.protocol {
            ProbeProtocol::Tcp => self.probe_tcp(target).await,
            ProbeProtocol::Http | ProbeProtocol::Https => self.probe_http(target).await,
        };
        metrics::record_probe(&target.protocol.to_string(), healthy, started.elapsed());

        if !healthy {
            let location = if target.location.is_empty() {
                "default"
            } else {
                target.location.as_str()
            };
            warn!(
                probe = %format!("{}://{}:{}{}", target.protocol, target.address, target.port,
                    probe_path(target)),
                location,
                "Target unhealthy"
            );
        }
        healthy
    }

    /// TCP probe: handshake within the deadline, then drop the connection.
    async fn probe_tcp(&self, target: &ValidatedTarget) -> bool {
        let addr = SocketAddr::from((target.address, target.port));
        matches!(
            tokio::time::timeout(self.timeout, tokio::net::TcpStream::connect(addr)).await,
            Ok(Ok(_))
        )
    }

    /// HTTP(S) probe: GET the configured path, healthy iff 2xx.
    async fn probe_http(&self, target: &ValidatedTarget) -> bool {
        let url = format!(
            "{}://{}:{}{}",
            target.protocol,
            target.address,
            target.port,
            probe_path(target)
        );
        match self.http.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!(url = %url, error = %err, "HTTP probe failed");
                false
            }
        }
    }
}

/// Probe path, only meaningful for HTTP(S); TCP probes report `/` for logging.
fn probe_path(target: &ValidatedTarget) -> &str {
    match target.protocol {
        ProbeProtocol::Http | ProbeProtocol::Https => &target.path,
        ProbeProtocol::Tcp => "",
    }
}
