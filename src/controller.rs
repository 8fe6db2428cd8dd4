// Copyright (c) 2025 Cyberun, cyberun.cloud
// SPDX-License-Identifier: MIT

//! The probe → synthesize → publish control loop.
//!
//! One tick fires every `interval`: the loop snapshots the Spec Store,
//! probes every target, synthesizes a generation from the resulting health
//! snapshot, publishes it atomically, then patches config statuses. A tick
//! that runs past the interval causes the next tick to be skipped (never
//! queued) and is reported as an overrun.
//!
//! The loop owns the health table, the synthesizer's serial state, and the
//! publisher; each tick therefore pairs exactly one spec snapshot with
//! exactly one completed probe pass over that snapshot's targets.

use crate::config::ControllerConfig;
use crate::constants::DNS_PORT;
use crate::geoip::GeoIpState;
use crate::health::HealthTable;
use crate::metrics;
use crate::prober::Prober;
use crate::publish::{PublishOutcome, Publisher};
use crate::status;
use crate::store::SpecStore;
use crate::synth::{SynthSettings, ZoneSynthesizer};
use anyhow::Result;
use kube::Client;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Owns the tick-driven reconciliation pipeline.
pub struct ControlLoop {
    config: ControllerConfig,
    store: Arc<SpecStore>,
    client: Client,
    prober: Prober,
    table: HealthTable,
    synthesizer: ZoneSynthesizer,
    publisher: Publisher,
    geoip: GeoIpState,
}

impl ControlLoop {
    /// Wire up the pipeline components.
    ///
    /// Opens the output directory, recovers published SOA serials, and
    /// builds the probe client.
    ///
    /// # Errors
    ///
    /// Returns an error if the output directory is unusable or the probe
    /// client cannot be built; both are fatal startup conditions.
    pub fn new(config: ControllerConfig, store: Arc<SpecStore>, client: Client) -> Result<Self> {
        let prober = Prober::new(&config)?;
        let publisher = Publisher::new(&config.output_dir, config.reload_command.clone())?;
        let mut synthesizer = ZoneSynthesizer::new();
        synthesizer.recover_serials(&publisher.current_dir());

        Ok(Self {
            config,
            store,
            client,
            prober,
            table: HealthTable::new(),
            synthesizer,
            publisher,
            geoip: GeoIpState::new(),
        })
    }

    /// Run ticks forever.
    ///
    /// # Errors
    ///
    /// Never returns in normal operation; the signature matches the other
    /// long-running controller tasks.
    pub async fn run(mut self) -> Result<()> {
        info!(
            interval_secs = self.config.interval.as_secs(),
            timeout_secs = self.config.timeout.as_secs(),
            concurrency = self.config.probe_concurrency,
            "Starting probe control loop"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let started = Instant::now();
            self.run_cycle().await;
            let elapsed = started.elapsed();
            let overran = elapsed > self.config.interval;
            metrics::record_tick(elapsed, overran);
            if overran {
                warn!(
                    elapsed_ms = elapsed.as_millis(),
                    interval_secs = self.config.interval.as_secs(),
                    "Tick overran the probe interval, next tick will be skipped"
                );
            }
        }
    }

    /// One probe → synthesize → publish → status cycle.
    async fn run_cycle(&mut self) {
        let specs = self.store.snapshot();
        let stats = self.prober.run_tick(&mut self.table, &specs).await;
        debug!(
            probed = stats.probed,
            up = stats.up,
            down = stats.down,
            "Probe tick completed"
        );

        let health = self.table.snapshot();
        let geoip_views = self.geoip.database_ready(&self.config.geoip);
        let settings = SynthSettings {
            record_ttl: self.config.record_ttl(),
            geoip_views,
            geoip_db_path: self.config.geoip.db_path.display().to_string(),
            zone_path_prefix: self.publisher.current_dir().display().to_string(),
            dns_port: DNS_PORT,
        };

        let generation = self.synthesizer.synthesize(&specs, &health, &settings);
        match self.publisher.publish(&generation).await {
            Ok(PublishOutcome::Published { generation, files }) => {
                metrics::record_publish("published");
                debug!(generation, files, "Generation published");
            }
            Ok(PublishOutcome::Unchanged) => {
                metrics::record_publish("unchanged");
            }
            Err(err) => {
                metrics::record_publish("error");
                warn!(
                    error = %err,
                    "Publish failed, previous generation stays live; retrying next tick"
                );
            }
        }

        status::publish_statuses(&self.client, &specs, &health).await;
    }
}
