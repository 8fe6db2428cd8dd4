// Copyright (c) 2025 Cyberun, cyberun.cloud
// SPDX-License-Identifier: MIT

//! Process configuration loaded from the environment.
//!
//! All knobs have defaults suitable for the in-cluster deployment; invalid
//! values are fatal at startup (everything after startup recovers locally).

use crate::constants::{
    DEFAULT_GEOIP_DB_PATH, DEFAULT_OUTPUT_DIR, DEFAULT_PROBE_CONCURRENCY,
    DEFAULT_PROBE_INTERVAL_SECS, DEFAULT_PROBE_TIMEOUT_SECS,
};
use crate::geoip::GeoIpSettings;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Controller configuration.
///
/// Loaded once at startup via [`ControllerConfig::from_env`] and shared
/// read-only afterwards.
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Probe period. Also the TTL of every synthesized A record, so caches
    /// expire no later than one health cycle.
    pub interval: Duration,

    /// Per-probe deadline.
    pub timeout: Duration,

    /// Bound on concurrently in-flight probes within one tick.
    pub probe_concurrency: usize,

    /// GeoIP settings gating split-horizon view generation.
    pub geoip: GeoIpSettings,

    /// Shared configuration directory read by the DNS server.
    pub output_dir: PathBuf,

    /// Optional command run best-effort after a successful publish
    /// (e.g. `kill -HUP $(cat /run/coredns.pid)`). When unset the data plane
    /// is expected to watch the published files itself.
    pub reload_command: Option<String>,
}

impl ControllerConfig {
    /// Load configuration from `GSLB_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable fails to parse or the resulting
    /// configuration is inconsistent (see [`ControllerConfig::validate`]).
    pub fn from_env() -> Result<Self> {
        let interval_secs = env_parse("GSLB_INTERVAL_SECONDS", DEFAULT_PROBE_INTERVAL_SECS)?;
        let timeout_secs = env_parse("GSLB_PROBE_TIMEOUT_SECONDS", DEFAULT_PROBE_TIMEOUT_SECS)?;
        let probe_concurrency = env_parse("GSLB_PROBE_CONCURRENCY", DEFAULT_PROBE_CONCURRENCY)?;

        let geoip = GeoIpSettings {
            enabled: env_parse("GSLB_GEOIP_ENABLED", false)?,
            db_path: PathBuf::from(env_string("GSLB_GEOIP_DB_PATH", DEFAULT_GEOIP_DB_PATH)),
            account: std::env::var("GSLB_GEOIP_ACCOUNT").unwrap_or_default(),
            license: std::env::var("GSLB_GEOIP_LICENSE").unwrap_or_default(),
        };

        let config = Self {
            interval: Duration::from_secs(interval_secs),
            timeout: Duration::from_secs(timeout_secs),
            probe_concurrency,
            geoip,
            output_dir: PathBuf::from(env_string("GSLB_OUTPUT_DIR", DEFAULT_OUTPUT_DIR)),
            reload_command: std::env::var("GSLB_RELOAD_COMMAND")
                .ok()
                .filter(|cmd| !cmd.trim().is_empty()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns an error when the interval is zero, the timeout is zero or not
    /// shorter than the interval, or the probe concurrency is zero.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            bail!("GSLB_INTERVAL_SECONDS must be at least 1");
        }
        if self.timeout.is_zero() {
            bail!("GSLB_PROBE_TIMEOUT_SECONDS must be at least 1");
        }
        if self.timeout >= self.interval {
            bail!(
                "probe timeout ({}s) must be shorter than the probe interval ({}s)",
                self.timeout.as_secs(),
                self.interval.as_secs()
            );
        }
        if self.probe_concurrency == 0 {
            bail!("GSLB_PROBE_CONCURRENCY must be at least 1");
        }
        if self.geoip.enabled && (self.geoip.account.is_empty() || self.geoip.license.is_empty()) {
            // Not fatal: the database may be provisioned out of band.
            warn!("GeoIP enabled without MaxMind credentials; relying on a pre-provisioned database");
        }
        Ok(())
    }

    /// TTL applied to every synthesized A record.
    #[must_use]
    pub fn record_ttl(&self) -> u32 {
        u32::try_from(self.interval.as_secs()).unwrap_or(u32::MAX)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_PROBE_INTERVAL_SECS),
            timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            probe_concurrency: DEFAULT_PROBE_CONCURRENCY,
            geoip: GeoIpSettings::default(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            reload_command: None,
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value '{raw}' for {key}")),
        Err(_) => Ok(default),
    }
}
