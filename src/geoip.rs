// Copyright (c) 2025 Cyberun, cyberun.cloud
// SPDX-License-Identifier: MIT

//! GeoIP database gating for split-horizon view generation.
//!
//! The data plane performs the actual client-country lookup; this controller
//! only checks that the configured GeoLite2 database is present before it
//! emits view routing. Database provisioning (download, refresh cadence) is
//! handled by a sidecar using the account/license credentials carried here.

use std::path::PathBuf;
use tracing::{info, warn};

/// GeoIP configuration knobs.
#[derive(Clone, Debug, Default)]
pub struct GeoIpSettings {
    /// Whether per-country view generation is enabled at all.
    pub enabled: bool,

    /// Path of the GeoLite2 database mounted for the data plane.
    pub db_path: PathBuf,

    /// MaxMind account id, passed through to the provisioning sidecar.
    pub account: String,

    /// MaxMind license key, passed through to the provisioning sidecar.
    pub license: String,
}

/// Tracks GeoIP database availability across synthesis cycles.
///
/// Logs once per state change rather than every cycle.
#[derive(Debug, Default)]
pub struct GeoIpState {
    available: Option<bool>,
}

impl GeoIpState {
    /// Create a new, not-yet-checked state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether view routing may be emitted this cycle.
    ///
    /// Returns `false` when GeoIP is disabled, and also when it is enabled
    /// but the database file is missing or empty (the synthesizer then falls
    /// back to default-only output until the database appears).
    pub fn database_ready(&mut self, settings: &GeoIpSettings) -> bool {
        if !settings.enabled {
            return false;
        }

        let ready = std::fs::metadata(&settings.db_path)
            .map(|meta| meta.is_file() && meta.len() > 0)
            .unwrap_or(false);

        if self.available != Some(ready) {
            if ready {
                info!(
                    db_path = %settings.db_path.display(),
                    "GeoIP database available, emitting per-country views"
                );
            } else {
                warn!(
                    db_path = %settings.db_path.display(),
                    "GeoIP enabled but database missing or empty, serving default view only"
                );
            }
            self.available = Some(ready);
        }

        ready
    }
}
