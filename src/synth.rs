// Copyright (c) 2025 Cyberun, cyberun.cloud
// SPDX-License-Identifier: MIT

//! Zone and server-config synthesis.
//!
//! Given a spec snapshot and the latest health snapshot, the synthesizer
//! produces one complete generation: an RFC 1035 zone file per `(domain,
//! view)` pair plus a CoreDNS Corefile routing clients to the view matching
//! their country. Outputs are deterministic for identical inputs except the
//! SOA serial, which only advances, and only when the zone body changed.
//!
//! View partitioning per record:
//! - a country view contains the `up` targets located in that country;
//! - a country view whose pool is empty falls back to the default pool;
//! - the default view contains the `up` targets with no location;
//! - a record with no eligible targets is omitted (NXRRSET) while the zone
//!   apex (SOA/NS) keeps being served.

use crate::constants::{
    COREFILE_NAME, DEFAULT_VIEW, SOA_EXPIRE_SECS, SOA_MINIMUM_SECS, SOA_REFRESH_SECS,
    SOA_RETRY_SECS, ZONE_FILE_SUFFIX,
};
use crate::gslb_errors::SynthesisError;
use crate::health::HealthSnapshot;
use crate::metrics;
use crate::store::{ValidatedConfig, ValidatedTarget};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Synthesis knobs resolved once per cycle.
#[derive(Clone, Debug)]
pub struct SynthSettings {
    /// TTL of every emitted A record; equals the effective probe interval.
    pub record_ttl: u32,
    /// Whether per-country views may be emitted this cycle (GeoIP enabled
    /// and the database present).
    pub geoip_views: bool,
    /// GeoLite2 database path written into the Corefile.
    pub geoip_db_path: String,
    /// Stable path prefix under which the data plane sees the published
    /// files (the `current` symlink), used in Corefile `file` directives.
    pub zone_path_prefix: String,
    /// Port the data plane serves DNS on.
    pub dns_port: u16,
}

/// One complete synthesized generation: `file name → contents`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Generation {
    pub files: BTreeMap<String, String>,
}

impl Generation {
    /// Number of files in the generation.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the generation holds no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[derive(Clone, Debug)]
struct ZoneState {
    serial: u32,
    body_hash: [u8; 32],
}

#[derive(Clone, Debug)]
struct CarriedDomain {
    files: BTreeMap<String, String>,
    regions: Vec<String>,
}

/// Stateful zone synthesizer.
///
/// Holds per-zone serial counters (recovered from the published generation
/// at startup) and the last successful output per domain so a config whose
/// synthesis fails keeps its previous files.
#[derive(Debug, Default)]
pub struct ZoneSynthesizer {
    serials: HashMap<String, ZoneState>,
    previous: HashMap<String, CarriedDomain>,
}

impl ZoneSynthesizer {
    /// Create a synthesizer with no serial history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recover per-zone serials from an already published generation.
    ///
    /// Restarts must never publish a serial at or below the live one, so the
    /// SOA of every `*.zone` file under `published_dir` seeds the counters.
    /// Missing or unparseable files are skipped.
    pub fn recover_serials(&mut self, published_dir: &Path) {
        let Ok(entries) = std::fs::read_dir(published_dir) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(ZONE_FILE_SUFFIX) {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            if let Some(serial) = parse_soa_serial(&content) {
                debug!(zone_file = %name, serial, "Recovered published SOA serial");
                self.serials.insert(
                    name,
                    ZoneState {
                        serial,
                        body_hash: zone_body_hash(&content),
                    },
                );
            }
        }
    }

    /// Synthesize one generation from the given spec and health snapshots.
    ///
    /// A config that fails to synthesize is skipped with its previous files
    /// carried forward; every other config proceeds.
    pub fn synthesize(
        &mut self,
        specs: &[Arc<ValidatedConfig>],
        health: &HealthSnapshot,
        settings: &SynthSettings,
    ) -> Generation {
        let mut files = BTreeMap::new();
        let mut domain_regions = BTreeMap::new();
        let mut next_previous = HashMap::new();

        for config in specs {
            match self.render_config(config, health, settings) {
                Ok((config_files, regions)) => {
                    files.extend(config_files.clone());
                    domain_regions.insert(config.domain.clone(), regions.clone());
                    next_previous.insert(
                        config.domain.clone(),
                        CarriedDomain {
                            files: config_files,
                            regions,
                        },
                    );
                }
                Err(err) => {
                    metrics::record_synthesis_error();
                    match self.previous.get(&config.domain) {
                        Some(carried) => {
                            warn!(
                                domain = %config.domain,
                                error = %err,
                                "Zone synthesis failed, keeping previous generation for this domain"
                            );
                            files.extend(carried.files.clone());
                            domain_regions
                                .insert(config.domain.clone(), carried.regions.clone());
                            next_previous.insert(config.domain.clone(), carried.clone());
                        }
                        None => {
                            warn!(
                                domain = %config.domain,
                                error = %err,
                                "Zone synthesis failed and no previous generation exists, domain unserved"
                            );
                        }
                    }
                }
            }
        }

        // Domains that left the spec drop out of the carry-forward cache so
        // a later synthesis failure cannot resurrect them.
        self.previous = next_previous;

        files.insert(
            COREFILE_NAME.to_string(),
            render_corefile(&domain_regions, settings),
        );
        Generation { files }
    }

    /// Render all zone files for one config.
    ///
    /// Returns the file map plus the sorted list of country views emitted.
    fn render_config(
        &mut self,
        config: &ValidatedConfig,
        health: &HealthSnapshot,
        settings: &SynthSettings,
    ) -> Result<(BTreeMap<String, String>, Vec<String>), SynthesisError> {
        if config.nameservers.is_empty() {
            return Err(SynthesisError::NoNameservers {
                domain: config.domain.clone(),
            });
        }

        // Per record: the up targets, in spec order.
        let up_targets: Vec<(&str, Vec<&ValidatedTarget>)> = config
            .records
            .iter()
            .enumerate()
            .map(|(record_index, record)| {
                let up = record
                    .targets
                    .iter()
                    .enumerate()
                    .filter(|(target_index, _)| {
                        health.is_up(&config.id, record_index, *target_index)
                    })
                    .map(|(_, target)| target)
                    .collect();
                (record.name.as_str(), up)
            })
            .collect();

        let regions: BTreeSet<String> = if settings.geoip_views {
            up_targets
                .iter()
                .flat_map(|(_, targets)| targets.iter())
                .filter(|target| !target.location.is_empty())
                .map(|target| target.location.clone())
                .collect()
        } else {
            BTreeSet::new()
        };

        let mut files = BTreeMap::new();
        let mut views: Vec<Option<&str>> = vec![None];
        views.extend(regions.iter().map(|region| Some(region.as_str())));

        for view in views {
            let rows: Vec<(&str, Vec<&ValidatedTarget>)> = up_targets
                .iter()
                .map(|(name, targets)| {
                    let pool: Vec<&ValidatedTarget> = match view {
                        // Country view: local pool, falling back to default.
                        Some(region) => {
                            let local: Vec<&ValidatedTarget> = targets
                                .iter()
                                .filter(|target| target.location == region)
                                .copied()
                                .collect();
                            if local.is_empty() {
                                targets
                                    .iter()
                                    .filter(|target| target.location.is_empty())
                                    .copied()
                                    .collect()
                            } else {
                                local
                            }
                        }
                        None => targets
                            .iter()
                            .filter(|target| target.location.is_empty())
                            .copied()
                            .collect(),
                    };
                    (*name, pool)
                })
                .collect();

            let view_label = view.unwrap_or(DEFAULT_VIEW);
            let file_name = format!("{}.{}{}", config.domain, view_label, ZONE_FILE_SUFFIX);
            let content = self.render_zone(&file_name, config, &rows, settings.record_ttl);
            files.insert(file_name, content);
        }

        Ok((files, regions.into_iter().collect()))
    }

    /// Render one zone file, advancing its serial iff the body changed.
    fn render_zone(
        &mut self,
        file_name: &str,
        config: &ValidatedConfig,
        rows: &[(&str, Vec<&ValidatedTarget>)],
        ttl: u32,
    ) -> String {
        // Render once with a probe serial to hash the body, then again with
        // the real serial. The serial line is excluded from the hash.
        let probe = render_zone_text(config, rows, ttl, 0);
        let body_hash = zone_body_hash(&probe);

        let serial = match self.serials.get(file_name) {
            Some(state) if state.body_hash == body_hash => state.serial,
            Some(state) => state.serial.wrapping_add(1).max(1),
            None => 1,
        };
        self.serials
            .insert(file_name.to_string(), ZoneState { serial, body_hash });

        render_zone_text(config, rows, ttl, serial)
    }
}

/// Render the RFC 1035 zone text for one view of one config.
fn render_zone_text(
    config: &ValidatedConfig,
    rows: &[(&str, Vec<&ValidatedTarget>)],
    ttl: u32,
    serial: u32,
) -> String {
    let domain = &config.domain;
    let primary = &config.nameservers[0].hostname;
    let mut zone = String::new();

    zone.push_str(&format!("$ORIGIN {domain}.\n"));
    zone.push_str(&format!("$TTL {ttl}\n"));
    zone.push_str(&format!(
        "@\tIN\tSOA\t{primary}. hostmaster.{domain}. (\n"
    ));
    zone.push_str(&format!("\t{serial}\t; serial\n"));
    zone.push_str(&format!("\t{SOA_REFRESH_SECS}\t; refresh\n"));
    zone.push_str(&format!("\t{SOA_RETRY_SECS}\t; retry\n"));
    zone.push_str(&format!("\t{SOA_EXPIRE_SECS}\t; expire\n"));
    zone.push_str(&format!("\t{SOA_MINIMUM_SECS} )\t; minimum\n"));

    for nameserver in &config.nameservers {
        zone.push_str(&format!("@\tIN\tNS\t{}.\n", nameserver.hostname));
    }

    // Glue for nameservers whose hostname falls inside the zone.
    for nameserver in &config.nameservers {
        if let Some(label) = in_zone_label(&nameserver.hostname, domain) {
            zone.push_str(&format!(
                "{label}\t{ttl}\tIN\tA\t{}\n",
                nameserver.address
            ));
        }
    }

    for (name, pool) in rows {
        for target in pool {
            for _ in 0..target.weight {
                zone.push_str(&format!("{name}\t{ttl}\tIN\tA\t{}\n", target.address));
            }
        }
    }

    zone
}

/// Relative owner label of `hostname` within `domain`, if it falls inside it.
fn in_zone_label(hostname: &str, domain: &str) -> Option<String> {
    if hostname == domain {
        return Some("@".to_string());
    }
    hostname
        .strip_suffix(domain)
        .and_then(|prefix| prefix.strip_suffix('.'))
        .map(str::to_string)
}

/// Render the CoreDNS Corefile routing each domain's views by client country.
fn render_corefile(
    domain_regions: &BTreeMap<String, Vec<String>>,
    settings: &SynthSettings,
) -> String {
    let mut corefile = String::from(
        "# Corefile synthesized by simplegslb. Do not edit; regenerated every probe cycle.\n",
    );
    let port = settings.dns_port;
    let prefix = &settings.zone_path_prefix;

    for (domain, regions) in domain_regions {
        if settings.geoip_views {
            for region in regions {
                let view_name = format!("geo-{}", region.to_ascii_lowercase());
                corefile.push_str(&format!(
                    "\n{domain}:{port} {{\n    view {view_name} {{\n        expr metadata('geoip/country/code') == '{region}'\n    }}\n    metadata\n    geoip {db}\n    file {prefix}/{domain}.{region}{suffix} {domain}\n    errors\n}}\n",
                    db = settings.geoip_db_path,
                    suffix = ZONE_FILE_SUFFIX,
                ));
            }
        }
        corefile.push_str(&format!(
            "\n{domain}:{port} {{\n    file {prefix}/{domain}.{DEFAULT_VIEW}{ZONE_FILE_SUFFIX} {domain}\n    errors\n}}\n"
        ));
    }

    corefile
}

/// SHA-256 over the zone text with the serial line excluded.
fn zone_body_hash(content: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for line in content.lines() {
        if line.ends_with("; serial") {
            continue;
        }
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().into()
}

/// Extract the SOA serial from synthesized zone text.
///
/// Returns `None` if no serial line is present or it fails to parse.
#[must_use]
pub fn parse_soa_serial(content: &str) -> Option<u32> {
    content
        .lines()
        .find(|line| line.ends_with("; serial"))
        .and_then(|line| line.split_whitespace().next())
        .and_then(|token| token.parse::<u32>().ok())
}
