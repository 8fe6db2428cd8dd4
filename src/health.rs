// Copyright (c) 2025 Cyberun, cyberun.cloud
// SPDX-License-Identifier: MIT

//! Health sample bookkeeping for probed targets.
//!
//! The [`HealthTable`] is owned exclusively by the prober task; every other
//! component sees health only through the immutable [`HealthSnapshot`]
//! published after each completed tick. Samples exist exactly as long as the
//! corresponding target exists in the Spec Store: [`HealthTable::sync_targets`]
//! creates `Unknown` samples for newly appeared targets and garbage-collects
//! samples whose target vanished.
//!
//! `Unknown` is treated as unhealthy everywhere (fail-closed): a target never
//! enters a zone before its first successful probe.

use crate::store::{ObjectId, ValidatedConfig};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Probe-derived state of one target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealthStatus {
    /// Last probe succeeded.
    Up,
    /// Last probe failed.
    Down,
    /// No probe has completed since the target appeared.
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Up => write!(f, "up"),
            HealthStatus::Down => write!(f, "down"),
            HealthStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Identity of one probed target: config object plus positional indices.
///
/// Positions (not addresses) are the key so that the same address appearing
/// in two records, or twice in one pool, is probed and tracked separately.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TargetKey {
    /// Owning `GslbConfig` identity.
    pub object: ObjectId,
    /// Index of the record within the config.
    pub record: usize,
    /// Index of the target within the record.
    pub target: usize,
}

/// One target's probe outcome history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HealthSample {
    /// Current status; transitions are immediate (no flap damping).
    pub status: HealthStatus,
    /// Completion time of the most recent probe, if any.
    pub last_checked: Option<DateTime<Utc>>,
    /// Consecutive failed probes; zeroed on success.
    pub consecutive_failures: u32,
}

impl HealthSample {
    fn unknown() -> Self {
        Self {
            status: HealthStatus::Unknown,
            last_checked: None,
            consecutive_failures: 0,
        }
    }
}

/// Immutable copy of the health table, published once per tick.
#[derive(Clone, Debug, Default)]
pub struct HealthSnapshot {
    samples: BTreeMap<TargetKey, HealthSample>,
}

impl HealthSnapshot {
    /// Look up one sample.
    #[must_use]
    pub fn get(&self, key: &TargetKey) -> Option<&HealthSample> {
        self.samples.get(key)
    }

    /// Whether the target is eligible for zone inclusion (`up` only;
    /// `unknown` counts as down).
    #[must_use]
    pub fn is_up(&self, object: &ObjectId, record: usize, target: usize) -> bool {
        let key = TargetKey {
            object: object.clone(),
            record,
            target,
        };
        self.samples
            .get(&key)
            .is_some_and(|sample| sample.status == HealthStatus::Up)
    }

    /// Number of tracked samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of samples currently `up`.
    #[must_use]
    pub fn healthy_count(&self) -> usize {
        self.samples
            .values()
            .filter(|sample| sample.status == HealthStatus::Up)
            .count()
    }
}

/// Mutable health state, owned by the prober.
#[derive(Debug, Default)]
pub struct HealthTable {
    samples: BTreeMap<TargetKey, HealthSample>,
}

impl HealthTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile tracked samples against the current spec snapshot.
    ///
    /// Creates an `Unknown` sample for every target that appeared and drops
    /// the sample of every target that vanished. Returns `(added, removed)`.
    pub fn sync_targets(&mut self, specs: &[Arc<ValidatedConfig>]) -> (usize, usize) {
        let mut live = BTreeMap::new();
        let mut added = 0;
        for config in specs {
            for (record_index, record) in config.records.iter().enumerate() {
                for target_index in 0..record.targets.len() {
                    let key = TargetKey {
                        object: config.id.clone(),
                        record: record_index,
                        target: target_index,
                    };
                    let sample = match self.samples.remove(&key) {
                        Some(existing) => existing,
                        None => {
                            added += 1;
                            HealthSample::unknown()
                        }
                    };
                    live.insert(key, sample);
                }
            }
        }

        let removed = self.samples.len();
        self.samples = live;
        (added, removed)
    }

    /// Record a successful probe: status `Up`, failure streak reset.
    pub fn record_success(&mut self, key: &TargetKey, now: DateTime<Utc>) {
        if let Some(sample) = self.samples.get_mut(key) {
            sample.status = HealthStatus::Up;
            sample.last_checked = Some(now);
            sample.consecutive_failures = 0;
        }
    }

    /// Record a failed probe: status `Down`, failure streak incremented.
    pub fn record_failure(&mut self, key: &TargetKey, now: DateTime<Utc>) {
        if let Some(sample) = self.samples.get_mut(key) {
            sample.status = HealthStatus::Down;
            sample.last_checked = Some(now);
            sample.consecutive_failures = sample.consecutive_failures.saturating_add(1);
        }
    }

    /// Current status of one target, `Unknown` if untracked.
    #[must_use]
    pub fn status(&self, key: &TargetKey) -> HealthStatus {
        self.samples
            .get(key)
            .map_or(HealthStatus::Unknown, |sample| sample.status)
    }

    /// Number of tracked samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Publish an immutable copy for the synthesizer.
    #[must_use]
    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            samples: self.samples.clone(),
        }
    }
}
