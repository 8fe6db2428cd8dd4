// Copyright (c) 2025 Cyberun, cyberun.cloud
// SPDX-License-Identifier: MIT

//! Custom Resource Definition for GSLB routing intent.
//!
//! This module defines the `GslbConfig` resource through which users declare
//! routing intent: a zone apex, the nameservers to advertise for it, and the
//! health-probed, geo-located endpoint pools behind each owner name.
//!
//! # Example: a geo-routed record
//!
//! ```rust,no_run
//! use simplegslb::crd::{GslbConfigSpec, NameserverSpec, ProbeProtocol, RecordSpec, TargetSpec};
//!
//! let spec = GslbConfigSpec {
//!     domain: "cloud.example.com".to_string(),
//!     nameservers: vec![NameserverSpec {
//!         hostname: "ns1.cloud.example.com".to_string(),
//!         address: "10.0.0.53".to_string(),
//!     }],
//!     records: vec![RecordSpec {
//!         name: "app".to_string(),
//!         targets: vec![TargetSpec {
//!             address: "10.0.0.1".to_string(),
//!             location: "DE".to_string(),
//!             weight: 1,
//!             protocol: ProbeProtocol::Http,
//!             port: 80,
//!             path: "/healthz".to_string(),
//!         }],
//!     }],
//! };
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Probe kind used to decide a target's health.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProbeProtocol {
    /// Plain HTTP GET; healthy iff the status code is in [200, 300).
    #[default]
    Http,
    /// HTTP GET over TLS. The server certificate is not validated: targets
    /// are IP-addressed load balancers, often with self-signed certificates.
    Https,
    /// TCP connect; healthy iff the handshake completes within the deadline.
    Tcp,
}

impl std::fmt::Display for ProbeProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeProtocol::Http => write!(f, "http"),
            ProbeProtocol::Https => write!(f, "https"),
            ProbeProtocol::Tcp => write!(f, "tcp"),
        }
    }
}

/// A nameserver advertised for the zone apex.
///
/// Each entry is emitted as an NS record; when `hostname` falls inside the
/// zone's domain a glue A record for `address` is emitted as well.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NameserverSpec {
    /// Fully qualified nameserver hostname (e.g. `ns1.cloud.example.com`).
    pub hostname: String,

    /// IPv4 address of the nameserver, used as glue.
    pub address: String,
}

/// One health-probed endpoint behind a record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetSpec {
    /// IPv4 address answered as the A record RDATA.
    pub address: String,

    /// ISO 3166-1 alpha-2 country code this endpoint serves, or empty for
    /// the global / default pool.
    #[serde(default)]
    pub location: String,

    /// Relative answer weight: the A record line is emitted this many times.
    #[serde(default = "default_weight")]
    #[schemars(range(min = 1))]
    pub weight: u32,

    /// Probe kind for this endpoint.
    #[serde(default)]
    pub protocol: ProbeProtocol,

    /// Probe port (also reached by clients; purely informational for DNS).
    #[schemars(range(min = 1, max = 65535))]
    pub port: u16,

    /// Request path for `http`/`https` probes. Must start with `/`.
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_weight() -> u32 {
    1
}

fn default_path() -> String {
    "/".to_string()
}

/// One owner name inside the zone with its endpoint pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordSpec {
    /// Single DNS label, or `@` for the zone apex. Combined with the parent
    /// `domain` to form the owner name.
    pub name: String,

    /// Ordered endpoint pool. Order is preserved in synthesized answers.
    #[serde(default)]
    pub targets: Vec<TargetSpec>,
}

/// Condition represents an observation of a resource's current state.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition. Common types include: Ready, Degraded.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// `GslbConfig` status, written best-effort after each publish cycle.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GslbConfigStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Targets currently answering (probe status `up`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthy_targets: Option<i32>,

    /// All targets declared by this config.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_targets: Option<i32>,

    /// Country views currently emitted for this config's domain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_views: Option<Vec<String>>,
}

/// `GslbConfig` declares geo-aware, health-gated DNS routing for one domain.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cyberun.cloud",
    version = "v1",
    kind = "GslbConfig",
    namespaced,
    shortname = "gslb",
    doc = "GslbConfig declares a GSLB-managed domain: the zone apex, its nameservers, and per-record endpoint pools that are health-probed and partitioned into per-country DNS views.",
    printcolumn = r#"{"name":"Domain","type":"string","jsonPath":".spec.domain"}"#,
    printcolumn = r#"{"name":"Targets","type":"integer","jsonPath":".status.totalTargets"}"#,
    printcolumn = r#"{"name":"Healthy","type":"integer","jsonPath":".status.healthyTargets"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#
)]
#[kube(status = "GslbConfigStatus")]
#[serde(rename_all = "camelCase")]
pub struct GslbConfigSpec {
    /// Fully qualified domain serving as the zone apex (e.g. `cloud.example.com`).
    #[schemars(regex(
        pattern = r"^[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+\.?$"
    ))]
    pub domain: String,

    /// Nameservers advertised for the zone. At least one entry is required;
    /// the first entry's hostname becomes the SOA MNAME.
    pub nameservers: Vec<NameserverSpec>,

    /// Owner names and their endpoint pools. Names must be unique within a config.
    #[serde(default)]
    pub records: Vec<RecordSpec>,
}
