// Copyright (c) 2025 Cyberun, cyberun.cloud
// SPDX-License-Identifier: MIT

//! Global constants for the SimpleGSLB controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for the `GslbConfig` CRD
pub const API_GROUP: &str = "cyberun.cloud";

/// API version for the `GslbConfig` CRD
pub const API_VERSION: &str = "v1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "cyberun.cloud/v1";

/// Kind name for the `GslbConfig` resource
pub const KIND_GSLB_CONFIG: &str = "GslbConfig";

// ============================================================================
// Probing Constants
// ============================================================================

/// Default probe period in seconds; also the A-record TTL
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 10;

/// Default per-probe deadline in seconds
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 2;

/// Default bound on concurrently in-flight probes per tick
pub const DEFAULT_PROBE_CONCURRENCY: usize = 64;

// ============================================================================
// DNS Protocol Constants
// ============================================================================

/// Standard DNS service port served by the data plane
pub const DNS_PORT: u16 = 53;

/// SOA refresh interval emitted in every synthesized zone
pub const SOA_REFRESH_SECS: u32 = 60;

/// SOA retry interval emitted in every synthesized zone
pub const SOA_RETRY_SECS: u32 = 30;

/// SOA expire time emitted in every synthesized zone
pub const SOA_EXPIRE_SECS: u32 = 86400;

/// SOA minimum (negative caching) TTL emitted in every synthesized zone
pub const SOA_MINIMUM_SECS: u32 = 10;

/// View name for the global / default answer pool
pub const DEFAULT_VIEW: &str = "default";

// ============================================================================
// Output Layout Constants
// ============================================================================

/// Default shared configuration directory consumed by the DNS server
pub const DEFAULT_OUTPUT_DIR: &str = "/etc/coredns";

/// Subdirectory of the output dir holding generation directories
pub const GENERATIONS_DIR: &str = "generations";

/// Name of the symlink pointing at the live generation
pub const CURRENT_LINK: &str = "current";

/// File name of the synthesized server configuration
pub const COREFILE_NAME: &str = "Corefile";

/// Suffix of synthesized zone files (`<domain>.<view>.zone`)
pub const ZONE_FILE_SUFFIX: &str = ".zone";

/// Default path of the GeoLite2 country database mounted for the data plane
pub const DEFAULT_GEOIP_DB_PATH: &str = "/data/GeoLite2-City.mmdb";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of Tokio worker threads for the controller runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Bind address for the Prometheus metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";

/// Port for the Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path of the Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";
