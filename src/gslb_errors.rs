// Copyright (c) 2025 Cyberun, cyberun.cloud
// SPDX-License-Identifier: MIT

//! Error types for the GSLB reconciliation pipeline.
//!
//! This module provides specialized error types for:
//! - Spec validation on watch-stream ingress
//! - Zone synthesis failures
//! - Generation publishing failures (disk writes, symlink swaps)
//!
//! These errors provide structured error handling for the pipeline, enabling
//! better error reporting in status conditions and metrics. Probe failures
//! are deliberately not errors: they are recorded as `down` health samples.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that reject a `GslbConfig` object on ingress.
///
/// A rejected object is dropped from the Spec Store with a reported error and
/// never blocks other objects from the same event batch.
#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    /// The object carries no namespace or name.
    #[error("GslbConfig object has no namespace/name")]
    UnnamedObject,

    /// `spec.domain` is not a valid fully qualified domain name.
    #[error("invalid domain '{domain}': {reason}")]
    InvalidDomain {
        /// The rejected domain string
        domain: String,
        /// Explanation of what is invalid
        reason: String,
    },

    /// The domain is already claimed by an earlier-seen config.
    ///
    /// First-seen wins: the earlier config keeps serving the zone.
    #[error("domain '{domain}' is already claimed by {claimed_by}")]
    DomainAlreadyClaimed {
        /// The contested domain
        domain: String,
        /// Identity (`namespace/name`) of the config holding the claim
        claimed_by: String,
    },

    /// `spec.nameservers` is empty; a zone cannot be served without NS records.
    #[error("domain '{domain}' declares no nameservers")]
    NoNameservers {
        /// The domain missing nameservers
        domain: String,
    },

    /// A record name appears more than once within the config.
    #[error("record name '{name}' is duplicated in config for '{domain}'")]
    DuplicateRecordName {
        /// The duplicated owner label
        name: String,
        /// The config's domain
        domain: String,
    },

    /// A record name is not a single valid DNS label (or `@`).
    #[error("record name '{name}' is not a valid DNS label")]
    InvalidRecordName {
        /// The rejected label
        name: String,
    },

    /// A target or nameserver address is not an IPv4 literal.
    #[error("'{address}' is not a valid IPv4 address (record '{name}')")]
    InvalidAddress {
        /// The rejected address string
        address: String,
        /// The record (or nameserver hostname) carrying it
        name: String,
    },

    /// A target declares port 0.
    #[error("target {address} in record '{name}' has port 0")]
    InvalidPort {
        /// The target address
        address: String,
        /// The record carrying it
        name: String,
    },

    /// A target declares weight 0; weights are positive answer repeat counts.
    #[error("target {address} in record '{name}' has weight 0")]
    InvalidWeight {
        /// The target address
        address: String,
        /// The record carrying it
        name: String,
    },

    /// An HTTP(S) probe path does not start with `/`.
    #[error("target {address} in record '{name}' has probe path '{path}' not starting with '/'")]
    InvalidPath {
        /// The target address
        address: String,
        /// The record carrying it
        name: String,
        /// The rejected path
        path: String,
    },

    /// A target location is not an ISO 3166-1 alpha-2 code.
    #[error("target {address} in record '{name}' has location '{location}', expected a two-letter country code")]
    InvalidLocation {
        /// The target address
        address: String,
        /// The record carrying it
        name: String,
        /// The rejected location string
        location: String,
    },
}

impl ValidationError {
    /// Stable low-cardinality label for the rejection metric.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::UnnamedObject => "unnamed_object",
            ValidationError::InvalidDomain { .. } => "invalid_domain",
            ValidationError::DomainAlreadyClaimed { .. } => "domain_claimed",
            ValidationError::NoNameservers { .. } => "no_nameservers",
            ValidationError::DuplicateRecordName { .. } => "duplicate_record",
            ValidationError::InvalidRecordName { .. } => "invalid_record_name",
            ValidationError::InvalidAddress { .. } => "invalid_address",
            ValidationError::InvalidPort { .. } => "invalid_port",
            ValidationError::InvalidWeight { .. } => "invalid_weight",
            ValidationError::InvalidPath { .. } => "invalid_path",
            ValidationError::InvalidLocation { .. } => "invalid_location",
        }
    }
}

/// Errors that skip one config during zone synthesis.
///
/// A failing config keeps its previously synthesized files, if any; other
/// configs in the same cycle proceed normally.
#[derive(Error, Debug, Clone)]
pub enum SynthesisError {
    /// The config reached synthesis without nameservers. Validation prevents
    /// this; the synthesizer re-checks rather than emitting a broken zone.
    #[error("cannot synthesize zone for '{domain}': no nameservers declared")]
    NoNameservers {
        /// The affected domain
        domain: String,
    },
}

/// Errors that abandon a publish attempt.
///
/// The previous generation stays live on disk; the publish is retried on the
/// next tick.
#[derive(Error, Debug)]
pub enum PublishError {
    /// Writing or fsyncing a file of the new generation failed.
    #[error("failed to write {path}: {source}")]
    WriteFailed {
        /// Path that failed to write
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Creating the staging generation directory failed.
    #[error("failed to create generation directory {path}: {source}")]
    StagingFailed {
        /// Directory that failed to create
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The atomic symlink swap onto the new generation failed.
    #[error("failed to swap '{link}' to new generation: {source}")]
    SwapFailed {
        /// The `current` symlink path
        link: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
}
