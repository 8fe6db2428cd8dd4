// Copyright (c) 2025 Cyberun, cyberun.cloud
// SPDX-License-Identifier: MIT

//! In-memory mirror of all `GslbConfig` objects.
//!
//! The Spec Store is the single authoritative copy of routing intent inside
//! the process. It is mutated only by the watch consumer and read by the
//! prober and synthesizer through immutable snapshots, so no lock is held
//! across probing or synthesis.
//!
//! Objects are validated on ingress; a rejected object is dropped with a
//! reported error and never blocks other objects from the same event batch.
//! Domains are claimed first-seen-wins: a second config naming an already
//! claimed domain is rejected while the first keeps serving the zone.

use crate::crd::{GslbConfig, ProbeProtocol};
use crate::gslb_errors::ValidationError;
use kube::{Resource, ResourceExt};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::{Arc, RwLock};

/// Identity of a configuration object: `(namespace, name)`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId {
    pub namespace: String,
    pub name: String,
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl ObjectId {
    /// Extract the identity of a `GslbConfig` object.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnnamedObject`] if namespace or name is missing.
    pub fn from_object(obj: &GslbConfig) -> Result<Self, ValidationError> {
        let namespace = obj.namespace().ok_or(ValidationError::UnnamedObject)?;
        let name = obj.meta().name.clone().ok_or(ValidationError::UnnamedObject)?;
        Ok(Self { namespace, name })
    }
}

/// A target that passed ingress validation, with its address parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedTarget {
    /// Parsed IPv4 address, the A record RDATA.
    pub address: Ipv4Addr,
    /// Uppercased ISO country code, or empty for the default pool.
    pub location: String,
    /// Answer repeat count, >= 1.
    pub weight: u32,
    /// Probe kind.
    pub protocol: ProbeProtocol,
    /// Probe port, >= 1.
    pub port: u16,
    /// Probe path for http/https, always starting with `/`.
    pub path: String,
}

/// A validated nameserver entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedNameserver {
    /// Normalized hostname (lowercase, no trailing dot).
    pub hostname: String,
    /// Parsed glue address.
    pub address: Ipv4Addr,
}

/// A validated record: owner label plus its ordered target pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedRecord {
    /// Single label, or `@` for the apex.
    pub name: String,
    /// Targets in spec order.
    pub targets: Vec<ValidatedTarget>,
}

/// A `GslbConfig` that passed ingress validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedConfig {
    /// Object identity in the cluster.
    pub id: ObjectId,
    /// Normalized zone apex (lowercase, no trailing dot).
    pub domain: String,
    /// Nameservers in spec order; the first becomes the SOA MNAME.
    pub nameservers: Vec<ValidatedNameserver>,
    /// Records in spec order.
    pub records: Vec<ValidatedRecord>,
}

#[derive(Default)]
struct Inner {
    configs: BTreeMap<ObjectId, Arc<ValidatedConfig>>,
    domains: HashMap<String, ObjectId>,
}

/// Authoritative in-memory set of validated `GslbConfig` objects.
#[derive(Default)]
pub struct SpecStore {
    inner: RwLock<Inner>,
}

impl SpecStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and insert (or replace) one object.
    ///
    /// # Errors
    ///
    /// Returns the validation error that rejected the object. The store is
    /// unchanged on rejection, except that a previously stored version of the
    /// same object stays in place.
    pub fn apply(&self, obj: &GslbConfig) -> Result<(), ValidationError> {
        let validated = validate_config(obj)?;
        let mut inner = self.inner.write().expect("spec store lock poisoned");

        if let Some(claimed_by) = inner.domains.get(&validated.domain) {
            if *claimed_by != validated.id {
                return Err(ValidationError::DomainAlreadyClaimed {
                    domain: validated.domain.clone(),
                    claimed_by: claimed_by.to_string(),
                });
            }
        }

        // The object may have changed its domain; release the old claim.
        let stale_domain = inner
            .configs
            .get(&validated.id)
            .filter(|previous| previous.domain != validated.domain)
            .map(|previous| previous.domain.clone());
        if let Some(stale) = stale_domain {
            inner.domains.remove(&stale);
        }

        inner.domains.insert(validated.domain.clone(), validated.id.clone());
        inner.configs.insert(validated.id.clone(), Arc::new(validated));
        Ok(())
    }

    /// Remove an object and release its domain claim.
    ///
    /// Returns `true` if the object was present.
    pub fn remove(&self, id: &ObjectId) -> bool {
        let mut inner = self.inner.write().expect("spec store lock poisoned");
        match inner.configs.remove(id) {
            Some(removed) => {
                inner.domains.remove(&removed.domain);
                true
            }
            None => false,
        }
    }

    /// Atomically replace the entire store contents with a relist result.
    ///
    /// Equivalent to `apply` for every listed object plus `remove` for every
    /// id present locally but absent from the list, performed as one swap.
    /// Returns the rejected objects with their validation errors.
    pub fn replace_all(&self, objs: &[GslbConfig]) -> Vec<(String, ValidationError)> {
        let mut fresh = Inner::default();
        let mut rejected = Vec::new();

        for obj in objs {
            let display = format!(
                "{}/{}",
                obj.namespace().unwrap_or_default(),
                obj.meta().name.clone().unwrap_or_default()
            );
            match validate_config(obj) {
                Ok(validated) => {
                    if let Some(claimed_by) = fresh.domains.get(&validated.domain) {
                        rejected.push((
                            display,
                            ValidationError::DomainAlreadyClaimed {
                                domain: validated.domain.clone(),
                                claimed_by: claimed_by.to_string(),
                            },
                        ));
                        continue;
                    }
                    fresh
                        .domains
                        .insert(validated.domain.clone(), validated.id.clone());
                    fresh
                        .configs
                        .insert(validated.id.clone(), Arc::new(validated));
                }
                Err(err) => rejected.push((display, err)),
            }
        }

        *self.inner.write().expect("spec store lock poisoned") = fresh;
        rejected
    }

    /// Point-in-time immutable copy of all stored configs, ordered by identity.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<ValidatedConfig>> {
        let inner = self.inner.read().expect("spec store lock poisoned");
        inner.configs.values().cloned().collect()
    }

    /// Number of stored configs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().expect("spec store lock poisoned").configs.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Validate one `GslbConfig` object into its normalized form.
///
/// # Errors
///
/// Returns the first violation found; see [`ValidationError`] for the full
/// taxonomy. Domain-claim conflicts are checked by the store, not here.
pub fn validate_config(obj: &GslbConfig) -> Result<ValidatedConfig, ValidationError> {
    let id = ObjectId::from_object(obj)?;
    let spec = &obj.spec;

    let domain = normalize_domain(&spec.domain).ok_or_else(|| ValidationError::InvalidDomain {
        domain: spec.domain.clone(),
        reason: "not a fully qualified domain name".to_string(),
    })?;

    if spec.nameservers.is_empty() {
        return Err(ValidationError::NoNameservers {
            domain: domain.clone(),
        });
    }

    let mut nameservers = Vec::with_capacity(spec.nameservers.len());
    for ns in &spec.nameservers {
        let hostname =
            normalize_domain(&ns.hostname).ok_or_else(|| ValidationError::InvalidDomain {
                domain: ns.hostname.clone(),
                reason: "nameserver hostname is not a fully qualified domain name".to_string(),
            })?;
        let address =
            ns.address
                .parse::<Ipv4Addr>()
                .map_err(|_| ValidationError::InvalidAddress {
                    address: ns.address.clone(),
                    name: hostname.clone(),
                })?;
        nameservers.push(ValidatedNameserver { hostname, address });
    }

    let mut seen_names = HashSet::new();
    let mut records = Vec::with_capacity(spec.records.len());
    for record in &spec.records {
        let name = record.name.trim().to_ascii_lowercase();
        if name != "@" && !is_valid_label(&name) {
            return Err(ValidationError::InvalidRecordName { name });
        }
        if !seen_names.insert(name.clone()) {
            return Err(ValidationError::DuplicateRecordName {
                name,
                domain: domain.clone(),
            });
        }

        let mut targets = Vec::with_capacity(record.targets.len());
        for target in &record.targets {
            let address = target.address.parse::<Ipv4Addr>().map_err(|_| {
                ValidationError::InvalidAddress {
                    address: target.address.clone(),
                    name: name.clone(),
                }
            })?;
            if target.port == 0 {
                return Err(ValidationError::InvalidPort {
                    address: target.address.clone(),
                    name: name.clone(),
                });
            }
            if target.weight == 0 {
                return Err(ValidationError::InvalidWeight {
                    address: target.address.clone(),
                    name: name.clone(),
                });
            }
            if !target.path.starts_with('/') {
                return Err(ValidationError::InvalidPath {
                    address: target.address.clone(),
                    name: name.clone(),
                    path: target.path.clone(),
                });
            }
            let location = target.location.trim().to_ascii_uppercase();
            if !location.is_empty()
                && (location.len() != 2 || !location.bytes().all(|b| b.is_ascii_uppercase()))
            {
                return Err(ValidationError::InvalidLocation {
                    address: target.address.clone(),
                    name: name.clone(),
                    location: target.location.clone(),
                });
            }
            targets.push(ValidatedTarget {
                address,
                location,
                weight: target.weight,
                protocol: target.protocol,
                port: target.port,
                path: target.path.clone(),
            });
        }
        records.push(ValidatedRecord { name, targets });
    }

    Ok(ValidatedConfig {
        id,
        domain,
        nameservers,
        records,
    })
}

/// Normalize a domain to lowercase without a trailing dot, or `None` if it is
/// not a valid multi-label FQDN.
fn normalize_domain(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('.').to_ascii_lowercase();
    if trimmed.is_empty() || trimmed.len() > 253 {
        return None;
    }
    let labels: Vec<&str> = trimmed.split('.').collect();
    if labels.len() < 2 || !labels.iter().all(|label| is_valid_label(label)) {
        return None;
    }
    Some(trimmed)
}

/// A single DNS label: 1..=63 chars of `[a-z0-9-]`, no leading/trailing hyphen.
fn is_valid_label(label: &str) -> bool {
    if label.is_empty() || label.len() > 63 {
        return false;
    }
    if label.starts_with('-') || label.ends_with('-') {
        return false;
    }
    label
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}
