// Copyright (c) 2025 Cyberun, cyberun.cloud
// SPDX-License-Identifier: MIT

//! Best-effort `GslbConfig` status updates.
//!
//! After each publish cycle the controller patches every config's status
//! subresource with its current health summary. This is purely informative:
//! a failed patch is logged at debug level and never blocks or retries
//! within the cycle, so the data path stays independent of the API server.

use crate::crd::GslbConfig;
use crate::health::HealthSnapshot;
use crate::store::ValidatedConfig;
use chrono::Utc;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Patch the status of every config in the snapshot.
pub async fn publish_statuses(
    client: &Client,
    specs: &[Arc<ValidatedConfig>],
    health: &HealthSnapshot,
) {
    for config in specs {
        let mut total = 0;
        let mut healthy = 0;
        let mut views = BTreeSet::new();

        for (record_index, record) in config.records.iter().enumerate() {
            for (target_index, target) in record.targets.iter().enumerate() {
                total += 1;
                if health.is_up(&config.id, record_index, target_index) {
                    healthy += 1;
                    if !target.location.is_empty() {
                        views.insert(target.location.clone());
                    }
                }
            }
        }

        let (status, reason, message) = if total == 0 {
            ("True", "NoTargets", "Config declares no targets".to_string())
        } else if healthy == total {
            (
                "True",
                "AllTargetsHealthy",
                format!("{healthy}/{total} targets healthy"),
            )
        } else if healthy > 0 {
            (
                "True",
                "SomeTargetsDown",
                format!("{healthy}/{total} targets healthy"),
            )
        } else {
            (
                "False",
                "AllTargetsDown",
                format!("0/{total} targets healthy"),
            )
        };

        let patch = json!({
            "status": {
                "conditions": [{
                    "type": "Ready",
                    "status": status,
                    "reason": reason,
                    "message": message,
                    "lastTransitionTime": Utc::now().to_rfc3339(),
                }],
                "healthyTargets": healthy,
                "totalTargets": total,
                "activeViews": views.into_iter().collect::<Vec<_>>(),
            }
        });

        let api: Api<GslbConfig> = Api::namespaced(client.clone(), &config.id.namespace);
        if let Err(err) = api
            .patch_status(
                &config.id.name,
                &PatchParams::default(),
                &Patch::Merge(&patch),
            )
            .await
        {
            debug!(object = %config.id, error = %err, "Status patch failed");
        }
    }
}
