// Copyright (c) 2025 Cyberun, cyberun.cloud
// SPDX-License-Identifier: MIT

//! Watch consumer feeding the Spec Store.
//!
//! Translates the Kubernetes watch stream for `GslbConfig` objects into Spec
//! Store mutations. Live `Apply`/`Delete` events map to `apply`/`remove`;
//! the `Init`/`InitApply`/`InitDone` relist sequence (emitted on startup and
//! after every watch disconnect) is buffered and committed as one atomic
//! `replace_all`, so a relist can never drop or duplicate targets.
//!
//! Stream errors are counted and retried with the watcher's default backoff;
//! validation rejections are reported per object and never block the rest of
//! an event batch.

use crate::crd::GslbConfig;
use crate::metrics;
use crate::store::{ObjectId, SpecStore};
use anyhow::Result;
use futures::StreamExt;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, ResourceExt};
use std::pin::pin;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Consume the `GslbConfig` watch stream until the process shuts down.
///
/// # Errors
///
/// Returns an error only if the watch stream terminates, which the backoff
/// wrapper prevents in normal operation; the caller treats a return as a
/// controller failure.
pub async fn run_watch(client: Client, store: Arc<SpecStore>) -> Result<()> {
    let api = Api::<GslbConfig>::all(client);
    info!("Starting GslbConfig watch");

    let mut relist_buffer: Option<Vec<GslbConfig>> = None;
    let mut stream = pin!(watcher(api, watcher::Config::default()).default_backoff());

    while let Some(event) = stream.next().await {
        match event {
            Ok(watcher::Event::Apply(obj)) => {
                metrics::record_watch_event("apply");
                apply_object(&store, &obj);
                metrics::set_specs_active(store.len());
            }
            Ok(watcher::Event::Delete(obj)) => {
                metrics::record_watch_event("delete");
                if let Ok(id) = ObjectId::from_object(&obj) {
                    if store.remove(&id) {
                        info!(object = %id, "GslbConfig removed");
                    }
                }
                metrics::set_specs_active(store.len());
            }
            Ok(watcher::Event::Init) => {
                debug!("Relist started, buffering objects");
                relist_buffer = Some(Vec::new());
            }
            Ok(watcher::Event::InitApply(obj)) => {
                if let Some(buffer) = relist_buffer.as_mut() {
                    buffer.push(obj);
                }
            }
            Ok(watcher::Event::InitDone) => {
                metrics::record_watch_event("relist");
                let objects = relist_buffer.take().unwrap_or_default();
                let total = objects.len();
                let rejected = store.replace_all(&objects);
                for (object, err) in &rejected {
                    metrics::record_spec_rejected(err.reason());
                    warn!(object = %object, error = %err, "GslbConfig rejected during relist");
                }
                info!(
                    accepted = total - rejected.len(),
                    rejected = rejected.len(),
                    "Relist committed atomically"
                );
                metrics::set_specs_active(store.len());
            }
            Err(err) => {
                metrics::record_watch_error();
                warn!(error = %err, "Watch stream error, reconnecting with backoff");
            }
        }
    }

    anyhow::bail!("GslbConfig watch stream terminated unexpectedly")
}

/// Apply one object, reporting a validation rejection without failing.
fn apply_object(store: &SpecStore, obj: &GslbConfig) {
    let object_ref = format!(
        "{}/{}",
        obj.namespace().unwrap_or_default(),
        obj.name_any()
    );
    match store.apply(obj) {
        Ok(()) => debug!(object = %object_ref, domain = %obj.spec.domain, "GslbConfig applied"),
        Err(err) => {
            metrics::record_spec_rejected(err.reason());
            warn!(object = %object_ref, error = %err, "GslbConfig rejected");
        }
    }
}
