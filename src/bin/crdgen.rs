// Copyright (c) 2025 Cyberun, cyberun.cloud
// SPDX-License-Identifier: MIT

//! Regenerates the `GslbConfig` CRD manifest from the types in src/crd.rs,
//! keeping `deploy/crds/` in lockstep with the code.
//!
//! Run `cargo run --bin crdgen` after changing the CRD types, then apply the
//! result with `kubectl apply -f deploy/crds/gslbconfigs.crd.yaml`. Pass
//! `--stdout` to print the manifest instead of writing it.

use anyhow::{Context, Result};
use kube::CustomResourceExt;
use simplegslb::crd::GslbConfig;
use std::path::Path;

const MANIFEST_PATH: &str = "deploy/crds/gslbconfigs.crd.yaml";

fn main() -> Result<()> {
    let mut manifest = String::new();
    manifest.push_str("# Copyright (c) 2025 Cyberun, cyberun.cloud\n");
    manifest.push_str("# SPDX-License-Identifier: MIT\n");
    manifest.push_str("#\n");
    manifest.push_str("# Generated from src/crd.rs by `cargo run --bin crdgen`; edit the Rust types instead.\n");
    manifest.push_str(
        &serde_yaml::to_string(&GslbConfig::crd())
            .context("failed to serialize the GslbConfig CRD")?,
    );

    if std::env::args().any(|arg| arg == "--stdout") {
        print!("{manifest}");
        return Ok(());
    }

    let path = Path::new(MANIFEST_PATH);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, manifest)
        .with_context(|| format!("failed to write {MANIFEST_PATH}"))?;

    println!("wrote {MANIFEST_PATH}");
    Ok(())
}
