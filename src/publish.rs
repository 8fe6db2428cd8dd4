// Copyright (c) 2025 Cyberun, cyberun.cloud
// SPDX-License-Identifier: MIT

//! Atomic publishing of synthesized generations.
//!
//! Each generation is written whole into a fresh directory under
//! `<output_dir>/generations/`, fsynced, and made live by atomically
//! re-pointing the `<output_dir>/current` symlink. A concurrently reading
//! DNS server therefore always observes a complete, consistent file set:
//! either the entirety of generation N or the entirety of N+1.
//!
//! A SHA-256 hash over the whole file set short-circuits the swap (and the
//! reload signal) when nothing changed since the last publish. A failed
//! publish abandons the staged generation; the previous one stays live and
//! the publish is retried next tick.

use crate::constants::{CURRENT_LINK, GENERATIONS_DIR};
use crate::gslb_errors::PublishError;
use crate::metrics;
use crate::synth::Generation;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of one publish attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    /// A new generation went live.
    Published {
        /// Sequence number of the published generation.
        generation: u64,
        /// Number of files it contains.
        files: usize,
    },
    /// The generation matched the live one; nothing was written.
    Unchanged,
}

/// Writes generations to the shared configuration directory.
pub struct Publisher {
    output_dir: PathBuf,
    next_generation: u64,
    last_hash: Option<[u8; 32]>,
    reload_command: Option<String>,
}

impl Publisher {
    /// Open (and if needed initialize) the output directory.
    ///
    /// Resumes the generation sequence and the last-published hash from an
    /// existing `current` link so a restart with unchanged inputs publishes
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the output directory cannot be created or is not
    /// writable. This is a fatal startup condition.
    pub fn new(output_dir: &Path, reload_command: Option<String>) -> Result<Self> {
        let generations = output_dir.join(GENERATIONS_DIR);
        fs::create_dir_all(&generations).with_context(|| {
            format!(
                "configuration directory {} is not usable",
                output_dir.display()
            )
        })?;

        // Cheap writability check: fail at startup, not on the first tick.
        let probe_path = generations.join(".write-check");
        fs::write(&probe_path, b"")
            .and_then(|()| fs::remove_file(&probe_path))
            .with_context(|| {
                format!(
                    "configuration directory {} is not writable",
                    output_dir.display()
                )
            })?;

        let mut publisher = Self {
            output_dir: output_dir.to_path_buf(),
            next_generation: 1,
            last_hash: None,
            reload_command,
        };
        publisher.resume_from_disk();
        Ok(publisher)
    }

    /// Path of the live generation as seen by the data plane.
    #[must_use]
    pub fn current_dir(&self) -> PathBuf {
        self.output_dir.join(CURRENT_LINK)
    }

    /// Publish a generation, unless it matches the live one.
    ///
    /// # Errors
    ///
    /// Returns a [`PublishError`] when staging, writing, or the symlink swap
    /// fails. The previous generation remains live in every error case.
    pub async fn publish(&mut self, generation: &Generation) -> Result<PublishOutcome, PublishError> {
        let hash = hash_generation(generation);
        if self.last_hash == Some(hash) {
            debug!("Generation unchanged, skipping publish and reload");
            return Ok(PublishOutcome::Unchanged);
        }

        let sequence = self.next_generation;
        let staging_rel = format!("{GENERATIONS_DIR}/gen-{sequence:08}");
        let staging = self.output_dir.join(&staging_rel);
        let previous_target = fs::read_link(self.current_dir()).ok();

        // A crashed earlier attempt may have left files here; the staging
        // directory must contain exactly the new file set.
        match fs::remove_dir_all(&staging) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(PublishError::StagingFailed {
                    path: staging.clone(),
                    source,
                })
            }
        }
        fs::create_dir_all(&staging).map_err(|source| PublishError::StagingFailed {
            path: staging.clone(),
            source,
        })?;

        for (name, contents) in &generation.files {
            let path = staging.join(name);
            write_synced(&path, contents.as_bytes()).map_err(|source| {
                PublishError::WriteFailed {
                    path: path.clone(),
                    source,
                }
            })?;
        }
        sync_dir(&staging).map_err(|source| PublishError::WriteFailed {
            path: staging.clone(),
            source,
        })?;

        self.swap_current(&staging_rel)?;
        self.next_generation = sequence + 1;
        self.last_hash = Some(hash);

        info!(
            generation = sequence,
            files = generation.len(),
            "Published new generation"
        );
        metrics::set_generation_files(generation.len());

        // The old generation is dead weight once the link moved; a failed
        // removal is not a publish failure.
        if let Some(previous) = previous_target {
            let previous_abs = self.output_dir.join(previous);
            if previous_abs != staging {
                if let Err(err) = fs::remove_dir_all(&previous_abs) {
                    if err.kind() != std::io::ErrorKind::NotFound {
                        warn!(
                            path = %previous_abs.display(),
                            error = %err,
                            "Failed to remove previous generation"
                        );
                    }
                }
            }
        }

        self.send_reload_signal().await;

        Ok(PublishOutcome::Published {
            generation: sequence,
            files: generation.len(),
        })
    }

    /// Atomically re-point `current` at the staged generation.
    fn swap_current(&self, staging_rel: &str) -> Result<(), PublishError> {
        let link = self.current_dir();
        let temp_link = self.output_dir.join(".current.swap");

        let swap = || -> std::io::Result<()> {
            match fs::remove_file(&temp_link) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err),
            }
            std::os::unix::fs::symlink(staging_rel, &temp_link)?;
            fs::rename(&temp_link, &link)?;
            sync_dir(&self.output_dir)
        };

        swap().map_err(|source| PublishError::SwapFailed { link, source })
    }

    /// Best-effort reload notification to the data plane.
    ///
    /// When no command is configured the DNS server is expected to watch the
    /// published files itself. Failures are logged and counted, never
    /// propagated: both the previous and the new generation are coherent.
    async fn send_reload_signal(&self) {
        let Some(command) = &self.reload_command else {
            return;
        };

        let result = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .status()
            .await;

        match result {
            Ok(status) if status.success() => {
                debug!(command = %command, "Reload signal sent");
                metrics::record_reload_signal(true);
            }
            Ok(status) => {
                warn!(command = %command, %status, "Reload command exited non-zero");
                metrics::record_reload_signal(false);
            }
            Err(err) => {
                warn!(command = %command, error = %err, "Failed to run reload command");
                metrics::record_reload_signal(false);
            }
        }
    }

    /// Resume sequence number and content hash from the live generation.
    fn resume_from_disk(&mut self) {
        let Ok(target) = fs::read_link(self.current_dir()) else {
            return;
        };

        if let Some(sequence) = target
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_prefix("gen-"))
            .and_then(|digits| digits.parse::<u64>().ok())
        {
            self.next_generation = sequence + 1;
        }

        if let Some(live) = read_generation(&self.output_dir.join(&target)) {
            debug!(
                generation = self.next_generation - 1,
                files = live.len(),
                "Resumed from published generation"
            );
            self.last_hash = Some(hash_generation(&live));
        }
    }
}

/// Hash a generation's full file set (names and contents, sorted).
fn hash_generation(generation: &Generation) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for (name, contents) in &generation.files {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(contents.as_bytes());
        hasher.update([0u8]);
    }
    hasher.finalize().into()
}

/// Read a published generation back from disk, if readable.
fn read_generation(dir: &Path) -> Option<Generation> {
    let entries = fs::read_dir(dir).ok()?;
    let mut generation = Generation::default();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        let contents = fs::read_to_string(entry.path()).ok()?;
        generation.files.insert(name, contents);
    }
    Some(generation)
}

/// Write a file and flush it to stable storage.
fn write_synced(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

/// Fsync a directory so entry renames and creations are durable.
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}
