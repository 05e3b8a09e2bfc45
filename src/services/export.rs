// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON export sink for fetched activities.
//!
//! The export file is the handoff artifact to the analysis layer: one
//! pretty-printed JSON array per run, named after the athlete and the run
//! date. The downstream loader defines its own schema; nothing here
//! interprets record contents.

use std::fs;
use std::path::PathBuf;

use crate::error::AppError;
use crate::models::ActivityRecord;

/// Writes activity batches as timestamped JSON files.
#[derive(Clone, Debug)]
pub struct JsonExportSink {
    dir: PathBuf,
}

impl JsonExportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write the full batch, returning the path of the export file.
    ///
    /// Re-running on the same day overwrites that day's export for the same
    /// athlete, which keeps manual retries idempotent.
    pub fn write_batch(
        &self,
        label: &str,
        records: &[ActivityRecord],
    ) -> Result<PathBuf, AppError> {
        fs::create_dir_all(&self.dir)?;

        let date = chrono::Local::now().format("%Y-%m-%d");
        let path = self.dir.join(format!("{label}_{date}_export.json"));

        let json = serde_json::to_string_pretty(records)?;
        fs::write(&path, json)?;

        tracing::info!(
            path = %path.display(),
            count = records.len(),
            "Activities exported"
        );
        Ok(path)
    }
}
