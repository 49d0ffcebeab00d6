use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use flowcal_core::CalibrationTarget;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::job::WorkerRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationManifest {
    pub created_at: DateTime<Utc>,
    /// Whole calibrated window, `yyyymmdd:hh..yyyymmdd:hh`.
    pub range: String,
    pub targets: Vec<CalibrationTarget>,
    pub success: usize,
    pub failure: usize,
    /// Keyed by worker id.
    pub workers: BTreeMap<usize, WorkerRecord>,
}

pub fn write_calibration_manifest(path: &Path, manifest: &CalibrationManifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating manifest directory '{}'", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(manifest)
        .context("serializing calibration manifest to JSON")?;
    fs::write(path, json)
        .with_context(|| format!("writing calibration manifest '{}'", path.display()))?;
    Ok(())
}

pub fn load_calibration_manifest(path: &Path) -> Result<CalibrationManifest> {
    let file = fs::File::open(path)
        .with_context(|| format!("opening calibration manifest '{}'", path.display()))?;
    serde_json::from_reader(file)
        .with_context(|| format!("parsing calibration manifest '{}'", path.display()))
}
