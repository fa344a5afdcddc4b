//! Post-run processing utilities.
//!
//! Handles exports after a run completes. Failures become messages; they never
//! replace the run's own outcome.

use crate::model::SessionResult;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Where the caller asked the finished run to be written.
#[derive(Debug, Clone, Default)]
pub(crate) struct ExportTargets {
    pub json: Option<PathBuf>,
    pub csv: Option<PathBuf>,
}

/// Run the requested exports and describe each outcome.
pub(crate) fn process_run_completion(targets: &ExportTargets, result: &SessionResult) -> Vec<String> {
    let mut export_messages = Vec::new();
    if let Some(export_path) = targets.json.as_deref() {
        match export_json(export_path, result) {
            Ok(_) => export_messages.push(format!("Exported JSON: {}", export_path.display())),
            Err(e) => export_messages.push(format!("Export JSON failed: {e:#}")),
        }
    }
    if let Some(export_path) = targets.csv.as_deref() {
        match export_csv(export_path, result) {
            Ok(_) => export_messages.push(format!("Exported CSV: {}", export_path.display())),
            Err(e) => export_messages.push(format!("Export CSV failed: {e:#}")),
        }
    }
    export_messages
}

pub(crate) fn export_json(path: &Path, result: &SessionResult) -> Result<()> {
    ensure_parent(path)?;
    let data = serde_json::to_vec_pretty(result)?;
    std::fs::write(path, data).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// The assignment table only, one row per patient in display order.
pub(crate) fn export_csv(path: &Path, result: &SessionResult) -> Result<()> {
    ensure_parent(path)?;
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
    if result.assignments.is_empty() {
        writer.write_record([
            "patient_id",
            "patient_name",
            "disease",
            "doctor_id",
            "doctor_name",
            "specialty",
            "specialty_match",
            "urgency",
            "fuzzy_score",
            "bed_id",
        ])?;
    }
    for row in &result.assignments {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    Ok(())
}
