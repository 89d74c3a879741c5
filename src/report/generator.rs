//! Registry export and run summary generation.
//!
//! This module renders the run's registry as JSON for downstream indexing
//! and produces the human-readable summary printed at the end of a run.

use crate::models::{RegistryTuple, RunSummary};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

/// Registry document written to disk.
#[derive(Debug, Serialize)]
struct RegistryDocument<'a> {
    generated_at: DateTime<Utc>,
    summary: &'a RunSummary,
    /// Sorted so identical runs produce identical files.
    releases: Vec<&'a RegistryTuple>,
}

/// Generate the registry JSON document.
pub fn generate_registry_json(
    registry: &HashSet<RegistryTuple>,
    summary: &RunSummary,
    generated_at: DateTime<Utc>,
) -> Result<String> {
    let mut releases: Vec<&RegistryTuple> = registry.iter().collect();
    releases.sort();

    let document = RegistryDocument {
        generated_at,
        summary,
        releases,
    };
    serde_json::to_string_pretty(&document).map_err(Into::into)
}

/// Write the registry JSON document to `path`.
pub fn write_registry(
    registry: &HashSet<RegistryTuple>,
    summary: &RunSummary,
    path: &Path,
) -> Result<()> {
    let content = generate_registry_json(registry, summary, Utc::now())?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(content.as_bytes())?;

    Ok(())
}

/// Generate a text summary of a run.
pub fn generate_summary_text(summary: &RunSummary, registry_size: usize) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Companies: {}", summary.entities));
    lines.push(format!("- Contributing: {}", summary.contributing));
    lines.push(format!("- Skipped: {}", summary.skipped));
    lines.push(format!("Lines written: {}", summary.lines_written));
    lines.push(format!("Registry entries: {}", registry_size));
    if summary.remaps > 0 {
        lines.push(format!("Remapped releases: {}", summary.remaps));
    }
    if summary.unresolved > 0 {
        lines.push(format!("Unresolved releases: {}", summary.unresolved));
    }
    lines.push(format!("Duration: {:.1}s", summary.duration_seconds));

    lines.join("\n")
}
