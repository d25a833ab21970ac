//! # grievance-cli — CLI Tool for the Grievance Engine
//!
//! Provides the `grievance` command-line interface for work that does not
//! need a running API: deadline arithmetic, converting legacy template
//! files, and analytics over exported snapshots.
//!
//! ## Subcommands
//!
//! - `grievance due-date` — Due date of a step from its start and time limit.
//! - `grievance elapsed` — Days between two dates, business or calendar.
//! - `grievance templates migrate` — Legacy steps to an ordered, typed set.
//! - `grievance templates schedule` — Worst-case timeline of a template set.
//! - `grievance report` — Step-duration reports over a snapshot file.
//!
//! ```bash
//! grievance due-date --start 2024-03-01 --days 10
//! grievance templates migrate legacy-steps.yaml --grievance-type GROUP
//! grievance report snapshot.json --kind overdue --now 2024-06-30
//! ```
//!
//! Input files ending in `.yaml` or `.yml` are read as YAML, anything else
//! as JSON. Output is JSON on stdout unless noted otherwise.

pub mod deadline;
pub mod report;
pub mod templates;

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

/// Read a JSON or YAML file, chosen by extension.
pub fn read_structured<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
    if is_yaml {
        serde_yaml::from_str(&text).with_context(|| format!("invalid YAML in {}", path.display()))
    } else {
        serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))
    }
}

/// Write `value` as pretty JSON to `out`, or to stdout when `out` is `None`.
pub fn write_json<T: serde::Serialize>(value: &T, out: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to encode output")?;
    match out {
        Some(path) => {
            std::fs::write(path, format!("{text}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "output written");
        }
        None => println!("{text}"),
    }
    Ok(())
}
