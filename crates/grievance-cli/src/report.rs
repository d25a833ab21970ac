//! # Report Subcommand
//!
//! Runs the duration analytics engine over an exported snapshot file
//! (grievances, outcomes, templates and bargaining units of one
//! organization) and prints the chosen report as JSON.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Args, ValueEnum};
use grievance_analytics::{AnalyticsDataset, DurationAnalyticsEngine, ReportFilter};
use grievance_core::{DateRange, GrievanceType};
use serde_json::Value;

use crate::{read_structured, write_json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    /// Actual against expected duration of every measurable step.
    Durations,
    /// Per bargaining unit, per step statistics.
    Units,
    /// Active grievances past their current step's due date.
    Overdue,
    /// Settled, withdrawn and arbitrated counts.
    Resolutions,
    /// Steps with outcomes but no template.
    Gaps,
}

/// Arguments for `grievance report`.
#[derive(Args, Debug)]
pub struct ReportArgs {
    /// JSON or YAML snapshot file.
    pub snapshot: PathBuf,

    #[arg(long, value_enum, default_value = "durations")]
    pub kind: ReportKind,

    /// Measure open steps up to this date instead of today.
    #[arg(long)]
    pub now: Option<NaiveDate>,

    /// Earliest grievance creation date, inclusive.
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Latest grievance creation date, inclusive.
    #[arg(long)]
    pub to: Option<NaiveDate>,

    #[arg(long)]
    pub grievance_type: Option<GrievanceType>,

    /// Write the report here instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Build one report as a JSON value.
pub fn build_report(
    dataset: AnalyticsDataset,
    kind: ReportKind,
    filter: &ReportFilter,
    now: DateTime<Utc>,
) -> Result<Value> {
    let engine = DurationAnalyticsEngine::new(dataset, now);
    let value = match kind {
        ReportKind::Durations => serde_json::to_value(engine.calculate_step_durations(filter))?,
        ReportKind::Units => serde_json::to_value(engine.bargaining_unit_step_report(filter))?,
        ReportKind::Overdue => serde_json::to_value(engine.overdue_by_step())?,
        ReportKind::Resolutions => serde_json::to_value(engine.resolution_breakdown(filter))?,
        ReportKind::Gaps => serde_json::to_value(engine.template_coverage_gaps(filter))?,
    };
    Ok(value)
}

pub fn run_report(args: &ReportArgs) -> Result<u8> {
    let dataset: AnalyticsDataset = read_structured(&args.snapshot)?;
    let filter = ReportFilter {
        range: DateRange::new(args.from, args.to)?,
        grievance_type: args.grievance_type,
    };
    let now = match args.now {
        Some(date) => date.and_time(NaiveTime::MIN).and_utc(),
        None => Utc::now(),
    };
    tracing::debug!(
        grievances = dataset.grievances.len(),
        outcomes = dataset.outcomes.len(),
        templates = dataset.templates.len(),
        kind = ?args.kind,
        "running report"
    );
    let report = build_report(dataset, args.kind, &filter, now)?;
    write_json(&report, args.out.as_deref())?;
    Ok(0)
}
