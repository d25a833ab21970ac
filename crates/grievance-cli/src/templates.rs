//! # Templates Subcommand
//!
//! - `migrate` — Convert legacy step definitions, where the stage may be
//!   missing, into the ordered and renumbered typed form the catalog
//!   stores. Missing stages are inferred from step descriptions and logged.
//! - `schedule` — Worst-case timeline of a typed template set: each step
//!   starts on the previous step's due date.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use grievance_catalog::{
    migrate_legacy_steps, order_and_renumber, LegacyStep, StepTemplate, StepTemplateInput,
};
use grievance_core::{AgreementId, GrievanceType};
use serde::Serialize;

use crate::{read_structured, write_json};

/// Arguments for the `grievance templates` subcommand.
#[derive(Args, Debug)]
pub struct TemplatesArgs {
    #[command(subcommand)]
    pub command: TemplatesCommand,
}

#[derive(Subcommand, Debug)]
pub enum TemplatesCommand {
    /// Convert a legacy step list into a typed, renumbered template set.
    Migrate {
        /// JSON or YAML list of legacy steps.
        input: PathBuf,
        /// Agreement the steps belong to.
        #[arg(long)]
        agreement_id: AgreementId,
        /// INDIVIDUAL, GROUP or POLICY.
        #[arg(long, default_value = "INDIVIDUAL")]
        grievance_type: GrievanceType,
        /// Write the result here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Print the worst-case timeline of a typed template set.
    Schedule {
        /// JSON or YAML list of typed steps (stage required).
        input: PathBuf,
        /// Date the grievance is filed (YYYY-MM-DD).
        #[arg(long)]
        start: NaiveDate,
    },
}

pub fn run_templates(args: &TemplatesArgs) -> Result<u8> {
    match &args.command {
        TemplatesCommand::Migrate {
            input,
            agreement_id,
            grievance_type,
            out,
        } => {
            let templates = migrate_file(input, *agreement_id, *grievance_type)?;
            write_json(&templates, out.as_deref())?;
            Ok(0)
        }
        TemplatesCommand::Schedule { input, start } => {
            let steps: Vec<StepTemplateInput> = read_structured(input)?;
            // The agreement is irrelevant to the timeline.
            let templates = order_and_renumber(AgreementId::new(), GrievanceType::Individual, steps)
                .context("template set is invalid")?;
            for row in schedule(&templates, *start) {
                println!(
                    "{:>3}  {:<12} {:<40} {:>3} {:<8}  {} -> {}",
                    row.step_number,
                    row.stage,
                    row.name,
                    row.time_limit_days,
                    if row.is_calendar_days { "calendar" } else { "business" },
                    row.starts,
                    row.due
                );
            }
            Ok(0)
        }
    }
}

/// Read legacy steps from `input` and produce the typed set.
pub fn migrate_file(
    input: &Path,
    agreement_id: AgreementId,
    grievance_type: GrievanceType,
) -> Result<Vec<StepTemplate>> {
    let legacy: Vec<LegacyStep> = read_structured(input)?;
    let count = legacy.len();
    let steps = migrate_legacy_steps(agreement_id, legacy);
    let templates = order_and_renumber(agreement_id, grievance_type, steps)
        .with_context(|| format!("legacy steps in {} are invalid", input.display()))?;
    tracing::info!(
        input = %input.display(),
        agreement_id = %agreement_id,
        grievance_type = %grievance_type,
        steps = count,
        "legacy template set migrated"
    );
    Ok(templates)
}

/// One row of a worst-case timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleRow {
    pub step_number: u32,
    pub stage: String,
    pub name: String,
    pub time_limit_days: u32,
    pub is_calendar_days: bool,
    pub starts: NaiveDate,
    pub due: NaiveDate,
}

/// Chain the steps so each starts on the previous step's due date.
pub fn schedule(templates: &[StepTemplate], filed: NaiveDate) -> Vec<ScheduleRow> {
    let mut starts = filed;
    templates
        .iter()
        .map(|t| {
            let due = t.due_date(starts);
            let row = ScheduleRow {
                step_number: t.step_number,
                stage: t.stage.to_string(),
                name: t.name.clone(),
                time_limit_days: t.time_limit_days,
                is_calendar_days: t.is_calendar_days,
                starts,
                due,
            };
            starts = due;
            row
        })
        .collect()
}
