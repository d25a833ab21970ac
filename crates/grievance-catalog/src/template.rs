//! # Step Templates
//!
//! The typed per-step rule record and the ordering/renumbering applied on
//! every full save.

use chrono::NaiveDate;
use grievance_core::{
    compute_due_date, AgreementId, DayCount, GrievanceStage, GrievanceType, ValidationError,
};
use serde::{Deserialize, Serialize};

/// One procedural step of an agreement, for one grievance type.
///
/// Key: `(agreement_id, grievance_type, step_number)`, unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTemplate {
    pub agreement_id: AgreementId,
    pub grievance_type: GrievanceType,
    /// Position in the procedure, `1..=N` after a save.
    pub step_number: u32,
    pub stage: GrievanceStage,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The time limit as written in the agreement, e.g. "10 working days".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<String>,
    pub time_limit_days: u32,
    pub is_calendar_days: bool,
    #[serde(default)]
    pub required_participants: Vec<String>,
    #[serde(default)]
    pub required_documents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl StepTemplate {
    pub fn day_count(&self) -> DayCount {
        DayCount::from_calendar_flag(self.is_calendar_days)
    }

    /// Due date for this step when it starts on `start`.
    pub fn due_date(&self, start: NaiveDate) -> NaiveDate {
        compute_due_date(start, self.time_limit_days, self.day_count())
    }

    /// Human-readable label used to group report rows, e.g. "Step 2: Formal Grievance".
    pub fn label(&self) -> String {
        format!("Step {}: {}", self.step_number, self.name)
    }
}

/// A step as submitted for saving. The stage is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTemplateInput {
    /// The caller's ordering hint within a stage. Replaced on save.
    pub step_number: u32,
    pub stage: GrievanceStage,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub time_limit: Option<String>,
    #[serde(default)]
    pub time_limit_days: u32,
    #[serde(default)]
    pub is_calendar_days: bool,
    #[serde(default)]
    pub required_participants: Vec<String>,
    #[serde(default)]
    pub required_documents: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Validate, order and renumber a full template set.
///
/// Steps are sorted by stage then by the supplied step number (stable, so
/// ties keep their submitted order) and renumbered sequentially from 1.
/// Every step needs a non-blank name.
pub fn order_and_renumber(
    agreement_id: AgreementId,
    grievance_type: GrievanceType,
    mut steps: Vec<StepTemplateInput>,
) -> Result<Vec<StepTemplate>, ValidationError> {
    for step in &steps {
        ValidationError::require_text("step name", Some(&step.name))?;
    }

    steps.sort_by_key(|s| (s.stage, s.step_number));

    Ok(steps
        .into_iter()
        .zip(1u32..)
        .map(|(step, number)| StepTemplate {
            agreement_id,
            grievance_type,
            step_number: number,
            stage: step.stage,
            name: step.name.trim().to_string(),
            description: step.description,
            time_limit: step.time_limit,
            time_limit_days: step.time_limit_days,
            is_calendar_days: step.is_calendar_days,
            required_participants: step.required_participants,
            required_documents: step.required_documents,
            notes: step.notes,
        })
        .collect())
}
