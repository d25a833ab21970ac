//! # Transition Validation
//!
//! Pure checks run before a status or stage change is submitted. They tell
//! a client which supplementary form, if any, must be filled in first.
//!
//! | Target                                 | Requirement                          | Form               |
//! |----------------------------------------|--------------------------------------|--------------------|
//! | `WITHDRAWN`                            | non-blank withdrawal details         | `withdrawal`       |
//! | `SETTLED`                              | non-blank settlement details         | `settlement`       |
//! | back to `ACTIVE` with remaining issues | remaining-issues text non-blank      | `remaining_issues` |
//! | anything, from `DELETED`               | target is the status before deletion | none               |
//! | `DELETED`, from `DELETED`              | never valid                          | none               |
//!
//! Every other transition is valid. The engine enforces further rules
//! (justification for terminal targets, frozen stage) when the change is
//! actually applied.

use grievance_core::{GrievanceStage, GrievanceStatus};
use serde::{Deserialize, Serialize};

use crate::model::Grievance;

/// The requested status, and optionally a new stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionTarget {
    pub status: GrievanceStatus,
    #[serde(default)]
    pub stage: Option<GrievanceStage>,
}

/// Supplementary form data accompanying a transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionForm {
    #[serde(default)]
    pub withdrawal_details: Option<String>,
    #[serde(default)]
    pub settlement_details: Option<String>,
    #[serde(default)]
    pub remaining_issues: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredForm {
    Withdrawal,
    Settlement,
    RemainingIssues,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_form: Option<RequiredForm>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            error: None,
            requires_form: None,
        }
    }

    fn invalid(error: impl Into<String>, requires_form: Option<RequiredForm>) -> Self {
        Self {
            is_valid: false,
            error: Some(error.into()),
            requires_form,
        }
    }
}

fn is_blank(text: &Option<String>) -> bool {
    text.as_deref().map_or(true, |t| t.trim().is_empty())
}

/// Check `target` against the current grievance and the supplied form.
pub fn validate_transition(
    current: &Grievance,
    target: &TransitionTarget,
    form: &TransitionForm,
) -> ValidationResult {
    if current.status == GrievanceStatus::Deleted {
        if target.status == GrievanceStatus::Deleted {
            return ValidationResult::invalid("grievance is already deleted", None);
        }
        let restorable = current
            .status_before_deletion
            .unwrap_or(GrievanceStatus::Active);
        if target.status != restorable {
            return ValidationResult::invalid(
                format!(
                    "a deleted grievance can only be restored to {restorable}, not {}",
                    target.status
                ),
                None,
            );
        }
    }

    match target.status {
        GrievanceStatus::Withdrawn if is_blank(&form.withdrawal_details) => {
            ValidationResult::invalid("withdrawal details are required", Some(RequiredForm::Withdrawal))
        }
        GrievanceStatus::Settled if is_blank(&form.settlement_details) => {
            ValidationResult::invalid("settlement details are required", Some(RequiredForm::Settlement))
        }
        GrievanceStatus::Active
            if current.status != GrievanceStatus::Active
                && form.remaining_issues.is_some()
                && is_blank(&form.remaining_issues) =>
        {
            ValidationResult::invalid(
                "remaining issues must be described when reopening a grievance",
                Some(RequiredForm::RemainingIssues),
            )
        }
        _ => ValidationResult::valid(),
    }
}
