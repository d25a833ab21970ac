//! # Lifecycle Records
//!
//! The grievance row, the outcome recorded when a step completes, and the
//! per-step instance carrying a computed due date.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use grievance_core::{
    AgreementId, BargainingUnitId, GrievanceId, GrievanceStage, GrievanceStatus, GrievanceType,
    OrganizationId, UserId, ValidationError,
};
use serde::{Deserialize, Serialize};

/// One labor dispute.
///
/// While `status` is `ACTIVE`, `current_step_number` never decreases.
/// Once status leaves `ACTIVE`, `stage` and `current_step_number` record
/// where the grievance was resolved and no longer change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grievance {
    pub id: GrievanceId,
    pub organization_id: OrganizationId,
    pub bargaining_unit_id: BargainingUnitId,
    pub agreement_id: AgreementId,
    pub grievance_type: GrievanceType,
    pub status: GrievanceStatus,
    pub stage: GrievanceStage,
    /// `None` only for records imported without step tracking.
    pub current_step_number: Option<u32>,
    /// Free-text outcome summary supplied with status changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcomes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_details: Option<ResolutionDetails>,
    /// Status to return to when a deleted grievance is restored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_before_deletion: Option<GrievanceStatus>,
    /// Optimistic-concurrency counter, incremented by every commit.
    pub version: u64,
    pub filed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Grievance {
    pub fn is_active(&self) -> bool {
        self.status == GrievanceStatus::Active
    }
}

/// How a grievance was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionType {
    Withdrawal,
    Settlement,
    Arbitration,
}

impl ResolutionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Withdrawal => "WITHDRAWAL",
            Self::Settlement => "SETTLEMENT",
            Self::Arbitration => "ARBITRATION",
        }
    }
}

/// Structured record of a resolution, attached to the grievance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionDetails {
    pub resolution_type: ResolutionType,
    pub resolution_date: DateTime<Utc>,
    pub resolved_by: UserId,
    pub details: String,
}

/// Written when a step is completed. Key: `(grievance_id, step_number)`.
///
/// If several rows exist for one key, the one with the latest
/// `completed_date` is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrievanceStepOutcome {
    pub grievance_id: GrievanceId,
    pub organization_id: OrganizationId,
    pub step_number: u32,
    pub stage: GrievanceStage,
    pub outcome: String,
    pub completed_date: DateTime<Utc>,
    pub recorded_by: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepInstanceStatus {
    Pending,
    InProgress,
    Completed,
}

impl StepInstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
        }
    }
}

impl FromStr for StepInstanceStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETED" => Ok(Self::Completed),
            other => Err(ValidationError::Invalid {
                field: "step_instance_status",
                reason: format!("unknown status '{other}'"),
            }),
        }
    }
}

impl FromStr for ResolutionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WITHDRAWAL" => Ok(Self::Withdrawal),
            "SETTLEMENT" => Ok(Self::Settlement),
            "ARBITRATION" => Ok(Self::Arbitration),
            other => Err(ValidationError::Invalid {
                field: "resolution_type",
                reason: format!("unknown resolution type '{other}'"),
            }),
        }
    }
}

/// A tracked step with a computed due date. Created only when the
/// agreement defines a template for the step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrievanceStepInstance {
    pub grievance_id: GrievanceId,
    pub organization_id: OrganizationId,
    pub step_number: u32,
    pub stage: GrievanceStage,
    pub name: String,
    pub due_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<DateTime<Utc>>,
    pub status: StepInstanceStatus,
}
