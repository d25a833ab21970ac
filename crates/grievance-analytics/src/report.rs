//! Report filters and result records.

use chrono::NaiveDate;
use grievance_core::{
    utc_date, AgreementId, BargainingUnitId, DateRange, GrievanceId, GrievanceStage, GrievanceType,
};
use grievance_lifecycle::Grievance;
use serde::{Deserialize, Serialize};

/// Restricts a report to grievances created within `range` (UTC dates,
/// inclusive) and, optionally, of one type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFilter {
    #[serde(default)]
    pub range: DateRange,
    #[serde(default)]
    pub grievance_type: Option<GrievanceType>,
}

impl ReportFilter {
    pub fn matches(&self, grievance: &Grievance) -> bool {
        self.range.contains(utc_date(grievance.created_at))
            && self
                .grievance_type
                .map_or(true, |t| t == grievance.grievance_type)
    }
}

/// Actual against expected duration for one grievance step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDurationRecord {
    pub grievance_id: GrievanceId,
    pub bargaining_unit_id: BargainingUnitId,
    pub bargaining_unit_name: String,
    pub agreement_id: AgreementId,
    pub grievance_type: GrievanceType,
    pub step_number: u32,
    pub step_name: String,
    pub stage: GrievanceStage,
    pub start_date: NaiveDate,
    /// `None` for the step an active grievance is currently at.
    pub end_date: Option<NaiveDate>,
    pub due_date: NaiveDate,
    pub duration_days: i64,
    pub expected_days: u32,
    pub is_calendar_days: bool,
    pub is_overdue: bool,
    pub overdue_by_days: i64,
}

impl StepDurationRecord {
    pub fn step_label(&self) -> String {
        format!("Step {}: {}", self.step_number, self.step_name)
    }
}

/// Aggregates for one (bargaining unit, step).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepStatistics {
    pub step_number: u32,
    pub step_name: String,
    pub total_count: u64,
    pub average_duration_days: f64,
    pub min_duration_days: i64,
    pub max_duration_days: i64,
    pub overdue_count: u64,
    pub overdue_percentage: f64,
    pub on_time_count: u64,
    pub on_time_percentage: f64,
    /// Grievances in the unit that ended `SETTLED` at this step number.
    pub settled_at_step: u64,
    /// Grievances in the unit that ended `WITHDRAWN` at this step number.
    pub withdrawn_at_step: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BargainingUnitReport {
    pub bargaining_unit_id: BargainingUnitId,
    pub bargaining_unit_name: String,
    pub steps: Vec<StepStatistics>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueEntry {
    pub grievance_id: GrievanceId,
    pub overdue_by_days: i64,
    pub expected_days: u32,
    pub actual_days: i64,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
}

/// Open, overdue steps for one (bargaining unit, step), most overdue first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueGroup {
    pub bargaining_unit_id: BargainingUnitId,
    pub bargaining_unit_name: String,
    pub step_number: u32,
    pub step_label: String,
    pub grievances: Vec<OverdueEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionCount {
    pub count: u64,
    /// Share of all resolved grievances, two decimals.
    pub percentage: f64,
}

/// Resolutions of one type at one step. `step_number` is `None` for
/// grievances resolved without a recorded step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepBucket {
    pub step_number: Option<u32>,
    pub count: u64,
    /// Share of that resolution type's total, two decimals.
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionBreakdown {
    pub total_resolved: u64,
    pub settled: ResolutionCount,
    pub withdrawn: ResolutionCount,
    pub resolved_arbitration: ResolutionCount,
    pub settled_by_step: Vec<StepBucket>,
    pub withdrawn_by_step: Vec<StepBucket>,
}

/// A step analytics could not measure because its agreement defines no
/// template for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateGap {
    pub agreement_id: AgreementId,
    pub grievance_type: GrievanceType,
    pub step_number: u32,
    pub affected_grievances: u64,
}

/// `part / whole` as a percentage rounded to two decimals; 0 when `whole`
/// is 0.
pub(crate) fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 * 100.0 / whole as f64)
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
