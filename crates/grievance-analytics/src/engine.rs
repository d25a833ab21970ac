//! # Duration Analytics Engine
//!
//! Pure computation over an [`AnalyticsDataset`] and a fixed "now". Every
//! report is derived from the same step timeline:
//!
//! 1. Keep grievances that are not `DELETED` and pass the [`ReportFilter`].
//! 2. Deduplicate their outcomes per (grievance, step), keeping the latest
//!    completion.
//! 3. Resolve each outcome's template. Steps without one become
//!    [`TemplateGap`]s instead of records.
//! 4. Measure each step from the previous step's completion (or the
//!    grievance's creation) to its own completion.
//! 5. Add an open record for the current step of every `ACTIVE` grievance,
//!    measured up to "now".
//!
//! Records are sorted by (unit name, step, grievance creation, grievance
//! id, end date), so repeated reads over the same data are identical.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use grievance_catalog::{StepTemplate, TemplateIndex};
use grievance_core::{
    elapsed, utc_date, AgreementId, BargainingUnitId, GrievanceId, GrievanceStatus, GrievanceType,
};
use grievance_lifecycle::{Grievance, GrievanceStepOutcome};

use crate::dataset::AnalyticsDataset;
use crate::report::{
    percentage, round2, BargainingUnitReport, OverdueEntry, OverdueGroup, ReportFilter,
    ResolutionBreakdown, ResolutionCount, StepBucket, StepDurationRecord, StepStatistics,
    TemplateGap,
};

/// Counter of step records skipped because no template matched.
pub const TEMPLATE_MISSING_METRIC: &str = "grievance_template_missing_total";

const UNKNOWN_UNIT: &str = "Unknown bargaining unit";

type GapKey = (AgreementId, GrievanceType, u32);
type SortKey = (String, u32, DateTime<Utc>, GrievanceId, Option<NaiveDate>);

struct Timeline {
    records: Vec<StepDurationRecord>,
    gaps: BTreeMap<GapKey, BTreeSet<GrievanceId>>,
}

#[derive(Debug, Clone)]
pub struct DurationAnalyticsEngine {
    grievances: Vec<Grievance>,
    outcomes: Vec<GrievanceStepOutcome>,
    index: TemplateIndex,
    unit_names: HashMap<BargainingUnitId, String>,
    now: DateTime<Utc>,
}

impl DurationAnalyticsEngine {
    pub fn new(dataset: AnalyticsDataset, now: DateTime<Utc>) -> Self {
        let AnalyticsDataset {
            grievances,
            outcomes,
            templates,
            bargaining_units,
        } = dataset;
        Self {
            grievances,
            outcomes,
            index: TemplateIndex::new(templates),
            unit_names: bargaining_units.into_iter().map(|u| (u.id, u.name)).collect(),
            now,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn unit_name(&self, id: &BargainingUnitId) -> String {
        self.unit_names
            .get(id)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_UNIT.to_string())
    }

    fn included<'a>(&'a self, filter: &'a ReportFilter) -> impl Iterator<Item = &'a Grievance> + 'a {
        self.grievances
            .iter()
            .filter(move |g| g.status != GrievanceStatus::Deleted && filter.matches(g))
    }

    fn record(
        &self,
        grievance: &Grievance,
        template: &StepTemplate,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    ) -> StepDurationRecord {
        let until = end_date.unwrap_or_else(|| utc_date(self.now));
        let duration_days = elapsed(start_date, until, template.day_count());
        let expected = i64::from(template.time_limit_days);
        StepDurationRecord {
            grievance_id: grievance.id,
            bargaining_unit_id: grievance.bargaining_unit_id,
            bargaining_unit_name: self.unit_name(&grievance.bargaining_unit_id),
            agreement_id: grievance.agreement_id,
            grievance_type: grievance.grievance_type,
            step_number: template.step_number,
            step_name: template.name.clone(),
            stage: template.stage,
            start_date,
            end_date,
            due_date: template.due_date(start_date),
            duration_days,
            expected_days: template.time_limit_days,
            is_calendar_days: template.is_calendar_days,
            is_overdue: duration_days > expected,
            overdue_by_days: (duration_days - expected).max(0),
        }
    }

    fn timeline(&self, filter: &ReportFilter) -> Timeline {
        let included: HashMap<GrievanceId, &Grievance> =
            self.included(filter).map(|g| (g.id, g)).collect();

        let mut latest: HashMap<(GrievanceId, u32), &GrievanceStepOutcome> = HashMap::new();
        for outcome in self
            .outcomes
            .iter()
            .filter(|o| included.contains_key(&o.grievance_id))
        {
            latest
                .entry((outcome.grievance_id, outcome.step_number))
                .and_modify(|current| {
                    if outcome.completed_date > current.completed_date {
                        *current = outcome;
                    }
                })
                .or_insert(outcome);
        }

        let start_of = |grievance: &Grievance, step: u32| -> NaiveDate {
            step.checked_sub(1)
                .and_then(|previous| latest.get(&(grievance.id, previous)))
                .map_or_else(|| utc_date(grievance.created_at), |o| utc_date(o.completed_date))
        };

        let mut keyed: Vec<(SortKey, StepDurationRecord)> = Vec::new();
        let mut gaps: BTreeMap<GapKey, BTreeSet<GrievanceId>> = BTreeMap::new();
        let mut measure = |grievance: &Grievance, step: u32, end: Option<NaiveDate>| {
            match self
                .index
                .get(grievance.agreement_id, grievance.grievance_type, step)
            {
                Some(template) => {
                    let record = self.record(grievance, template, start_of(grievance, step), end);
                    let key = (
                        record.bargaining_unit_name.clone(),
                        step,
                        grievance.created_at,
                        grievance.id,
                        end,
                    );
                    keyed.push((key, record));
                }
                None => {
                    gaps.entry((grievance.agreement_id, grievance.grievance_type, step))
                        .or_default()
                        .insert(grievance.id);
                }
            }
        };

        for ((grievance_id, step), outcome) in &latest {
            if let Some(grievance) = included.get(grievance_id) {
                measure(*grievance, *step, Some(utc_date(outcome.completed_date)));
            }
        }
        for grievance in included.values() {
            if grievance.status != GrievanceStatus::Active {
                continue;
            }
            if let Some(step) = grievance.current_step_number {
                if !latest.contains_key(&(grievance.id, step)) {
                    measure(*grievance, step, None);
                }
            }
        }

        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        Timeline {
            records: keyed.into_iter().map(|(_, r)| r).collect(),
            gaps,
        }
    }

    /// Actual against expected duration for every measurable step.
    pub fn calculate_step_durations(&self, filter: &ReportFilter) -> Vec<StepDurationRecord> {
        let Timeline { records, gaps } = self.timeline(filter);
        for ((agreement_id, grievance_type, step_number), grievances) in &gaps {
            tracing::warn!(
                agreement_id = %agreement_id,
                grievance_type = %grievance_type,
                step_number,
                skipped = grievances.len(),
                "no step template; step excluded from duration analytics"
            );
            metrics::counter!(TEMPLATE_MISSING_METRIC).increment(grievances.len() as u64);
        }
        records
    }

    /// Per bargaining unit and step: duration statistics, overdue and
    /// on-time shares, and how many grievances were settled or withdrawn
    /// at that step.
    pub fn bargaining_unit_step_report(&self, filter: &ReportFilter) -> Vec<BargainingUnitReport> {
        let records = self.calculate_step_durations(filter);

        let mut ended_at: HashMap<(BargainingUnitId, u32, GrievanceStatus), u64> = HashMap::new();
        for grievance in self.included(filter) {
            if let (GrievanceStatus::Settled | GrievanceStatus::Withdrawn, Some(step)) =
                (grievance.status, grievance.current_step_number)
            {
                *ended_at
                    .entry((grievance.bargaining_unit_id, step, grievance.status))
                    .or_default() += 1;
            }
        }

        let mut units: BTreeMap<(String, BargainingUnitId), BTreeMap<(u32, String), Vec<&StepDurationRecord>>> =
            BTreeMap::new();
        for record in &records {
            units
                .entry((record.bargaining_unit_name.clone(), record.bargaining_unit_id))
                .or_default()
                .entry((record.step_number, record.step_name.clone()))
                .or_default()
                .push(record);
        }

        units
            .into_iter()
            .map(|((name, unit_id), steps)| BargainingUnitReport {
                bargaining_unit_id: unit_id,
                bargaining_unit_name: name,
                steps: steps
                    .into_iter()
                    .map(|((step_number, step_name), group)| {
                        let ended = |status| {
                            ended_at
                                .get(&(unit_id, step_number, status))
                                .copied()
                                .unwrap_or(0)
                        };
                        step_statistics(
                            step_number,
                            step_name,
                            &group,
                            ended(GrievanceStatus::Settled),
                            ended(GrievanceStatus::Withdrawn),
                        )
                    })
                    .collect(),
            })
            .collect()
    }

    /// Open steps past their due date, grouped by bargaining unit and step.
    pub fn overdue_by_step(&self) -> Vec<OverdueGroup> {
        let records = self.calculate_step_durations(&ReportFilter::default());
        let mut groups: BTreeMap<(String, BargainingUnitId, u32, String), Vec<OverdueEntry>> =
            BTreeMap::new();
        for record in records
            .iter()
            .filter(|r| r.end_date.is_none() && r.is_overdue)
        {
            groups
                .entry((
                    record.bargaining_unit_name.clone(),
                    record.bargaining_unit_id,
                    record.step_number,
                    record.step_label(),
                ))
                .or_default()
                .push(OverdueEntry {
                    grievance_id: record.grievance_id,
                    overdue_by_days: record.overdue_by_days,
                    expected_days: record.expected_days,
                    actual_days: record.duration_days,
                    start_date: record.start_date,
                    due_date: record.due_date,
                });
        }

        groups
            .into_iter()
            .map(|((name, unit_id, step_number, step_label), mut entries)| {
                entries.sort_by(|a, b| {
                    b.overdue_by_days
                        .cmp(&a.overdue_by_days)
                        .then(a.grievance_id.cmp(&b.grievance_id))
                });
                OverdueGroup {
                    bargaining_unit_id: unit_id,
                    bargaining_unit_name: name,
                    step_number,
                    step_label,
                    grievances: entries,
                }
            })
            .collect()
    }

    /// How resolved grievances ended, and at which step.
    pub fn resolution_breakdown(&self, filter: &ReportFilter) -> ResolutionBreakdown {
        let resolved: Vec<&Grievance> = self
            .included(filter)
            .filter(|g| g.status.is_resolution())
            .collect();
        let total = resolved.len() as u64;

        let by_step = |status: GrievanceStatus| -> (u64, Vec<StepBucket>) {
            let mut buckets: BTreeMap<Option<u32>, u64> = BTreeMap::new();
            for grievance in resolved.iter().filter(|g| g.status == status) {
                *buckets.entry(grievance.current_step_number).or_default() += 1;
            }
            let count: u64 = buckets.values().sum();
            let steps = buckets
                .into_iter()
                .map(|(step_number, n)| StepBucket {
                    step_number,
                    count: n,
                    percentage: percentage(n, count),
                })
                .collect();
            (count, steps)
        };
        let (settled, settled_by_step) = by_step(GrievanceStatus::Settled);
        let (withdrawn, withdrawn_by_step) = by_step(GrievanceStatus::Withdrawn);
        let arbitration = resolved
            .iter()
            .filter(|g| g.status == GrievanceStatus::ResolvedArbitration)
            .count() as u64;

        let share = |count| ResolutionCount {
            count,
            percentage: percentage(count, total),
        };
        ResolutionBreakdown {
            total_resolved: total,
            settled: share(settled),
            withdrawn: share(withdrawn),
            resolved_arbitration: share(arbitration),
            settled_by_step,
            withdrawn_by_step,
        }
    }

    /// Steps analytics had to skip for lack of a template, with the number
    /// of grievances affected.
    pub fn template_coverage_gaps(&self, filter: &ReportFilter) -> Vec<TemplateGap> {
        self.timeline(filter)
            .gaps
            .into_iter()
            .map(|((agreement_id, grievance_type, step_number), grievances)| TemplateGap {
                agreement_id,
                grievance_type,
                step_number,
                affected_grievances: grievances.len() as u64,
            })
            .collect()
    }
}

fn step_statistics(
    step_number: u32,
    step_name: String,
    group: &[&StepDurationRecord],
    settled_at_step: u64,
    withdrawn_at_step: u64,
) -> StepStatistics {
    let total = group.len() as u64;
    let durations = || group.iter().map(|r| r.duration_days);
    let sum: i64 = durations().sum();
    let overdue = group.iter().filter(|r| r.is_overdue).count() as u64;
    let on_time = total - overdue;
    StepStatistics {
        step_number,
        step_name,
        total_count: total,
        average_duration_days: if total == 0 {
            0.0
        } else {
            round2(sum as f64 / total as f64)
        },
        min_duration_days: durations().min().unwrap_or(0),
        max_duration_days: durations().max().unwrap_or(0),
        overdue_count: overdue,
        overdue_percentage: percentage(overdue, total),
        on_time_count: on_time,
        on_time_percentage: percentage(on_time, total),
        settled_at_step,
        withdrawn_at_step,
    }
}
