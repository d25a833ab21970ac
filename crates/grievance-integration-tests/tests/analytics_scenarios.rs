//! # Analytics Scenarios
//!
//! Grievances are filed and advanced through the lifecycle engine, then
//! measured through the analytics service under a fixed clock.

mod common;

use chrono::NaiveDate;
use common::{at, World};
use grievance_analytics::ReportFilter;
use grievance_core::{DateRange, GrievanceStatus, GrievanceType};
use grievance_lifecycle::StatusUpdate;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn individual() -> ReportFilter {
    ReportFilter {
        range: DateRange::unbounded(),
        grievance_type: Some(GrievanceType::Individual),
    }
}

// -- Durations ----------------------------------------------------------------

#[tokio::test]
async fn step_completed_on_its_due_date_is_on_time() {
    // Filed Monday 2024-03-04, first step allows 10 business days.
    let world = World::new(at(2024, 3, 4)).await;
    let grievance = world.file(GrievanceType::Individual).await;
    world.clock.set(at(2024, 3, 18));
    world
        .engine
        .advance_to_next_step(&world.ctx, &grievance.id, "Denied")
        .await
        .unwrap();

    let records = world.analytics.step_durations(&world.org, &individual()).await;
    let first = records
        .iter()
        .find(|r| r.grievance_id == grievance.id && r.step_number == 1)
        .unwrap();
    assert_eq!(first.start_date, date(2024, 3, 4));
    assert_eq!(first.end_date, Some(date(2024, 3, 18)));
    assert_eq!(first.duration_days, 10);
    assert!(!first.is_overdue);
    assert_eq!(first.overdue_by_days, 0);
    assert_eq!(first.bargaining_unit_name, "Warehouse");

    // The next step opens on the completion date.
    let second = records
        .iter()
        .find(|r| r.grievance_id == grievance.id && r.step_number == 2)
        .unwrap();
    assert_eq!(second.start_date, date(2024, 3, 18));
    assert_eq!(second.end_date, None);
    assert_eq!(second.duration_days, 0);
}

#[tokio::test]
async fn open_step_past_its_limit_is_overdue() {
    let world = World::new(at(2024, 3, 4)).await;
    let grievance = world.file(GrievanceType::Individual).await;
    world.clock.set(at(2024, 3, 24));

    let records = world.analytics.step_durations(&world.org, &individual()).await;
    assert_eq!(records.len(), 1);
    let open = &records[0];
    assert_eq!(open.end_date, None);
    assert_eq!(open.duration_days, 14);
    assert!(open.is_overdue);
    assert_eq!(open.overdue_by_days, 4);
    assert_eq!(open.due_date, date(2024, 3, 18));

    let overdue = world.analytics.overdue_by_step(&world.org).await;
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].step_number, 1);
    assert_eq!(overdue[0].step_label, "Step 1: Supervisor meeting");
    assert_eq!(overdue[0].grievances[0].grievance_id, grievance.id);
    assert_eq!(overdue[0].grievances[0].overdue_by_days, 4);
}

#[tokio::test]
async fn steps_without_templates_become_coverage_gaps() {
    let world = World::new(at(2024, 3, 4)).await;
    world.file(GrievanceType::Group).await;
    world.file(GrievanceType::Individual).await;
    world.clock.set(at(2024, 3, 6));

    let group = ReportFilter {
        range: DateRange::unbounded(),
        grievance_type: Some(GrievanceType::Group),
    };
    assert!(world.analytics.step_durations(&world.org, &group).await.is_empty());

    let all = world
        .analytics
        .step_durations(&world.org, &ReportFilter::default())
        .await;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].grievance_type, GrievanceType::Individual);

    let gaps = world
        .analytics
        .template_coverage_gaps(&world.org, &ReportFilter::default())
        .await;
    assert_eq!(gaps.len(), 1);
    assert_eq!(gaps[0].agreement_id, world.agreement);
    assert_eq!(gaps[0].grievance_type, GrievanceType::Group);
    assert_eq!(gaps[0].step_number, 1);
    assert_eq!(gaps[0].affected_grievances, 1);
}

#[tokio::test]
async fn deleted_grievances_are_not_measured() {
    let world = World::new(at(2024, 3, 4)).await;
    let kept = world.file(GrievanceType::Individual).await;
    let deleted = world.file(GrievanceType::Individual).await;
    world
        .engine
        .update_status(
            &world.ctx,
            &deleted.id,
            StatusUpdate {
                status: GrievanceStatus::Deleted,
                stage: None,
                outcomes: Some("Duplicate filing".into()),
                resolution_details: None,
            },
        )
        .await
        .unwrap();

    let records = world
        .analytics
        .step_durations(&world.org, &ReportFilter::default())
        .await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].grievance_id, kept.id);
}

#[tokio::test]
async fn creation_date_range_restricts_reports() {
    let world = World::new(at(2024, 3, 4)).await;
    world.file(GrievanceType::Individual).await;
    world.clock.set(at(2024, 4, 1));
    let april = world.file(GrievanceType::Individual).await;

    let filter = ReportFilter {
        range: DateRange::new(Some(date(2024, 4, 1)), None).unwrap(),
        grievance_type: None,
    };
    let records = world.analytics.step_durations(&world.org, &filter).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].grievance_id, april.id);
}

// -- Resolutions and Unit Reports ---------------------------------------------

/// Three settlements (two at step 1, one at step 2) and one withdrawal at
/// step 1.
async fn resolved_world() -> World {
    let world = World::new(at(2024, 3, 4)).await;
    let a = world.file(GrievanceType::Individual).await;
    let b = world.file(GrievanceType::Individual).await;
    let c = world.file(GrievanceType::Individual).await;
    let d = world.file(GrievanceType::Individual).await;

    world.clock.set(at(2024, 3, 6));
    world
        .engine
        .advance_to_next_step(&world.ctx, &c.id, "Denied at step 1")
        .await
        .unwrap();

    world.clock.set(at(2024, 3, 8));
    for id in [a.id, b.id, c.id] {
        world
            .engine
            .process_settlement(&world.ctx, &id, "Settled with back pay")
            .await
            .unwrap();
    }
    world
        .engine
        .process_withdrawal(&world.ctx, &d.id, "Member withdrew")
        .await
        .unwrap();
    world
}

#[tokio::test]
async fn resolution_breakdown_counts_by_type_and_step() {
    let world = resolved_world().await;
    let breakdown = world
        .analytics
        .resolution_breakdown(&world.org, &ReportFilter::default())
        .await;

    assert_eq!(breakdown.total_resolved, 4);
    assert_eq!(breakdown.settled.count, 3);
    assert_eq!(breakdown.settled.percentage, 75.0);
    assert_eq!(breakdown.withdrawn.count, 1);
    assert_eq!(breakdown.resolved_arbitration.count, 0);

    let steps: Vec<(Option<u32>, u64)> = breakdown
        .settled_by_step
        .iter()
        .map(|b| (b.step_number, b.count))
        .collect();
    assert_eq!(steps, vec![(Some(1), 2), (Some(2), 1)]);
    let share: f64 = breakdown.settled_by_step.iter().map(|b| b.percentage).sum();
    assert!((share - 100.0).abs() < 0.02);
}

#[tokio::test]
async fn unit_report_attributes_resolutions_to_steps() {
    let world = resolved_world().await;
    let report = world
        .analytics
        .bargaining_unit_report(&world.org, &ReportFilter::default())
        .await;

    assert_eq!(report.len(), 1);
    assert_eq!(report[0].bargaining_unit_id, world.unit);
    // Only the completed step 1 of the advanced grievance is measurable.
    let step = &report[0].steps[0];
    assert_eq!(report[0].steps.len(), 1);
    assert_eq!(step.step_number, 1);
    assert_eq!(step.total_count, 1);
    assert_eq!(step.min_duration_days, 2);
    assert_eq!(step.settled_at_step, 2);
    assert_eq!(step.withdrawn_at_step, 1);
    assert_eq!(step.on_time_percentage, 100.0);
}

#[tokio::test]
async fn repeated_reports_over_unchanged_data_are_identical() {
    let world = resolved_world().await;
    let first = world
        .analytics
        .bargaining_unit_report(&world.org, &ReportFilter::default())
        .await;
    let second = world
        .analytics
        .bargaining_unit_report(&world.org, &ReportFilter::default())
        .await;
    assert_eq!(first, second);

    let durations = world
        .analytics
        .step_durations(&world.org, &ReportFilter::default())
        .await;
    let again = world
        .analytics
        .step_durations(&world.org, &ReportFilter::default())
        .await;
    assert_eq!(durations, again);
}
