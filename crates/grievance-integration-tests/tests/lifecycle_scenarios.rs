//! # Lifecycle Scenarios
//!
//! Step progression, status transitions, tenant isolation and concurrent
//! writers, exercised across the catalog, lifecycle and in-memory store.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use common::{at, World};
use grievance_catalog::TemplateCatalog;
use grievance_core::{
    GrievanceId, GrievanceStage, GrievanceStatus, GrievanceType, OrganizationId, UserId,
};
use grievance_lifecycle::{
    ActorContext, EventQuery, EventType, Grievance, GrievanceEvent, GrievanceSnapshot,
    GrievanceStepInstance, GrievanceStepOutcome, GrievanceStore, LifecycleError, Paginated,
    RequiredForm, RetryPolicy, StatusUpdate, StepInstanceStatus, StepProgressionEngine,
    StoreError, TransitionCommit, TransitionForm, TransitionTarget,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// -- Progression --------------------------------------------------------------

#[tokio::test]
async fn full_procedure_walk_records_every_step() {
    let world = World::new(at(2024, 3, 4)).await;
    let grievance = world.file(GrievanceType::Individual).await;

    let instances = world.engine.step_instances(&world.ctx, &grievance.id).await.unwrap();
    assert_eq!(instances.len(), 1);
    // Ten business days from Monday 2024-03-04.
    assert_eq!(instances[0].due_date, date(2024, 3, 18));

    world.clock.set(at(2024, 3, 11));
    let first = world
        .engine
        .advance_to_next_step(&world.ctx, &grievance.id, "Denied by supervisor")
        .await
        .unwrap();
    assert_eq!(first.new_step_number, 2);
    assert_eq!(first.next_due_date, Some(date(2024, 3, 25)));

    world.clock.set(at(2024, 3, 20));
    let second = world
        .engine
        .advance_to_next_step(&world.ctx, &grievance.id, "Denied by HR")
        .await
        .unwrap();
    assert_eq!(second.new_step_number, 3);
    // Arbitration counts calendar days.
    assert_eq!(second.next_due_date, Some(date(2024, 4, 19)));

    let outcomes = world.engine.step_outcomes(&world.ctx, &grievance.id).await.unwrap();
    let steps: Vec<u32> = outcomes.iter().map(|o| o.step_number).collect();
    assert_eq!(steps, vec![1, 2]);

    let instances = world.engine.step_instances(&world.ctx, &grievance.id).await.unwrap();
    let statuses: Vec<StepInstanceStatus> = instances.iter().map(|i| i.status).collect();
    assert_eq!(
        statuses,
        vec![
            StepInstanceStatus::Completed,
            StepInstanceStatus::Completed,
            StepInstanceStatus::InProgress
        ]
    );
}

#[tokio::test]
async fn advancing_past_the_last_template_keeps_counting() {
    let world = World::new(at(2024, 3, 4)).await;
    let grievance = world.file(GrievanceType::Individual).await;
    for outcome in ["one", "two", "three"] {
        world
            .engine
            .advance_to_next_step(&world.ctx, &grievance.id, outcome)
            .await
            .unwrap();
    }
    let loaded = world.engine.get_grievance(&world.ctx, &grievance.id).await.unwrap();
    assert_eq!(loaded.current_step_number, Some(4));
}

#[tokio::test]
async fn blank_outcome_changes_nothing() {
    let world = World::new(at(2024, 3, 4)).await;
    let grievance = world.file(GrievanceType::Individual).await;

    let err = world
        .engine
        .advance_to_next_step(&world.ctx, &grievance.id, "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Validation(_)));

    let loaded = world.engine.get_grievance(&world.ctx, &grievance.id).await.unwrap();
    assert_eq!(loaded, grievance);
    assert!(world
        .engine
        .step_outcomes(&world.ctx, &grievance.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn settled_grievance_cannot_advance() {
    let world = World::new(at(2024, 3, 4)).await;
    let grievance = world.file(GrievanceType::Individual).await;
    world
        .engine
        .process_settlement(&world.ctx, &grievance.id, "Back pay agreed")
        .await
        .unwrap();

    let err = world
        .engine
        .advance_to_next_step(&world.ctx, &grievance.id, "Too late")
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Validation(_)));
    let loaded = world.engine.get_grievance(&world.ctx, &grievance.id).await.unwrap();
    assert_eq!(loaded.current_step_number, Some(1));
    assert_eq!(loaded.status, GrievanceStatus::Settled);
}

// -- Transitions --------------------------------------------------------------

#[tokio::test]
async fn withdrawal_without_details_requires_the_withdrawal_form() {
    let world = World::new(at(2024, 3, 4)).await;
    let grievance = world.file(GrievanceType::Individual).await;

    let result = world
        .engine
        .validate_status_transition(
            &world.ctx,
            &grievance.id,
            &TransitionTarget {
                status: GrievanceStatus::Withdrawn,
                stage: None,
            },
            &TransitionForm::default(),
        )
        .await
        .unwrap();
    assert!(!result.is_valid);
    assert_eq!(result.requires_form, Some(RequiredForm::Withdrawal));

    let unchanged = world.engine.get_grievance(&world.ctx, &grievance.id).await.unwrap();
    assert_eq!(unchanged.status, GrievanceStatus::Active);
}

#[tokio::test]
async fn terminal_status_freezes_stage_and_step() {
    let world = World::new(at(2024, 3, 4)).await;
    let grievance = world.file(GrievanceType::Individual).await;
    world
        .engine
        .advance_to_next_step(&world.ctx, &grievance.id, "Denied")
        .await
        .unwrap();
    world
        .engine
        .process_withdrawal(&world.ctx, &grievance.id, "Member resigned")
        .await
        .unwrap();

    let err = world
        .engine
        .update_status(
            &world.ctx,
            &grievance.id,
            StatusUpdate {
                status: GrievanceStatus::Withdrawn,
                stage: Some(GrievanceStage::Arbitration),
                outcomes: None,
                resolution_details: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidTransition { .. }));

    let loaded = world.engine.get_grievance(&world.ctx, &grievance.id).await.unwrap();
    assert_eq!(loaded.stage, GrievanceStage::Informal);
    assert_eq!(loaded.current_step_number, Some(2));
}

#[tokio::test]
async fn delete_and_restore_returns_to_the_prior_status() {
    let world = World::new(at(2024, 3, 4)).await;
    let grievance = world.file(GrievanceType::Individual).await;
    world
        .engine
        .process_settlement(&world.ctx, &grievance.id, "Reinstated")
        .await
        .unwrap();
    world
        .engine
        .update_status(
            &world.ctx,
            &grievance.id,
            StatusUpdate {
                status: GrievanceStatus::Deleted,
                stage: None,
                outcomes: Some("Filed in error".into()),
                resolution_details: None,
            },
        )
        .await
        .unwrap();

    let wrong = world
        .engine
        .update_status(
            &world.ctx,
            &grievance.id,
            StatusUpdate {
                status: GrievanceStatus::Active,
                stage: None,
                outcomes: None,
                resolution_details: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(wrong, LifecycleError::InvalidTransition { .. }));

    world.clock.advance(Duration::days(1));
    let restored = world
        .engine
        .update_status(
            &world.ctx,
            &grievance.id,
            StatusUpdate {
                status: GrievanceStatus::Settled,
                stage: None,
                outcomes: None,
                resolution_details: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(restored.status, GrievanceStatus::Settled);
    assert_eq!(restored.status_before_deletion, None);

    let events = world
        .events
        .query(
            &world.ctx,
            &EventQuery {
                grievance_id: Some(grievance.id),
                event_types: vec![EventType::GrievanceDeleted, EventType::GrievanceRestored],
                ..EventQuery::default()
            },
        )
        .await
        .unwrap();
    let types: Vec<EventType> = events.items.iter().map(|e| e.event_type).collect();
    assert_eq!(
        types,
        vec![EventType::GrievanceRestored, EventType::GrievanceDeleted]
    );
}

// -- Tenancy ------------------------------------------------------------------

#[tokio::test]
async fn other_organizations_see_nothing() {
    let world = World::new(at(2024, 3, 4)).await;
    let grievance = world.file(GrievanceType::Individual).await;
    let outsider = ActorContext {
        organization_id: OrganizationId::new(),
        user_id: UserId::new(),
    };

    let err = world
        .engine
        .advance_to_next_step(&outsider, &grievance.id, "Denied")
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound { .. }));
    assert!(world.engine.list_grievances(&outsider).await.unwrap().is_empty());
    assert!(world
        .catalog
        .templates(&outsider.organization_id, &world.agreement, GrievanceType::Individual)
        .await
        .unwrap()
        .is_empty());

    let page = world.events.query(&outsider, &EventQuery::default()).await.unwrap();
    assert_eq!(page.total, 0);
}

// -- Event Log ----------------------------------------------------------------

#[tokio::test]
async fn event_log_pages_newest_first() {
    let world = World::new(at(2024, 3, 4)).await;
    let grievance = world.file(GrievanceType::Individual).await;
    for note in ["called member", "requested records", "met steward"] {
        world.clock.advance(Duration::hours(1));
        world
            .events
            .append(
                &world.ctx,
                &grievance.id,
                EventType::NoteAdded,
                None,
                Some(note.to_string()),
            )
            .await
            .unwrap();
    }

    let page = world
        .events
        .query(
            &world.ctx,
            &EventQuery {
                event_types: vec![EventType::NoteAdded],
                page: 1,
                page_size: 2,
                ..EventQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.items[0].new_value.as_deref(), Some("met steward"));
    assert_eq!(page.items[1].new_value.as_deref(), Some("requested records"));
}

#[tokio::test]
async fn engine_owned_events_cannot_be_appended() {
    let world = World::new(at(2024, 3, 4)).await;
    let grievance = world.file(GrievanceType::Individual).await;
    let err = world
        .events
        .append(
            &world.ctx,
            &grievance.id,
            EventType::StepCompleted,
            Some("1".into()),
            Some("2".into()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Validation(_)));
}

// -- Concurrency --------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_advances_serialize_into_consecutive_steps() {
    const WRITERS: u32 = 6;
    let world = World::with_retry(at(2024, 3, 4), RetryPolicy::immediate(32)).await;
    let grievance = world.file(GrievanceType::Individual).await;

    let mut handles = Vec::new();
    for writer in 0..WRITERS {
        let engine = Arc::clone(&world.engine);
        let ctx = world.ctx;
        let id = grievance.id;
        handles.push(tokio::spawn(async move {
            engine
                .advance_to_next_step(&ctx, &id, &format!("outcome from writer {writer}"))
                .await
        }));
    }
    let mut reached = Vec::new();
    for handle in handles {
        reached.push(handle.await.unwrap().unwrap().new_step_number);
    }
    reached.sort_unstable();
    assert_eq!(reached, (2..=WRITERS + 1).collect::<Vec<_>>());

    let loaded = world.engine.get_grievance(&world.ctx, &grievance.id).await.unwrap();
    assert_eq!(loaded.current_step_number, Some(WRITERS + 1));
    assert_eq!(loaded.version, u64::from(WRITERS) + 1);

    let outcomes = world.engine.step_outcomes(&world.ctx, &grievance.id).await.unwrap();
    let steps: Vec<u32> = outcomes.iter().map(|o| o.step_number).collect();
    assert_eq!(steps, (1..=WRITERS).collect::<Vec<_>>());
    let mut texts: Vec<&str> = outcomes.iter().map(|o| o.outcome.as_str()).collect();
    texts.sort_unstable();
    texts.dedup();
    assert_eq!(texts.len(), WRITERS as usize);
}

// -- Retry --------------------------------------------------------------------

/// Delegates to an in-memory store, failing the first `failures` commits.
struct FlakyStore {
    inner: Arc<dyn GrievanceStore>,
    failures: AtomicU32,
    commits: AtomicU32,
}

#[async_trait]
impl GrievanceStore for FlakyStore {
    async fn load(
        &self,
        org: &OrganizationId,
        id: &GrievanceId,
    ) -> Result<Option<Grievance>, StoreError> {
        self.inner.load(org, id).await
    }

    async fn list(&self, org: &OrganizationId) -> Result<Vec<Grievance>, StoreError> {
        self.inner.list(org).await
    }

    async fn create(&self, commit: TransitionCommit) -> Result<(), StoreError> {
        self.inner.create(commit).await
    }

    async fn commit(&self, commit: TransitionCommit) -> Result<(), StoreError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("connection reset".into()));
        }
        self.inner.commit(commit).await
    }

    async fn outcomes(
        &self,
        org: &OrganizationId,
        id: &GrievanceId,
    ) -> Result<Vec<GrievanceStepOutcome>, StoreError> {
        self.inner.outcomes(org, id).await
    }

    async fn step_instances(
        &self,
        org: &OrganizationId,
        id: &GrievanceId,
    ) -> Result<Vec<GrievanceStepInstance>, StoreError> {
        self.inner.step_instances(org, id).await
    }

    async fn append_event(&self, event: GrievanceEvent) -> Result<(), StoreError> {
        self.inner.append_event(event).await
    }

    async fn query_events(
        &self,
        org: &OrganizationId,
        query: &EventQuery,
    ) -> Result<Paginated<GrievanceEvent>, StoreError> {
        self.inner.query_events(org, query).await
    }

    async fn snapshot(&self, org: &OrganizationId) -> Result<GrievanceSnapshot, StoreError> {
        self.inner.snapshot(org).await
    }
}

async fn flaky_engine(failures: u32, retry: RetryPolicy) -> (World, Arc<FlakyStore>, StepProgressionEngine) {
    let world = World::new(at(2024, 3, 4)).await;
    let flaky = Arc::new(FlakyStore {
        inner: world.store.clone(),
        failures: AtomicU32::new(failures),
        commits: AtomicU32::new(0),
    });
    let catalog: Arc<dyn TemplateCatalog> = world.catalog.clone();
    let engine = StepProgressionEngine::new(
        catalog,
        flaky.clone(),
        Arc::new(world.clock.clone()),
        retry,
    );
    (world, flaky, engine)
}

#[tokio::test]
async fn transient_commit_failures_are_retried() {
    let (world, flaky, engine) = flaky_engine(2, RetryPolicy::immediate(4)).await;
    let grievance = world.file(GrievanceType::Individual).await;

    let result = engine
        .advance_to_next_step(&world.ctx, &grievance.id, "Denied")
        .await
        .unwrap();
    assert_eq!(result.new_step_number, 2);
    assert_eq!(flaky.commits.load(Ordering::SeqCst), 3);

    let outcomes = world.engine.step_outcomes(&world.ctx, &grievance.id).await.unwrap();
    assert_eq!(outcomes.len(), 1);
}

#[tokio::test]
async fn exhausted_retries_surface_unavailable_and_write_nothing() {
    let (world, flaky, engine) = flaky_engine(10, RetryPolicy::immediate(3)).await;
    let grievance = world.file(GrievanceType::Individual).await;

    let err = engine
        .advance_to_next_step(&world.ctx, &grievance.id, "Denied")
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Unavailable(_)));
    assert_eq!(flaky.commits.load(Ordering::SeqCst), 3);

    let loaded = world.engine.get_grievance(&world.ctx, &grievance.id).await.unwrap();
    assert_eq!(loaded.current_step_number, Some(1));
    assert_eq!(loaded.version, 1);
}

#[tokio::test]
async fn validation_errors_are_never_retried() {
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = attempts.clone();
    let result: Result<(), LifecycleError> = RetryPolicy::immediate(5)
        .run("validate", || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(LifecycleError::Validation("outcome is required".into())) }
        })
        .await;
    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}
