//! Append/query facade over the grievance audit trail.
//!
//! Lifecycle events are written by [`StepProgressionEngine`](crate::engine::StepProgressionEngine)
//! inside the same commit as the state change they describe. This facade
//! records the remaining event types, which belong to subsystems outside
//! the engine (evidence, costs, notes, recategorization).

use std::sync::Arc;

use grievance_core::{Clock, GrievanceId};

use crate::engine::ActorContext;
use crate::error::LifecycleError;
use crate::event::{EventQuery, EventType, GrievanceEvent, Paginated};
use crate::retry::RetryPolicy;
use crate::store::GrievanceStore;

#[derive(Clone)]
pub struct EventLog {
    store: Arc<dyn GrievanceStore>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("clock", &self.clock)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl EventLog {
    pub fn new(store: Arc<dyn GrievanceStore>, clock: Arc<dyn Clock>, retry: RetryPolicy) -> Self {
        Self { store, clock, retry }
    }

    /// Record a standalone event. Event types owned by the lifecycle
    /// engine are rejected with `Validation`.
    pub async fn append(
        &self,
        ctx: &ActorContext,
        grievance_id: &GrievanceId,
        event_type: EventType,
        previous_value: Option<String>,
        new_value: Option<String>,
    ) -> Result<GrievanceEvent, LifecycleError> {
        if event_type.is_engine_owned() {
            return Err(LifecycleError::Validation(format!(
                "{event_type} events are recorded by the lifecycle engine"
            )));
        }
        let event = GrievanceEvent::new(
            *grievance_id,
            ctx.organization_id,
            ctx.user_id,
            event_type,
            previous_value,
            new_value,
            self.clock.now(),
        );
        self.retry
            .run("append_event", || {
                let event = event.clone();
                async move { self.store.append_event(event).await.map_err(LifecycleError::from) }
            })
            .await?;
        tracing::debug!(grievance_id = %grievance_id, event_type = %event_type, "event appended");
        Ok(event)
    }

    /// Events for the caller's organization, newest first.
    pub async fn query(
        &self,
        ctx: &ActorContext,
        query: &EventQuery,
    ) -> Result<Paginated<GrievanceEvent>, LifecycleError> {
        Ok(self.store.query_events(&ctx.organization_id, query).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::model::Grievance;
    use crate::store::TransitionCommit;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use grievance_core::{
        AgreementId, BargainingUnitId, DateRange, FixedClock, GrievanceStage, GrievanceStatus,
        GrievanceType, OrganizationId, UserId,
    };

    async fn seeded() -> (EventLog, FixedClock, ActorContext, GrievanceId) {
        let store = InMemoryStore::new();
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap());
        let ctx = ActorContext {
            organization_id: OrganizationId::new(),
            user_id: UserId::new(),
        };
        let now = clock.now();
        let grievance = Grievance {
            id: GrievanceId::new(),
            organization_id: ctx.organization_id,
            bargaining_unit_id: BargainingUnitId::new(),
            agreement_id: AgreementId::new(),
            grievance_type: GrievanceType::Individual,
            status: GrievanceStatus::Active,
            stage: GrievanceStage::Informal,
            current_step_number: Some(1),
            outcomes: None,
            resolution_details: None,
            status_before_deletion: None,
            version: 1,
            filed_at: now,
            created_at: now,
            updated_at: now,
        };
        let id = grievance.id;
        store
            .create(TransitionCommit {
                expected_version: 0,
                grievance,
                outcome: None,
                instances: vec![],
                events: vec![],
            })
            .await
            .unwrap();
        let log = EventLog::new(Arc::new(store), Arc::new(clock.clone()), RetryPolicy::none());
        (log, clock, ctx, id)
    }

    #[tokio::test]
    async fn engine_owned_types_are_rejected() {
        let (log, _, ctx, id) = seeded().await;
        for event_type in [EventType::StatusChanged, EventType::StepCompleted, EventType::Created] {
            let err = log.append(&ctx, &id, event_type, None, None).await.unwrap_err();
            assert!(matches!(err, LifecycleError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn filters_by_type_and_date() {
        let (log, clock, ctx, id) = seeded().await;
        log.append(&ctx, &id, EventType::NoteAdded, None, Some("first".into()))
            .await
            .unwrap();
        clock.advance(Duration::days(2));
        log.append(&ctx, &id, EventType::EvidenceAdded, None, Some("photo.jpg".into()))
            .await
            .unwrap();
        log.append(&ctx, &id, EventType::NoteAdded, None, Some("second".into()))
            .await
            .unwrap();

        let notes = log
            .query(
                &ctx,
                &EventQuery {
                    event_types: vec![EventType::NoteAdded],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(notes.total, 2);
        assert_eq!(notes.items[0].new_value.as_deref(), Some("second"));

        let first_day = log
            .query(
                &ctx,
                &EventQuery {
                    date_range: DateRange::new(
                        NaiveDate::from_ymd_opt(2024, 3, 4),
                        NaiveDate::from_ymd_opt(2024, 3, 4),
                    )
                    .unwrap(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(first_day.total, 1);
    }

    #[tokio::test]
    async fn paginates_newest_first() {
        let (log, clock, ctx, id) = seeded().await;
        for i in 0..5 {
            clock.advance(Duration::minutes(1));
            log.append(&ctx, &id, EventType::CostUpdated, None, Some(i.to_string()))
                .await
                .unwrap();
        }
        let page = log
            .query(
                &ctx,
                &EventQuery {
                    page: 2,
                    page_size: 2,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 3);
        let values: Vec<_> = page.items.iter().filter_map(|e| e.new_value.clone()).collect();
        assert_eq!(values, vec!["2", "1"]);
    }

    #[tokio::test]
    async fn unknown_grievance_is_not_found() {
        let (log, _, ctx, _) = seeded().await;
        let err = log
            .append(&ctx, &GrievanceId::new(), EventType::NoteAdded, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { .. }));
    }
}
