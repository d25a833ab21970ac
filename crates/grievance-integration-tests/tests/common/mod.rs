//! Shared fixture: one organization with a bargaining unit, an agreement
//! and a three-step INDIVIDUAL procedure, wired over in-memory backends
//! and a fixed clock.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use grievance_analytics::AnalyticsService;
use grievance_catalog::{Agreement, BargainingUnit, InMemoryCatalog, StepTemplateInput, TemplateCatalog};
use grievance_core::{
    AgreementId, BargainingUnitId, FixedClock, GrievanceStage, GrievanceType, OrganizationId,
    UserId,
};
use grievance_lifecycle::{
    ActorContext, EventLog, Grievance, GrievanceStore, InMemoryStore, NewGrievance, RetryPolicy,
    StepProgressionEngine,
};

/// 09:00 UTC on the given date.
pub fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()
}

pub fn step(stage: GrievanceStage, name: &str, days: u32, calendar: bool) -> StepTemplateInput {
    StepTemplateInput {
        step_number: 1,
        stage,
        name: name.to_string(),
        description: None,
        time_limit: Some(format!("{days} days")),
        time_limit_days: days,
        is_calendar_days: calendar,
        required_participants: vec!["Steward".into()],
        required_documents: vec![],
        notes: None,
    }
}

pub struct World {
    pub catalog: Arc<InMemoryCatalog>,
    pub store: Arc<InMemoryStore>,
    pub clock: FixedClock,
    pub engine: Arc<StepProgressionEngine>,
    pub events: EventLog,
    pub analytics: AnalyticsService,
    pub org: OrganizationId,
    pub ctx: ActorContext,
    pub unit: BargainingUnitId,
    pub agreement: AgreementId,
}

impl World {
    /// Seeded world with the clock at `now`.
    pub async fn new(now: DateTime<Utc>) -> Self {
        Self::with_retry(now, RetryPolicy::immediate(8)).await
    }

    pub async fn with_retry(now: DateTime<Utc>, retry: RetryPolicy) -> Self {
        let catalog = Arc::new(InMemoryCatalog::new());
        let store = Arc::new(InMemoryStore::new());
        let clock = FixedClock::new(now);
        let org = OrganizationId::new();
        let unit = BargainingUnitId::new();
        let agreement = AgreementId::new();

        catalog
            .register_bargaining_unit(BargainingUnit {
                id: unit,
                organization_id: org,
                name: "Warehouse".into(),
            })
            .await
            .unwrap();
        catalog
            .register_agreement(Agreement {
                id: agreement,
                organization_id: org,
                bargaining_unit_id: unit,
                name: "Warehouse CBA 2024-2027".into(),
            })
            .await
            .unwrap();
        catalog
            .save_templates(
                &org,
                &agreement,
                GrievanceType::Individual,
                vec![
                    step(GrievanceStage::Informal, "Supervisor meeting", 10, false),
                    step(GrievanceStage::Formal, "Written grievance", 10, false),
                    step(GrievanceStage::Arbitration, "Arbitration referral", 30, true),
                ],
            )
            .await
            .unwrap();

        let catalog_port: Arc<dyn TemplateCatalog> = catalog.clone();
        let store_port: Arc<dyn GrievanceStore> = store.clone();
        let clock_port = Arc::new(clock.clone());
        let engine = Arc::new(StepProgressionEngine::new(
            catalog_port.clone(),
            store_port.clone(),
            clock_port.clone(),
            retry,
        ));
        let events = EventLog::new(store_port.clone(), clock_port.clone(), retry);
        let analytics = AnalyticsService::new(catalog_port, store_port, clock_port);

        Self {
            catalog,
            store,
            clock,
            engine,
            events,
            analytics,
            org,
            ctx: ActorContext {
                organization_id: org,
                user_id: UserId::new(),
            },
            unit,
            agreement,
        }
    }

    /// File a grievance of `grievance_type` at the current clock time.
    pub async fn file(&self, grievance_type: GrievanceType) -> Grievance {
        self.engine
            .create_grievance(
                &self.ctx,
                NewGrievance {
                    bargaining_unit_id: self.unit,
                    agreement_id: self.agreement,
                    grievance_type,
                    stage: GrievanceStage::Informal,
                    filed_at: None,
                },
            )
            .await
            .unwrap()
    }
}
