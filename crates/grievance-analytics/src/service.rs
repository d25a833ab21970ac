//! Request-scoped analytics over live storage.
//!
//! Each call reads "now" once, loads one snapshot of the organization's
//! grievances, outcomes, templates and units, and runs the engine over it.
//! A load failure is logged and answered with an empty result; reports
//! never surface storage errors to their callers.
//!
//! Grievances and templates live behind separate ports, so they cannot
//! share a read transaction. The template set is read on both sides of the
//! grievance snapshot and the load is repeated when a save landed in
//! between, up to [`SNAPSHOT_ATTEMPTS`] times.

use std::sync::Arc;

use grievance_catalog::TemplateCatalog;
use grievance_core::{Clock, OrganizationId};
use grievance_lifecycle::{GrievanceStore, LifecycleError};

use crate::dataset::AnalyticsDataset;
use crate::engine::DurationAnalyticsEngine;
use crate::report::{
    BargainingUnitReport, OverdueGroup, ReportFilter, ResolutionBreakdown, StepDurationRecord,
    TemplateGap,
};

/// Loads attempted before a report is built from a template set that
/// changed while the grievance snapshot was read.
pub const SNAPSHOT_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct AnalyticsService {
    catalog: Arc<dyn TemplateCatalog>,
    store: Arc<dyn GrievanceStore>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AnalyticsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsService")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl AnalyticsService {
    pub fn new(
        catalog: Arc<dyn TemplateCatalog>,
        store: Arc<dyn GrievanceStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            store,
            clock,
        }
    }

    async fn load_dataset(&self, org: &OrganizationId) -> Result<AnalyticsDataset, LifecycleError> {
        let units = self.catalog.bargaining_units(org).await?;
        let mut attempt = 1;
        loop {
            let before = self.catalog.all_templates(org).await?;
            let snapshot = self.store.snapshot(org).await?;
            let after = self.catalog.all_templates(org).await?;
            if before == after {
                return Ok(AnalyticsDataset::from_parts(snapshot, after, units));
            }
            if attempt >= SNAPSHOT_ATTEMPTS {
                tracing::warn!(
                    organization_id = %org,
                    attempts = attempt,
                    "templates kept changing during the analytics snapshot; using the latest set"
                );
                return Ok(AnalyticsDataset::from_parts(snapshot, after, units));
            }
            attempt += 1;
        }
    }

    async fn engine(&self, org: &OrganizationId, report: &'static str) -> Option<DurationAnalyticsEngine> {
        let now = self.clock.now();
        match self.load_dataset(org).await {
            Ok(dataset) => Some(DurationAnalyticsEngine::new(dataset, now)),
            Err(e) => {
                tracing::error!(
                    organization_id = %org,
                    report,
                    error = %e,
                    "analytics snapshot unavailable; returning empty report"
                );
                None
            }
        }
    }

    pub async fn step_durations(
        &self,
        org: &OrganizationId,
        filter: &ReportFilter,
    ) -> Vec<StepDurationRecord> {
        self.engine(org, "step_durations")
            .await
            .map(|e| e.calculate_step_durations(filter))
            .unwrap_or_default()
    }

    pub async fn bargaining_unit_report(
        &self,
        org: &OrganizationId,
        filter: &ReportFilter,
    ) -> Vec<BargainingUnitReport> {
        self.engine(org, "bargaining_units")
            .await
            .map(|e| e.bargaining_unit_step_report(filter))
            .unwrap_or_default()
    }

    pub async fn overdue_by_step(&self, org: &OrganizationId) -> Vec<OverdueGroup> {
        self.engine(org, "overdue")
            .await
            .map(|e| e.overdue_by_step())
            .unwrap_or_default()
    }

    pub async fn resolution_breakdown(
        &self,
        org: &OrganizationId,
        filter: &ReportFilter,
    ) -> ResolutionBreakdown {
        self.engine(org, "resolutions")
            .await
            .map(|e| e.resolution_breakdown(filter))
            .unwrap_or_default()
    }

    pub async fn template_coverage_gaps(
        &self,
        org: &OrganizationId,
        filter: &ReportFilter,
    ) -> Vec<TemplateGap> {
        self.engine(org, "template_gaps")
            .await
            .map(|e| e.template_coverage_gaps(filter))
            .unwrap_or_default()
    }
}
