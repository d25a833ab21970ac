//! # Duration Analytics API
//!
//! Read-only reports over step durations. Storage failures degrade to
//! empty results inside the analytics service, so these handlers only
//! fail on malformed query strings.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use grievance_analytics::{
    BargainingUnitReport, OverdueGroup, ReportFilter, ResolutionBreakdown, StepDurationRecord,
    TemplateGap,
};
use grievance_core::{DateRange, GrievanceType};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::extract_query;
use crate::routes::parse_optional;
use crate::state::AppState;

/// Report filter query string.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportParams {
    /// Earliest grievance creation date, inclusive (YYYY-MM-DD, UTC).
    pub from: Option<NaiveDate>,
    /// Latest grievance creation date, inclusive.
    pub to: Option<NaiveDate>,
    /// INDIVIDUAL, GROUP or POLICY.
    pub grievance_type: Option<String>,
}

impl ReportParams {
    fn into_filter(self) -> Result<ReportFilter, AppError> {
        Ok(ReportFilter {
            range: DateRange::new(self.from, self.to)?,
            grievance_type: parse_optional::<GrievanceType>(self.grievance_type.as_deref())?,
        })
    }
}

fn report_filter(params: Result<Query<ReportParams>, QueryRejection>) -> Result<ReportFilter, AppError> {
    extract_query(params)?.into_filter()
}

/// Build the analytics router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/analytics/step-durations", get(step_durations))
        .route("/v1/analytics/bargaining-units", get(bargaining_units))
        .route("/v1/analytics/overdue", get(overdue))
        .route("/v1/analytics/resolutions", get(resolutions))
        .route("/v1/analytics/template-gaps", get(template_gaps))
}

/// GET /v1/analytics/step-durations — Actual against expected duration per step.
#[utoipa::path(
    get,
    path = "/v1/analytics/step-durations",
    params(ReportParams),
    responses((status = 200, description = "Step duration records; grievances without a matching template are omitted")),
    tag = "analytics"
)]
pub(crate) async fn step_durations(
    State(state): State<AppState>,
    caller: CallerIdentity,
    params: Result<Query<ReportParams>, QueryRejection>,
) -> Result<Json<Vec<StepDurationRecord>>, AppError> {
    let filter = report_filter(params)?;
    Ok(Json(
        state
            .analytics
            .step_durations(&caller.organization_id, &filter)
            .await,
    ))
}

/// GET /v1/analytics/bargaining-units — Per-unit, per-step statistics.
#[utoipa::path(
    get,
    path = "/v1/analytics/bargaining-units",
    params(ReportParams),
    responses((status = 200, description = "One report per bargaining unit")),
    tag = "analytics"
)]
pub(crate) async fn bargaining_units(
    State(state): State<AppState>,
    caller: CallerIdentity,
    params: Result<Query<ReportParams>, QueryRejection>,
) -> Result<Json<Vec<BargainingUnitReport>>, AppError> {
    let filter = report_filter(params)?;
    Ok(Json(
        state
            .analytics
            .bargaining_unit_report(&caller.organization_id, &filter)
            .await,
    ))
}

/// GET /v1/analytics/overdue — Active grievances past their current step's due date.
#[utoipa::path(
    get,
    path = "/v1/analytics/overdue",
    responses((status = 200, description = "Overdue grievances grouped by step")),
    tag = "analytics"
)]
pub(crate) async fn overdue(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Json<Vec<OverdueGroup>> {
    Json(state.analytics.overdue_by_step(&caller.organization_id).await)
}

/// GET /v1/analytics/resolutions — Resolution counts and the steps they happened at.
#[utoipa::path(
    get,
    path = "/v1/analytics/resolutions",
    params(ReportParams),
    responses((status = 200, description = "Resolution breakdown")),
    tag = "analytics"
)]
pub(crate) async fn resolutions(
    State(state): State<AppState>,
    caller: CallerIdentity,
    params: Result<Query<ReportParams>, QueryRejection>,
) -> Result<Json<ResolutionBreakdown>, AppError> {
    let filter = report_filter(params)?;
    Ok(Json(
        state
            .analytics
            .resolution_breakdown(&caller.organization_id, &filter)
            .await,
    ))
}

/// GET /v1/analytics/template-gaps — Steps referenced by grievances but missing a template.
#[utoipa::path(
    get,
    path = "/v1/analytics/template-gaps",
    params(ReportParams),
    responses((status = 200, description = "Missing templates with affected grievance counts")),
    tag = "analytics"
)]
pub(crate) async fn template_gaps(
    State(state): State<AppState>,
    caller: CallerIdentity,
    params: Result<Query<ReportParams>, QueryRejection>,
) -> Result<Json<Vec<TemplateGap>>, AppError> {
    let filter = report_filter(params)?;
    Ok(Json(
        state
            .analytics
            .template_coverage_gaps(&caller.organization_id, &filter)
            .await,
    ))
}
