//! # Grievance Lifecycle API
//!
//! Filing, step progression, status transitions and per-grievance history.
//!
//! ## Endpoints
//!
//! - `POST /v1/grievances` — file a grievance at step 1
//! - `GET /v1/grievances` — list the organization's grievances
//! - `GET /v1/grievances/:id` — get one grievance
//! - `POST /v1/grievances/:id/advance` — complete the current step
//! - `POST /v1/grievances/:id/status` — generic status/stage transition
//! - `POST /v1/grievances/:id/status/validate` — dry-run a transition
//! - `POST /v1/grievances/:id/withdraw` — withdraw with details
//! - `POST /v1/grievances/:id/settle` — settle with details
//! - `GET /v1/grievances/:id/outcomes` — step outcome history
//! - `GET /v1/grievances/:id/steps` — step instances with due dates
//! - `POST /v1/grievances/:id/events` — append a non-lifecycle audit event

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use grievance_core::{
    AgreementId, BargainingUnitId, GrievanceId, GrievanceStage, GrievanceStatus, GrievanceType,
};
use grievance_lifecycle::{
    AdvanceResult, EventType, Grievance, GrievanceEvent, GrievanceStepInstance,
    GrievanceStepOutcome, NewGrievance, ResolutionDetails, ResolutionType, StatusUpdate,
    TransitionForm, TransitionTarget, ValidationResult,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json, Validate};
use crate::routes::{parse_field, parse_optional};
use crate::state::AppState;

// ── Request DTOs ────────────────────────────────────────────────────

/// Request to file a grievance.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateGrievanceRequest {
    pub bargaining_unit_id: Uuid,
    pub agreement_id: Uuid,
    /// INDIVIDUAL, GROUP or POLICY.
    pub grievance_type: String,
    /// INFORMAL, FORMAL or ARBITRATION. Defaults to INFORMAL.
    #[serde(default)]
    pub stage: Option<String>,
    /// Defaults to now.
    #[serde(default)]
    pub filed_at: Option<DateTime<Utc>>,
}

impl Validate for CreateGrievanceRequest {
    fn validate(&self) -> Result<(), String> {
        if self.grievance_type.trim().is_empty() {
            return Err("grievance_type must not be empty".to_string());
        }
        Ok(())
    }
}

/// Request to complete the current step.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AdvanceRequest {
    /// What was decided at the step. Required, non-blank.
    #[serde(default)]
    pub outcome: Option<String>,
}

/// Resolution details supplied with a status change.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolutionDetailsRequest {
    /// WITHDRAWAL, SETTLEMENT or ARBITRATION.
    pub resolution_type: String,
    pub details: String,
    /// Defaults to now.
    #[serde(default)]
    pub resolution_date: Option<DateTime<Utc>>,
}

/// Request for a generic status transition.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusUpdateRequest {
    /// Target status, e.g. RESOLVED_ARBITRATION or DELETED.
    pub status: String,
    #[serde(default)]
    pub stage: Option<String>,
    /// Justification text for terminal targets.
    #[serde(default)]
    pub outcomes: Option<String>,
    #[serde(default)]
    pub resolution_details: Option<ResolutionDetailsRequest>,
}

/// Request to check a transition without applying it.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ValidateTransitionRequest {
    pub status: String,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub withdrawal_details: Option<String>,
    #[serde(default)]
    pub settlement_details: Option<String>,
    #[serde(default)]
    pub remaining_issues: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WithdrawRequest {
    #[serde(default)]
    pub withdrawal_details: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SettleRequest {
    #[serde(default)]
    pub settlement_details: Option<String>,
}

/// Request to record an audit event outside the lifecycle, e.g. NOTE_ADDED.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AppendEventRequest {
    pub event_type: String,
    #[serde(default)]
    pub previous_value: Option<String>,
    #[serde(default)]
    pub new_value: Option<String>,
}

impl Validate for AppendEventRequest {
    fn validate(&self) -> Result<(), String> {
        if self.event_type.trim().is_empty() {
            return Err("event_type must not be empty".to_string());
        }
        Ok(())
    }
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the grievances router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/grievances", get(list_grievances).post(create_grievance))
        .route("/v1/grievances/:id", get(get_grievance))
        .route("/v1/grievances/:id/advance", post(advance_step))
        .route("/v1/grievances/:id/status", post(update_status))
        .route("/v1/grievances/:id/status/validate", post(validate_transition))
        .route("/v1/grievances/:id/withdraw", post(withdraw))
        .route("/v1/grievances/:id/settle", post(settle))
        .route("/v1/grievances/:id/outcomes", get(step_outcomes))
        .route("/v1/grievances/:id/steps", get(step_instances))
        .route("/v1/grievances/:id/events", post(append_event))
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /v1/grievances — File a grievance.
#[utoipa::path(
    post,
    path = "/v1/grievances",
    request_body = CreateGrievanceRequest,
    responses(
        (status = 201, description = "Grievance filed at step 1"),
        (status = 404, description = "Agreement or bargaining unit not found", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "grievances"
)]
pub(crate) async fn create_grievance(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateGrievanceRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Grievance>), AppError> {
    let req = extract_validated_json(body)?;
    let request = NewGrievance {
        bargaining_unit_id: BargainingUnitId::from_uuid(req.bargaining_unit_id),
        agreement_id: AgreementId::from_uuid(req.agreement_id),
        grievance_type: parse_field::<GrievanceType>(&req.grievance_type)?,
        stage: parse_optional::<GrievanceStage>(req.stage.as_deref())?
            .unwrap_or(GrievanceStage::Informal),
        filed_at: req.filed_at,
    };
    let grievance = state.engine.create_grievance(&caller.actor(), request).await?;
    Ok((StatusCode::CREATED, Json(grievance)))
}

/// GET /v1/grievances — List grievances, newest first.
#[utoipa::path(
    get,
    path = "/v1/grievances",
    responses((status = 200, description = "Grievances in the caller's organization")),
    tag = "grievances"
)]
pub(crate) async fn list_grievances(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<Grievance>>, AppError> {
    Ok(Json(state.engine.list_grievances(&caller.actor()).await?))
}

/// GET /v1/grievances/:id — Get one grievance.
#[utoipa::path(
    get,
    path = "/v1/grievances/{id}",
    params(("id" = Uuid, Path, description = "Grievance ID")),
    responses(
        (status = 200, description = "Grievance found"),
        (status = 404, description = "Grievance not found", body = crate::error::ErrorBody),
    ),
    tag = "grievances"
)]
pub(crate) async fn get_grievance(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<Grievance>, AppError> {
    let grievance = state
        .engine
        .get_grievance(&caller.actor(), &GrievanceId::from_uuid(id))
        .await?;
    Ok(Json(grievance))
}

/// POST /v1/grievances/:id/advance — Record the step outcome and move to the next step.
#[utoipa::path(
    post,
    path = "/v1/grievances/{id}/advance",
    params(("id" = Uuid, Path, description = "Grievance ID")),
    request_body = AdvanceRequest,
    responses(
        (status = 200, description = "Advanced to the next step"),
        (status = 409, description = "Grievance is not active, or was modified concurrently", body = crate::error::ErrorBody),
        (status = 422, description = "Outcome text missing", body = crate::error::ErrorBody),
    ),
    tag = "grievances"
)]
pub(crate) async fn advance_step(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<AdvanceRequest>, JsonRejection>,
) -> Result<Json<AdvanceResult>, AppError> {
    let req = extract_json(body)?;
    let result = state
        .engine
        .advance_to_next_step(
            &caller.actor(),
            &GrievanceId::from_uuid(id),
            req.outcome.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(result))
}

/// POST /v1/grievances/:id/status — Apply a status and optional stage change.
#[utoipa::path(
    post,
    path = "/v1/grievances/{id}/status",
    params(("id" = Uuid, Path, description = "Grievance ID")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Status updated"),
        (status = 409, description = "Transition not allowed", body = crate::error::ErrorBody),
        (status = 422, description = "Justification missing", body = crate::error::ErrorBody),
    ),
    tag = "grievances"
)]
pub(crate) async fn update_status(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> Result<Json<Grievance>, AppError> {
    let req = extract_json(body)?;
    let resolution_details = match req.resolution_details {
        Some(details) => Some(ResolutionDetails {
            resolution_type: parse_field::<ResolutionType>(details.resolution_type.trim())?,
            resolution_date: details.resolution_date.unwrap_or_else(|| state.clock.now()),
            resolved_by: caller.user_id,
            details: details.details,
        }),
        None => None,
    };
    let update = StatusUpdate {
        status: parse_field::<GrievanceStatus>(&req.status)?,
        stage: parse_optional::<GrievanceStage>(req.stage.as_deref())?,
        outcomes: req.outcomes,
        resolution_details,
    };
    let grievance = state
        .engine
        .update_status(&caller.actor(), &GrievanceId::from_uuid(id), update)
        .await?;
    Ok(Json(grievance))
}

/// POST /v1/grievances/:id/status/validate — Check a transition without applying it.
#[utoipa::path(
    post,
    path = "/v1/grievances/{id}/status/validate",
    params(("id" = Uuid, Path, description = "Grievance ID")),
    request_body = ValidateTransitionRequest,
    responses(
        (status = 200, description = "Validation result with the form the client must complete, if any"),
        (status = 404, description = "Grievance not found", body = crate::error::ErrorBody),
    ),
    tag = "grievances"
)]
pub(crate) async fn validate_transition(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<ValidateTransitionRequest>, JsonRejection>,
) -> Result<Json<ValidationResult>, AppError> {
    let req = extract_json(body)?;
    let target = TransitionTarget {
        status: parse_field::<GrievanceStatus>(&req.status)?,
        stage: parse_optional::<GrievanceStage>(req.stage.as_deref())?,
    };
    let form = TransitionForm {
        withdrawal_details: req.withdrawal_details,
        settlement_details: req.settlement_details,
        remaining_issues: req.remaining_issues,
    };
    let result = state
        .engine
        .validate_status_transition(&caller.actor(), &GrievanceId::from_uuid(id), &target, &form)
        .await?;
    Ok(Json(result))
}

/// POST /v1/grievances/:id/withdraw — Withdraw a grievance.
#[utoipa::path(
    post,
    path = "/v1/grievances/{id}/withdraw",
    params(("id" = Uuid, Path, description = "Grievance ID")),
    request_body = WithdrawRequest,
    responses(
        (status = 200, description = "Grievance withdrawn"),
        (status = 409, description = "Grievance already withdrawn or deleted", body = crate::error::ErrorBody),
        (status = 422, description = "Withdrawal details missing", body = crate::error::ErrorBody),
    ),
    tag = "grievances"
)]
pub(crate) async fn withdraw(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<WithdrawRequest>, JsonRejection>,
) -> Result<Json<Grievance>, AppError> {
    let req = extract_json(body)?;
    let grievance = state
        .engine
        .process_withdrawal(
            &caller.actor(),
            &GrievanceId::from_uuid(id),
            req.withdrawal_details.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(grievance))
}

/// POST /v1/grievances/:id/settle — Settle a grievance.
#[utoipa::path(
    post,
    path = "/v1/grievances/{id}/settle",
    params(("id" = Uuid, Path, description = "Grievance ID")),
    request_body = SettleRequest,
    responses(
        (status = 200, description = "Grievance settled"),
        (status = 409, description = "Grievance already settled or deleted", body = crate::error::ErrorBody),
        (status = 422, description = "Settlement details missing", body = crate::error::ErrorBody),
    ),
    tag = "grievances"
)]
pub(crate) async fn settle(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<SettleRequest>, JsonRejection>,
) -> Result<Json<Grievance>, AppError> {
    let req = extract_json(body)?;
    let grievance = state
        .engine
        .process_settlement(
            &caller.actor(),
            &GrievanceId::from_uuid(id),
            req.settlement_details.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(grievance))
}

/// GET /v1/grievances/:id/outcomes — Step outcome history.
#[utoipa::path(
    get,
    path = "/v1/grievances/{id}/outcomes",
    params(("id" = Uuid, Path, description = "Grievance ID")),
    responses((status = 200, description = "Outcomes ordered by step number")),
    tag = "grievances"
)]
pub(crate) async fn step_outcomes(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<GrievanceStepOutcome>>, AppError> {
    let outcomes = state
        .engine
        .step_outcomes(&caller.actor(), &GrievanceId::from_uuid(id))
        .await?;
    Ok(Json(outcomes))
}

/// GET /v1/grievances/:id/steps — Step instances with due dates.
#[utoipa::path(
    get,
    path = "/v1/grievances/{id}/steps",
    params(("id" = Uuid, Path, description = "Grievance ID")),
    responses((status = 200, description = "Step instances ordered by step number")),
    tag = "grievances"
)]
pub(crate) async fn step_instances(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<GrievanceStepInstance>>, AppError> {
    let instances = state
        .engine
        .step_instances(&caller.actor(), &GrievanceId::from_uuid(id))
        .await?;
    Ok(Json(instances))
}

/// POST /v1/grievances/:id/events — Append an audit event.
#[utoipa::path(
    post,
    path = "/v1/grievances/{id}/events",
    params(("id" = Uuid, Path, description = "Grievance ID")),
    request_body = AppendEventRequest,
    responses(
        (status = 201, description = "Event recorded"),
        (status = 404, description = "Grievance not found", body = crate::error::ErrorBody),
        (status = 422, description = "Unknown or lifecycle-owned event type", body = crate::error::ErrorBody),
    ),
    tag = "events"
)]
pub(crate) async fn append_event(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<AppendEventRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<GrievanceEvent>), AppError> {
    let req = extract_validated_json(body)?;
    let event_type = parse_field::<EventType>(&req.event_type)?;
    let event = state
        .events
        .append(
            &caller.actor(),
            &GrievanceId::from_uuid(id),
            event_type,
            req.previous_value,
            req.new_value,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(event)))
}
