//! # Agreement Step Template API
//!
//! - `GET /v1/agreements/:id/templates/:type` — ordered step templates
//! - `PUT /v1/agreements/:id/templates/:type` — replace the full set
//!
//! A save is ordered by stage then step number and renumbered from 1.
//! A step submitted without a stage has one inferred from its description
//! (or name), logged at WARN and counted.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use grievance_catalog::{migrate_legacy_steps, LegacyStep, StepTemplate};
use grievance_core::{AgreementId, GrievanceType};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::routes::parse_field;
use crate::state::AppState;

/// Request to replace an agreement's template set for one grievance type.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SaveTemplatesRequest {
    /// Steps with `name`, `time_limit_days`, `is_calendar_days`, and
    /// optional `step_number`, `stage`, `description` and metadata lists.
    #[schema(value_type = Vec<Object>)]
    pub steps: Vec<LegacyStep>,
}

impl Validate for SaveTemplatesRequest {
    fn validate(&self) -> Result<(), String> {
        if let Some(position) = self.steps.iter().position(|s| s.name.trim().is_empty()) {
            return Err(format!("step at position {} has an empty name", position + 1));
        }
        Ok(())
    }
}

/// Build the templates router.
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/v1/agreements/:id/templates/:grievance_type",
        get(list_templates).put(save_templates),
    )
}

/// GET /v1/agreements/:id/templates/:type — List step templates.
#[utoipa::path(
    get,
    path = "/v1/agreements/{id}/templates/{grievance_type}",
    params(
        ("id" = Uuid, Path, description = "Agreement ID"),
        ("grievance_type" = String, Path, description = "INDIVIDUAL, GROUP or POLICY"),
    ),
    responses((status = 200, description = "Templates ordered by step number")),
    tag = "templates"
)]
pub(crate) async fn list_templates(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((id, grievance_type)): Path<(Uuid, String)>,
) -> Result<Json<Vec<StepTemplate>>, AppError> {
    let grievance_type = parse_field::<GrievanceType>(&grievance_type)?;
    let templates = state
        .catalog
        .templates(&caller.organization_id, &AgreementId::from_uuid(id), grievance_type)
        .await?;
    Ok(Json(templates))
}

/// PUT /v1/agreements/:id/templates/:type — Replace the template set.
#[utoipa::path(
    put,
    path = "/v1/agreements/{id}/templates/{grievance_type}",
    params(
        ("id" = Uuid, Path, description = "Agreement ID"),
        ("grievance_type" = String, Path, description = "INDIVIDUAL, GROUP or POLICY"),
    ),
    request_body = SaveTemplatesRequest,
    responses(
        (status = 200, description = "Saved templates, renumbered"),
        (status = 404, description = "Agreement not found", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid step", body = crate::error::ErrorBody),
    ),
    tag = "templates"
)]
pub(crate) async fn save_templates(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((id, grievance_type)): Path<(Uuid, String)>,
    body: Result<Json<SaveTemplatesRequest>, JsonRejection>,
) -> Result<Json<Vec<StepTemplate>>, AppError> {
    let grievance_type = parse_field::<GrievanceType>(&grievance_type)?;
    let req = extract_validated_json(body)?;
    let agreement_id = AgreementId::from_uuid(id);
    let steps = migrate_legacy_steps(agreement_id, req.steps);
    let saved = state
        .catalog
        .save_templates(&caller.organization_id, &agreement_id, grievance_type, steps)
        .await?;
    tracing::info!(
        organization_id = %caller.organization_id,
        agreement_id = %id,
        grievance_type = %grievance_type,
        steps = saved.len(),
        "templates saved"
    );
    Ok(Json(saved))
}
