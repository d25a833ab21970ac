//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI document,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Grievance Engine API",
        version = "0.3.0",
        description = "Grievance lifecycle, agreement step templates, audit events and step-duration analytics.",
        license(name = "AGPL-3.0-or-later")
    ),
    paths(
        // Grievances
        crate::routes::grievances::create_grievance,
        crate::routes::grievances::list_grievances,
        crate::routes::grievances::get_grievance,
        crate::routes::grievances::advance_step,
        crate::routes::grievances::update_status,
        crate::routes::grievances::validate_transition,
        crate::routes::grievances::withdraw,
        crate::routes::grievances::settle,
        crate::routes::grievances::step_outcomes,
        crate::routes::grievances::step_instances,
        crate::routes::grievances::append_event,
        // Events
        crate::routes::events::query_events,
        // Templates
        crate::routes::templates::list_templates,
        crate::routes::templates::save_templates,
        // Analytics
        crate::routes::analytics::step_durations,
        crate::routes::analytics::bargaining_units,
        crate::routes::analytics::overdue,
        crate::routes::analytics::resolutions,
        crate::routes::analytics::template_gaps,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::grievances::CreateGrievanceRequest,
        crate::routes::grievances::AdvanceRequest,
        crate::routes::grievances::ResolutionDetailsRequest,
        crate::routes::grievances::StatusUpdateRequest,
        crate::routes::grievances::ValidateTransitionRequest,
        crate::routes::grievances::WithdrawRequest,
        crate::routes::grievances::SettleRequest,
        crate::routes::grievances::AppendEventRequest,
        crate::routes::templates::SaveTemplatesRequest,
    )),
    tags(
        (name = "grievances", description = "Grievance lifecycle"),
        (name = "events", description = "Audit event log"),
        (name = "templates", description = "Agreement step templates"),
        (name = "analytics", description = "Step-duration analytics"),
    )
)]
pub struct ApiDoc;

/// Router serving the OpenAPI document.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in [
            "/v1/grievances",
            "/v1/grievances/{id}/advance",
            "/v1/grievances/{id}/status/validate",
            "/v1/events",
            "/v1/agreements/{id}/templates/{grievance_type}",
            "/v1/analytics/overdue",
            "/v1/analytics/template-gaps",
        ] {
            assert!(
                doc.paths.paths.contains_key(expected),
                "missing {expected} in {paths:?}"
            );
        }
    }
}
