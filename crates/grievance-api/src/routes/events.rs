//! # Event Log Query API
//!
//! `GET /v1/events` pages through the organization's audit log, newest
//! first, filtered by date range, event types, user and grievance.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use grievance_core::{DateRange, GrievanceId, UserId};
use grievance_lifecycle::{EventQuery, EventType, GrievanceEvent, Paginated};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::extract_query;
use crate::routes::parse_field;
use crate::state::AppState;

/// Query string for `GET /v1/events`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventsParams {
    /// Earliest creation date, inclusive (YYYY-MM-DD, UTC).
    pub from: Option<NaiveDate>,
    /// Latest creation date, inclusive.
    pub to: Option<NaiveDate>,
    /// Comma-separated event types, e.g. `STEP_COMPLETED,NOTE_ADDED`.
    pub event_types: Option<String>,
    pub user_id: Option<Uuid>,
    pub grievance_id: Option<Uuid>,
    /// 1-based page number.
    pub page: Option<u32>,
    /// Page size, at most 100. Defaults to 25.
    pub page_size: Option<u32>,
}

impl EventsParams {
    fn into_query(self) -> Result<EventQuery, AppError> {
        let event_types = self
            .event_types
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(parse_field::<EventType>)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(EventQuery {
            date_range: DateRange::new(self.from, self.to)?,
            event_types,
            user_id: self.user_id.map(UserId::from_uuid),
            grievance_id: self.grievance_id.map(GrievanceId::from_uuid),
            page: self.page.unwrap_or(1),
            page_size: self.page_size.unwrap_or(EventQuery::DEFAULT_PAGE_SIZE),
        })
    }
}

/// Build the events router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/events", get(query_events))
}

/// GET /v1/events — Query the audit log.
#[utoipa::path(
    get,
    path = "/v1/events",
    params(EventsParams),
    responses(
        (status = 200, description = "One page of events, newest first"),
        (status = 422, description = "Unknown event type or inverted date range", body = crate::error::ErrorBody),
    ),
    tag = "events"
)]
pub(crate) async fn query_events(
    State(state): State<AppState>,
    caller: CallerIdentity,
    params: Result<Query<EventsParams>, QueryRejection>,
) -> Result<Json<Paginated<GrievanceEvent>>, AppError> {
    let query = extract_query(params)?.into_query()?;
    Ok(Json(state.events.query(&caller.actor(), &query).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_list_is_split_and_trimmed() {
        let query = EventsParams {
            event_types: Some("step_completed, NOTE_ADDED,".into()),
            ..Default::default()
        }
        .into_query()
        .unwrap();
        assert_eq!(
            query.event_types,
            vec![EventType::StepCompleted, EventType::NoteAdded]
        );
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, EventQuery::DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn unknown_event_type_is_a_validation_error() {
        let err = EventsParams {
            event_types: Some("TELEPORTED".into()),
            ..Default::default()
        }
        .into_query()
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn inverted_range_is_a_validation_error() {
        let err = EventsParams {
            from: NaiveDate::from_ymd_opt(2024, 5, 2),
            to: NaiveDate::from_ymd_opt(2024, 5, 1),
            ..Default::default()
        }
        .into_query()
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
