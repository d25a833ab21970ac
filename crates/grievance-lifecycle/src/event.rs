//! # Audit Events
//!
//! Immutable entries in the grievance event log, plus the filter and page
//! types used to query them. Events are appended in the same commit as the
//! state change they describe and are never updated or deleted.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use grievance_core::{DateRange, GrievanceId, OrganizationId, UserId, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Created,
    StatusChanged,
    StageChanged,
    StepCompleted,
    GrievanceWithdrawn,
    GrievanceSettled,
    GrievanceDeleted,
    GrievanceRestored,
    CategoryChanged,
    AgreementChanged,
    EvidenceAdded,
    EvidenceRemoved,
    CostUpdated,
    NoteAdded,
}

impl EventType {
    pub const ALL: [EventType; 14] = [
        Self::Created,
        Self::StatusChanged,
        Self::StageChanged,
        Self::StepCompleted,
        Self::GrievanceWithdrawn,
        Self::GrievanceSettled,
        Self::GrievanceDeleted,
        Self::GrievanceRestored,
        Self::CategoryChanged,
        Self::AgreementChanged,
        Self::EvidenceAdded,
        Self::EvidenceRemoved,
        Self::CostUpdated,
        Self::NoteAdded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::StatusChanged => "STATUS_CHANGED",
            Self::StageChanged => "STAGE_CHANGED",
            Self::StepCompleted => "STEP_COMPLETED",
            Self::GrievanceWithdrawn => "GRIEVANCE_WITHDRAWN",
            Self::GrievanceSettled => "GRIEVANCE_SETTLED",
            Self::GrievanceDeleted => "GRIEVANCE_DELETED",
            Self::GrievanceRestored => "GRIEVANCE_RESTORED",
            Self::CategoryChanged => "CATEGORY_CHANGED",
            Self::AgreementChanged => "AGREEMENT_CHANGED",
            Self::EvidenceAdded => "EVIDENCE_ADDED",
            Self::EvidenceRemoved => "EVIDENCE_REMOVED",
            Self::CostUpdated => "COST_UPDATED",
            Self::NoteAdded => "NOTE_ADDED",
        }
    }

    /// Event types owned by the lifecycle engine. External callers of
    /// [`EventLog::append`](crate::event_log::EventLog::append) may not
    /// forge these.
    pub fn is_engine_owned(&self) -> bool {
        matches!(
            self,
            Self::Created
                | Self::StatusChanged
                | Self::StageChanged
                | Self::StepCompleted
                | Self::GrievanceWithdrawn
                | Self::GrievanceSettled
                | Self::GrievanceDeleted
                | Self::GrievanceRestored
        )
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::Invalid {
                field: "event_type",
                reason: format!("unknown event type '{s}'"),
            })
    }
}

/// One audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrievanceEvent {
    pub id: Uuid,
    pub grievance_id: GrievanceId,
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl GrievanceEvent {
    pub fn new(
        grievance_id: GrievanceId,
        organization_id: OrganizationId,
        user_id: UserId,
        event_type: EventType,
        previous_value: Option<String>,
        new_value: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            grievance_id,
            organization_id,
            user_id,
            event_type,
            previous_value,
            new_value,
            created_at,
        }
    }
}

// -- Query --------------------------------------------------------------------

/// Filters and paging for event log queries. Results are ordered by
/// `created_at` descending, newest insertions first on ties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventQuery {
    #[serde(default)]
    pub date_range: DateRange,
    /// Empty means every type.
    #[serde(default)]
    pub event_types: Vec<EventType>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub grievance_id: Option<GrievanceId>,
    /// 1-based. Zero is treated as 1.
    #[serde(default)]
    pub page: u32,
    /// Clamped to `1..=100`. Zero selects the default of 25.
    #[serde(default)]
    pub page_size: u32,
}

impl EventQuery {
    pub const DEFAULT_PAGE_SIZE: u32 = 25;
    pub const MAX_PAGE_SIZE: u32 = 100;

    pub fn effective_page(&self) -> u32 {
        self.page.max(1)
    }

    pub fn effective_page_size(&self) -> u32 {
        match self.page_size {
            0 => Self::DEFAULT_PAGE_SIZE,
            n => n.min(Self::MAX_PAGE_SIZE),
        }
    }

    /// Rows to skip for the effective page.
    pub fn offset(&self) -> u64 {
        u64::from(self.effective_page() - 1) * u64::from(self.effective_page_size())
    }

    /// Whether `event` passes every filter except the organization scope,
    /// which stores apply structurally.
    pub fn matches(&self, event: &GrievanceEvent) -> bool {
        self.date_range.contains_timestamp(event.created_at)
            && (self.event_types.is_empty() || self.event_types.contains(&event.event_type))
            && self.user_id.map_or(true, |u| u == event.user_id)
            && self.grievance_id.map_or(true, |g| g == event.grievance_id)
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: u64, page: u32, page_size: u32) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            u32::try_from(total.div_ceil(u64::from(page_size))).unwrap_or(u32::MAX)
        };
        Self {
            items,
            total,
            page,
            page_size,
            total_pages,
        }
    }

    /// Page through an already filtered and ordered list.
    pub fn from_ordered(all: Vec<T>, query: &EventQuery) -> Self {
        let total = all.len() as u64;
        let page_size = query.effective_page_size();
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let items = all
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .collect();
        Self::new(items, total, query.effective_page(), page_size)
    }
}
