//! # Persistence Port
//!
//! [`GrievanceStore`] is implemented by the in-memory store in this crate
//! and by the Postgres store in `grievance-api`. Every read takes the
//! caller's organization, so a grievance belonging to another tenant is
//! simply not found.
//!
//! Writes go through [`TransitionCommit`]: one atomic unit applied only if
//! the stored version equals `expected_version`.

use async_trait::async_trait;
use grievance_core::{GrievanceId, OrganizationId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{EventQuery, GrievanceEvent, Paginated};
use crate::model::{Grievance, GrievanceStepInstance, GrievanceStepOutcome};

/// Everything one mutation writes.
#[derive(Debug, Clone)]
pub struct TransitionCommit {
    /// Version the grievance had when it was read. Zero for creation.
    pub expected_version: u64,
    /// The new row. Its `version` must be `expected_version + 1`.
    pub grievance: Grievance,
    /// Upserted by `(grievance_id, step_number)`, keeping the latest
    /// completion.
    pub outcome: Option<GrievanceStepOutcome>,
    /// Upserted by `(grievance_id, step_number)`.
    pub instances: Vec<GrievanceStepInstance>,
    pub events: Vec<GrievanceEvent>,
}

/// Consistent read of an organization's grievances and outcome history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrievanceSnapshot {
    pub grievances: Vec<Grievance>,
    pub outcomes: Vec<GrievanceStepOutcome>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("grievance {grievance_id} not found")]
    NotFound { grievance_id: String },

    #[error("grievance {grievance_id} already exists")]
    AlreadyExists { grievance_id: String },

    /// The row changed between read and commit.
    #[error("version conflict on grievance {grievance_id}: expected {expected}, found {actual}")]
    VersionConflict {
        grievance_id: String,
        expected: u64,
        actual: u64,
    },

    /// Transient failure reaching the backing store.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Non-transient backend failure or undecodable data.
    #[error("store error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait GrievanceStore: Send + Sync {
    async fn load(
        &self,
        org: &OrganizationId,
        id: &GrievanceId,
    ) -> Result<Option<Grievance>, StoreError>;

    /// All grievances in the organization, newest first.
    async fn list(&self, org: &OrganizationId) -> Result<Vec<Grievance>, StoreError>;

    /// Insert a new grievance. `expected_version` must be zero.
    async fn create(&self, commit: TransitionCommit) -> Result<(), StoreError>;

    /// Apply a mutation if the stored version still equals
    /// `commit.expected_version`.
    async fn commit(&self, commit: TransitionCommit) -> Result<(), StoreError>;

    /// Outcome history, ordered by step number.
    async fn outcomes(
        &self,
        org: &OrganizationId,
        id: &GrievanceId,
    ) -> Result<Vec<GrievanceStepOutcome>, StoreError>;

    /// Step instances, ordered by step number.
    async fn step_instances(
        &self,
        org: &OrganizationId,
        id: &GrievanceId,
    ) -> Result<Vec<GrievanceStepInstance>, StoreError>;

    /// Append a standalone event. The grievance must exist in the event's
    /// organization.
    async fn append_event(&self, event: GrievanceEvent) -> Result<(), StoreError>;

    async fn query_events(
        &self,
        org: &OrganizationId,
        query: &EventQuery,
    ) -> Result<Paginated<GrievanceEvent>, StoreError>;

    async fn snapshot(&self, org: &OrganizationId) -> Result<GrievanceSnapshot, StoreError>;
}
