//! In-memory [`GrievanceStore`].
//!
//! All data sits behind one `parking_lot::RwLock`, partitioned by
//! organization. A commit checks the version and applies every part of the
//! [`TransitionCommit`] under a single write lock, so readers never observe
//! half of a mutation. The lock is never held across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use grievance_core::{GrievanceId, OrganizationId};
use parking_lot::RwLock;

use crate::event::{EventQuery, GrievanceEvent, Paginated};
use crate::model::{Grievance, GrievanceStepInstance, GrievanceStepOutcome};
use crate::store::{GrievanceSnapshot, GrievanceStore, StoreError, TransitionCommit};

#[derive(Debug, Default)]
struct OrgData {
    grievances: HashMap<GrievanceId, Grievance>,
    outcomes: HashMap<(GrievanceId, u32), GrievanceStepOutcome>,
    instances: HashMap<(GrievanceId, u32), GrievanceStepInstance>,
    /// Insertion order.
    events: Vec<GrievanceEvent>,
}

impl OrgData {
    fn apply(&mut self, commit: TransitionCommit) {
        let TransitionCommit {
            grievance,
            outcome,
            instances,
            events,
            ..
        } = commit;

        if let Some(outcome) = outcome {
            let key = (outcome.grievance_id, outcome.step_number);
            let keep_existing = self
                .outcomes
                .get(&key)
                .is_some_and(|existing| existing.completed_date > outcome.completed_date);
            if !keep_existing {
                self.outcomes.insert(key, outcome);
            }
        }
        for instance in instances {
            self.instances
                .insert((instance.grievance_id, instance.step_number), instance);
        }
        self.events.extend(events);
        self.grievances.insert(grievance.id, grievance);
    }
}

/// Cloneable store; clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    orgs: Arc<RwLock<HashMap<OrganizationId, OrgData>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GrievanceStore for InMemoryStore {
    async fn load(
        &self,
        org: &OrganizationId,
        id: &GrievanceId,
    ) -> Result<Option<Grievance>, StoreError> {
        Ok(self
            .orgs
            .read()
            .get(org)
            .and_then(|d| d.grievances.get(id).cloned()))
    }

    async fn list(&self, org: &OrganizationId) -> Result<Vec<Grievance>, StoreError> {
        let mut all: Vec<Grievance> = self
            .orgs
            .read()
            .get(org)
            .map(|d| d.grievances.values().cloned().collect())
            .unwrap_or_default();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn create(&self, commit: TransitionCommit) -> Result<(), StoreError> {
        let mut guard = self.orgs.write();
        let data = guard.entry(commit.grievance.organization_id).or_default();
        if data.grievances.contains_key(&commit.grievance.id) {
            return Err(StoreError::AlreadyExists {
                grievance_id: commit.grievance.id.to_string(),
            });
        }
        data.apply(commit);
        Ok(())
    }

    async fn commit(&self, commit: TransitionCommit) -> Result<(), StoreError> {
        let mut guard = self.orgs.write();
        let id = commit.grievance.id;
        let data = guard
            .get_mut(&commit.grievance.organization_id)
            .ok_or_else(|| StoreError::NotFound {
                grievance_id: id.to_string(),
            })?;
        let actual = data
            .grievances
            .get(&id)
            .map(|g| g.version)
            .ok_or_else(|| StoreError::NotFound {
                grievance_id: id.to_string(),
            })?;
        if actual != commit.expected_version {
            return Err(StoreError::VersionConflict {
                grievance_id: id.to_string(),
                expected: commit.expected_version,
                actual,
            });
        }
        data.apply(commit);
        Ok(())
    }

    async fn outcomes(
        &self,
        org: &OrganizationId,
        id: &GrievanceId,
    ) -> Result<Vec<GrievanceStepOutcome>, StoreError> {
        let mut outcomes: Vec<GrievanceStepOutcome> = self
            .orgs
            .read()
            .get(org)
            .map(|d| {
                d.outcomes
                    .values()
                    .filter(|o| o.grievance_id == *id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        outcomes.sort_by_key(|o| o.step_number);
        Ok(outcomes)
    }

    async fn step_instances(
        &self,
        org: &OrganizationId,
        id: &GrievanceId,
    ) -> Result<Vec<GrievanceStepInstance>, StoreError> {
        let mut instances: Vec<GrievanceStepInstance> = self
            .orgs
            .read()
            .get(org)
            .map(|d| {
                d.instances
                    .values()
                    .filter(|i| i.grievance_id == *id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        instances.sort_by_key(|i| i.step_number);
        Ok(instances)
    }

    async fn append_event(&self, event: GrievanceEvent) -> Result<(), StoreError> {
        let mut guard = self.orgs.write();
        let data = guard
            .get_mut(&event.organization_id)
            .filter(|d| d.grievances.contains_key(&event.grievance_id))
            .ok_or_else(|| StoreError::NotFound {
                grievance_id: event.grievance_id.to_string(),
            })?;
        data.events.push(event);
        Ok(())
    }

    async fn query_events(
        &self,
        org: &OrganizationId,
        query: &EventQuery,
    ) -> Result<Paginated<GrievanceEvent>, StoreError> {
        let mut matching: Vec<GrievanceEvent> = self
            .orgs
            .read()
            .get(org)
            .map(|d| {
                d.events
                    .iter()
                    .rev()
                    .filter(|e| query.matches(e))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        // Stable: ties keep newest-inserted first.
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Paginated::from_ordered(matching, query))
    }

    async fn snapshot(&self, org: &OrganizationId) -> Result<GrievanceSnapshot, StoreError> {
        let guard = self.orgs.read();
        Ok(guard
            .get(org)
            .map(|d| GrievanceSnapshot {
                grievances: d.grievances.values().cloned().collect(),
                outcomes: d.outcomes.values().cloned().collect(),
            })
            .unwrap_or_default())
    }
}
