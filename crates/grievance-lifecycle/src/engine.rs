//! # Step Progression Engine
//!
//! Creates grievances, advances them step by step, and applies status and
//! stage transitions. Each mutating operation is a read-validate-commit
//! cycle run under the engine's [`RetryPolicy`]; a version conflict re-reads
//! the grievance and re-checks every precondition before committing again.
//!
//! ## Deadlines
//!
//! When a step has a template, a [`GrievanceStepInstance`] is created with
//! a due date computed from the day the step started: the grievance's
//! creation date for step 1, otherwise the completion date of the previous
//! step.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use grievance_catalog::{StepTemplate, TemplateCatalog};
use grievance_core::{
    utc_date, AgreementId, BargainingUnitId, Clock, GrievanceId, GrievanceStage, GrievanceStatus,
    GrievanceType, OrganizationId, UserId, ValidationError,
};
use serde::{Deserialize, Serialize};

use crate::error::LifecycleError;
use crate::event::{EventType, GrievanceEvent};
use crate::model::{
    Grievance, GrievanceStepInstance, GrievanceStepOutcome, ResolutionDetails, ResolutionType,
    StepInstanceStatus,
};
use crate::retry::RetryPolicy;
use crate::store::{GrievanceStore, StoreError, TransitionCommit};
use crate::transition::{validate_transition, TransitionForm, TransitionTarget, ValidationResult};

/// Metric incremented on every committed status change, labelled by target.
pub const TRANSITION_METRIC: &str = "grievance_transitions_total";

/// Who is acting, and on behalf of which organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorContext {
    pub organization_id: OrganizationId,
    pub user_id: UserId,
}

/// Input for filing a grievance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGrievance {
    pub bargaining_unit_id: BargainingUnitId,
    pub agreement_id: AgreementId,
    pub grievance_type: GrievanceType,
    pub stage: GrievanceStage,
    /// Defaults to now.
    #[serde(default)]
    pub filed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvanceResult {
    pub new_step_number: u32,
    /// Due date of the new step, when the agreement defines it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_due_date: Option<NaiveDate>,
    pub grievance: Grievance,
}

/// Input for the generic status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: GrievanceStatus,
    #[serde(default)]
    pub stage: Option<GrievanceStage>,
    #[serde(default)]
    pub outcomes: Option<String>,
    #[serde(default)]
    pub resolution_details: Option<ResolutionDetails>,
}

/// Payload of a `STEP_COMPLETED` event.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StepCompletion<'a> {
    previous_step: u32,
    new_step: u32,
    outcome_text: &'a str,
}

#[derive(Clone)]
pub struct StepProgressionEngine {
    catalog: Arc<dyn TemplateCatalog>,
    store: Arc<dyn GrievanceStore>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for StepProgressionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepProgressionEngine")
            .field("clock", &self.clock)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

fn is_blank(text: Option<&str>) -> bool {
    text.map_or(true, |t| t.trim().is_empty())
}

fn instance_for(grievance: &Grievance, template: &StepTemplate, start: NaiveDate) -> GrievanceStepInstance {
    GrievanceStepInstance {
        grievance_id: grievance.id,
        organization_id: grievance.organization_id,
        step_number: template.step_number,
        stage: template.stage,
        name: template.name.clone(),
        due_date: template.due_date(start),
        completed_date: None,
        status: StepInstanceStatus::InProgress,
    }
}

impl StepProgressionEngine {
    pub fn new(
        catalog: Arc<dyn TemplateCatalog>,
        store: Arc<dyn GrievanceStore>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            catalog,
            store,
            clock,
            retry,
        }
    }

    fn event(
        &self,
        ctx: &ActorContext,
        grievance_id: GrievanceId,
        event_type: EventType,
        previous_value: Option<String>,
        new_value: Option<String>,
        at: DateTime<Utc>,
    ) -> GrievanceEvent {
        GrievanceEvent::new(
            grievance_id,
            ctx.organization_id,
            ctx.user_id,
            event_type,
            previous_value,
            new_value,
            at,
        )
    }

    async fn load(&self, ctx: &ActorContext, id: &GrievanceId) -> Result<Grievance, LifecycleError> {
        self.store
            .load(&ctx.organization_id, id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound {
                kind: "grievance",
                id: id.to_string(),
            })
    }

    // ── Reads ───────────────────────────────────────────────────────────

    pub async fn get_grievance(
        &self,
        ctx: &ActorContext,
        id: &GrievanceId,
    ) -> Result<Grievance, LifecycleError> {
        self.load(ctx, id).await
    }

    pub async fn list_grievances(&self, ctx: &ActorContext) -> Result<Vec<Grievance>, LifecycleError> {
        Ok(self.store.list(&ctx.organization_id).await?)
    }

    pub async fn step_outcomes(
        &self,
        ctx: &ActorContext,
        id: &GrievanceId,
    ) -> Result<Vec<GrievanceStepOutcome>, LifecycleError> {
        self.load(ctx, id).await?;
        Ok(self.store.outcomes(&ctx.organization_id, id).await?)
    }

    pub async fn step_instances(
        &self,
        ctx: &ActorContext,
        id: &GrievanceId,
    ) -> Result<Vec<GrievanceStepInstance>, LifecycleError> {
        self.load(ctx, id).await?;
        Ok(self.store.step_instances(&ctx.organization_id, id).await?)
    }

    // ── Create ──────────────────────────────────────────────────────────

    /// File a new grievance at step 1 with the chosen initial stage.
    ///
    /// The agreement and bargaining unit must exist in the caller's
    /// organization, and the agreement must cover that unit.
    pub async fn create_grievance(
        &self,
        ctx: &ActorContext,
        request: NewGrievance,
    ) -> Result<Grievance, LifecycleError> {
        let org = &ctx.organization_id;
        let agreement = self
            .catalog
            .agreement(org, &request.agreement_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound {
                kind: "agreement",
                id: request.agreement_id.to_string(),
            })?;
        self.catalog
            .bargaining_unit(org, &request.bargaining_unit_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound {
                kind: "bargaining unit",
                id: request.bargaining_unit_id.to_string(),
            })?;
        if agreement.bargaining_unit_id != request.bargaining_unit_id {
            return Err(LifecycleError::Validation(format!(
                "agreement {} does not cover bargaining unit {}",
                agreement.id, request.bargaining_unit_id
            )));
        }

        let first_step = self
            .catalog
            .template(org, &agreement.id, request.grievance_type, 1)
            .await?;

        let now = self.clock.now();
        let grievance = Grievance {
            id: GrievanceId::new(),
            organization_id: *org,
            bargaining_unit_id: request.bargaining_unit_id,
            agreement_id: request.agreement_id,
            grievance_type: request.grievance_type,
            status: GrievanceStatus::Active,
            stage: request.stage,
            current_step_number: Some(1),
            outcomes: None,
            resolution_details: None,
            status_before_deletion: None,
            version: 1,
            filed_at: request.filed_at.unwrap_or(now),
            created_at: now,
            updated_at: now,
        };

        let instances = first_step
            .iter()
            .map(|t| instance_for(&grievance, t, utc_date(now)))
            .collect();
        let commit = TransitionCommit {
            expected_version: 0,
            grievance: grievance.clone(),
            outcome: None,
            instances,
            events: vec![self.event(
                ctx,
                grievance.id,
                EventType::Created,
                None,
                Some(GrievanceStatus::Active.as_str().to_string()),
                now,
            )],
        };

        // The id is fresh, so `AlreadyExists` on a retry means an earlier
        // attempt committed and only its acknowledgement was lost.
        let mut attempted = false;
        self.retry
            .run("create_grievance", || {
                let commit = commit.clone();
                let retrying = std::mem::replace(&mut attempted, true);
                async move {
                    match self.store.create(commit).await {
                        Err(StoreError::AlreadyExists { .. }) if retrying => Ok(()),
                        result => result.map_err(LifecycleError::from),
                    }
                }
            })
            .await?;

        metrics::counter!(TRANSITION_METRIC, "status" => GrievanceStatus::Active.as_str()).increment(1);
        tracing::info!(
            grievance_id = %grievance.id,
            organization_id = %org,
            agreement_id = %grievance.agreement_id,
            grievance_type = %grievance.grievance_type,
            stage = %grievance.stage,
            has_step_template = first_step.is_some(),
            "grievance created"
        );
        Ok(grievance)
    }

    // ── Advance ─────────────────────────────────────────────────────────

    /// Complete the current step with `outcome_text` and move to the next.
    ///
    /// Fails with `Validation` when the text is blank or the grievance is
    /// not `ACTIVE`; nothing is written in either case. On success the
    /// outcome, the completed and next step instances, the new step number
    /// and a `STEP_COMPLETED` event are committed together.
    pub async fn advance_to_next_step(
        &self,
        ctx: &ActorContext,
        id: &GrievanceId,
        outcome_text: &str,
    ) -> Result<AdvanceResult, LifecycleError> {
        let outcome_text = ValidationError::require_text("outcome", Some(outcome_text))?;
        self.retry
            .run("advance_to_next_step", || self.try_advance(ctx, id, outcome_text))
            .await
    }

    async fn try_advance(
        &self,
        ctx: &ActorContext,
        id: &GrievanceId,
        outcome_text: &str,
    ) -> Result<AdvanceResult, LifecycleError> {
        let org = &ctx.organization_id;
        let mut grievance = self.load(ctx, id).await?;
        if !grievance.is_active() {
            return Err(LifecycleError::Validation(format!(
                "grievance {id} is {}; only ACTIVE grievances can advance",
                grievance.status
            )));
        }
        let current = grievance.current_step_number.ok_or_else(|| {
            LifecycleError::Validation(format!("grievance {id} has no current step to complete"))
        })?;
        let next = current.checked_add(1).ok_or_else(|| {
            LifecycleError::Validation(format!("grievance {id} cannot advance past step {current}"))
        })?;

        let now = self.clock.now();
        let completed_on = utc_date(now);

        let outcome = GrievanceStepOutcome {
            grievance_id: grievance.id,
            organization_id: *org,
            step_number: current,
            stage: grievance.stage,
            outcome: outcome_text.to_string(),
            completed_date: now,
            recorded_by: ctx.user_id,
        };

        let mut instances: Vec<GrievanceStepInstance> = self
            .store
            .step_instances(org, id)
            .await?
            .into_iter()
            .filter(|i| i.step_number == current)
            .map(|mut i| {
                i.status = StepInstanceStatus::Completed;
                i.completed_date = Some(now);
                i
            })
            .collect();

        let next_template = self
            .catalog
            .template(org, &grievance.agreement_id, grievance.grievance_type, next)
            .await?;
        let next_due_date = next_template.as_ref().map(|t| t.due_date(completed_on));
        if let Some(template) = &next_template {
            instances.push(instance_for(&grievance, template, completed_on));
        }

        let payload = serde_json::to_string(&StepCompletion {
            previous_step: current,
            new_step: next,
            outcome_text,
        })
        .map_err(|e| LifecycleError::Internal(format!("failed to encode step completion: {e}")))?;

        let expected_version = grievance.version;
        grievance.current_step_number = Some(next);
        grievance.updated_at = now;
        grievance.version += 1;

        let event = self.event(
            ctx,
            grievance.id,
            EventType::StepCompleted,
            Some(current.to_string()),
            Some(payload),
            now,
        );
        self.store
            .commit(TransitionCommit {
                expected_version,
                grievance: grievance.clone(),
                outcome: Some(outcome),
                instances,
                events: vec![event],
            })
            .await?;

        tracing::info!(
            grievance_id = %grievance.id,
            previous_step = current,
            new_step = next,
            next_due_date = ?next_due_date,
            "grievance advanced"
        );
        Ok(AdvanceResult {
            new_step_number: next,
            next_due_date,
            grievance,
        })
    }

    // ── Transitions ─────────────────────────────────────────────────────

    /// Check a prospective transition without applying it.
    pub async fn validate_status_transition(
        &self,
        ctx: &ActorContext,
        id: &GrievanceId,
        target: &TransitionTarget,
        form: &TransitionForm,
    ) -> Result<ValidationResult, LifecycleError> {
        let grievance = self.load(ctx, id).await?;
        Ok(validate_transition(&grievance, target, form))
    }

    /// Apply a status and optional stage change.
    ///
    /// - Terminal targets need justification: non-blank `outcomes` or
    ///   resolution details. Restoring a deleted grievance does not.
    /// - A deleted grievance can only return to the status it held before
    ///   deletion.
    /// - The stage cannot change while the grievance stays outside `ACTIVE`.
    /// - The current step number is never touched.
    pub async fn update_status(
        &self,
        ctx: &ActorContext,
        id: &GrievanceId,
        update: StatusUpdate,
    ) -> Result<Grievance, LifecycleError> {
        self.retry
            .run("update_status", || self.try_apply_status(ctx, id, &update, None))
            .await
    }

    /// Withdraw a grievance, recording `details` as its resolution.
    pub async fn process_withdrawal(
        &self,
        ctx: &ActorContext,
        id: &GrievanceId,
        details: &str,
    ) -> Result<Grievance, LifecycleError> {
        let details = ValidationError::require_text("withdrawal_details", Some(details))?;
        let update = self.resolution_update(ctx, GrievanceStatus::Withdrawn, ResolutionType::Withdrawal, details);
        self.retry
            .run("process_withdrawal", || {
                self.try_apply_status(ctx, id, &update, Some(EventType::GrievanceWithdrawn))
            })
            .await
    }

    /// Settle a grievance, recording `details` as its resolution.
    pub async fn process_settlement(
        &self,
        ctx: &ActorContext,
        id: &GrievanceId,
        details: &str,
    ) -> Result<Grievance, LifecycleError> {
        let details = ValidationError::require_text("settlement_details", Some(details))?;
        let update = self.resolution_update(ctx, GrievanceStatus::Settled, ResolutionType::Settlement, details);
        self.retry
            .run("process_settlement", || {
                self.try_apply_status(ctx, id, &update, Some(EventType::GrievanceSettled))
            })
            .await
    }

    fn resolution_update(
        &self,
        ctx: &ActorContext,
        status: GrievanceStatus,
        resolution_type: ResolutionType,
        details: &str,
    ) -> StatusUpdate {
        StatusUpdate {
            status,
            stage: None,
            outcomes: Some(details.to_string()),
            resolution_details: Some(ResolutionDetails {
                resolution_type,
                resolution_date: self.clock.now(),
                resolved_by: ctx.user_id,
                details: details.to_string(),
            }),
        }
    }

    async fn try_apply_status(
        &self,
        ctx: &ActorContext,
        id: &GrievanceId,
        update: &StatusUpdate,
        resolution_event: Option<EventType>,
    ) -> Result<Grievance, LifecycleError> {
        let mut grievance = self.load(ctx, id).await?;
        let from_status = grievance.status;
        let from_stage = grievance.stage;
        let to_status = update.status;
        let to_stage = update.stage.unwrap_or(from_stage);

        let rejected = |reason: String| LifecycleError::InvalidTransition {
            from: from_status.to_string(),
            to: to_status.to_string(),
            reason,
        };

        if from_status == GrievanceStatus::Deleted {
            let restorable = grievance
                .status_before_deletion
                .unwrap_or(GrievanceStatus::Active);
            if to_status == GrievanceStatus::Deleted {
                return Err(rejected("grievance is already deleted".into()));
            }
            if to_status != restorable {
                return Err(rejected(format!(
                    "a deleted grievance can only be restored to {restorable}"
                )));
            }
        }
        if resolution_event.is_some() && from_status == to_status {
            return Err(rejected(format!("grievance is already {to_status}")));
        }
        if from_status.is_terminal() && to_status.is_terminal() && to_stage != from_stage {
            return Err(LifecycleError::InvalidTransition {
                from: from_stage.to_string(),
                to: to_stage.to_string(),
                reason: format!("stage is frozen while the grievance is {from_status}"),
            });
        }
        if to_status.is_terminal() && to_status != from_status && from_status != GrievanceStatus::Deleted {
            let justified = !is_blank(update.outcomes.as_deref())
                || update
                    .resolution_details
                    .as_ref()
                    .is_some_and(|r| !r.details.trim().is_empty());
            if !justified {
                return Err(LifecycleError::Validation(format!(
                    "moving a grievance to {to_status} requires justification in outcomes or resolution details"
                )));
            }
        }

        let status_changed = to_status != from_status;
        let stage_changed = to_stage != from_stage;
        if !status_changed
            && !stage_changed
            && update.outcomes.is_none()
            && update.resolution_details.is_none()
        {
            return Ok(grievance);
        }

        let now = self.clock.now();
        let mut events = Vec::new();
        if status_changed {
            events.push(self.event(
                ctx,
                grievance.id,
                EventType::StatusChanged,
                Some(from_status.to_string()),
                Some(to_status.to_string()),
                now,
            ));
            if to_status == GrievanceStatus::Deleted {
                grievance.status_before_deletion = Some(from_status);
                events.push(self.event(
                    ctx,
                    grievance.id,
                    EventType::GrievanceDeleted,
                    Some(from_status.to_string()),
                    update.outcomes.clone(),
                    now,
                ));
            }
            if from_status == GrievanceStatus::Deleted {
                grievance.status_before_deletion = None;
                events.push(self.event(
                    ctx,
                    grievance.id,
                    EventType::GrievanceRestored,
                    Some(from_status.to_string()),
                    Some(to_status.to_string()),
                    now,
                ));
            }
        }
        if stage_changed {
            events.push(self.event(
                ctx,
                grievance.id,
                EventType::StageChanged,
                Some(from_stage.to_string()),
                Some(to_stage.to_string()),
                now,
            ));
        }
        if let Some(event_type) = resolution_event {
            let details = update
                .resolution_details
                .as_ref()
                .map(|r| r.details.clone())
                .or_else(|| update.outcomes.clone());
            events.push(self.event(
                ctx,
                grievance.id,
                event_type,
                Some(from_status.to_string()),
                details,
                now,
            ));
        }

        let expected_version = grievance.version;
        grievance.status = to_status;
        grievance.stage = to_stage;
        if let Some(outcomes) = &update.outcomes {
            grievance.outcomes = Some(outcomes.clone());
        }
        if let Some(resolution) = &update.resolution_details {
            grievance.resolution_details = Some(resolution.clone());
        }
        grievance.updated_at = now;
        grievance.version += 1;

        self.store
            .commit(TransitionCommit {
                expected_version,
                grievance: grievance.clone(),
                outcome: None,
                instances: vec![],
                events,
            })
            .await?;

        if status_changed {
            metrics::counter!(TRANSITION_METRIC, "status" => to_status.as_str()).increment(1);
        }
        tracing::info!(
            grievance_id = %grievance.id,
            from_status = %from_status,
            to_status = %to_status,
            from_stage = %from_stage,
            to_stage = %to_stage,
            "grievance status updated"
        );
        Ok(grievance)
    }
}
