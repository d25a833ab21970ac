//! # grievance-lifecycle — Step Progression Engine
//!
//! The state machine governing a grievance from filing to resolution.
//!
//! ## States
//!
//! ```text
//!                 advance (outcome text required)
//!               ┌──────────────┐
//!               ▼              │
//!   create ──▶ ACTIVE(stage, step n) ──▶ SETTLED | WITHDRAWN | RESOLVED_ARBITRATION
//!                  │                                 │
//!                  └──────────▶ DELETED ◀────────────┘
//!                                 │
//!                                 └──▶ restore to the status held before deletion
//! ```
//!
//! `ACTIVE` is the only state in which steps advance. Leaving it freezes
//! stage and step number. Terminal targets require justification text.
//!
//! ## Commits
//!
//! Every mutation is one [`TransitionCommit`](store::TransitionCommit):
//! the new grievance row, any step outcome and step instances, and the
//! audit events, applied only if the stored version still matches. A
//! version conflict re-runs the whole read-validate-commit cycle under the
//! shared [`RetryPolicy`](retry::RetryPolicy).
//!
//! ## Modules
//!
//! - [`model`] — grievance, outcome and step-instance records.
//! - [`event`] — audit event types and paginated queries.
//! - [`transition`] — pure transition validation.
//! - [`store`] — the persistence port and commit record.
//! - [`memory`] — in-memory store.
//! - [`retry`] — retry policy with exponential backoff.
//! - [`engine`] — [`StepProgressionEngine`].
//! - [`event_log`] — [`EventLog`] append/query facade.

pub mod engine;
pub mod error;
pub mod event;
pub mod event_log;
pub mod memory;
pub mod model;
pub mod retry;
pub mod store;
pub mod transition;

pub use engine::{ActorContext, AdvanceResult, NewGrievance, StatusUpdate, StepProgressionEngine};
pub use error::LifecycleError;
pub use event::{EventQuery, EventType, GrievanceEvent, Paginated};
pub use event_log::EventLog;
pub use memory::InMemoryStore;
pub use model::{
    Grievance, GrievanceStepInstance, GrievanceStepOutcome, ResolutionDetails, ResolutionType,
    StepInstanceStatus,
};
pub use retry::{RetryPolicy, Retryable};
pub use store::{GrievanceSnapshot, GrievanceStore, StoreError, TransitionCommit};
pub use transition::{RequiredForm, TransitionForm, TransitionTarget, ValidationResult};
