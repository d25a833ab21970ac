//! # grievance-core — Foundational Types
//!
//! Leaf crate of the workspace dependency DAG. Every other crate builds on
//! the primitives defined here:
//!
//! - [`identity`] — UUID newtypes for organizations, grievances, agreements,
//!   bargaining units and users. All engine operations are scoped by
//!   [`OrganizationId`].
//! - [`domain`] — grievance type, status and stage enums with their
//!   lifecycle predicates.
//! - [`calendar`] — the step deadline calculator: due dates and elapsed
//!   durations in calendar days or business days (Saturday/Sunday excluded).
//! - [`temporal`] — inclusive UTC date ranges and the injectable [`Clock`].
//! - [`error`] — validation errors shared across the workspace.
//!
//! ## Invariants
//!
//! - Date arithmetic operates on UTC calendar dates. Timestamps are reduced
//!   to their UTC date before any computation, so results never depend on
//!   the time of day or the server's local zone.
//! - No `unwrap()` outside tests.

pub mod calendar;
pub mod domain;
pub mod error;
pub mod identity;
pub mod temporal;

pub use calendar::{compute_due_date, elapsed, is_business_day, utc_date, DayCount};
pub use domain::{GrievanceStage, GrievanceStatus, GrievanceType};
pub use error::ValidationError;
pub use identity::{AgreementId, BargainingUnitId, GrievanceId, OrganizationId, UserId};
pub use temporal::{Clock, DateRange, FixedClock, SystemClock};
