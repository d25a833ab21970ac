//! # grievance-catalog — Agreement Step Templates
//!
//! Stores, per agreement and grievance type, the ordered list of procedural
//! steps a grievance moves through, each with a stage, a time limit and a
//! calendar/business-day flag. Also answers the agreement and
//! bargaining-unit lookups the lifecycle engine validates against.
//!
//! ## Ordering
//!
//! Within one (agreement, type) the steps are ordered by stage
//! (`INFORMAL < FORMAL < ARBITRATION`) and then by the step number supplied
//! by the caller. Every full save renumbers the steps `1..=N` in that order.
//!
//! ## Stage at save time
//!
//! [`TemplateCatalog::save_templates`] takes a required, typed stage for
//! every step. Step lists that omit a stage (legacy imports and API saves)
//! go through [`legacy::migrate_legacy_steps`], which infers a stage from
//! the step description and reports every inference.
//!
//! ## Absence is not an error
//!
//! A missing template for some step number is an expected state:
//! lookups return `Ok(None)`, distinct from `Err(CatalogError)`.

pub mod catalog;
pub mod error;
pub mod legacy;
pub mod memory;
pub mod reference;
pub mod template;

pub use catalog::{TemplateCatalog, TemplateIndex};
pub use error::CatalogError;
pub use legacy::{infer_stage, migrate_legacy_steps, LegacyStep};
pub use memory::InMemoryCatalog;
pub use reference::{Agreement, BargainingUnit};
pub use template::{order_and_renumber, StepTemplate, StepTemplateInput};
