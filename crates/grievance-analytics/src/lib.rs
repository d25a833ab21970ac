//! # grievance-analytics — Step Duration Analytics
//!
//! Retrospective measurement of how long grievances spend at each step,
//! against the time limits their agreements allow.
//!
//! ## Timeline reconstruction
//!
//! A step's start is the completion of the previous step, or the
//! grievance's creation when there is no previous outcome. Its end is the
//! completion recorded by its own outcome. Active grievances contribute one
//! open record for the step they are currently at, measured up to "now".
//! Where several outcomes exist for the same step, only the latest
//! completion counts.
//!
//! ## Incomplete data
//!
//! Outcomes whose agreement defines no template for that step cannot be
//! measured. They are skipped, logged, counted in
//! `grievance_template_missing_total`, and listed by
//! [`DurationAnalyticsEngine::template_coverage_gaps`]. Reports never fail
//! because of them.
//!
//! ## Layers
//!
//! - [`DurationAnalyticsEngine`] — pure computation over an
//!   [`AnalyticsDataset`] and a fixed "now".
//! - [`AnalyticsService`] — loads one snapshot per request from the
//!   catalog and store, and degrades to empty results when loading fails.

pub mod dataset;
pub mod engine;
pub mod report;
pub mod service;

pub use dataset::AnalyticsDataset;
pub use engine::{DurationAnalyticsEngine, TEMPLATE_MISSING_METRIC};
pub use report::{
    BargainingUnitReport, OverdueEntry, OverdueGroup, ReportFilter, ResolutionBreakdown,
    ResolutionCount, StepBucket, StepDurationRecord, StepStatistics, TemplateGap,
};
pub use service::AnalyticsService;
