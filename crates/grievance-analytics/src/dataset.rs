//! The input to one analytics computation.

use grievance_catalog::{BargainingUnit, StepTemplate};
use grievance_lifecycle::{Grievance, GrievanceSnapshot, GrievanceStepOutcome};
use serde::{Deserialize, Serialize};

/// Everything the analytics engine reads for one organization, captured
/// at a single point in time. Also the format of offline snapshot files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyticsDataset {
    #[serde(default)]
    pub grievances: Vec<Grievance>,
    #[serde(default)]
    pub outcomes: Vec<GrievanceStepOutcome>,
    #[serde(default)]
    pub templates: Vec<StepTemplate>,
    #[serde(default)]
    pub bargaining_units: Vec<BargainingUnit>,
}

impl AnalyticsDataset {
    pub fn from_parts(
        snapshot: GrievanceSnapshot,
        templates: Vec<StepTemplate>,
        bargaining_units: Vec<BargainingUnit>,
    ) -> Self {
        Self {
            grievances: snapshot.grievances,
            outcomes: snapshot.outcomes,
            templates,
            bargaining_units,
        }
    }
}
