//! Reference records owned by the agreement catalog.

use grievance_core::{AgreementId, BargainingUnitId, OrganizationId};
use serde::{Deserialize, Serialize};

/// A group of employees represented collectively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BargainingUnit {
    pub id: BargainingUnitId,
    pub organization_id: OrganizationId,
    pub name: String,
}

/// A collective agreement covering one bargaining unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agreement {
    pub id: AgreementId,
    pub organization_id: OrganizationId,
    pub bargaining_unit_id: BargainingUnitId,
    pub name: String,
}
