//! # Grievance Domain Enums
//!
//! Type, status and stage of a grievance. Each enum serializes in
//! `SCREAMING_SNAKE_CASE`, which is also the form persisted in storage,
//! and parses back through [`FromStr`] with a [`ValidationError`] that lists
//! the accepted values.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ── Grievance Type ──────────────────────────────────────────────────────────

/// Who the grievance is filed on behalf of. Step templates are defined per
/// agreement and per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrievanceType {
    Individual,
    Group,
    Policy,
}

impl GrievanceType {
    pub const ALL: [GrievanceType; 3] = [Self::Individual, Self::Group, Self::Policy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "INDIVIDUAL",
            Self::Group => "GROUP",
            Self::Policy => "POLICY",
        }
    }
}

impl std::fmt::Display for GrievanceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrievanceType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::Invalid {
                field: "grievance_type",
                reason: format!("'{s}' is not one of INDIVIDUAL, GROUP, POLICY"),
            })
    }
}

// ── Grievance Status ────────────────────────────────────────────────────────

/// Lifecycle status.
///
/// `Active` is the only state in which step progression happens. Every
/// other status is terminal with respect to progression: stage and current
/// step number are frozen and record where the grievance was resolved.
/// `Deleted` is a soft delete that may be reversed to the status held
/// before deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrievanceStatus {
    Active,
    Settled,
    Withdrawn,
    ResolvedArbitration,
    Deleted,
}

impl GrievanceStatus {
    pub const ALL: [GrievanceStatus; 5] = [
        Self::Active,
        Self::Settled,
        Self::Withdrawn,
        Self::ResolvedArbitration,
        Self::Deleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Settled => "SETTLED",
            Self::Withdrawn => "WITHDRAWN",
            Self::ResolvedArbitration => "RESOLVED_ARBITRATION",
            Self::Deleted => "DELETED",
        }
    }

    /// Whether step progression is frozen in this status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }

    /// Whether this status counts as a resolution in analytics.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Self::Settled | Self::Withdrawn | Self::ResolvedArbitration
        )
    }
}

impl std::fmt::Display for GrievanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrievanceStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::Invalid {
                field: "status",
                reason: format!(
                    "'{s}' is not one of ACTIVE, SETTLED, WITHDRAWN, RESOLVED_ARBITRATION, DELETED"
                ),
            })
    }
}

// ── Grievance Stage ─────────────────────────────────────────────────────────

/// Coarse procedural phase.
///
/// The derived `Ord` follows declaration order
/// (`Informal < Formal < Arbitration`), which is the order step templates
/// are sorted in before renumbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrievanceStage {
    Informal,
    Formal,
    Arbitration,
}

impl GrievanceStage {
    pub const ALL: [GrievanceStage; 3] = [Self::Informal, Self::Formal, Self::Arbitration];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Informal => "INFORMAL",
            Self::Formal => "FORMAL",
            Self::Arbitration => "ARBITRATION",
        }
    }
}

impl std::fmt::Display for GrievanceStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrievanceStage {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::Invalid {
                field: "stage",
                reason: format!("'{s}' is not one of INFORMAL, FORMAL, ARBITRATION"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_is_non_terminal() {
        for status in GrievanceStatus::ALL {
            assert_eq!(status.is_terminal(), status != GrievanceStatus::Active);
        }
    }

    #[test]
    fn deleted_is_not_a_resolution() {
        assert!(!GrievanceStatus::Deleted.is_resolution());
        assert!(!GrievanceStatus::Active.is_resolution());
        assert!(GrievanceStatus::ResolvedArbitration.is_resolution());
    }

    #[test]
    fn stage_order_follows_procedure() {
        assert!(GrievanceStage::Informal < GrievanceStage::Formal);
        assert!(GrievanceStage::Formal < GrievanceStage::Arbitration);
    }

    #[test]
    fn serde_matches_as_str() {
        for status in GrievanceStatus::ALL {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, serde_json::Value::String(status.as_str().into()));
        }
        for stage in GrievanceStage::ALL {
            let json = serde_json::to_value(stage).unwrap();
            assert_eq!(json, serde_json::Value::String(stage.as_str().into()));
        }
        for ty in GrievanceType::ALL {
            let json = serde_json::to_value(ty).unwrap();
            assert_eq!(json, serde_json::Value::String(ty.as_str().into()));
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(
            "resolved_arbitration".parse::<GrievanceStatus>().unwrap(),
            GrievanceStatus::ResolvedArbitration
        );
        assert_eq!("policy".parse::<GrievanceType>().unwrap(), GrievanceType::Policy);
        assert_eq!(" Formal ".parse::<GrievanceStage>().unwrap(), GrievanceStage::Formal);
    }

    #[test]
    fn parse_rejects_unknown_values() {
        let err = "OPEN".parse::<GrievanceStatus>().unwrap_err();
        assert!(err.to_string().contains("ACTIVE"));
        assert!("STEP_2".parse::<GrievanceStage>().is_err());
    }
}
