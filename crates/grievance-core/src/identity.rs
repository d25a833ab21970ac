//! # Identity Newtypes
//!
//! UUID-backed identifiers for every record the engine touches. Distinct
//! types prevent a grievance id from being passed where an agreement id is
//! expected, which matters because most lookups take several ids at once.
//!
//! All identifiers serialize as bare UUID strings.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|e| ValidationError::Invalid {
                        field: $field,
                        reason: e.to_string(),
                    })
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_identifier!(
    /// The tenant boundary. Every read and write is scoped to one organization.
    OrganizationId,
    "organization_id"
);

uuid_identifier!(
    /// A single grievance filed under a collective agreement.
    GrievanceId,
    "grievance_id"
);

uuid_identifier!(
    /// A group of employees represented collectively.
    BargainingUnitId,
    "bargaining_unit_id"
);

uuid_identifier!(
    /// A collective agreement whose step templates govern deadlines.
    AgreementId,
    "agreement_id"
);

uuid_identifier!(
    /// The user performing an operation, recorded on events and outcomes.
    UserId,
    "user_id"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_serialize_as_bare_uuid_strings() {
        let uuid = Uuid::new_v4();
        let id = GrievanceId::from_uuid(uuid);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{uuid}\""));
        let back: GrievanceId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn parse_rejects_garbage_with_field_name() {
        let err = "not-a-uuid".parse::<AgreementId>().unwrap_err();
        assert!(err.to_string().contains("agreement_id"));
    }

    #[test]
    fn parse_accepts_surrounding_whitespace() {
        let uuid = Uuid::new_v4();
        let parsed: OrganizationId = format!(" {uuid} ").parse().unwrap();
        assert_eq!(parsed.as_uuid(), &uuid);
    }

    #[test]
    fn new_identifiers_are_distinct() {
        assert_ne!(UserId::new(), UserId::new());
    }
}
