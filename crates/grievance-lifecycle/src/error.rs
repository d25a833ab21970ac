//! # Lifecycle Error Types
//!
//! Every variant maps to one client-visible outcome:
//!
//! | Variant             | Meaning                                  | Retried |
//! |---------------------|------------------------------------------|---------|
//! | `Validation`        | required transition data missing        | no      |
//! | `NotFound`          | absent or owned by another organization  | no      |
//! | `InvalidTransition` | forbidden by the state machine           | no      |
//! | `Conflict`          | concurrent modification                  | yes     |
//! | `Unavailable`       | storage unreachable                      | yes     |
//! | `Internal`          | unexpected backend failure               | no      |
//!
//! No state is mutated when an operation returns an error.

use grievance_catalog::CatalogError;
use grievance_core::ValidationError;
use thiserror::Error;

use crate::retry::Retryable;
use crate::store::StoreError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Retryable for LifecycleError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Unavailable(_))
    }
}

impl From<ValidationError> for LifecycleError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { grievance_id } => Self::NotFound {
                kind: "grievance",
                id: grievance_id,
            },
            StoreError::AlreadyExists { .. } | StoreError::VersionConflict { .. } => {
                Self::Conflict(err.to_string())
            }
            StoreError::Unavailable(msg) => Self::Unavailable(msg),
            StoreError::Backend(msg) => Self::Internal(msg),
        }
    }
}

impl From<CatalogError> for LifecycleError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound { kind, id } => Self::NotFound { kind, id },
            CatalogError::Validation(v) => Self::Validation(v.to_string()),
            CatalogError::Unavailable(msg) => Self::Unavailable(msg),
            CatalogError::Storage(msg) => Self::Internal(msg),
        }
    }
}
