//! Catalog error types.

use grievance_core::ValidationError;
use thiserror::Error;

/// Errors arising from template catalog operations.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// A referenced agreement or bargaining unit does not exist in the
    /// caller's organization. Records owned by other organizations are
    /// reported the same way.
    #[error("{kind} {id} not found")]
    NotFound {
        /// The record kind ("agreement", "bargaining unit").
        kind: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// Template input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The backing store could not be reached.
    #[error("catalog storage unavailable: {0}")]
    Unavailable(String),

    /// The backing store returned an unexpected error or malformed data.
    #[error("catalog storage error: {0}")]
    Storage(String),
}
