//! # API Route Modules
//!
//! | Prefix                             | Module          |
//! |------------------------------------|-----------------|
//! | `/v1/grievances/*`                 | [`grievances`]  |
//! | `/v1/events`                       | [`events`]      |
//! | `/v1/agreements/:id/templates/*`   | [`templates`]   |
//! | `/v1/analytics/*`                  | [`analytics`]   |

pub mod analytics;
pub mod events;
pub mod grievances;
pub mod templates;

use std::str::FromStr;

use grievance_core::ValidationError;

use crate::error::AppError;

/// Parse a wire string into a domain enum, reporting failures as 422.
pub(crate) fn parse_field<T>(value: &str) -> Result<T, AppError>
where
    T: FromStr<Err = ValidationError>,
{
    value.parse::<T>().map_err(AppError::from)
}

/// Parse an optional wire string.
pub(crate) fn parse_optional<T>(value: Option<&str>) -> Result<Option<T>, AppError>
where
    T: FromStr<Err = ValidationError>,
{
    value.map(parse_field).transpose()
}
