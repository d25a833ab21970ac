//! # Temporal Types
//!
//! Inclusive UTC date ranges used as report and query filters, and the
//! [`Clock`] abstraction through which every component reads "now".
//! Injecting the clock keeps deadline and overdue computations
//! deterministic under test.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// -- Date Range ---------------------------------------------------------------

/// Optional inclusive bounds on a UTC calendar date.
///
/// An absent bound is open. `{from: None, to: None}` matches every date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<NaiveDate>,
}

impl DateRange {
    /// Build a range, rejecting `from > to`.
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Self, ValidationError> {
        if let (Some(f), Some(t)) = (from, to) {
            if f > t {
                return Err(ValidationError::InvalidDateRange {
                    from: f.to_string(),
                    to: t.to_string(),
                });
            }
        }
        Ok(Self { from, to })
    }

    /// A range with no bounds.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Whether `date` lies within the range, both ends inclusive.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |f| date >= f) && self.to.map_or(true, |t| date <= t)
    }

    /// Whether the UTC date of `ts` lies within the range.
    pub fn contains_timestamp(&self, ts: DateTime<Utc>) -> bool {
        self.contains(ts.date_naive())
    }
}

// -- Clock --------------------------------------------------------------------

/// Source of the current time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(now)),
        }
    }

    /// Pin the clock to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.write();
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}
