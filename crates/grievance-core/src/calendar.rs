//! # Step Deadline Calculator
//!
//! Pure date arithmetic behind every step deadline and every duration in
//! the analytics reports.
//!
//! ## Day counting
//!
//! - **Calendar days**: plain date addition and subtraction.
//! - **Business days**: Saturdays and Sundays are skipped. There is no
//!   holiday calendar. The first weekday *after* the start date is business
//!   day 1, so a start on a weekend counts from the following Monday.
//!
//! ## Round trip
//!
//! For every start date and every `n`:
//!
//! ```text
//! elapsed(start, compute_due_date(start, n, dc), dc) == n
//! ```
//!
//! Business-day elapsed time counts the weekdays in the half-open interval
//! `(start, end]`, which is exactly the inverse of the addition above.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// How a step's time limit is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayCount {
    /// Every day counts.
    Calendar,
    /// Monday through Friday only.
    Business,
}

impl DayCount {
    /// Map the `is_calendar_days` flag carried by step templates.
    pub fn from_calendar_flag(is_calendar_days: bool) -> Self {
        if is_calendar_days {
            Self::Calendar
        } else {
            Self::Business
        }
    }

    pub fn is_calendar(&self) -> bool {
        matches!(self, Self::Calendar)
    }
}

/// Whether `date` is a weekday.
pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Reduce a timestamp to its UTC calendar date.
pub fn utc_date(ts: DateTime<Utc>) -> NaiveDate {
    ts.date_naive()
}

/// Compute the due date of a step that starts on `start` and allows
/// `time_limit_days` days counted per `day_count`.
///
/// A limit of zero means the step has no real deadline and yields `start`
/// unchanged. Results past the end of the representable date range saturate
/// at [`NaiveDate::MAX`].
pub fn compute_due_date(start: NaiveDate, time_limit_days: u32, day_count: DayCount) -> NaiveDate {
    if time_limit_days == 0 {
        return start;
    }
    match day_count {
        DayCount::Calendar => start
            .checked_add_days(Days::new(u64::from(time_limit_days)))
            .unwrap_or(NaiveDate::MAX),
        DayCount::Business => add_business_days(start, time_limit_days),
    }
}

/// Days elapsed from `start` to `end`, counted per `day_count`.
///
/// Negative when `end` precedes `start`.
pub fn elapsed(start: NaiveDate, end: NaiveDate, day_count: DayCount) -> i64 {
    match day_count {
        DayCount::Calendar => end.signed_duration_since(start).num_days(),
        DayCount::Business if end < start => -business_days_between(end, start),
        DayCount::Business => business_days_between(start, end),
    }
}

/// Add `n >= 1` business days.
///
/// Any seven consecutive days hold exactly five weekdays, so all but the
/// last 1..=5 business days are consumed as whole weeks. The remainder is
/// walked day by day, which guarantees the result lands on a weekday.
fn add_business_days(start: NaiveDate, n: u32) -> NaiveDate {
    let whole_weeks = (n - 1) / 5;
    let mut remaining = n - whole_weeks * 5;

    let Some(mut date) = start.checked_add_days(Days::new(u64::from(whole_weeks) * 7)) else {
        return NaiveDate::MAX;
    };

    while remaining > 0 {
        date = match date.succ_opt() {
            Some(next) => next,
            None => return NaiveDate::MAX,
        };
        if is_business_day(date) {
            remaining -= 1;
        }
    }
    date
}

/// Weekdays in `(start, end]`. Requires `start <= end`.
fn business_days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    let days = end.signed_duration_since(start).num_days();
    let whole_weeks = days / 7;
    let mut count = whole_weeks * 5;

    // whole_weeks * 7 <= days, so this never passes `end`.
    let mut date = start
        .checked_add_days(Days::new((whole_weeks * 7) as u64))
        .unwrap_or(end);

    while date < end {
        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
        if is_business_day(date) {
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn zero_days_returns_start_for_both_counts() {
        let start = d(2024, 3, 9); // Saturday
        assert_eq!(compute_due_date(start, 0, DayCount::Calendar), start);
        assert_eq!(compute_due_date(start, 0, DayCount::Business), start);
    }

    #[test]
    fn calendar_days_add_plainly() {
        assert_eq!(compute_due_date(d(2024, 2, 20), 10, DayCount::Calendar), d(2024, 3, 1));
    }

    #[test]
    fn ten_business_days_from_monday_is_two_weeks_later() {
        // Monday 2024-03-04 + 10 business days = Monday 2024-03-18.
        assert_eq!(compute_due_date(d(2024, 3, 4), 10, DayCount::Business), d(2024, 3, 18));
    }

    #[test]
    fn business_days_skip_the_weekend() {
        // Friday + 1 business day = Monday.
        assert_eq!(compute_due_date(d(2024, 3, 8), 1, DayCount::Business), d(2024, 3, 11));
        // Thursday + 3 business days = Tuesday.
        assert_eq!(compute_due_date(d(2024, 3, 7), 3, DayCount::Business), d(2024, 3, 12));
    }

    #[test]
    fn weekend_start_counts_from_monday() {
        // Saturday + 1 = Monday, Sunday + 5 = Friday.
        assert_eq!(compute_due_date(d(2024, 3, 9), 1, DayCount::Business), d(2024, 3, 11));
        assert_eq!(compute_due_date(d(2024, 3, 10), 5, DayCount::Business), d(2024, 3, 15));
    }

    #[test]
    fn elapsed_business_days_over_two_weeks() {
        assert_eq!(elapsed(d(2024, 3, 4), d(2024, 3, 18), DayCount::Business), 10);
        assert_eq!(elapsed(d(2024, 3, 4), d(2024, 3, 18), DayCount::Calendar), 14);
    }

    #[test]
    fn elapsed_is_negative_when_end_precedes_start() {
        assert_eq!(elapsed(d(2024, 3, 18), d(2024, 3, 4), DayCount::Business), -10);
        assert_eq!(elapsed(d(2024, 3, 18), d(2024, 3, 4), DayCount::Calendar), -14);
    }

    #[test]
    fn elapsed_over_weekend_only_is_zero() {
        // Friday -> Sunday contains no weekday in (Fri, Sun].
        assert_eq!(elapsed(d(2024, 3, 8), d(2024, 3, 10), DayCount::Business), 0);
    }

    #[test]
    fn utc_date_ignores_time_of_day() {
        let late = DateTime::parse_from_rfc3339("2024-03-04T23:59:59Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(utc_date(late), d(2024, 3, 4));
    }

    #[test]
    fn day_count_from_flag() {
        assert_eq!(DayCount::from_calendar_flag(true), DayCount::Calendar);
        assert_eq!(DayCount::from_calendar_flag(false), DayCount::Business);
        assert!(DayCount::Calendar.is_calendar());
    }
}
