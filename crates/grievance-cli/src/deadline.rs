//! # Deadline Subcommands
//!
//! `due-date` and `elapsed` expose the step-deadline arithmetic used by the
//! lifecycle engine and analytics, so agreement time limits can be checked
//! by hand.

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use grievance_core::{compute_due_date, elapsed, DayCount};

/// Arguments for `grievance due-date`.
#[derive(Args, Debug)]
pub struct DueDateArgs {
    /// Date the step started (YYYY-MM-DD).
    #[arg(long)]
    pub start: NaiveDate,

    /// Time limit in days.
    #[arg(long)]
    pub days: u32,

    /// Count calendar days instead of business days.
    #[arg(long)]
    pub calendar: bool,
}

/// Arguments for `grievance elapsed`.
#[derive(Args, Debug)]
pub struct ElapsedArgs {
    /// Start date (YYYY-MM-DD), exclusive.
    #[arg(long)]
    pub start: NaiveDate,

    /// End date (YYYY-MM-DD), inclusive.
    #[arg(long)]
    pub end: NaiveDate,

    /// Count calendar days instead of business days.
    #[arg(long)]
    pub calendar: bool,
}

fn unit(day_count: DayCount, n: i64) -> &'static str {
    match (day_count, n.abs() == 1) {
        (DayCount::Calendar, true) => "calendar day",
        (DayCount::Calendar, false) => "calendar days",
        (DayCount::Business, true) => "business day",
        (DayCount::Business, false) => "business days",
    }
}

/// One-line description of a due date computation.
pub fn describe_due_date(args: &DueDateArgs) -> String {
    let day_count = DayCount::from_calendar_flag(args.calendar);
    let due = compute_due_date(args.start, args.days, day_count);
    format!(
        "{due} ({} {} from {})",
        args.days,
        unit(day_count, i64::from(args.days)),
        args.start
    )
}

pub fn run_due_date(args: &DueDateArgs) -> Result<u8> {
    println!("{}", describe_due_date(args));
    Ok(0)
}

pub fn run_elapsed(args: &ElapsedArgs) -> Result<u8> {
    let day_count = DayCount::from_calendar_flag(args.calendar);
    let days = elapsed(args.start, args.end, day_count);
    println!("{days} {}", unit(day_count, days));
    Ok(0)
}
