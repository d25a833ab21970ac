//! # grievance CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use grievance_cli::deadline::{run_due_date, run_elapsed, DueDateArgs, ElapsedArgs};
use grievance_cli::report::{run_report, ReportArgs};
use grievance_cli::templates::{run_templates, TemplatesArgs};

/// Grievance engine toolchain.
///
/// Step deadline arithmetic, legacy template migration, and offline
/// step-duration reports.
#[derive(Parser, Debug)]
#[command(name = "grievance", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Due date of a step from its start date and time limit.
    DueDate(DueDateArgs),

    /// Days elapsed between two dates.
    Elapsed(ElapsedArgs),

    /// Step template migration and timelines.
    Templates(TemplatesArgs),

    /// Step-duration reports over a snapshot file.
    Report(ReportArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity level. Logs go to stderr so
    // JSON output on stdout stays parseable.
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::DueDate(args) => run_due_date(&args),
        Commands::Elapsed(args) => run_elapsed(&args),
        Commands::Templates(args) => run_templates(&args),
        Commands::Report(args) => run_report(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
