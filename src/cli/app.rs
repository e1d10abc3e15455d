//! Main CLI application structure

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::output::{Output, OutputFormat};
use super::{db_cmd, report_cmd, weeks};
use crate::domain::HeaderStyle;
use crate::storage::{Config, Project};

#[derive(Parser)]
#[command(name = "ipit")]
#[command(author, version, about = "Week-indexed resource planning reports")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config, then text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new ipit project
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,
    },

    /// List the ISO weeks of a range
    Weeks {
        /// Start year
        start_year: String,
        /// Start week
        start_week: String,
        /// End year
        end_year: String,
        /// End week
        end_week: String,

        /// Week label style
        #[arg(long, value_enum, default_value = "week-year")]
        style: HeaderStyle,
    },

    /// Week range covering two dates (dd-mm-yyyy)
    WeeksBetween {
        start: String,
        end: String,
    },

    /// Number of ISO weeks in a year
    LastWeek {
        year: i32,
    },

    /// Load usages from a JSONL file into the database
    Import {
        file: PathBuf,

        /// Remove existing usages first
        #[arg(long)]
        replace: bool,
    },

    /// Generate a pivoted usage report
    #[command(subcommand)]
    Report(report_cmd::ReportCommands),

    /// Manage the usage database
    #[command(subcommand)]
    Db(db_cmd::DbCommands),
}

/// Installs the stderr log subscriber; `RUST_LOG` overrides the level
fn init_tracing(verbose: bool) {
    let default = if verbose { "ipit=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A subscriber may already be set when running inside tests
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn resolve_format(flag: Option<OutputFormat>) -> Result<OutputFormat> {
    match flag {
        Some(format) => Ok(format),
        None => Ok(Config::load_global()?.default_format.into()),
    }
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output = Output::new(resolve_format(cli.format)?, cli.verbose);
    output.verbose("ipit starting");

    match cli.command {
        Commands::Init { path } => {
            output.verbose_ctx("init", &format!("Initializing project at: {}", path));
            let project = Project::init(&path)?;
            output.verbose_ctx(
                "init",
                &format!("Created .ipit directory at: {}", project.ipit_dir().display()),
            );
            output.success(&format!("Initialized ipit project at {}", project.root().display()));
        }

        Commands::Weeks {
            start_year,
            start_week,
            end_year,
            end_week,
            style,
        } => weeks::weeks(&output, &start_year, &start_week, &end_year, &end_week, style)?,

        Commands::WeeksBetween { start, end } => weeks::weeks_between(&output, &start, &end)?,

        Commands::LastWeek { year } => weeks::last_week(&output, year)?,

        Commands::Import { file, replace } => db_cmd::import(&output, &file, replace)?,

        Commands::Report(cmd) => report_cmd::run(cmd, &output)?,

        Commands::Db(cmd) => db_cmd::run(cmd, &output)?,
    }

    output.verbose("Command completed successfully");
    Ok(())
}
