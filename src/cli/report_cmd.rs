//! Report CLI commands

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};

use super::output::Output;
use crate::domain::{validate, Cell, FilterMode, WeekRange};
use crate::report::{element_report, human_report, Report};
use crate::storage::{Config, Project, TimeFilteredSource, UsageFile};

/// Start and end of the reported time window
#[derive(Args)]
pub struct RangeArgs {
    /// Start year
    pub start_year: String,
    /// Start week
    pub start_week: String,
    /// End year
    pub end_year: String,
    /// End week
    pub end_week: String,
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Weekly element usages per project
    Elements {
        #[command(flatten)]
        range: RangeArgs,

        /// Only usages of this project
        #[arg(long)]
        project: Option<String>,

        /// Narrow to conflicts (pcu) or weekly important usages (pwu)
        #[arg(long, value_enum)]
        filter: Option<FilterMode>,

        /// Read usages from a JSONL file instead of the database
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Weekly hours per employee and project, with availability when no project is given
    Hours {
        #[command(flatten)]
        range: RangeArgs,

        /// Only hours of this project
        #[arg(long)]
        project: Option<String>,

        /// Read usages from a JSONL file instead of the database
        #[arg(long)]
        input: Option<PathBuf>,
    },
}

pub fn run(cmd: ReportCommands, output: &Output) -> Result<()> {
    match cmd {
        ReportCommands::Elements {
            range,
            project,
            filter,
            input,
        } => elements(output, &range, project.as_deref(), filter, input),
        ReportCommands::Hours {
            range,
            project,
            input,
        } => hours(output, &range, project.as_deref(), input),
    }
}

/// Where report rows come from
enum Source {
    File(PathBuf),
    Store(Project),
}

impl Source {
    fn resolve(input: Option<PathBuf>) -> Result<(Source, Config)> {
        match input {
            Some(path) => Ok((Source::File(path), Config::load()?)),
            None => {
                let project = Project::open_current()?;
                let config = project.config().clone();
                Ok((Source::Store(project), config))
            }
        }
    }

    /// Runs `query` against the source and releases it before returning
    fn fetch<F>(&self, output: &Output, query: F) -> Result<Vec<Vec<Cell>>>
    where
        F: Fn(&dyn TimeFilteredSource) -> Result<Vec<Vec<Cell>>>,
    {
        match self {
            Source::File(path) => {
                output.verbose_ctx("report", &format!("Reading usages from {}", path.display()));
                let rows = UsageFile::new(path).read_all()?;
                query(&rows)
            }
            Source::Store(project) => {
                let store = project.existing_store()?;
                output.verbose_ctx("report", &format!("Querying {}", store.path().display()));
                query(&store)
            }
        }
    }
}

fn validated(config: &Config, args: &RangeArgs) -> Result<WeekRange> {
    let range = validate(
        &config.project.calendar(),
        &args.start_year,
        &args.start_week,
        &args.end_year,
        &args.end_week,
    )?;
    Ok(range)
}

fn elements(
    output: &Output,
    args: &RangeArgs,
    project: Option<&str>,
    filter: Option<FilterMode>,
    input: Option<PathBuf>,
) -> Result<()> {
    let (source, config) = Source::resolve(input)?;
    let range = validated(&config, args)?;

    let rows = source.fetch(output, |s| s.element_usages(&range, project))?;
    output.verbose_ctx("report", &format!("Fetched {} element usages", rows.len()));

    let policy = config.project.policy();
    let report = element_report(rows, &range, filter.map(|mode| (mode, &policy)))?;
    render(output, &report);
    Ok(())
}

fn hours(output: &Output, args: &RangeArgs, project: Option<&str>, input: Option<PathBuf>) -> Result<()> {
    let (source, config) = Source::resolve(input)?;
    let range = validated(&config, args)?;

    let rows = source.fetch(output, |s| s.human_usages(&range, project))?;
    output.verbose_ctx("report", &format!("Fetched {} human usages", rows.len()));

    // Available and difference rows only make sense across all projects
    let availability = config.project.availability();
    let report = human_report(rows, &range, project.is_none().then_some(&availability))?;
    render(output, &report);
    Ok(())
}

fn render(output: &Output, report: &Report) {
    if output.is_json() {
        output.data(report);
        return;
    }

    output.table(&report.columns, &report.rows);
    println!("{}", report.message);

    if report.matrix.dropped() > 0 {
        output.verbose_ctx(
            "report",
            &format!("{} usages fell outside {}", report.matrix.dropped(), report.range),
        );
    }
}
