//! Usage database CLI commands (import, db status, db export)

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Subcommand;

use super::output::Output;
use crate::domain::IsoCalendar;
use crate::storage::{Project, UsageFile, UsageRow};

#[derive(Subcommand)]
pub enum DbCommands {
    /// Show database status
    Status,

    /// Write all stored usages to a JSONL file
    Export {
        /// Destination file
        file: PathBuf,
    },
}

pub fn run(cmd: DbCommands, output: &Output) -> Result<()> {
    match cmd {
        DbCommands::Status => status(output),
        DbCommands::Export { file } => export(output, &file),
    }
}

/// Loads a JSONL usage file into the project database
pub fn import(output: &Output, file: &Path, replace: bool) -> Result<()> {
    let project = Project::open_current()?;
    let rows = UsageFile::new(file).read_all()?;
    output.verbose_ctx("import", &format!("Read {} usages from {}", rows.len(), file.display()));

    let calendar = project.config().project.calendar();
    let invalid = invalid_rows(&calendar, &rows);
    if let Some((line, year, week)) = invalid.first() {
        anyhow::bail!(
            "{} usages have an invalid week; first is {}-{} (usage {})",
            invalid.len(),
            year,
            week,
            line
        );
    }

    let start = std::time::Instant::now();
    let mut store = project.store()?;
    if replace {
        output.verbose_ctx("import", "Clearing existing usages");
        store.clear()?;
    }
    let counts = store.import(&rows)?;
    let duration = start.elapsed();

    if output.is_json() {
        output.data(&serde_json::json!({
            "imported": counts.total(),
            "element_usages": counts.element_usages,
            "human_usages": counts.human_usages,
            "duration_ms": duration.as_millis(),
        }));
    } else {
        output.success(&format!(
            "Imported {} usages ({} element, {} human) in {:?}",
            counts.total(),
            counts.element_usages,
            counts.human_usages,
            duration
        ));
    }

    Ok(())
}

/// First week the calendar rejects in each row, with the row's 1-based position
fn invalid_rows(calendar: &IsoCalendar, rows: &[UsageRow]) -> Vec<(usize, i32, u32)> {
    rows.iter()
        .enumerate()
        .filter_map(|(i, row)| {
            row.weeks()
                .into_iter()
                .find(|&(year, week)| calendar.validate_year_week(year, week).is_err())
                .map(|(year, week)| (i + 1, year, week))
        })
        .collect()
}

fn status(output: &Output) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.existing_store()?;
    let status = store.status()?;

    if output.is_json() {
        output.data(&status);
    } else {
        println!("Usage Database");
        println!("{}", "=".repeat(40));
        println!("Path: {}", status.path.display());
        println!("Schema version: {}", status.schema_version);
        println!();
        println!("Stored Usages:");
        println!("  Element usages: {}", status.element_usages);
        println!("  Human usages: {}", status.human_usages);

        if status.element_usages + status.human_usages == 0 {
            println!();
            println!("Run 'ipit import <file>' to load usages.");
        }
    }

    Ok(())
}

fn export(output: &Output, file: &Path) -> Result<()> {
    let project = Project::open_current()?;
    let rows = project.existing_store()?.all_rows()?;

    UsageFile::new(file).write_all(&rows)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "exported": rows.len(),
            "path": file.display().to_string(),
        }));
    } else {
        output.success(&format!("Exported {} usages to {}", rows.len(), file.display()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parse_date;
    use crate::storage::{ElementSpan, HumanUsage};

    fn human(year: i32, week: u32) -> UsageRow {
        UsageRow::Human(HumanUsage {
            department: None,
            employee: "a".into(),
            project: "p".into(),
            role: "r".into(),
            personnel_type: None,
            note: None,
            year,
            week,
            hours: 1.0,
        })
    }

    fn span(start: &str, end: &str) -> UsageRow {
        UsageRow::ElementSpan(ElementSpan {
            manager: None,
            node: "MGW".into(),
            hostname: "EXT-GVTEMW1".into(),
            project: "VoLTE".into(),
            note: None,
            start: parse_date(start).unwrap(),
            end: parse_date(end).unwrap(),
            usage: "Training".into(),
        })
    }

    #[test]
    fn finds_invalid_weeks() {
        let rows = vec![human(2016, 1), human(2016, 53), human(2013, 5), human(2015, 53)];
        let invalid = invalid_rows(&IsoCalendar::default(), &rows);
        assert_eq!(invalid, vec![(2, 2016, 53), (3, 2013, 5)]);
    }

    #[test]
    fn spans_are_checked_week_by_week() {
        let rows = vec![span("21-12-2015", "06-01-2016"), span("22-12-2019", "08-01-2020")];
        let invalid = invalid_rows(&IsoCalendar::default(), &rows);
        assert_eq!(invalid, vec![(2, 2020, 1)]);
    }
}
