//! Week calendar commands (weeks, weeks-between, last-week)

use anyhow::{Context, Result};

use super::output::Output;
use crate::domain::{
    expand_from_dates, headers, last_week as iso_last_week, parse_date, validate,
    weeks_between_dates, HeaderStyle, IsoCalendar,
};
use crate::storage::Config;

/// Calendar bounds of the current project, or the defaults outside one
fn calendar(output: &Output) -> Result<IsoCalendar> {
    let config = Config::load()?;
    if let Some(root) = &config.project_root {
        output.verbose_ctx("calendar", &format!("Using config of {}", root.display()));
    }
    Ok(config.project.calendar())
}

/// Validates a range and prints its weeks
pub fn weeks(
    output: &Output,
    start_year: &str,
    start_week: &str,
    end_year: &str,
    end_week: &str,
    style: HeaderStyle,
) -> Result<()> {
    let cal = calendar(output)?;
    let range = validate(&cal, start_year, start_week, end_year, end_week)?;
    let series = range.expand();
    output.verbose_ctx("weeks", &format!("{} expands to {} weeks", range, series.len()));

    let labels = headers(&series, style);

    if output.is_json() {
        output.data(&serde_json::json!({
            "range": range.time_line(),
            "count": labels.len(),
            "weeks": labels,
        }));
    } else {
        for label in &labels {
            println!("{}", label);
        }
    }

    Ok(())
}

/// Converts two `dd-mm-yyyy` dates to a time line and prints its weeks
///
/// Also prints the weeks a usage planned over the same dates is stored under.
pub fn weeks_between(output: &Output, start: &str, end: &str) -> Result<()> {
    let start = parse_date(start)?;
    let end = parse_date(end)?;
    let time_line = expand_from_dates(start, end);

    let cal = calendar(output)?;
    let range = time_line
        .to_range(&cal)
        .with_context(|| format!("Dates {} and {} do not form a valid range", start, end))?;
    let labels = headers(&range.expand(), HeaderStyle::WeekYear);
    let span = headers(&weeks_between_dates(start, end), HeaderStyle::WeekYear);

    if output.is_json() {
        output.data(&serde_json::json!({
            "time_line": time_line,
            "count": labels.len(),
            "weeks": labels,
            "span_weeks": span,
        }));
    } else {
        println!("{}", time_line);
        println!("{} weeks: {}", labels.len(), labels.join(" "));
        println!("Span weeks: {}", span.join(" "));
    }

    Ok(())
}

/// Prints the number of ISO weeks in a year
pub fn last_week(output: &Output, year: i32) -> Result<()> {
    let last = iso_last_week(year);

    if output.is_json() {
        output.data(&serde_json::json!({
            "year": year,
            "last_week": last,
        }));
    } else {
        println!("{}", last);
    }

    Ok(())
}
