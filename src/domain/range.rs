//! Week ranges and their expansion into week series
//!
//! A [`WeekRange`] can only be obtained through validation, so holding one
//! means `start <= end` and both endpoints lie inside the calendar's years.
//! Expanding it yields every ISO week between the endpoints, inclusive,
//! across year boundaries.
//!
//! User input arrives as four strings (start year, start week, end year,
//! end week). [`validate`] checks them field by field and reports one message
//! per failing field so a form can show the hint next to the right input.

use std::fmt;
use std::iter::FusedIterator;

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;
use thiserror::Error;

use super::week::{IsoCalendar, WeekError, YearWeek};

const EMPTY_HINT: &str = "This field can't be empty.";
const NON_DIGITS_HINT: &str = "Please only type digits.";

/// Shared by both week fields, so a start week of 0 reads "End week ..." too
fn week_low_hint(low: impl fmt::Display) -> String {
    format!("End week number starts from {}.", low)
}

/// Input field a validation message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    StartYear,
    StartWeek,
    EndYear,
    EndWeek,
    Year,
    Week,
}

impl Field {
    pub fn label(&self) -> &'static str {
        match self {
            Field::StartYear => "start year",
            Field::StartWeek => "start week",
            Field::EndYear => "end year",
            Field::EndWeek => "end week",
            Field::Year => "year",
            Field::Week => "week",
        }
    }
}

/// A message attached to one input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

/// User input that does not describe a usable week or week range
#[derive(Debug, Clone, Default, PartialEq, Eq, Error, Serialize)]
#[error("{}", self.summary())]
pub struct RangeValidationError {
    errors: Vec<FieldError>,
}

impl RangeValidationError {
    fn push(&mut self, field: Field, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    fn single(field: Field, message: impl Into<String>) -> Self {
        let mut err = Self::default();
        err.push(field, message);
        err
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Message for a field, or an empty string when the field is fine
    pub fn message_for(&self, field: Field) -> &str {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
            .unwrap_or("")
    }

    fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.field.label(), e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// A validated, non-empty span of ISO weeks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct WeekRange {
    start: YearWeek,
    end: YearWeek,
}

impl WeekRange {
    /// Builds a range from two endpoints, failing when `end` precedes `start`
    pub fn new(start: YearWeek, end: YearWeek) -> Result<Self, WeekError> {
        if end < start {
            return Err(WeekError::InvalidTime {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> YearWeek {
        self.start
    }

    pub fn end(&self) -> YearWeek {
        self.end
    }

    pub fn is_single_year(&self) -> bool {
        self.start.year() == self.end.year()
    }

    /// True when `week` lies inside the range (same predicate the query layer applies)
    pub fn contains(&self, week: YearWeek) -> bool {
        self.start <= week && week <= self.end
    }

    /// Number of weeks in the range
    pub fn len(&self) -> usize {
        let (start, end) = (self.start, self.end);
        if start.year() == end.year() {
            return (end.week() - start.week() + 1) as usize;
        }

        let head = super::week::last_week(start.year()) - start.week() + 1;
        let middle: u32 = (start.year() + 1..end.year())
            .map(super::week::last_week)
            .sum();
        (head + middle + end.week()) as usize
    }

    /// Always false; a range holds at least one week
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterates the weeks of the range in ascending order
    pub fn iter(&self) -> Weeks {
        Weeks {
            next: Some(self.start),
            end: self.end,
        }
    }

    /// The ordered, gapless week series of the range
    pub fn expand(&self) -> Vec<YearWeek> {
        self.iter().collect()
    }

    /// Start and end as the four integers the query layer takes
    pub fn time_line(&self) -> TimeLine {
        TimeLine {
            start_year: self.start.year(),
            start_week: self.start.week(),
            end_year: self.end.year(),
            end_week: self.end.week(),
        }
    }
}

impl fmt::Display for WeekRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} .. {}", self.start, self.end)
    }
}

impl IntoIterator for &WeekRange {
    type Item = YearWeek;
    type IntoIter = Weeks;

    fn into_iter(self) -> Weeks {
        self.iter()
    }
}

/// Iterator over the weeks of a [`WeekRange`]
///
/// Call [`WeekRange::iter`] again to start over from the first week.
#[derive(Debug, Clone)]
pub struct Weeks {
    next: Option<YearWeek>,
    end: YearWeek,
}

impl Iterator for Weeks {
    type Item = YearWeek;

    fn next(&mut self) -> Option<YearWeek> {
        let current = self.next?;
        self.next = if current < self.end {
            Some(current.next())
        } else {
            None
        };
        Some(current)
    }
}

impl FusedIterator for Weeks {}

/// Four raw integers describing a time window, not yet validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeLine {
    pub start_year: i32,
    pub start_week: u32,
    pub end_year: i32,
    pub end_week: u32,
}

impl TimeLine {
    pub fn new(start_year: i32, start_week: u32, end_year: i32, end_week: u32) -> Self {
        Self {
            start_year,
            start_week,
            end_year,
            end_week,
        }
    }

    /// Checks the time line against the calendar and builds the range
    ///
    /// Every failure is [`WeekError::InvalidTime`]: callers reaching this point
    /// were expected to have validated the input already.
    pub fn to_range(&self, calendar: &IsoCalendar) -> Result<WeekRange, WeekError> {
        let invalid = || WeekError::InvalidTime {
            start: format!("{}-{}", self.start_year, self.start_week),
            end: format!("{}-{}", self.end_year, self.end_week),
        };

        let start = calendar
            .validate_year_week(self.start_year, self.start_week)
            .map_err(|_| invalid())?;
        let end = calendar
            .validate_year_week(self.end_year, self.end_week)
            .map_err(|_| invalid())?;
        WeekRange::new(start, end).map_err(|_| invalid())
    }
}

impl fmt::Display for TimeLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.start_year, self.start_week, self.end_year, self.end_week
        )
    }
}

/// Expands four raw integers into a week series
///
/// Unlike [`validate`], a bad time line here is a caller bug and is reported
/// as [`WeekError::InvalidTime`] rather than as per-field messages.
pub fn week_series(
    calendar: &IsoCalendar,
    start_year: i32,
    start_week: u32,
    end_year: i32,
    end_week: u32,
) -> Result<Vec<YearWeek>, WeekError> {
    let range = TimeLine::new(start_year, start_week, end_year, end_week).to_range(calendar)?;
    Ok(range.expand())
}

/// Validates a time line typed into a form
///
/// Fields are checked in order (start year, start week, end year, end week)
/// and checking stops at the first failing field.
pub fn validate(
    calendar: &IsoCalendar,
    start_year: &str,
    start_week: &str,
    end_year: &str,
    end_week: &str,
) -> Result<WeekRange, RangeValidationError> {
    let year_range_hint = |from: String| {
        format!("Only allow year between {} and {}.", from, calendar.last_year())
    };

    // Start year
    let sy = parse_digits(start_year)
        .map(to_year)
        .map_err(|m| RangeValidationError::single(Field::StartYear, m))?;
    if !calendar.contains_year(sy) {
        return Err(RangeValidationError::single(
            Field::StartYear,
            year_range_hint(calendar.first_year().to_string()),
        ));
    }

    // Start week
    let sw = parse_digits(start_week).map_err(|m| RangeValidationError::single(Field::StartWeek, m))?;
    let sw = check_week(sw, sy, 1, &week_low_hint(1))
        .map_err(|m| RangeValidationError::single(Field::StartWeek, m))?;

    // End year
    let ey = parse_digits(end_year).map_err(|m| RangeValidationError::single(Field::EndYear, m))?;
    if ey < sy as u64 || ey > calendar.last_year() as u64 {
        return Err(RangeValidationError::single(
            Field::EndYear,
            year_range_hint(format!("start year ({})", sy)),
        ));
    }
    let ey = to_year(ey);

    // End week
    let ew = parse_digits(end_week).map_err(|m| RangeValidationError::single(Field::EndWeek, m))?;
    if ew < 1 {
        return Err(RangeValidationError::single(Field::EndWeek, week_low_hint(1)));
    }
    if sy == ey && ew < sw as u64 {
        return Err(RangeValidationError::single(
            Field::EndWeek,
            week_low_hint(sw),
        ));
    }
    let ew = check_week(ew, ey, 1, &week_low_hint(1))
        .map_err(|m| RangeValidationError::single(Field::EndWeek, m))?;

    let start = YearWeek::new(sy, sw).map_err(|e| RangeValidationError::single(Field::StartWeek, e.to_string()))?;
    let end = YearWeek::new(ey, ew).map_err(|e| RangeValidationError::single(Field::EndWeek, e.to_string()))?;
    WeekRange::new(start, end).map_err(|e| RangeValidationError::single(Field::EndWeek, e.to_string()))
}

/// Validates a single year/week pair typed into a form
///
/// Both fields are checked for emptiness first, so an empty year and an
/// empty week are reported together.
pub fn validate_year_week(
    calendar: &IsoCalendar,
    year: &str,
    week: &str,
) -> Result<YearWeek, RangeValidationError> {
    let mut errors = RangeValidationError::default();
    if year.trim().is_empty() {
        errors.push(Field::Year, "Year can't be empty.");
    }
    if week.trim().is_empty() {
        errors.push(Field::Week, "Week number can't be empty.");
    }
    if !errors.errors.is_empty() {
        return Err(errors);
    }

    let year: i32 = year.trim().parse().map_err(|_| {
        RangeValidationError::single(Field::Year, "Please type year with only digits.")
    })?;
    let week: u32 = week.trim().parse().map_err(|_| {
        RangeValidationError::single(Field::Week, "Please type week with only digits.")
    })?;

    if !calendar.contains_year(year) {
        return Err(RangeValidationError::single(
            Field::Year,
            format!(
                "The year must be between {} and {}",
                calendar.first_year(),
                calendar.last_year()
            ),
        ));
    }

    YearWeek::new(year, week).map_err(|_| {
        RangeValidationError::single(
            Field::Week,
            format!(
                "The week for year {} must be > 1 and < {}",
                year,
                calendar.last_week(year)
            ),
        )
    })
}

/// Week numbers for a pair of calendar dates
///
/// The years are the calendar years of the dates. Weeks are ISO weeks with
/// two boundary corrections: January 1 or 2 landing in week 52/53 of the
/// previous ISO year takes the week of January 8 instead, and December 31
/// landing in week 1 of the next ISO year takes the week of December 24.
pub fn expand_from_dates(start: NaiveDate, end: NaiveDate) -> TimeLine {
    TimeLine {
        start_year: start.year(),
        start_week: corrected_week(start),
        end_year: end.year(),
        end_week: corrected_week(end),
    }
}

/// ISO weeks covered by a date span, stepping a week at a time from `start`
///
/// When the last step lands in a lower week number than `end`, the week of
/// `end` is appended. Only week numbers are compared, so a span whose last
/// step falls in week 52 or 53 does not get the following week 1 appended.
/// A span with `start > end` covers nothing.
pub fn weeks_between_dates(start: NaiveDate, end: NaiveDate) -> Vec<YearWeek> {
    let mut weeks: Vec<YearWeek> =
        std::iter::successors(Some(start), |d| d.checked_add_days(Days::new(7)))
            .take_while(|d| *d <= end)
            .map(YearWeek::from_date)
            .collect();

    let last = YearWeek::from_date(end);
    if weeks.last().is_some_and(|w| w.week() < last.week()) {
        weeks.push(last);
    }
    weeks
}

/// Parses a `dd-mm-yyyy` date
pub fn parse_date(s: &str) -> Result<NaiveDate, WeekError> {
    NaiveDate::parse_from_str(s.trim(), "%d-%m-%Y")
        .map_err(|_| WeekError::UnparsableDate(s.to_string()))
}

fn corrected_week(date: NaiveDate) -> u32 {
    let week = date.iso_week().week();
    let week_of = |month, day| {
        NaiveDate::from_ymd_opt(date.year(), month, day)
            .map(|d| d.iso_week().week())
            .unwrap_or(week)
    };

    match (date.month(), date.day()) {
        (1, 1 | 2) if week >= 52 => week_of(1, 8),
        (12, 31) if week == 1 => week_of(12, 24),
        _ => week,
    }
}

fn parse_digits(input: &str) -> Result<u64, &'static str> {
    let input = input.trim();
    if input.is_empty() {
        return Err(EMPTY_HINT);
    }
    if !input.chars().all(|c| c.is_ascii_digit()) {
        return Err(NON_DIGITS_HINT);
    }
    // Digits only; overflow saturates so range checks reject it
    Ok(input.parse().unwrap_or(u64::MAX))
}

fn to_year(value: u64) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn check_week(week: u64, year: i32, low: u64, low_hint: &str) -> Result<u32, String> {
    if week < low {
        return Err(low_hint.to_string());
    }
    let last = super::week::last_week(year);
    if week > last as u64 {
        return Err(format!("Week number for year {} must <= {}.", year, last));
    }
    Ok(week as u32)
}
