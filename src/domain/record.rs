//! Flat time-series records and their cell values
//!
//! Queries return rows shaped `(field.., year, week, value)`. A [`FlatRecord`]
//! is the same row with the year and week folded into a [`YearWeek`], ready
//! for pivoting. A [`SpanRecord`] applies one value to every week of a date
//! span and explodes into flat records.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::range::{weeks_between_dates, WeekRange};
use super::week::{WeekError, YearWeek};

#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("Row has {0} columns; at least year, week and value are required")]
    TooShort(usize),

    #[error("Column {column} must be an integer {name}, got '{value}'")]
    NotAnInteger {
        column: usize,
        name: &'static str,
        value: String,
    },

    #[error(transparent)]
    Week(#[from] WeekError),
}

/// A single value in a record or pivot cell
///
/// `Empty` marks an absent value (SQL NULL, or a week with no record).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Empty,
    Integer(i64),
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    /// Empty cells and empty strings hold nothing
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.is_empty(),
            Cell::Integer(_) | Cell::Number(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Integer(i) => Some(*i),
            Cell::Number(n) if n.fract() == 0.0 => Some(*n as i64),
            Cell::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Numeric value, with blanks and non-numeric text counting as zero
    pub fn float_or_zero(&self) -> f64 {
        match self.to_number() {
            Cell::Number(n) => n,
            _ => 0.0,
        }
    }

    /// Numeric view of the cell; text that does not parse becomes `Empty`
    pub fn to_number(&self) -> Cell {
        match self {
            Cell::Integer(i) => Cell::Number(*i as f64),
            Cell::Number(n) => Cell::Number(*n),
            Cell::Text(s) => s.trim().parse().map(Cell::Number).unwrap_or(Cell::Empty),
            Cell::Empty => Cell::Empty,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Integer(i) => write!(f, "{}", i),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<i64> for Cell {
    fn from(i: i64) -> Self {
        Cell::Integer(i)
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Empty)
    }
}

/// A row of leading fields, the week it applies to, and a trailing value
///
/// How many leading fields identify a pivot row is decided by the pivot, not
/// by the record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatRecord {
    pub fields: Vec<Cell>,
    pub week: YearWeek,
    pub value: Cell,
}

impl FlatRecord {
    pub fn new(fields: Vec<Cell>, week: YearWeek, value: impl Into<Cell>) -> Self {
        Self {
            fields,
            week,
            value: value.into(),
        }
    }

    /// Folds a raw query row `(field.., year, week, value)` into a record
    pub fn from_row(mut row: Vec<Cell>) -> Result<Self, RecordError> {
        let len = row.len();
        if len < 3 {
            return Err(RecordError::TooShort(len));
        }

        let value = row.pop().unwrap_or_default();
        let week = integer_at(&row, len - 2, "week")?;
        let year = integer_at(&row, len - 3, "year")?;
        row.truncate(len - 3);

        let week = u32::try_from(week).map_err(|_| out_of_range(len - 2, "week", week))?;
        let year = i32::try_from(year).map_err(|_| out_of_range(len - 3, "year", year))?;

        Ok(Self {
            fields: row,
            week: YearWeek::new(year, week)?,
            value,
        })
    }

    /// Same record with the value converted to a number (or `Empty`)
    pub fn numeric(mut self) -> Self {
        self.value = self.value.to_number();
        self
    }

    /// Back to a raw row `(field.., year, week, value)`
    pub fn into_row(self) -> Vec<Cell> {
        let mut row = self.fields;
        row.push(Cell::Integer(self.week.year().into()));
        row.push(Cell::Integer(self.week.week().into()));
        row.push(self.value);
        row
    }
}

/// A row whose value holds for every week from `start` to `end`
#[derive(Debug, Clone, PartialEq)]
pub struct SpanRecord {
    pub fields: Vec<Cell>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub value: Cell,
}

impl SpanRecord {
    pub fn new(fields: Vec<Cell>, start: NaiveDate, end: NaiveDate, value: impl Into<Cell>) -> Self {
        Self {
            fields,
            start,
            end,
            value: value.into(),
        }
    }

    /// Weeks the span covers, see [`weeks_between_dates`]
    pub fn weeks(&self) -> Vec<YearWeek> {
        weeks_between_dates(self.start, self.end)
    }

    /// One flat record per covered week inside `range`
    pub fn explode(&self, range: &WeekRange) -> Vec<FlatRecord> {
        self.weeks()
            .into_iter()
            .filter(|week| range.contains(*week))
            .map(|week| FlatRecord::new(self.fields.clone(), week, self.value.clone()))
            .collect()
    }
}

fn integer_at(row: &[Cell], column: usize, name: &'static str) -> Result<i64, RecordError> {
    row[column].as_i64().ok_or_else(|| RecordError::NotAnInteger {
        column,
        name,
        value: row[column].to_string(),
    })
}

fn out_of_range(column: usize, name: &'static str, value: i64) -> RecordError {
    RecordError::NotAnInteger {
        column,
        name,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_row_folds_year_and_week() {
        let row = vec![Cell::text("SBC Swap"), Cell::Integer(2016), Cell::Integer(4), Cell::Number(2.5)];
        let rec = FlatRecord::from_row(row).unwrap();
        assert_eq!(rec.fields, vec![Cell::text("SBC Swap")]);
        assert_eq!(rec.week, YearWeek::new(2016, 4).unwrap());
        assert_eq!(rec.value, Cell::Number(2.5));
    }

    #[test]
    fn from_row_keeps_null_value() {
        let row = vec![Cell::text("a"), Cell::text("b"), Cell::Integer(2015), Cell::Integer(53), Cell::Empty];
        let rec = FlatRecord::from_row(row).unwrap();
        assert_eq!(rec.fields.len(), 2);
        assert_eq!(rec.value, Cell::Empty);
    }

    #[test]
    fn from_row_rejects_short_rows() {
        assert_eq!(
            FlatRecord::from_row(vec![Cell::Integer(2016), Cell::Integer(1)]),
            Err(RecordError::TooShort(2))
        );
    }

    #[test]
    fn from_row_rejects_non_integer_week() {
        let row = vec![Cell::Integer(2016), Cell::text("x"), Cell::Empty];
        assert!(matches!(
            FlatRecord::from_row(row),
            Err(RecordError::NotAnInteger { name: "week", .. })
        ));
    }

    #[test]
    fn from_row_rejects_invalid_week() {
        let row = vec![Cell::Integer(2016), Cell::Integer(53), Cell::Empty];
        assert!(matches!(FlatRecord::from_row(row), Err(RecordError::Week(_))));
    }

    #[test]
    fn numeric_converts_value() {
        let week = YearWeek::new(2016, 1).unwrap();
        assert_eq!(FlatRecord::new(vec![], week, "2.5").numeric().value, Cell::Number(2.5));
        assert_eq!(FlatRecord::new(vec![], week, 40i64).numeric().value, Cell::Number(40.0));
        assert_eq!(FlatRecord::new(vec![], week, Cell::Empty).numeric().value, Cell::Empty);
        assert_eq!(FlatRecord::new(vec![], week, "n/a").numeric().value, Cell::Empty);
    }

    #[test]
    fn into_row_restores_year_and_week() {
        let row = vec![Cell::text("SBC Swap"), Cell::Integer(2015), Cell::Integer(53), Cell::Number(2.5)];
        assert_eq!(FlatRecord::from_row(row.clone()).unwrap().into_row(), row);
    }

    fn date(s: &str) -> NaiveDate {
        crate::domain::parse_date(s).unwrap()
    }

    fn span(host: &str, start: &str, end: &str, usage: &str) -> SpanRecord {
        SpanRecord::new(vec![Cell::text("MGW"), Cell::text(host)], date(start), date(end), usage)
    }

    #[test]
    fn span_explodes_into_weekly_records() {
        let range = crate::domain::validate(&Default::default(), "2015", "52", "2016", "2").unwrap();
        let records = span("EXT-GVTEMW1", "21-12-2015", "06-01-2016", "Training").explode(&range);

        let weeks: Vec<YearWeek> = records.iter().map(|r| r.week).collect();
        let expected: Vec<YearWeek> = [(2015, 52), (2015, 53), (2016, 1)]
            .into_iter()
            .map(|(y, w)| YearWeek::new(y, w).unwrap())
            .collect();
        assert_eq!(weeks, expected);
        assert!(records.iter().all(|r| r.value == Cell::text("Training")));
        assert!(records.iter().all(|r| r.fields.len() == 2));
    }

    #[test]
    fn span_explode_skips_weeks_outside_range() {
        let range = crate::domain::validate(&Default::default(), "2017", "1", "2017", "10").unwrap();
        let records = span("EXT-GVTEMW1", "26-12-2016", "04-01-2017", "Training").explode(&range);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].week, YearWeek::new(2017, 1).unwrap());
    }

    #[test]
    fn exploded_spans_pivot_across_new_year() {
        let range = crate::domain::validate(&Default::default(), "2016", "51", "2017", "2").unwrap();
        let spans = [
            span("EXT-GVTEMW1", "26-12-2016", "04-01-2017", "Training"),
            span("EXT-GVTEMW2", "19-12-2016", "19-12-2016", "Switched off"),
        ];
        let records: Vec<FlatRecord> = spans.iter().flat_map(|s| s.explode(&range)).collect();
        let matrix = crate::domain::pivot(&records, &range.expand(), 2).unwrap();

        assert_eq!(matrix.len(), 2);
        assert_eq!(
            matrix.rows()[0].cells,
            vec![Cell::Empty, Cell::text("Training"), Cell::text("Training"), Cell::Empty]
        );
        assert_eq!(
            matrix.rows()[1].cells,
            vec![Cell::text("Switched off"), Cell::Empty, Cell::Empty, Cell::Empty]
        );
        assert_eq!(matrix.dropped(), 0);
    }

    #[test]
    fn float_or_zero_defaults_blanks() {
        assert_eq!(Cell::Integer(40).float_or_zero(), 40.0);
        assert_eq!(Cell::text(" 7.5").float_or_zero(), 7.5);
        assert_eq!(Cell::Empty.float_or_zero(), 0.0);
        assert_eq!(Cell::text("n/a").float_or_zero(), 0.0);
    }

    #[test]
    fn blank_cells() {
        assert!(Cell::Empty.is_blank());
        assert!(Cell::text("").is_blank());
        assert!(!Cell::text("Training").is_blank());
        assert!(!Cell::Number(0.0).is_blank());
    }

    #[test]
    fn cell_json_is_untagged() {
        let cells = vec![Cell::Empty, Cell::Integer(3), Cell::Number(2.5), Cell::text("x")];
        assert_eq!(serde_json::to_string(&cells).unwrap(), r#"[null,3,2.5,"x"]"#);
    }
}
