//! ISO-8601 week arithmetic
//!
//! Weeks start on Monday and belong to the year that contains their Thursday.
//! A year therefore has either 52 or 53 ISO weeks.
//!
//! [`YearWeek`] is the value type used everywhere a week is a key: as a pivot
//! column, as a query bound, or as a header label. [`IsoCalendar`] adds the
//! configured range of years the planning database accepts.

use std::fmt;
use std::ops::RangeInclusive;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WeekError {
    #[error("Week {week} is not a valid ISO week of {year} (1..={last})")]
    InvalidWeek { year: i32, week: u32, last: u32 },

    #[error("Year {year} is outside the valid range {first}..={last}")]
    YearOutOfRange { year: i32, first: i32, last: i32 },

    #[error("Invalid time range: {start} .. {end}")]
    InvalidTime { start: String, end: String },

    #[error("Invalid date '{0}': expected dd-mm-yyyy")]
    UnparsableDate(String),
}

/// Returns the number of ISO weeks in `year` (52 or 53).
///
/// December 31 is looked at first. When it already belongs to week 1 of the
/// next year, December 24 is used instead, which always falls in the last
/// week of `year` itself.
pub fn last_week(year: i32) -> u32 {
    let week_of = |day| NaiveDate::from_ymd_opt(year, 12, day).map(|d| d.iso_week().week());

    match week_of(31) {
        Some(1) => week_of(24).unwrap_or(52),
        Some(week) => week,
        // Outside chrono's representable range
        None => 52,
    }
}

/// An ISO (year, week) pair
///
/// Ordering is lexicographic by year, then week. Values are only built through
/// [`YearWeek::new`] or [`YearWeek::from_date`], so `week` is always within
/// `1..=last_week(year)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct YearWeek {
    year: i32,
    week: u32,
}

impl YearWeek {
    /// Creates a year-week, checking the week against the ISO week count of the year
    pub fn new(year: i32, week: u32) -> Result<Self, WeekError> {
        let last = last_week(year);
        if week < 1 || week > last {
            return Err(WeekError::InvalidWeek { year, week, last });
        }
        Ok(Self { year, week })
    }

    /// ISO year and week of a calendar date
    pub fn from_date(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn week(&self) -> u32 {
        self.week
    }

    /// The following ISO week, rolling over into week 1 of the next year
    pub fn next(&self) -> Self {
        if self.week >= last_week(self.year) {
            Self {
                year: self.year + 1,
                week: 1,
            }
        } else {
            Self {
                year: self.year,
                week: self.week + 1,
            }
        }
    }
}

impl fmt::Display for YearWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

/// ISO week calendar bounded to the years the planning data covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsoCalendar {
    valid_years: RangeInclusive<i32>,
}

impl Default for IsoCalendar {
    fn default() -> Self {
        Self::new(2014..=2019)
    }
}

impl IsoCalendar {
    pub fn new(valid_years: RangeInclusive<i32>) -> Self {
        Self { valid_years }
    }

    pub fn first_year(&self) -> i32 {
        *self.valid_years.start()
    }

    pub fn last_year(&self) -> i32 {
        *self.valid_years.end()
    }

    pub fn contains_year(&self, year: i32) -> bool {
        self.valid_years.contains(&year)
    }

    /// Number of ISO weeks in `year`
    pub fn last_week(&self, year: i32) -> u32 {
        last_week(year)
    }

    /// Checks a (year, week) pair against the calendar bounds and the year's week count
    pub fn validate_year_week(&self, year: i32, week: u32) -> Result<YearWeek, WeekError> {
        self.check_year(year)?;
        YearWeek::new(year, week)
    }

    pub(crate) fn check_year(&self, year: i32) -> Result<(), WeekError> {
        if self.contains_year(year) {
            Ok(())
        } else {
            Err(WeekError::YearOutOfRange {
                year,
                first: self.first_year(),
                last: self.last_year(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn last_week_of_known_years() {
        assert_eq!(last_week(2014), 52);
        assert_eq!(last_week(2015), 53);
        assert_eq!(last_week(2016), 52);
        assert_eq!(last_week(2019), 52);
        assert_eq!(last_week(2020), 53);
    }

    #[test]
    fn dec_31_in_next_years_first_week() {
        // 2014-12-31 is in 2015-W01
        assert_eq!(YearWeek::from_date(date(2014, 12, 31)), YearWeek::new(2015, 1).unwrap());
        assert_eq!(last_week(2014), 52);
    }

    #[test]
    fn jan_1_in_previous_years_last_week() {
        assert_eq!(YearWeek::from_date(date(2016, 1, 1)), YearWeek::new(2015, 53).unwrap());
        assert_eq!(YearWeek::from_date(date(2017, 1, 1)), YearWeek::new(2016, 52).unwrap());
    }

    #[test]
    fn new_rejects_out_of_range_weeks() {
        assert!(YearWeek::new(2016, 0).is_err());
        assert_eq!(
            YearWeek::new(2016, 53),
            Err(WeekError::InvalidWeek { year: 2016, week: 53, last: 52 })
        );
        assert!(YearWeek::new(2015, 53).is_ok());
    }

    #[test]
    fn ordering_is_year_then_week() {
        let a = YearWeek::new(2015, 53).unwrap();
        let b = YearWeek::new(2016, 1).unwrap();
        let c = YearWeek::new(2016, 2).unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn next_rolls_over_year() {
        assert_eq!(YearWeek::new(2015, 53).unwrap().next(), YearWeek::new(2016, 1).unwrap());
        assert_eq!(YearWeek::new(2014, 52).unwrap().next(), YearWeek::new(2015, 1).unwrap());
        assert_eq!(YearWeek::new(2016, 10).unwrap().next(), YearWeek::new(2016, 11).unwrap());
    }

    #[test]
    fn display_format() {
        assert_eq!(YearWeek::new(2016, 3).unwrap().to_string(), "2016-W03");
    }

    #[test]
    fn calendar_validates_year_bounds() {
        let cal = IsoCalendar::default();
        assert!(cal.validate_year_week(2016, 7).is_ok());
        assert_eq!(
            cal.validate_year_week(2040, 7),
            Err(WeekError::YearOutOfRange { year: 2040, first: 2014, last: 2019 })
        );
        assert!(cal.validate_year_week(2016, 54).is_err());
    }

    #[test]
    fn calendar_bounds_are_configurable() {
        let cal = IsoCalendar::new(2020..=2030);
        assert!(cal.validate_year_week(2020, 53).is_ok());
        assert!(cal.validate_year_week(2016, 1).is_err());
    }

    proptest! {
        #[test]
        fn last_week_is_52_or_53(year in 2014i32..=2019) {
            let w = last_week(year);
            prop_assert!(w == 52 || w == 53);
            prop_assert_eq!(w, last_week(year));
        }

        #[test]
        fn last_week_matches_dec_28(year in 1900i32..=2200) {
            // Dec 28 always lies in the last ISO week of its year
            let expected = NaiveDate::from_ymd_opt(year, 12, 28).unwrap().iso_week().week();
            prop_assert_eq!(last_week(year), expected);
        }
    }
}
