//! Column header rendering for week series
//!
//! Reports label their week columns in one of three ways. Each style is a
//! plain function of a [`YearWeek`]; callers pick a style instead of building
//! strings themselves.

use serde::{Deserialize, Serialize};

use super::week::YearWeek;

/// How a week column is labelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum HeaderStyle {
    /// `11-2016`
    #[default]
    WeekYear,
    /// `2016-11`
    YearWeek,
    /// `yw_2016_11`
    Column,
}

impl HeaderStyle {
    pub fn format(self, week: YearWeek) -> String {
        match self {
            HeaderStyle::WeekYear => week_year_label(week),
            HeaderStyle::YearWeek => year_week_label(week),
            HeaderStyle::Column => column_name(week),
        }
    }
}

/// `"{week}-{year}"`
pub fn week_year_label(week: YearWeek) -> String {
    format!("{}-{}", week.week(), week.year())
}

/// `"{year}-{week}"`
pub fn year_week_label(week: YearWeek) -> String {
    format!("{}-{}", week.year(), week.week())
}

/// `"yw_{year}_{week}"`
pub fn column_name(week: YearWeek) -> String {
    format!("yw_{}_{}", week.year(), week.week())
}

/// Labels for every week of a series, in series order
pub fn headers(series: &[YearWeek], style: HeaderStyle) -> Vec<String> {
    series.iter().map(|w| style.format(*w)).collect()
}

/// Column lists for a SQL crosstab over a week series
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekColumns {
    /// `yw_2016_11, yw_2016_12`
    pub columns: String,
    /// `yw_2016_11 text, yw_2016_12 text`
    pub definitions: String,
    /// `(2016, 11), (2016, 12)`
    pub series: String,
}

pub fn week_columns(series: &[YearWeek]) -> WeekColumns {
    let names = headers(series, HeaderStyle::Column);

    WeekColumns {
        columns: names.join(", "),
        definitions: names
            .iter()
            .map(|n| format!("{} text", n))
            .collect::<Vec<_>>()
            .join(", "),
        series: series
            .iter()
            .map(|w| format!("({}, {})", w.year(), w.week()))
            .collect::<Vec<_>>()
            .join(", "),
    }
}
