//! Time-filtered row sources
//!
//! A report never sees how usages are stored. It asks a [`TimeFilteredSource`]
//! for the raw rows of a [`WeekRange`] and pivots whatever comes back.
//! [`TimeFilter`] is the one place where a range turns into a predicate, both
//! as SQL for the database and as an in-memory check.

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{Cell, SpanRecord, WeekRange, YearWeek};

/// One planned element usage for one week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementUsage {
    /// Test manager of the project, if the project has one
    #[serde(default)]
    pub manager: Option<String>,
    pub node: String,
    pub hostname: String,
    pub project: String,
    #[serde(default)]
    pub note: Option<String>,
    pub year: i32,
    pub week: u32,
    pub usage: String,
}

impl ElementUsage {
    /// `[manager, node, hostname, project, note, year, week, usage]`
    pub fn to_row(&self) -> Vec<Cell> {
        vec![
            self.manager.clone().into(),
            self.node.clone().into(),
            self.hostname.clone().into(),
            self.project.clone().into(),
            self.note.clone().into(),
            Cell::Integer(self.year.into()),
            Cell::Integer(self.week.into()),
            self.usage.clone().into(),
        ]
    }
}

/// An element usage planned from one date to another
///
/// Stored as one [`ElementUsage`] per week the span covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSpan {
    #[serde(default)]
    pub manager: Option<String>,
    pub node: String,
    pub hostname: String,
    pub project: String,
    #[serde(default)]
    pub note: Option<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub usage: String,
}

impl ElementSpan {
    /// Span over `[manager, node, hostname, project, note]`
    pub fn to_span(&self) -> SpanRecord {
        let fields = vec![
            self.manager.clone().into(),
            self.node.clone().into(),
            self.hostname.clone().into(),
            self.project.clone().into(),
            self.note.clone().into(),
        ];
        SpanRecord::new(fields, self.start, self.end, self.usage.as_str())
    }

    pub fn weekly(&self) -> Vec<ElementUsage> {
        self.to_span()
            .weeks()
            .into_iter()
            .map(|week| ElementUsage {
                manager: self.manager.clone(),
                node: self.node.clone(),
                hostname: self.hostname.clone(),
                project: self.project.clone(),
                note: self.note.clone(),
                year: week.year(),
                week: week.week(),
                usage: self.usage.clone(),
            })
            .collect()
    }
}

/// Hours one employee is assigned to a project in one week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanUsage {
    #[serde(default)]
    pub department: Option<String>,
    pub employee: String,
    pub project: String,
    pub role: String,
    /// Contract type, e.g. `OP` or `Intern`
    #[serde(default)]
    pub personnel_type: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    pub year: i32,
    pub week: u32,
    pub hours: f64,
}

impl HumanUsage {
    /// `[department, employee, project, role, personnel type, note, "Assigned", year, week, hours]`
    pub fn to_row(&self) -> Vec<Cell> {
        vec![
            self.department.clone().into(),
            self.employee.clone().into(),
            self.project.clone().into(),
            self.role.clone().into(),
            self.personnel_type.clone().into(),
            self.note.clone().into(),
            Cell::text(ASSIGNED),
            Cell::Integer(self.year.into()),
            Cell::Integer(self.week.into()),
            Cell::Number(self.hours),
        ]
    }
}

/// Type column of every stored hours row
pub const ASSIGNED: &str = "Assigned";

/// A usage line as stored in import files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UsageRow {
    Element(ElementUsage),
    ElementSpan(ElementSpan),
    Human(HumanUsage),
}

impl UsageRow {
    /// Raw `(year, week)` pairs the row applies to
    pub fn weeks(&self) -> Vec<(i32, u32)> {
        match self {
            UsageRow::Element(e) => vec![(e.year, e.week)],
            UsageRow::ElementSpan(s) => s.weekly().iter().map(|e| (e.year, e.week)).collect(),
            UsageRow::Human(h) => vec![(h.year, h.week)],
        }
    }
}

/// Source of raw usage rows restricted to a week range
///
/// Rows come back as `(fields.., year, week, value)`. Element rows are
/// ordered by node, then hostname; human rows by employee.
pub trait TimeFilteredSource {
    fn element_usages(&self, range: &WeekRange, project: Option<&str>) -> Result<Vec<Vec<Cell>>>;

    fn human_usages(&self, range: &WeekRange, project: Option<&str>) -> Result<Vec<Vec<Cell>>>;
}

/// One disjunct of a range predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    /// `year = ? AND week BETWEEN ? AND ?`
    Within { year: i32, from: u32, to: u32 },
    /// `year = ? AND week >= ?`
    From { year: i32, week: u32 },
    /// `year > ? AND year < ?`
    Between { after: i32, before: i32 },
    /// `year = ? AND week <= ?`
    Upto { year: i32, week: u32 },
}

impl Clause {
    fn sql(&self, year: &str, week: &str) -> String {
        match self {
            Clause::Within { .. } => format!("({year} = ? AND {week} BETWEEN ? AND ?)"),
            Clause::From { .. } => format!("({year} = ? AND {week} >= ?)"),
            Clause::Between { .. } => format!("({year} > ? AND {year} < ?)"),
            Clause::Upto { .. } => format!("({year} = ? AND {week} <= ?)"),
        }
    }

    fn params(&self) -> Vec<i64> {
        match *self {
            Clause::Within { year, from, to } => vec![year.into(), from.into(), to.into()],
            Clause::From { year, week } | Clause::Upto { year, week } => {
                vec![year.into(), week.into()]
            }
            Clause::Between { after, before } => vec![after.into(), before.into()],
        }
    }

    fn matches(&self, yw: YearWeek) -> bool {
        let (y, w) = (yw.year(), yw.week());
        match *self {
            Clause::Within { year, from, to } => y == year && (from..=to).contains(&w),
            Clause::From { year, week } => y == year && w >= week,
            Clause::Between { after, before } => y > after && y < before,
            Clause::Upto { year, week } => y == year && w <= week,
        }
    }
}

/// Range predicate over a table's `year` and `week` columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeFilter {
    clauses: Vec<Clause>,
}

impl TimeFilter {
    pub fn for_range(range: &WeekRange) -> Self {
        let (start, end) = (range.start(), range.end());

        let clauses = if range.is_single_year() {
            vec![Clause::Within {
                year: start.year(),
                from: start.week(),
                to: end.week(),
            }]
        } else {
            vec![
                Clause::From {
                    year: start.year(),
                    week: start.week(),
                },
                Clause::Between {
                    after: start.year(),
                    before: end.year(),
                },
                Clause::Upto {
                    year: end.year(),
                    week: end.week(),
                },
            ]
        };

        Self { clauses }
    }

    /// SQL predicate over the `year` and `week` columns
    pub fn sql(&self) -> String {
        self.sql_for("year", "week")
    }

    /// SQL predicate over the given column names
    pub fn sql_for(&self, year: &str, week: &str) -> String {
        self.clauses
            .iter()
            .map(|c| c.sql(year, week))
            .collect::<Vec<_>>()
            .join(" OR ")
    }

    /// Positional parameters for [`TimeFilter::sql`], in placeholder order
    pub fn params(&self) -> Vec<i64> {
        self.clauses.iter().flat_map(Clause::params).collect()
    }

    pub fn matches(&self, yw: YearWeek) -> bool {
        self.clauses.iter().any(|c| c.matches(yw))
    }

    /// Same as [`TimeFilter::matches`] for raw, possibly invalid, year and week values
    pub fn matches_raw(&self, year: i32, week: u32) -> bool {
        YearWeek::new(year, week).is_ok_and(|yw| self.matches(yw))
    }
}

/// In-memory source over a list of usage rows
impl TimeFilteredSource for Vec<UsageRow> {
    fn element_usages(&self, range: &WeekRange, project: Option<&str>) -> Result<Vec<Vec<Cell>>> {
        let filter = TimeFilter::for_range(range);
        let mut rows: Vec<(&str, &str, Vec<Cell>)> = Vec::new();

        for row in self {
            match row {
                UsageRow::Element(e) if filter.matches_raw(e.year, e.week) => {
                    rows.push((e.node.as_str(), e.hostname.as_str(), e.to_row()));
                }
                UsageRow::ElementSpan(s) => {
                    let weekly = s.to_span().explode(range).into_iter().map(|r| r.into_row());
                    rows.extend(weekly.map(|row| (s.node.as_str(), s.hostname.as_str(), row)));
                }
                _ => {}
            }
        }
        if let Some(p) = project {
            rows.retain(|(_, _, row)| row[3].as_str() == Some(p));
        }

        // Stable, so rows of one element keep their input order
        rows.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        Ok(rows.into_iter().map(|(_, _, row)| row).collect())
    }

    fn human_usages(&self, range: &WeekRange, project: Option<&str>) -> Result<Vec<Vec<Cell>>> {
        let filter = TimeFilter::for_range(range);
        let mut rows: Vec<&HumanUsage> = self
            .iter()
            .filter_map(|r| match r {
                UsageRow::Human(h) => Some(h),
                _ => None,
            })
            .filter(|h| filter.matches_raw(h.year, h.week))
            .filter(|h| project.map_or(true, |p| h.project == p))
            .collect();

        rows.sort_by(|a, b| a.employee.cmp(&b.employee));
        Ok(rows.into_iter().map(HumanUsage::to_row).collect())
    }
}
