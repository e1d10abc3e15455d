//! Conflict detection over pivoted element usages
//!
//! Rows of an element usage matrix are grouped by element (two head fields,
//! typically node and hostname). A group conflicts when, in some week, at
//! least two of its rows are filled and at least one of them carries a
//! conflict-capable usage label.
//!
//! Groups must be contiguous: the caller sorts by element before filtering.

use std::collections::{BTreeSet, HashSet};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::pivot::{KeyPart, PivotMatrix, PivotRow};
use super::record::Cell;

/// Usage labels that occupy an element and clash with other users
pub const DEFAULT_CONFLICT_USAGES: [&str; 5] = [
    "Cfg aanp. + Test Uitv.",
    "Software update",
    "software update + Testen",
    "Switched off",
    "Configuratie aanpassing",
];

/// Usage labels worth surfacing in a weekly overview
pub const DEFAULT_IMPORTANT_USAGES: [&str; 5] = [
    "Cfg aanp. + Test Uitv.",
    "Software update",
    "software update + Testen",
    "Training",
    "Configuratie aanpassing",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConflictError {
    #[error("Element {key} reappears at row {row} after its group ended; sort rows by element first")]
    NonContiguousGroup { key: String, row: usize },

    #[error("Element key field {index} is outside the {width} head fields of row {row}")]
    KeyOutOfBounds { index: usize, width: usize, row: usize },
}

/// Label sets driving the filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictPolicy {
    conflict: BTreeSet<String>,
    important: BTreeSet<String>,
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_CONFLICT_USAGES, DEFAULT_IMPORTANT_USAGES)
    }
}

impl ConflictPolicy {
    pub fn new<C, I>(conflict: C, important: I) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            conflict: conflict.into_iter().map(Into::into).collect(),
            important: important.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_conflict(&self, cell: &Cell) -> bool {
        cell.as_str().is_some_and(|s| self.conflict.contains(s))
    }

    pub fn is_important(&self, cell: &Cell) -> bool {
        cell.as_str().is_some_and(|s| self.important.contains(s))
    }
}

/// Which rows the filter keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Whole element groups with a conflicting week
    Pcu,
    /// Conflicting groups, plus single rows carrying an important usage
    Pwu,
}

/// Positions of the two head fields that identify an element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementKey {
    pub first: usize,
    pub second: usize,
}

impl ElementKey {
    /// Head `[employee, employee_id, node, hostname, element_id, project, project_id, note]`
    pub const WITH_IDS: ElementKey = ElementKey { first: 2, second: 3 };
    /// Head `[employee, node, hostname, project, note]`
    pub const WITHOUT_IDS: ElementKey = ElementKey { first: 1, second: 2 };

    pub fn new(first: usize, second: usize) -> Self {
        Self { first, second }
    }

    /// The two key fields of `row`, compared by value
    fn of(&self, row: &PivotRow, index: usize) -> Result<(KeyPart, KeyPart), ConflictError> {
        let (first, second) = self.fields(row, index)?;
        Ok((KeyPart::from(first), KeyPart::from(second)))
    }

    /// `"first:second"`, for messages only
    fn label(&self, row: &PivotRow, index: usize) -> Result<String, ConflictError> {
        let (first, second) = self.fields(row, index)?;
        Ok(format!("{}:{}", first, second))
    }

    fn fields<'r>(&self, row: &'r PivotRow, index: usize) -> Result<(&'r Cell, &'r Cell), ConflictError> {
        let field = |i: usize| {
            row.head.get(i).ok_or(ConflictError::KeyOutOfBounds {
                index: i,
                width: row.head.len(),
                row: index,
            })
        };
        Ok((field(self.first)?, field(self.second)?))
    }
}

/// Narrows `matrix` to the rows selected by `mode`
///
/// Groups are emitted in input order. In [`FilterMode::Pcu`] a conflicting
/// group is kept whole. [`FilterMode::Pwu`] keeps conflicting groups the same
/// way; otherwise the first row holding an important usage in the earliest
/// such week is kept on its own.
pub fn filter_conflicts(
    matrix: &PivotMatrix,
    policy: &ConflictPolicy,
    mode: FilterMode,
    key: ElementKey,
) -> Result<PivotMatrix, ConflictError> {
    let rows = matrix.rows();
    let mut kept: Vec<PivotRow> = Vec::new();
    let mut closed: HashSet<(KeyPart, KeyPart)> = HashSet::new();
    let mut start = 0;

    while start < rows.len() {
        let current = key.of(&rows[start], start)?;
        if closed.contains(&current) {
            return Err(ConflictError::NonContiguousGroup {
                key: key.label(&rows[start], start)?,
                row: start,
            });
        }

        let mut end = start + 1;
        while end < rows.len() && key.of(&rows[end], end)? == current {
            end += 1;
        }

        let group = &rows[start..end];
        match select(group, matrix.series().len(), policy, mode) {
            Selection::Group => kept.extend_from_slice(group),
            Selection::Row(i) => kept.push(group[i].clone()),
            Selection::Nothing => {}
        }

        closed.insert(current);
        start = end;
    }

    tracing::debug!(
        input = rows.len(),
        kept = kept.len(),
        groups = closed.len(),
        ?mode,
        "filtered element usages"
    );

    Ok(matrix.with_rows(kept))
}

enum Selection {
    Group,
    Row(usize),
    Nothing,
}

fn select(group: &[PivotRow], weeks: usize, policy: &ConflictPolicy, mode: FilterMode) -> Selection {
    for col in 0..weeks {
        let mut sums = 0;
        let mut count = 0;
        for row in group {
            let cell = &row.cells[col];
            if policy.is_conflict(cell) {
                sums += 1;
            }
            if !cell.is_blank() {
                count += 1;
            }
        }
        if sums >= 1 && count >= 2 {
            return Selection::Group;
        }

        if mode == FilterMode::Pwu {
            if let Some(i) = group.iter().position(|r| policy.is_important(&r.cells[col])) {
                return Selection::Row(i);
            }
        }
    }
    Selection::Nothing
}

/// Number of filled week cells across the matrix
///
/// Filled means not [`Cell::is_blank`]: a numeric `0` or `0.0` counts. Only
/// absent values and empty text are left out, so a matrix of hours with
/// explicit zeros counts those weeks too.
pub fn summarize(matrix: &PivotMatrix) -> usize {
    matrix.rows().iter().map(PivotRow::filled).sum()
}

/// Rewrites a successful report message with the filtered cell count
///
/// Messages that do not report success are returned unchanged.
pub fn summary_message(message: &str, matrix: &PivotMatrix) -> String {
    if !message.starts_with("SUCC") {
        return message.to_string();
    }
    if matrix.is_empty() {
        return "SUCCESSFUL: 0 record retrieved.".to_string();
    }
    format!("SUCCESSFUL: {} records retrieved.", summarize(matrix))
}
