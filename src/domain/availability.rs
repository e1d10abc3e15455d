//! Available and difference rows for the hours report
//!
//! Every employee block of a pivoted hours matrix is framed by two derived
//! rows: `Available` before it, holding the employee's weekly hours, and
//! `Difference` after it, holding the available hours minus everything
//! assigned in the block that week.
//!
//! Blocks must be contiguous: the caller sorts hours by employee first.

use std::collections::{BTreeMap, HashSet};

use thiserror::Error;

use super::pivot::{KeyPart, PivotMatrix, PivotRow};
use super::record::Cell;

pub const AVAILABLE: &str = "Available";
pub const DIFFERENCE: &str = "Difference";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AvailabilityError {
    #[error("Employee {employee} reappears at row {row} after their rows ended; sort rows by employee first")]
    NonContiguousEmployee { employee: String, row: usize },

    #[error("Person field {index} is outside the {width} head fields of row {row}")]
    FieldOutOfBounds { index: usize, width: usize, row: usize },
}

/// Weekly hours each employee can be planned for
#[derive(Debug, Clone, PartialEq)]
pub struct Availability {
    default_hours: f64,
    employees: BTreeMap<String, f64>,
}

impl Default for Availability {
    fn default() -> Self {
        Self::new(40.0)
    }
}

impl Availability {
    pub fn new(default_hours: f64) -> Self {
        Self {
            default_hours,
            employees: BTreeMap::new(),
        }
    }

    pub fn with_employee(mut self, employee: impl Into<String>, hours: f64) -> Self {
        self.employees.insert(employee.into(), hours);
        self
    }

    pub fn hours_for(&self, employee: &str) -> f64 {
        self.employees.get(employee).copied().unwrap_or(self.default_hours)
    }
}

/// Positions of the person fields within a row head
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersonColumns {
    pub employee: usize,
    /// Cleared in derived rows
    pub project: usize,
    /// Cleared in derived rows
    pub note: usize,
    /// Holds `Assigned`, `Available` or `Difference`
    pub kind: usize,
}

impl PersonColumns {
    /// Head `[department, employee, project, role, personnel type, note, type]`
    pub const WITHOUT_IDS: PersonColumns = PersonColumns {
        employee: 1,
        project: 2,
        note: 5,
        kind: 6,
    };

    fn check(&self, row: &PivotRow, index: usize) -> Result<(), AvailabilityError> {
        let widest = self.employee.max(self.project).max(self.note).max(self.kind);
        if widest >= row.head.len() {
            return Err(AvailabilityError::FieldOutOfBounds {
                index: widest,
                width: row.head.len(),
                row: index,
            });
        }
        Ok(())
    }

    fn derived(&self, row: &PivotRow, kind: &str, hours: f64) -> PivotRow {
        let mut head = row.head.clone();
        head[self.project] = Cell::Empty;
        head[self.note] = Cell::Empty;
        head[self.kind] = Cell::text(kind);
        PivotRow::new(head, vec![Cell::Number(hours); row.cells.len()])
    }
}

/// Frames each employee block of `matrix` with `Available` and `Difference` rows
///
/// Derived rows copy the head of the block's first row with the project and
/// note cleared. Blank or non-numeric hours count as zero in the difference.
pub fn add_availability_rows(
    matrix: &PivotMatrix,
    columns: PersonColumns,
    availability: &Availability,
) -> Result<PivotMatrix, AvailabilityError> {
    let mut rows = Vec::with_capacity(matrix.len() + 2);
    let mut finished: HashSet<KeyPart> = HashSet::new();
    let mut current: Option<(KeyPart, PivotRow)> = None;

    for (index, row) in matrix.rows().iter().enumerate() {
        columns.check(row, index)?;
        let employee = &row.head[columns.employee];
        let key = KeyPart::from(employee);

        if current.as_ref().map_or(true, |(k, _)| *k != key) {
            if finished.contains(&key) {
                return Err(AvailabilityError::NonContiguousEmployee {
                    employee: employee.to_string(),
                    row: index,
                });
            }
            if let Some((done, difference)) = current.take() {
                finished.insert(done);
                rows.push(difference);
            }

            let hours = availability.hours_for(&employee.to_string());
            rows.push(columns.derived(row, AVAILABLE, hours));
            current = Some((key, columns.derived(row, DIFFERENCE, hours)));
        }

        if let Some((_, difference)) = current.as_mut() {
            for (left, assigned) in difference.cells.iter_mut().zip(&row.cells) {
                *left = Cell::Number(left.float_or_zero() - assigned.float_or_zero());
            }
        }
        rows.push(row.clone());
    }

    if let Some((done, difference)) = current {
        finished.insert(done);
        rows.push(difference);
    }

    tracing::debug!(employees = finished.len(), "added availability rows");
    Ok(matrix.with_rows(rows))
}
