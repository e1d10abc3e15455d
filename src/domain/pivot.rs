//! Cross-tabulation of flat week records into a wide matrix
//!
//! Each distinct group key becomes one row, each week of the governing series
//! one column. The matrix is always rectangular: weeks without a record hold
//! [`Cell::Empty`].

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use super::record::{Cell, FlatRecord};
use super::week::YearWeek;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PivotError {
    #[error("Group key length {key_len} exceeds the {width} leading fields of record {index}")]
    KeyTooLong {
        key_len: usize,
        width: usize,
        index: usize,
    },

    #[error("Record {index} has {found} leading fields, expected {expected}")]
    RaggedRecord {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("Row {index} has {found} week cells, expected {expected}")]
    RaggedRow {
        index: usize,
        expected: usize,
        found: usize,
    },
}

/// One pivoted row: the carried leading fields, then one cell per series week
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotRow {
    pub head: Vec<Cell>,
    pub cells: Vec<Cell>,
}

impl PivotRow {
    pub fn new(head: Vec<Cell>, cells: Vec<Cell>) -> Self {
        Self { head, cells }
    }

    pub fn width(&self) -> usize {
        self.head.len() + self.cells.len()
    }

    /// Non-blank week cells in this row
    pub fn filled(&self) -> usize {
        self.cells.iter().filter(|c| !c.is_blank()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotMatrix {
    series: Vec<YearWeek>,
    rows: Vec<PivotRow>,
    /// Records whose week was not part of the series
    dropped: usize,
}

impl PivotMatrix {
    /// An empty matrix over `series`
    pub fn empty(series: Vec<YearWeek>) -> Self {
        Self {
            series,
            rows: Vec::new(),
            dropped: 0,
        }
    }

    /// Builds a matrix from prepared rows, checking each has one cell per week
    pub fn from_rows(series: Vec<YearWeek>, rows: Vec<PivotRow>) -> Result<Self, PivotError> {
        for (index, row) in rows.iter().enumerate() {
            if row.cells.len() != series.len() {
                return Err(PivotError::RaggedRow {
                    index,
                    expected: series.len(),
                    found: row.cells.len(),
                });
            }
        }
        Ok(Self {
            series,
            rows,
            dropped: 0,
        })
    }

    pub fn series(&self) -> &[YearWeek] {
        &self.series
    }

    pub fn rows(&self) -> &[PivotRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<PivotRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Same series, different rows. Used by filters that narrow a matrix.
    pub(crate) fn with_rows(&self, rows: Vec<PivotRow>) -> Self {
        Self {
            series: self.series.clone(),
            rows,
            dropped: self.dropped,
        }
    }
}

/// Hashable view of a key cell. Numbers compare by bit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum KeyPart {
    Empty,
    Integer(i64),
    Number(u64),
    Text(String),
}

impl From<&Cell> for KeyPart {
    fn from(cell: &Cell) -> Self {
        match cell {
            Cell::Empty => KeyPart::Empty,
            Cell::Integer(i) => KeyPart::Integer(*i),
            Cell::Number(n) => KeyPart::Number(n.to_bits()),
            Cell::Text(s) => KeyPart::Text(s.clone()),
        }
    }
}

/// Pivots `records` into one row per group key and one column per week of `series`
///
/// The group key is the first `key_len` leading fields. Rows appear in the
/// order their key is first seen and carry every leading field of that first
/// record. When several records share a key and week the last one wins.
///
/// Records whose week is outside `series` do not fill a cell; they are
/// counted in [`PivotMatrix::dropped`]. All records must have the same number
/// of leading fields, at least `key_len`.
pub fn pivot(
    records: &[FlatRecord],
    series: &[YearWeek],
    key_len: usize,
) -> Result<PivotMatrix, PivotError> {
    let width = records.first().map(|r| r.fields.len()).unwrap_or(key_len);

    let columns: HashMap<YearWeek, usize> =
        series.iter().enumerate().map(|(i, w)| (*w, i)).collect();
    let mut positions: HashMap<Vec<KeyPart>, usize> = HashMap::new();
    let mut rows: Vec<PivotRow> = Vec::new();
    let mut dropped = 0;

    for (index, record) in records.iter().enumerate() {
        let found = record.fields.len();
        if found != width {
            return Err(PivotError::RaggedRecord {
                index,
                expected: width,
                found,
            });
        }
        if key_len > found {
            return Err(PivotError::KeyTooLong {
                key_len,
                width: found,
                index,
            });
        }

        let key: Vec<KeyPart> = record.fields[..key_len].iter().map(KeyPart::from).collect();
        let row = *positions.entry(key).or_insert_with(|| {
            rows.push(PivotRow::new(
                record.fields.clone(),
                vec![Cell::Empty; series.len()],
            ));
            rows.len() - 1
        });

        match columns.get(&record.week) {
            Some(&col) => rows[row].cells[col] = record.value.clone(),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        tracing::warn!(
            dropped,
            weeks = series.len(),
            "records outside the week series were not pivoted"
        );
    }
    tracing::debug!(records = records.len(), rows = rows.len(), "pivoted");

    Ok(PivotMatrix {
        series: series.to_vec(),
        rows,
        dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::range::week_series;
    use crate::domain::week::IsoCalendar;
    use proptest::prelude::*;

    fn yw(year: i32, week: u32) -> YearWeek {
        YearWeek::new(year, week).unwrap()
    }

    fn rec(fields: &[&str], week: YearWeek, value: &str) -> FlatRecord {
        FlatRecord::new(fields.iter().map(|f| Cell::text(*f)).collect(), week, value)
    }

    fn series() -> Vec<YearWeek> {
        week_series(&IsoCalendar::default(), 2016, 11, 2016, 14).unwrap()
    }

    #[test]
    fn pivots_into_week_columns() {
        let records = vec![
            rec(&["Leon", "VoLTE"], yw(2016, 11), "Training"),
            rec(&["Leon", "VoLTE"], yw(2016, 13), "Software update"),
            rec(&["Robin", "X+1"], yw(2016, 12), "Switched off"),
        ];

        let m = pivot(&records, &series(), 2).unwrap();

        assert_eq!(m.len(), 2);
        assert_eq!(m.rows()[0].head, vec![Cell::text("Leon"), Cell::text("VoLTE")]);
        assert_eq!(
            m.rows()[0].cells,
            vec![
                Cell::text("Training"),
                Cell::Empty,
                Cell::text("Software update"),
                Cell::Empty
            ]
        );
        assert_eq!(
            m.rows()[1].cells,
            vec![Cell::Empty, Cell::text("Switched off"), Cell::Empty, Cell::Empty]
        );
        assert_eq!(m.dropped(), 0);
    }

    #[test]
    fn rows_follow_first_seen_order() {
        let records = vec![
            rec(&["b"], yw(2016, 11), "1"),
            rec(&["a"], yw(2016, 11), "2"),
            rec(&["b"], yw(2016, 12), "3"),
        ];
        let m = pivot(&records, &series(), 1).unwrap();
        let heads: Vec<_> = m.rows().iter().map(|r| r.head[0].to_string()).collect();
        assert_eq!(heads, vec!["b", "a"]);
    }

    #[test]
    fn last_duplicate_wins() {
        let records = vec![
            rec(&["a"], yw(2016, 11), "first"),
            rec(&["a"], yw(2016, 11), "second"),
        ];
        let m = pivot(&records, &series(), 1).unwrap();
        assert_eq!(m.rows()[0].cells[0], Cell::text("second"));
    }

    #[test]
    fn carries_unkeyed_fields_from_first_record() {
        let records = vec![
            rec(&["GVDRS1", "VoLTE", "Voice"], yw(2016, 11), "x"),
            rec(&["GVDRS1", "VoLTE", "Data"], yw(2016, 12), "y"),
        ];
        let m = pivot(&records, &series(), 2).unwrap();
        assert_eq!(m.len(), 1);
        assert_eq!(m.rows()[0].head[2], Cell::text("Voice"));
        assert_eq!(m.rows()[0].width(), 3 + 4);
    }

    #[test]
    fn out_of_series_records_are_counted() {
        let records = vec![
            rec(&["a"], yw(2016, 11), "in"),
            rec(&["a"], yw(2016, 30), "out"),
            rec(&["b"], yw(2017, 1), "out"),
        ];
        let m = pivot(&records, &series(), 1).unwrap();
        assert_eq!(m.dropped(), 2);
        // The key still gets a row, with nothing filled in
        assert_eq!(m.len(), 2);
        assert_eq!(m.rows()[1].filled(), 0);
    }

    #[test]
    fn numeric_keys_distinguish_types() {
        let week = yw(2016, 11);
        let records = vec![
            FlatRecord::new(vec![Cell::Integer(1)], week, "int"),
            FlatRecord::new(vec![Cell::text("1")], week, "text"),
        ];
        assert_eq!(pivot(&records, &series(), 1).unwrap().len(), 2);
    }

    #[test]
    fn empty_inputs() {
        let m = pivot(&[], &series(), 3).unwrap();
        assert!(m.is_empty());
        assert_eq!(m.series().len(), 4);

        let records = vec![rec(&["a"], yw(2016, 11), "x")];
        let m = pivot(&records, &[], 1).unwrap();
        assert_eq!(m.rows()[0].cells.len(), 0);
        assert_eq!(m.dropped(), 1);
    }

    #[test]
    fn rejects_key_longer_than_fields() {
        let records = vec![rec(&["a"], yw(2016, 11), "x")];
        assert_eq!(
            pivot(&records, &series(), 2),
            Err(PivotError::KeyTooLong { key_len: 2, width: 1, index: 0 })
        );
    }

    #[test]
    fn rejects_ragged_records() {
        let records = vec![
            rec(&["a", "b"], yw(2016, 11), "x"),
            rec(&["a"], yw(2016, 12), "y"),
        ];
        assert_eq!(
            pivot(&records, &series(), 1),
            Err(PivotError::RaggedRecord { index: 1, expected: 2, found: 1 })
        );
    }

    #[test]
    fn from_rows_checks_width() {
        let rows = vec![PivotRow::new(vec![Cell::text("a")], vec![Cell::Empty; 3])];
        assert!(matches!(
            PivotMatrix::from_rows(series(), rows),
            Err(PivotError::RaggedRow { expected: 4, found: 3, .. })
        ));
    }

    fn arb_records() -> impl Strategy<Value = Vec<FlatRecord>> {
        prop::collection::vec((0u8..6, 0u8..3, 1u32..=20, "[a-z]{0,3}"), 0..40).prop_map(|rows| {
            rows.into_iter()
                .map(|(a, b, week, value)| {
                    FlatRecord::new(
                        vec![Cell::Integer(a as i64), Cell::Integer(b as i64)],
                        YearWeek::new(2016, week).unwrap(),
                        value,
                    )
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn matrix_is_rectangular(records in arb_records(), end in 1u32..=20) {
            let series = week_series(&IsoCalendar::default(), 2016, 1, 2016, end).unwrap();
            let m = pivot(&records, &series, 2).unwrap();
            for row in m.rows() {
                prop_assert_eq!(row.width(), 2 + series.len());
            }
        }

        #[test]
        fn pivot_is_deterministic(records in arb_records()) {
            let series = week_series(&IsoCalendar::default(), 2016, 1, 2016, 20).unwrap();
            let a = pivot(&records, &series, 1).unwrap();
            let b = pivot(&records, &series, 1).unwrap();
            prop_assert_eq!(&a, &b);

            // Rows appear in first-seen key order
            let mut seen = Vec::new();
            for r in &records {
                if !seen.contains(&r.fields[0]) {
                    seen.push(r.fields[0].clone());
                }
            }
            let heads: Vec<Cell> = a.rows().iter().map(|r| r.head[0].clone()).collect();
            prop_assert_eq!(heads, seen);
        }
    }
}
