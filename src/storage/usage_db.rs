//! SQLite usage store
//!
//! Imported usages live in `.ipit/usage.db`. The store answers range queries
//! for reports and is dropped before the rows are pivoted.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Statement};
use serde::Serialize;
use thiserror::Error;

use super::filter::{ElementUsage, HumanUsage, TimeFilter, TimeFilteredSource, UsageRow};
use crate::domain::{Cell, WeekRange};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Usage database not found at {0}. Run 'ipit import' first.")]
    NotFound(PathBuf),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Row counts reported by `ipit db status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    pub path: PathBuf,
    pub schema_version: i32,
    pub element_usages: usize,
    pub human_usages: usize,
}

/// Rows added by one import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportCounts {
    pub element_usages: usize,
    pub human_usages: usize,
}

impl ImportCounts {
    pub fn total(&self) -> usize {
        self.element_usages + self.human_usages
    }
}

pub struct UsageStore {
    db_path: PathBuf,
    conn: Connection,
}

impl UsageStore {
    /// Schema version - bump when schema changes to force recreation
    const SCHEMA_VERSION: i32 = 2;

    /// Opens or creates the store of a project
    pub fn open(project_root: &Path) -> Result<Self> {
        let ipit_dir = project_root.join(".ipit");
        fs::create_dir_all(&ipit_dir)
            .with_context(|| format!("Failed to create directory: {}", ipit_dir.display()))?;

        Self::open_at(ipit_dir.join("usage.db"))
    }

    /// Opens an existing store, failing if it was never created
    pub fn open_existing(project_root: &Path) -> Result<Self> {
        let db_path = Self::path_for(project_root);
        if !db_path.exists() {
            return Err(StoreError::NotFound(db_path).into());
        }
        Self::open_at(db_path)
    }

    /// Opens or creates a store at an explicit path
    pub fn open_at(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open usage database: {}", db_path.display()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(StoreError::from)?;

        let mut store = Self { db_path, conn };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn path_for(project_root: &Path) -> PathBuf {
        project_root.join(".ipit").join("usage.db")
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn ensure_schema(&mut self) -> Result<()> {
        if self.schema_version()? != Self::SCHEMA_VERSION {
            self.create_schema()?;
        }
        Ok(())
    }

    fn schema_version(&self) -> Result<i32> {
        let version: Option<i32> = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .optional()
            .map_err(StoreError::from)?;
        Ok(version.unwrap_or(0))
    }

    fn create_schema(&mut self) -> Result<()> {
        self.conn
            .execute_batch(
                "
            DROP TABLE IF EXISTS element_usages;
            DROP TABLE IF EXISTS human_usages;

            CREATE TABLE element_usages (
                manager TEXT,
                node TEXT NOT NULL,
                hostname TEXT NOT NULL,
                project TEXT NOT NULL,
                note TEXT,
                year INTEGER NOT NULL,
                week INTEGER NOT NULL,
                usage TEXT NOT NULL
            );

            CREATE TABLE human_usages (
                department TEXT,
                employee TEXT NOT NULL,
                project TEXT NOT NULL,
                role TEXT NOT NULL,
                personnel_type TEXT,
                note TEXT,
                year INTEGER NOT NULL,
                week INTEGER NOT NULL,
                hours REAL NOT NULL
            );

            CREATE INDEX idx_element_week ON element_usages(year, week);
            CREATE INDEX idx_element_host ON element_usages(node, hostname);
            CREATE INDEX idx_human_week ON human_usages(year, week);
            CREATE INDEX idx_human_employee ON human_usages(employee);
            ",
            )
            .map_err(StoreError::from)?;

        self.conn
            .execute(&format!("PRAGMA user_version = {}", Self::SCHEMA_VERSION), [])
            .map_err(StoreError::from)?;

        Ok(())
    }

    /// Inserts `rows` in one transaction; a span adds one row per covered week
    pub fn import(&mut self, rows: &[UsageRow]) -> Result<ImportCounts> {
        let tx = self.conn.transaction().map_err(StoreError::from)?;
        let mut counts = ImportCounts::default();

        {
            let mut element = tx
                .prepare(
                    "INSERT INTO element_usages (manager, node, hostname, project, note, year, week, usage)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .map_err(StoreError::from)?;
            let mut human = tx
                .prepare(
                    "INSERT INTO human_usages (department, employee, project, role, personnel_type, note, year, week, hours)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )
                .map_err(StoreError::from)?;

            for row in rows {
                match row {
                    UsageRow::Element(e) => {
                        insert_element(&mut element, e)?;
                        counts.element_usages += 1;
                    }
                    UsageRow::ElementSpan(span) => {
                        let weekly = span.weekly();
                        if weekly.is_empty() {
                            tracing::warn!(
                                hostname = %span.hostname,
                                start = %span.start,
                                end = %span.end,
                                "element span covers no weeks"
                            );
                        }
                        for e in &weekly {
                            insert_element(&mut element, e)?;
                        }
                        counts.element_usages += weekly.len();
                    }
                    UsageRow::Human(h) => {
                        human
                            .execute(params![
                                h.department,
                                h.employee,
                                h.project,
                                h.role,
                                h.personnel_type,
                                h.note,
                                h.year,
                                h.week,
                                h.hours
                            ])
                            .map_err(StoreError::from)?;
                        counts.human_usages += 1;
                    }
                }
            }
        }

        tx.commit().map_err(StoreError::from)?;
        tracing::debug!(
            elements = counts.element_usages,
            humans = counts.human_usages,
            "imported usages"
        );

        Ok(counts)
    }

    /// Removes all usages
    pub fn clear(&mut self) -> Result<()> {
        self.conn
            .execute_batch("DELETE FROM element_usages; DELETE FROM human_usages;")
            .map_err(StoreError::from)?;
        Ok(())
    }

    pub fn status(&self) -> Result<StoreStatus> {
        let count = |table: &str| -> Result<usize> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
                .map_err(StoreError::from)?;
            Ok(n as usize)
        };

        Ok(StoreStatus {
            path: self.db_path.clone(),
            schema_version: self.schema_version()?,
            element_usages: count("element_usages")?,
            human_usages: count("human_usages")?,
        })
    }

    fn query(
        &self,
        columns: &str,
        table: &str,
        order: &str,
        range: &WeekRange,
        project: Option<&str>,
    ) -> Result<Vec<Vec<Cell>>> {
        let filter = TimeFilter::for_range(range);
        let mut sql = format!("SELECT {} FROM {} WHERE ({})", columns, table, filter.sql());
        let mut values: Vec<Value> = filter.params().into_iter().map(Value::Integer).collect();

        if let Some(project) = project {
            sql.push_str(" AND project = ?");
            values.push(Value::Text(project.to_string()));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(order);

        let mut stmt = self.conn.prepare(&sql).map_err(StoreError::from)?;
        let width = stmt.column_count();
        let rows = stmt
            .query_map(params_from_iter(values), |row| to_cells(row, width))
            .map_err(StoreError::from)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::from)?;

        Ok(rows)
    }
}

fn insert_element(stmt: &mut Statement<'_>, e: &ElementUsage) -> Result<(), StoreError> {
    stmt.execute(params![
        e.manager, e.node, e.hostname, e.project, e.note, e.year, e.week, e.usage
    ])?;
    Ok(())
}

fn to_cells(row: &Row<'_>, width: usize) -> rusqlite::Result<Vec<Cell>> {
    (0..width)
        .map(|i| {
            Ok(match row.get_ref(i)? {
                ValueRef::Null | ValueRef::Blob(_) => Cell::Empty,
                ValueRef::Integer(n) => Cell::Integer(n),
                ValueRef::Real(n) => Cell::Number(n),
                ValueRef::Text(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
            })
        })
        .collect()
}

impl TimeFilteredSource for UsageStore {
    fn element_usages(&self, range: &WeekRange, project: Option<&str>) -> Result<Vec<Vec<Cell>>> {
        self.query(
            "manager, node, hostname, project, note, year, week, usage",
            "element_usages",
            "node, hostname, rowid",
            range,
            project,
        )
        .context("Failed to query element usages")
    }

    fn human_usages(&self, range: &WeekRange, project: Option<&str>) -> Result<Vec<Vec<Cell>>> {
        self.query(
            "department, employee, project, role, personnel_type, note, 'Assigned', year, week, hours",
            "human_usages",
            "employee, rowid",
            range,
            project,
        )
        .context("Failed to query human usages")
    }
}

impl UsageStore {
    /// Every stored usage in insertion order, elements first
    pub fn all_rows(&self) -> Result<Vec<UsageRow>> {
        let mut rows = Vec::new();

        let mut stmt = self
            .conn
            .prepare("SELECT manager, node, hostname, project, note, year, week, usage FROM element_usages ORDER BY rowid")
            .map_err(StoreError::from)?;
        let elements = stmt
            .query_map([], |row| {
                Ok(UsageRow::Element(ElementUsage {
                    manager: row.get(0)?,
                    node: row.get(1)?,
                    hostname: row.get(2)?,
                    project: row.get(3)?,
                    note: row.get(4)?,
                    year: row.get(5)?,
                    week: row.get(6)?,
                    usage: row.get(7)?,
                }))
            })
            .map_err(StoreError::from)?;
        for row in elements {
            rows.push(row.map_err(StoreError::from)?);
        }

        let mut stmt = self
            .conn
            .prepare(
                "SELECT department, employee, project, role, personnel_type, note, year, week, hours
                 FROM human_usages ORDER BY rowid",
            )
            .map_err(StoreError::from)?;
        let humans = stmt
            .query_map([], |row| {
                Ok(UsageRow::Human(HumanUsage {
                    department: row.get(0)?,
                    employee: row.get(1)?,
                    project: row.get(2)?,
                    role: row.get(3)?,
                    personnel_type: row.get(4)?,
                    note: row.get(5)?,
                    year: row.get(6)?,
                    week: row.get(7)?,
                    hours: row.get(8)?,
                }))
            })
            .map_err(StoreError::from)?;
        for row in humans {
            rows.push(row.map_err(StoreError::from)?);
        }

        Ok(rows)
    }
}
