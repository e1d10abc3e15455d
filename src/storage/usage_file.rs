//! JSONL usage files
//!
//! One tagged [`UsageRow`] per line, e.g.
//!
//! ```text
//! {"kind":"element","node":"MGW","hostname":"EXT-GVTEMW1","project":"VoLTE","year":2016,"week":11,"usage":"Training"}
//! {"kind":"human","employee":"Hannina Robin","project":"VoLTE","role":"Tester","year":2016,"week":11,"hours":8.0}
//! ```
//!
//! Used to import usages into the database and as a file-backed report input.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;

use super::filter::UsageRow;

pub struct UsageFile {
    path: PathBuf,
}

impl UsageFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every row; blank lines are skipped
    pub fn read_all(&self) -> Result<Vec<UsageRow>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open usage file: {}", self.path.display()))?;

        file.lock_shared()
            .context("Failed to acquire read lock on usage file")?;

        let reader = BufReader::new(&file);
        let mut rows = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read line {}", line_num + 1))?;

            if line.trim().is_empty() {
                continue;
            }

            let row: UsageRow = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse usage at line {}", line_num + 1))?;
            rows.push(row);
        }

        tracing::debug!(path = %self.path.display(), rows = rows.len(), "read usage file");
        Ok(rows)
    }

    /// Replaces the file with `rows` (temp file + rename)
    pub fn write_all(&self, rows: &[UsageRow]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let temp_path = self.path.with_extension("jsonl.tmp");

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

            file.lock_exclusive()
                .context("Failed to acquire write lock on usage file")?;

            let mut writer = BufWriter::new(&file);
            for row in rows {
                let line = serde_json::to_string(row).context("Failed to serialize usage")?;
                writeln!(writer, "{}", line).context("Failed to write usage")?;
            }
            writer.flush().context("Failed to flush usage file")?;
        }

        fs::rename(&temp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                self.path.display()
            )
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parse_date;
    use crate::storage::filter::{ElementSpan, ElementUsage, HumanUsage};
    use tempfile::TempDir;

    fn rows() -> Vec<UsageRow> {
        vec![
            UsageRow::Element(ElementUsage {
                manager: Some("Verhaeg Leon".into()),
                node: "MGW".into(),
                hostname: "EXT-GVTEMW1".into(),
                project: "VoLTE".into(),
                note: None,
                year: 2016,
                week: 11,
                usage: "Training".into(),
            }),
            UsageRow::ElementSpan(ElementSpan {
                manager: None,
                node: "MGW".into(),
                hostname: "EXT-GVTEMW2".into(),
                project: "VoLTE".into(),
                note: Some("Data".into()),
                start: parse_date("26-12-2016").unwrap(),
                end: parse_date("04-01-2017").unwrap(),
                usage: "Switched off".into(),
            }),
            UsageRow::Human(HumanUsage {
                department: Some("Innovation Test Data".into()),
                employee: "Hannina Robin".into(),
                project: "X+1".into(),
                role: "Tester".into(),
                personnel_type: Some("OP".into()),
                note: None,
                year: 2016,
                week: 12,
                hours: 8.0,
            }),
        ]
    }

    #[test]
    fn write_then_read() {
        let dir = TempDir::new().unwrap();
        let file = UsageFile::new(dir.path().join("usages.jsonl"));

        file.write_all(&rows()).unwrap();
        assert_eq!(file.read_all().unwrap(), rows());
    }

    #[test]
    fn skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("usages.jsonl");
        fs::write(
            &path,
            "\n{\"kind\":\"human\",\"employee\":\"a\",\"project\":\"p\",\"role\":\"r\",\"year\":2016,\"week\":1,\"hours\":2}\n\n",
        )
        .unwrap();

        let rows = UsageFile::new(&path).read_all().unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn reports_failing_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("usages.jsonl");
        fs::write(&path, "{\"kind\":\"human\",\"employee\":\"a\",\"project\":\"p\",\"role\":\"r\",\"year\":2016,\"week\":1,\"hours\":2}\nnot json\n").unwrap();

        let err = UsageFile::new(&path).read_all().unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }

    #[test]
    fn missing_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(UsageFile::new(dir.path().join("nope.jsonl")).read_all().is_err());
    }
}
