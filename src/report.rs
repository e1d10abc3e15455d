//! Report pipeline
//!
//! A report takes a validated [`WeekRange`], fetches raw rows from a
//! [`TimeFilteredSource`], pivots them over the expanded week series and, for
//! element reports, optionally narrows the matrix to conflicts. Hours reports
//! over all projects frame each employee with available and difference rows.
//!
//! Fetching and building are separate steps so the caller can release the
//! source before any pivoting happens.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::domain::{
    add_availability_rows, filter_conflicts, headers, pivot, summary_message, Availability, Cell,
    ConflictPolicy, ElementKey, FilterMode, FlatRecord, HeaderStyle, PersonColumns, PivotMatrix,
    WeekRange,
};
use crate::storage::TimeFilteredSource;

/// Leading columns of the element usage report
pub const ELEMENT_HEAD: [&str; 5] = ["Test Manager", "Node", "Hostname", "Project", "Note"];

/// Leading columns of the human usage report
pub const HUMAN_HEAD: [&str; 7] = [
    "Department",
    "Employee",
    "Project",
    "Role",
    "Personnel Type",
    "Note",
    "Type",
];

/// Manager, node, hostname and project identify a row; the note is carried along
const ELEMENT_KEY_LEN: usize = 4;
/// Everything up to the note; the type is carried along
const HUMAN_KEY_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    ElementUsage,
    HumanUsage,
}

/// A finished report, ready to render
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub kind: ReportKind,
    #[serde(serialize_with = "display")]
    pub range: WeekRange,
    pub columns: Vec<String>,
    #[serde(skip)]
    pub matrix: PivotMatrix,
    pub rows: Vec<Vec<Cell>>,
    pub message: String,
    /// Raw rows returned by the source
    pub fetched: usize,
}

fn display<S: serde::Serializer>(range: &WeekRange, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(range)
}

impl Report {
    fn new(
        kind: ReportKind,
        range: &WeekRange,
        columns: Vec<String>,
        matrix: PivotMatrix,
        message: String,
        fetched: usize,
    ) -> Self {
        let rows = matrix
            .rows()
            .iter()
            .map(|r| r.head.iter().chain(&r.cells).cloned().collect())
            .collect();

        Self {
            kind,
            range: *range,
            columns,
            matrix,
            rows,
            message,
            fetched,
        }
    }
}

/// Base message for `n` fetched rows
pub fn retrieved_message(n: usize) -> String {
    format!("SUCCESSFUL: {} records retrieved.", n)
}

fn to_records(rows: Vec<Vec<Cell>>) -> Result<Vec<FlatRecord>> {
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            FlatRecord::from_row(row).with_context(|| format!("Malformed usage row {}", i + 1))
        })
        .collect()
}

fn columns(head: &[&str], range: &WeekRange, style: HeaderStyle) -> Vec<String> {
    head.iter()
        .map(|h| h.to_string())
        .chain(headers(&range.expand(), style))
        .collect()
}

/// Builds the element usage report from fetched rows
///
/// Rows must be sorted by node and hostname when a filter is given.
pub fn element_report(
    rows: Vec<Vec<Cell>>,
    range: &WeekRange,
    filter: Option<(FilterMode, &ConflictPolicy)>,
) -> Result<Report> {
    let fetched = rows.len();
    let mut message = retrieved_message(fetched);

    let records = to_records(rows)?;
    let mut matrix = pivot(&records, &range.expand(), ELEMENT_KEY_LEN)
        .context("Failed to pivot element usages")?;

    if let Some((mode, policy)) = filter {
        matrix = filter_conflicts(&matrix, policy, mode, ElementKey::WITHOUT_IDS)
            .context("Failed to filter element usages")?;
        message = summary_message(&message, &matrix);
    }

    let columns = columns(&ELEMENT_HEAD, range, HeaderStyle::WeekYear);
    Ok(Report::new(ReportKind::ElementUsage, range, columns, matrix, message, fetched))
}

/// Builds the human usage report from fetched rows; hours become numbers
///
/// With `availability`, rows must be grouped by employee and each group gets
/// its `Available` and `Difference` rows.
pub fn human_report(
    rows: Vec<Vec<Cell>>,
    range: &WeekRange,
    availability: Option<&Availability>,
) -> Result<Report> {
    let fetched = rows.len();
    let records: Vec<FlatRecord> = to_records(rows)?.into_iter().map(FlatRecord::numeric).collect();

    let mut matrix = pivot(&records, &range.expand(), HUMAN_KEY_LEN)
        .context("Failed to pivot human usages")?;

    if let Some(availability) = availability {
        matrix = add_availability_rows(&matrix, PersonColumns::WITHOUT_IDS, availability)
            .context("Failed to add availability rows")?;
    }

    let columns = columns(&HUMAN_HEAD, range, HeaderStyle::YearWeek);
    Ok(Report::new(
        ReportKind::HumanUsage,
        range,
        columns,
        matrix,
        retrieved_message(fetched),
        fetched,
    ))
}

/// Fetches and builds the element usage report in one go
pub fn element_usage_report(
    source: &impl TimeFilteredSource,
    range: &WeekRange,
    project: Option<&str>,
    filter: Option<(FilterMode, &ConflictPolicy)>,
) -> Result<Report> {
    let rows = source.element_usages(range, project)?;
    element_report(rows, range, filter)
}

/// Fetches and builds the human usage report in one go
///
/// Availability rows are only added when the report spans all projects.
pub fn human_usage_report(
    source: &impl TimeFilteredSource,
    range: &WeekRange,
    project: Option<&str>,
    availability: &Availability,
) -> Result<Report> {
    let rows = source.human_usages(range, project)?;
    human_report(rows, range, project.is_none().then_some(availability))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{validate, IsoCalendar};
    use crate::storage::{ElementUsage, HumanUsage, UsageRow};

    const CFG: &str = "Cfg aanp. + Test Uitv.";

    fn range(sy: &str, sw: &str, ey: &str, ew: &str) -> WeekRange {
        validate(&IsoCalendar::default(), sy, sw, ey, ew).unwrap()
    }

    fn element(manager: &str, node: &str, host: &str, project: &str, week: u32, usage: &str) -> UsageRow {
        UsageRow::Element(ElementUsage {
            manager: Some(manager.into()),
            node: node.into(),
            hostname: host.into(),
            project: project.into(),
            note: None,
            year: 2016,
            week,
            usage: usage.into(),
        })
    }

    fn source() -> Vec<UsageRow> {
        vec![
            element("Verhaeg Leon", "DRA - HPc7000", "GVDRS1", "VoLTE", 11, CFG),
            element("Verhaeg Leon", "Radio Nodes", "nog onbekend welke", "VoLTE", 11, CFG),
            element("Verhaeg Leon", "Radio Nodes", "nog onbekend welke", "VoLTE", 12, "Training"),
            element("Hannina Robin", "Radio Nodes", "nog onbekend welke", "X+1", 11, CFG),
            element("Verhaeg Leon", "MGW", "EXT-GVTEMW1", "VoLTE", 30, CFG),
        ]
    }

    #[test]
    fn element_report_pivots_by_week() {
        let r = element_usage_report(&source(), &range("2016", "11", "2016", "13"), None, None).unwrap();

        assert_eq!(
            r.columns,
            vec!["Test Manager", "Node", "Hostname", "Project", "Note", "11-2016", "12-2016", "13-2016"]
        );
        assert_eq!(r.fetched, 4);
        assert_eq!(r.message, "SUCCESSFUL: 4 records retrieved.");
        // Sorted by node: DRA, then the two radio node rows
        assert_eq!(r.rows.len(), 3);
        assert_eq!(r.rows[1][5], Cell::text(CFG));
        assert_eq!(r.rows[1][6], Cell::text("Training"));
        assert!(r.rows.iter().all(|row| row.len() == 8));
    }

    #[test]
    fn element_report_with_conflict_filter() {
        let policy = ConflictPolicy::default();
        let r = element_usage_report(
            &source(),
            &range("2016", "11", "2016", "13"),
            None,
            Some((FilterMode::Pcu, &policy)),
        )
        .unwrap();

        assert_eq!(r.rows.len(), 2);
        assert_eq!(r.rows[0][1], Cell::text("Radio Nodes"));
        assert_eq!(r.message, "SUCCESSFUL: 3 records retrieved.");
    }

    #[test]
    fn empty_filtered_report_message() {
        let policy = ConflictPolicy::default();
        let r = element_usage_report(
            &source(),
            &range("2016", "20", "2016", "25"),
            None,
            Some((FilterMode::Pcu, &policy)),
        )
        .unwrap();

        assert!(r.rows.is_empty());
        assert_eq!(r.message, "SUCCESSFUL: 0 record retrieved.");
    }

    #[test]
    fn element_report_project_filter() {
        let r = element_usage_report(&source(), &range("2016", "11", "2016", "13"), Some("X+1"), None).unwrap();
        assert_eq!(r.rows.len(), 1);
        assert_eq!(r.rows[0][0], Cell::text("Hannina Robin"));
    }

    fn human(employee: &str, project: &str, week: (i32, u32), hours: f64) -> UsageRow {
        UsageRow::Human(HumanUsage {
            department: Some("Innovation Test Data".into()),
            employee: employee.into(),
            project: project.into(),
            role: "Tester".into(),
            personnel_type: Some("OP".into()),
            note: None,
            year: week.0,
            week: week.1,
            hours,
        })
    }

    fn hours() -> Vec<UsageRow> {
        vec![
            human("Hannina Robin", "VoLTE", (2015, 53), 40.0),
            human("Hannina Robin", "VoLTE", (2016, 2), 23.5),
            human("Hannina Robin", "X+1", (2016, 2), 8.0),
        ]
    }

    #[test]
    fn human_report_uses_numbers() {
        let r = human_usage_report(
            &hours(),
            &range("2015", "53", "2016", "2"),
            Some("VoLTE"),
            &Availability::default(),
        )
        .unwrap();

        assert_eq!(
            r.columns,
            vec![
                "Department",
                "Employee",
                "Project",
                "Role",
                "Personnel Type",
                "Note",
                "Type",
                "2015-53",
                "2016-1",
                "2016-2"
            ]
        );
        assert_eq!(
            r.rows,
            vec![vec![
                Cell::text("Innovation Test Data"),
                Cell::text("Hannina Robin"),
                Cell::text("VoLTE"),
                Cell::text("Tester"),
                Cell::text("OP"),
                Cell::Empty,
                Cell::text("Assigned"),
                Cell::Number(40.0),
                Cell::Empty,
                Cell::Number(23.5),
            ]]
        );
        assert_eq!(r.message, "SUCCESSFUL: 2 records retrieved.");
    }

    #[test]
    fn all_projects_hours_report_adds_availability() {
        let availability = Availability::new(40.0).with_employee("Hannina Robin", 36.0);
        let r = human_usage_report(&hours(), &range("2015", "53", "2016", "2"), None, &availability)
            .unwrap();

        let kinds: Vec<String> = r.rows.iter().map(|row| row[6].to_string()).collect();
        assert_eq!(kinds, vec!["Available", "Assigned", "Assigned", "Difference"]);
        assert_eq!(r.rows[0][2], Cell::Empty);
        assert_eq!(r.rows[0][7..], [Cell::Number(36.0), Cell::Number(36.0), Cell::Number(36.0)]);
        assert_eq!(r.rows[3][7..], [Cell::Number(-4.0), Cell::Number(36.0), Cell::Number(4.5)]);
        assert_eq!(r.fetched, 3);
    }

    #[test]
    fn malformed_rows_are_reported() {
        let rows = vec![vec![Cell::text("a"), Cell::text("b")]];
        let err = element_report(rows, &range("2016", "1", "2016", "2"), None).unwrap_err();
        assert!(format!("{:#}", err).contains("Malformed usage row 1"));
    }

    #[test]
    fn report_json_shape() {
        let r = element_usage_report(&source(), &range("2016", "11", "2016", "11"), None, None).unwrap();
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["kind"], "element_usage");
        assert_eq!(json["range"], "2016-W11 .. 2016-W11");
        assert!(json.get("matrix").is_none());
        assert_eq!(json["rows"][0][4], serde_json::Value::Null);
    }
}
