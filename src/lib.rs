//! IPIT - week-indexed resource planning reports
//!
//! Usage records carry an ISO year and week. IPIT validates week ranges,
//! pivots flat records into one row per entity with one column per week,
//! and narrows element reports to conflicting or important usages.

pub mod cli;
pub mod domain;
pub mod report;
pub mod storage;

pub use domain::{FlatRecord, IsoCalendar, PivotMatrix, WeekRange, YearWeek};
pub use report::Report;
