//! Week-indexed planning core
//!
//! Pure computations over already fetched rows: ISO week arithmetic, range
//! expansion, cross-tabulation and conflict filtering. Nothing here does I/O.

mod availability;
mod conflict;
mod header;
mod pivot;
mod range;
mod record;
mod week;

pub use availability::{
    add_availability_rows, Availability, AvailabilityError, PersonColumns, AVAILABLE, DIFFERENCE,
};
pub use conflict::{
    filter_conflicts, summarize, summary_message, ConflictError, ConflictPolicy, ElementKey,
    FilterMode, DEFAULT_CONFLICT_USAGES, DEFAULT_IMPORTANT_USAGES,
};
pub use header::{
    column_name, headers, week_columns, week_year_label, year_week_label, HeaderStyle, WeekColumns,
};
pub use pivot::{pivot, PivotError, PivotMatrix, PivotRow};
pub use range::{
    expand_from_dates, parse_date, validate, validate_year_week, week_series, weeks_between_dates,
    Field, FieldError, RangeValidationError, TimeLine, WeekRange, Weeks,
};
pub use record::{Cell, FlatRecord, RecordError, SpanRecord};
pub use week::{last_week, IsoCalendar, WeekError, YearWeek};
