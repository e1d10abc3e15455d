//! # Storage Layer
//!
//! Everything that touches disk: configuration, the imported usage database
//! and JSONL usage files. Reports reach usages only through
//! [`TimeFilteredSource`].
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Usages | SQLite (WAL) | `.ipit/usage.db` |
//! | Import files | JSONL (one tagged usage per line) | anywhere |
//! | Config | TOML | `.ipit/config.toml` |
//!
//! ## Project Structure
//!
//! ```text
//! .ipit/
//! ├── config.toml    # Calendar bounds, usage policy and availability
//! ├── usage.db       # Imported usages (ignored by git)
//! └── .gitignore
//! ```
//!
//! ## Key Types
//!
//! - [`Project`] - Entry point for an IPIT directory
//! - [`UsageStore`] - SQLite-backed [`TimeFilteredSource`]
//! - [`UsageFile`] - Read/write usages as JSONL
//! - [`TimeFilter`] - Week range predicate, as SQL or in memory
//! - [`Config`] - Project and global configuration

mod config;
mod filter;
mod project;
mod usage_db;
mod usage_file;

pub use config::{
    AvailabilityConfig, CalendarConfig, Config, ConfigError, GlobalConfig, OutputFormat,
    PolicyConfig, ProjectConfig,
};
pub use filter::{
    ElementSpan, ElementUsage, HumanUsage, TimeFilter, TimeFilteredSource, UsageRow, ASSIGNED,
};
pub use project::{Project, ProjectError};
pub use usage_db::{ImportCounts, StoreError, StoreStatus, UsageStore};
pub use usage_file::UsageFile;
