//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Core | Project management | `init` |
//! | Calendar | ISO week arithmetic | `weeks`, `weeks-between`, `last-week` |
//! | Data | Usage storage | `import`, `db status`, `db export` |
//! | Report | Pivoted week tables | `report elements`, `report hours` |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug output:
//! ```bash
//! ipit --verbose report elements 2016 1 2016 8 --filter pcu
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod db_cmd;
mod output;
mod report_cmd;
mod weeks;

pub use app::{Cli, Commands, run};
pub use output::{Output, OutputFormat};
