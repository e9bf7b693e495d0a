//! Tasksheet - outstanding markdown tasks exported to CSV.
//!
//! This crate scans a tree of markdown documents organised as
//! `<customers root>/<customer>/**/<project>.md`, extracts every open leaf
//! task together with its heading and parent-task context, and writes them
//! to a spreadsheet-friendly CSV file.
//!
//! # Overview
//!
//! ```text
//! collector -> parser -> csv_writer -> exporter -> output file
//!                                          ^
//!                     watcher -> debounce -+
//! ```
//!
//! The parser and writer are pure and synchronous. The exporter adds
//! single-flight file output, and the watcher re-runs it after changes
//! settle.
//!
//! # Modules
//!
//! - [`types`]: Task records and the CSV delimiter
//! - [`parser`]: Markdown task extraction
//! - [`csv_writer`]: CSV serialization
//! - [`collector`]: Directory walk and customer/project derivation
//! - [`exporter`]: Export orchestration
//! - [`watcher`]: Automatic re-export on file changes
//! - [`status`]: "Last export" phrasing
//! - [`config`]: Configuration from environment variables
//! - [`error`]: Error types
//! - [`utils`]: Shared utilities (debouncing)

pub mod collector;
pub mod config;
pub mod csv_writer;
pub mod error;
pub mod exporter;
pub mod parser;
pub mod status;
pub mod types;
pub mod utils;
pub mod watcher;

pub use collector::{Collector, TaskDocument};
pub use config::{Config, ConfigError, CsvOptions};
pub use csv_writer::{CsvError, CsvWriter};
pub use error::{ExporterError, Result};
pub use exporter::{ExportOutcome, Exporter};
pub use parser::{parse_tasks, MarkdownParser};
pub use types::{Delimiter, TaskRecord};
pub use utils::{Debouncer, DebouncerError};
pub use watcher::{TaskWatcher, WatcherError};
