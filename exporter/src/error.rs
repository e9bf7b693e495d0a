//! Error types for Tasksheet.
//!
//! Each module owns a narrow error enum. [`ExporterError`] covers what can go
//! wrong during an export or preview. Configuration and watcher errors stay in
//! their own types ([`ConfigError`](crate::config::ConfigError),
//! [`WatcherError`](crate::watcher::WatcherError)) because no export path can
//! produce them.

use std::path::PathBuf;

use thiserror::Error;

use crate::csv_writer::CsvError;

/// Errors that can occur while exporting.
///
/// # Examples
///
/// ```ignore
/// use tasksheet_exporter::error::ExporterError;
///
/// fn render(records: &[TaskRecord]) -> Result<String, ExporterError> {
///     Ok(CsvWriter::default().generate(records, false, true)?)
/// }
/// ```
#[derive(Error, Debug)]
pub enum ExporterError {
    /// The CSV file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV generation error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The background collection task panicked or was cancelled.
    #[error("export task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A specialized `Result` type for Tasksheet operations.
pub type Result<T> = std::result::Result<T, ExporterError>;
