//! Export orchestration: collect, serialize, write.
//!
//! [`Exporter`] is the single entry point used by both the one-shot `export`
//! command and the watch loop. At most one export runs at a time. A request
//! that arrives while another is in flight returns
//! [`ExportOutcome::AlreadyRunning`] straight away and marks the exporter
//! dirty; the in-flight export then runs once more before it returns, so
//! edits saved after its collection pass still reach the CSV. Any number of
//! overlapping requests collapse into that single follow-up run.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::collector::Collector;
use crate::config::{Config, CsvOptions};
use crate::csv_writer::CsvWriter;
use crate::error::{ExporterError, Result};
use crate::types::TaskRecord;

/// Result of a single export request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The CSV was written.
    Written {
        /// Number of data rows.
        task_count: usize,
        /// Where the CSV went.
        path: PathBuf,
    },

    /// No outstanding tasks were found; the output file was left alone.
    NoTasks,

    /// Another export was already running. It will run once more after its
    /// current pass.
    AlreadyRunning,
}

/// State guarded by the single-flight lock.
#[derive(Debug, Default)]
struct ExportState {
    last_export: Option<DateTime<Utc>>,
    /// Collection passes run by this exporter, follow-up runs included.
    runs: u64,
}

/// Runs exports for one configuration.
#[derive(Debug)]
pub struct Exporter {
    collector: Collector,
    writer: CsvWriter,
    csv: CsvOptions,
    output_file: PathBuf,
    state: Mutex<ExportState>,
    /// Set by a request that found an export in flight.
    rerun_requested: AtomicBool,
}

impl Exporter {
    /// Creates an exporter from `config`.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            collector: Collector::from_config(config),
            writer: CsvWriter::new(config.csv.delimiter),
            csv: config.csv,
            output_file: config.output_file(),
            state: Mutex::new(ExportState::default()),
            rerun_requested: AtomicBool::new(false),
        }
    }

    /// Path the CSV is written to.
    #[must_use]
    pub fn output_file(&self) -> &Path {
        &self.output_file
    }

    /// Customers root being scanned.
    #[must_use]
    pub fn customers_dir(&self) -> &Path {
        self.collector.customers_dir()
    }

    /// Time of the last successful write by this exporter.
    ///
    /// Waits for an in-flight export to finish.
    pub async fn last_export(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.last_export
    }

    /// Collects the current records without writing anything.
    #[must_use]
    pub fn preview(&self) -> Vec<TaskRecord> {
        self.collector.collect()
    }

    /// Collects the current records and renders them as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ExporterError::Json`] if serialization fails.
    pub fn preview_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.preview())?)
    }

    /// Runs one export, plus one follow-up run if more requests arrived
    /// while it was in flight.
    ///
    /// Returns the outcome of the last run this call performed, or
    /// [`ExportOutcome::AlreadyRunning`] if another call holds the export.
    ///
    /// # Errors
    ///
    /// Returns an error if the output directory cannot be created, the file
    /// cannot be written, or the collection task fails.
    pub async fn export(&self) -> Result<ExportOutcome> {
        let mut outcome = ExportOutcome::AlreadyRunning;

        loop {
            let Some(mut state) = self.acquire() else {
                debug!("Export already in progress, follow-up run requested");
                return Ok(outcome);
            };

            self.rerun_requested.store(false, Ordering::SeqCst);
            outcome = self.run_locked(&mut state).await?;
            drop(state);

            if !self.rerun_requested.load(Ordering::SeqCst) {
                return Ok(outcome);
            }
            debug!("Changes requested during export, exporting again");
        }
    }

    /// Takes the single-flight lock, or flags a follow-up run for its holder.
    ///
    /// The flag is raised before the second attempt, so a holder that
    /// releases in between either sees the flag or leaves the lock free.
    fn acquire(&self) -> Option<MutexGuard<'_, ExportState>> {
        if let Ok(state) = self.state.try_lock() {
            return Some(state);
        }
        self.rerun_requested.store(true, Ordering::SeqCst);
        self.state.try_lock().ok()
    }

    /// One collect, serialize and write pass. The caller holds the lock.
    async fn run_locked(&self, state: &mut ExportState) -> Result<ExportOutcome> {
        state.runs += 1;

        let collector = self.collector.clone();
        let records = tokio::task::spawn_blocking(move || collector.collect()).await?;

        if records.is_empty() {
            info!(
                customers_dir = %self.collector.customers_dir().display(),
                "No outstanding tasks found"
            );
            return Ok(ExportOutcome::NoTasks);
        }

        let csv = self.writer.generate(
            &records,
            self.csv.compress_levels,
            self.csv.include_header,
        )?;

        write_output(&self.output_file, &csv).await?;

        state.last_export = Some(Utc::now());

        info!(
            path = %self.output_file.display(),
            task_count = records.len(),
            run = state.runs,
            "Exported outstanding tasks"
        );

        Ok(ExportOutcome::Written {
            task_count: records.len(),
            path: self.output_file.clone(),
        })
    }
}

/// Replaces `path` with `contents`, creating parent directories first.
async fn write_output(path: &Path, contents: &str) -> Result<()> {
    let to_write_error = |source| ExporterError::WriteOutput {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(to_write_error)?;
    }

    tokio::fs::write(path, contents)
        .await
        .map_err(to_write_error)
}
