//! Automatic re-export when task documents change.
//!
//! # Architecture
//!
//! ```text
//! notify callback --try_send--> Debouncer --(quiet period)--> processor task
//!                                                              |
//!                                                   tokio::spawn(export)
//! ```
//!
//! The notify callback only filters paths and forwards them. Every change
//! shares one debounce key (the customers root), so a burst of saves across
//! several files collapses into a single export. Each settled trigger spawns
//! its own export. A trigger that lands while an export is in flight gets
//! [`ExportOutcome::AlreadyRunning`], and the in-flight export runs once more
//! so the change is still picked up.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tasksheet_exporter::{Config, Exporter};
//! use tasksheet_exporter::watcher::{export_and_log, TaskWatcher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let exporter = Arc::new(Exporter::new(&config));
//!
//!     let watcher = TaskWatcher::start(Arc::clone(&exporter), config.debounce_interval())?;
//!     export_and_log(&exporter).await;
//!
//!     tokio::signal::ctrl_c().await?;
//!     watcher.stop().await?;
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use notify::{event::ModifyKind, Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::collector::is_task_document;
use crate::exporter::{ExportOutcome, Exporter};
use crate::status::describe_since;
use crate::utils::debounce::{Debouncer, DebouncerError};

/// Capacity of the channel carrying settled triggers.
const TRIGGER_CHANNEL_CAPACITY: usize = 16;

/// Errors that can occur while setting up a watch.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to initialize the file system watcher.
    #[error("failed to create watcher: {0}")]
    WatcherInit(#[from] notify::Error),

    /// The watch directory does not exist or is inaccessible.
    #[error("watch directory does not exist: {}", .0.display())]
    DirectoryNotFound(PathBuf),
}

/// Result type for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Watches the customers root and re-exports after changes settle.
///
/// Dropping the value stops the file system subscription; [`TaskWatcher::stop`]
/// additionally discards a pending trigger.
#[derive(Debug)]
pub struct TaskWatcher {
    /// Kept alive to maintain the watch subscription.
    watcher: RecommendedWatcher,

    debouncer: Arc<Debouncer<PathBuf, PathBuf>>,

    /// Canonical customers root; notify reports paths below it.
    customers_dir: PathBuf,
}

impl TaskWatcher {
    /// Starts watching the exporter's customers root.
    ///
    /// Must be called from within a Tokio runtime. No export is run here;
    /// callers typically follow up with [`export_and_log`].
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The customers root does not exist
    /// - The file system watcher cannot be initialized
    pub fn start(exporter: Arc<Exporter>, debounce: Duration) -> Result<Self> {
        let customers_dir = exporter
            .customers_dir()
            .canonicalize()
            .map_err(|_| WatcherError::DirectoryNotFound(exporter.customers_dir().to_path_buf()))?;

        if !customers_dir.is_dir() {
            return Err(WatcherError::DirectoryNotFound(customers_dir));
        }

        let (trigger_tx, trigger_rx) = mpsc::channel::<(PathBuf, PathBuf)>(TRIGGER_CHANNEL_CAPACITY);
        let debouncer = Arc::new(Debouncer::new(debounce, trigger_tx));

        tokio::spawn(process_debounced_changes(trigger_rx, exporter));

        let watcher = create_watcher(customers_dir.clone(), Arc::clone(&debouncer))?;

        info!(
            customers_dir = %customers_dir.display(),
            debounce_ms = debounce.as_millis(),
            "Watching for task changes"
        );

        Ok(Self {
            watcher,
            debouncer,
            customers_dir,
        })
    }

    /// Returns the directory being watched.
    #[must_use]
    pub fn customers_dir(&self) -> &Path {
        &self.customers_dir
    }

    /// Stops watching and drops any trigger still waiting out its quiet period.
    ///
    /// Exports that already started are left to finish.
    ///
    /// # Errors
    ///
    /// Returns [`DebouncerError::ChannelClosed`] if the debouncer task has
    /// already terminated.
    pub async fn stop(self) -> std::result::Result<(), DebouncerError> {
        drop(self.watcher);
        self.debouncer.cancel().await?;
        debug!(customers_dir = %self.customers_dir.display(), "Stopped watching");
        Ok(())
    }
}

/// Runs one export and logs the outcome; failures never propagate.
///
/// Returns the outcome when the export itself did not fail.
pub async fn export_and_log(exporter: &Exporter) -> Option<ExportOutcome> {
    let previous = exporter.last_export().await;

    match exporter.export().await {
        Ok(outcome) => {
            match &outcome {
                ExportOutcome::Written { task_count, path } => {
                    let previous_export = previous
                        .map(|then| describe_since(then, Utc::now()))
                        .unwrap_or_else(|| "never".to_string());
                    info!(
                        path = %path.display(),
                        task_count,
                        previous_export = %previous_export,
                        "Auto-export complete"
                    );
                }
                ExportOutcome::NoTasks => {
                    info!("Auto-export skipped: no outstanding tasks");
                }
                ExportOutcome::AlreadyRunning => {
                    debug!("Export in progress, it will run again when done");
                }
            }
            Some(outcome)
        }
        Err(e) => {
            error!(error = %e, "Auto-export failed");
            None
        }
    }
}

/// Creates the notify watcher; the callback only filters and forwards.
fn create_watcher(
    customers_dir: PathBuf,
    debouncer: Arc<Debouncer<PathBuf, PathBuf>>,
) -> Result<RecommendedWatcher> {
    let root = customers_dir.clone();
    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<Event, notify::Error>| {
            handle_notify_event(res, &root, &debouncer);
        },
        Config::default(),
    )?;

    watcher.watch(&customers_dir, RecursiveMode::Recursive)?;

    debug!(
        customers_dir = %customers_dir.display(),
        "Started recursive file watch"
    );

    Ok(watcher)
}

/// Forwards relevant task document changes to the debouncer.
fn handle_notify_event(
    res: std::result::Result<Event, notify::Error>,
    customers_dir: &Path,
    debouncer: &Debouncer<PathBuf, PathBuf>,
) {
    let event = match res {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "File watcher error");
            return;
        }
    };

    if !is_relevant_kind(&event.kind) {
        trace!(kind = ?event.kind, "Ignoring event kind");
        return;
    }

    for path in &event.paths {
        if !is_task_document(path, customers_dir) {
            continue;
        }

        debug!(path = %path.display(), kind = ?event.kind, "Task document changed");

        // Every change shares the root key so saves across files coalesce.
        if !debouncer.try_send(customers_dir.to_path_buf(), path.clone()) {
            warn!(path = %path.display(), "Failed to send to debouncer: channel full or closed");
        }
    }
}

/// Content changes count; metadata-only and access events do not.
fn is_relevant_kind(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    }
}

/// Spawns an export for every settled trigger.
async fn process_debounced_changes(
    mut rx: mpsc::Receiver<(PathBuf, PathBuf)>,
    exporter: Arc<Exporter>,
) {
    while let Some((_, last_changed)) = rx.recv().await {
        debug!(path = %last_changed.display(), "Changes settled, exporting");

        let exporter = Arc::clone(&exporter);
        tokio::spawn(async move {
            export_and_log(&exporter).await;
        });
    }

    debug!("Trigger processor shutting down");
}
