//! Debounce utility for coalescing bursts of change notifications.
//!
//! Editors tend to write a file several times in quick succession (temp
//! file, rename, metadata touch). The debouncer holds the latest value per
//! key and only emits it once the key has been quiet for the configured
//! interval. Every new event for a key cancels its pending timer and
//! schedules a fresh one.
//!
//! # Architecture
//!
//! A background task owns the pending map. Callers talk to it through a
//! command channel:
//!
//! 1. `Event(key, value)` replaces the pending value for `key` and resets its
//!    deadline to `now + interval`
//! 2. `Cancel` drops every pending value without emitting it
//! 3. When a deadline passes, the value is sent on the output channel
//! 4. When every [`Debouncer`] handle is dropped, remaining values are
//!    flushed immediately and the task exits
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use std::time::Duration;
//! use tokio::sync::mpsc;
//! use tasksheet_exporter::utils::debounce::Debouncer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (output_tx, mut output_rx) = mpsc::channel(16);
//!     let debouncer = Debouncer::new(Duration::from_secs(3), output_tx);
//!
//!     let root = PathBuf::from("/vault/Customers");
//!     debouncer.send(root.clone(), PathBuf::from("/vault/Customers/Acme/a.md")).await.unwrap();
//!     debouncer.send(root.clone(), PathBuf::from("/vault/Customers/Acme/b.md")).await.unwrap();
//!
//!     // Three seconds after the last change, a single trigger comes out.
//!     if let Some((_, last_changed)) = output_rx.recv().await {
//!         assert_eq!(last_changed, PathBuf::from("/vault/Customers/Acme/b.md"));
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Capacity of the command channel feeding the background task.
const COMMAND_CHANNEL_CAPACITY: usize = 1000;

/// Error type for debouncer operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DebouncerError {
    /// The background task has stopped and no longer accepts commands.
    #[error("debouncer channel closed")]
    ChannelClosed,
}

/// Messages understood by the background task.
#[derive(Debug)]
enum Command<K, V> {
    Event(K, V),
    Cancel,
}

/// A value waiting for its key to go quiet.
#[derive(Debug)]
struct Pending<V> {
    value: V,
    deadline: Instant,
}

/// Coalesces rapid events per key, emitting the latest value after a quiet period.
///
/// # Type Parameters
///
/// * `K` - Grouping key (the watcher uses the customers root, so all changes
///   share one timer)
/// * `V` - Event value; only the most recent one per key is kept
#[derive(Debug)]
pub struct Debouncer<K, V>
where
    K: Clone + Eq + Hash + Send + 'static,
    V: Send + 'static,
{
    command_tx: mpsc::Sender<Command<K, V>>,
    interval: Duration,
}

impl<K, V> Debouncer<K, V>
where
    K: Clone + Eq + Hash + Send + Debug + 'static,
    V: Send + 'static,
{
    /// Creates a debouncer and spawns its background task.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(interval: Duration, output_tx: mpsc::Sender<(K, V)>) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

        tokio::spawn(run_debounce_loop(interval, command_rx, output_tx));

        Self {
            command_tx,
            interval,
        }
    }

    /// Returns the quiet period.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Queues an event, restarting the quiet period for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DebouncerError::ChannelClosed`] if the background task has
    /// terminated.
    pub async fn send(&self, key: K, value: V) -> Result<(), DebouncerError> {
        self.command_tx
            .send(Command::Event(key, value))
            .await
            .map_err(|_| DebouncerError::ChannelClosed)
    }

    /// Queues an event without waiting for channel capacity.
    ///
    /// Used from the synchronous notify callback. Returns `false` if the
    /// channel is full or closed.
    pub fn try_send(&self, key: K, value: V) -> bool {
        self.command_tx.try_send(Command::Event(key, value)).is_ok()
    }

    /// Drops every pending event without emitting it.
    ///
    /// # Errors
    ///
    /// Returns [`DebouncerError::ChannelClosed`] if the background task has
    /// terminated.
    pub async fn cancel(&self) -> Result<(), DebouncerError> {
        self.command_tx
            .send(Command::Cancel)
            .await
            .map_err(|_| DebouncerError::ChannelClosed)
    }
}

/// Runs the debounce loop until every sender is dropped.
async fn run_debounce_loop<K, V>(
    interval: Duration,
    mut command_rx: mpsc::Receiver<Command<K, V>>,
    output_tx: mpsc::Sender<(K, V)>,
) where
    K: Clone + Eq + Hash + Debug,
{
    let mut pending: HashMap<K, Pending<V>> = HashMap::new();

    debug!(interval_ms = interval.as_millis(), "Starting debounce loop");

    loop {
        let next_deadline = pending.values().map(|p| p.deadline).min();

        tokio::select! {
            command = command_rx.recv() => {
                match command {
                    Some(Command::Event(key, value)) => {
                        trace!(key = ?key, "Event received, rescheduling");
                        let deadline = Instant::now() + interval;
                        pending.insert(key, Pending { value, deadline });
                    }
                    Some(Command::Cancel) => {
                        debug!(dropped = pending.len(), "Cancelling pending events");
                        pending.clear();
                    }
                    None => {
                        debug!("Command channel closed, flushing pending events");
                        flush_all(&mut pending, &output_tx).await;
                        break;
                    }
                }
            }

            () = sleep_until_deadline(next_deadline) => {
                emit_expired(&mut pending, &output_tx).await;
            }
        }
    }

    debug!("Debounce loop terminated");
}

/// Sleeps until `deadline`, or forever when nothing is pending.
async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Emits every pending value whose deadline has passed.
async fn emit_expired<K, V>(pending: &mut HashMap<K, Pending<V>>, output_tx: &mpsc::Sender<(K, V)>)
where
    K: Clone + Eq + Hash + Debug,
{
    let now = Instant::now();

    let expired: Vec<K> = pending
        .iter()
        .filter(|(_, p)| p.deadline <= now)
        .map(|(key, _)| key.clone())
        .collect();

    for key in expired {
        if let Some(p) = pending.remove(&key) {
            trace!(key = ?key, "Emitting debounced event");
            if output_tx.send((key.clone(), p.value)).await.is_err() {
                warn!(key = ?key, "Debounce output channel closed, dropping event");
            }
        }
    }
}

/// Emits every pending value immediately.
async fn flush_all<K, V>(pending: &mut HashMap<K, Pending<V>>, output_tx: &mpsc::Sender<(K, V)>)
where
    K: Clone + Eq + Hash + Debug,
{
    for (key, p) in pending.drain() {
        trace!(key = ?key, "Flushing pending event");
        if output_tx.send((key.clone(), p.value)).await.is_err() {
            warn!(key = ?key, "Debounce output channel closed, dropping event");
        }
    }
}
