//! Human-readable "last export" phrasing.

use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Duration, Utc};

/// Describes how long ago something happened, rounded down to whole units.
///
/// Negative durations (clock skew, future mtimes) read as `just now`.
#[must_use]
pub fn describe_elapsed(elapsed: Duration) -> String {
    let minutes = elapsed.num_minutes();

    if minutes < 1 {
        "just now".to_string()
    } else if minutes == 1 {
        "1 minute ago".to_string()
    } else if minutes < 60 {
        format!("{minutes} minutes ago")
    } else {
        let hours = minutes / 60;
        if hours == 1 {
            "1 hour ago".to_string()
        } else {
            format!("{hours} hours ago")
        }
    }
}

/// Describes the time between `then` and `now`.
#[must_use]
pub fn describe_since(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    describe_elapsed(now.signed_duration_since(then))
}

/// Returns the modification time of a previous export, if the file exists.
pub fn last_export_time(output_file: &Path) -> Option<DateTime<Utc>> {
    let modified: SystemTime = std::fs::metadata(output_file).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}

/// Status line for the `status` command.
#[must_use]
pub fn status_line(last_export: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match last_export {
        Some(then) => format!("Last export: {}", describe_since(then, now)),
        None => "No export yet".to_string(),
    }
}
