//! Configuration module for Tasksheet.
//!
//! This module handles parsing configuration from environment variables.
//! Command-line flags in the `tasksheet` binary override these values.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `TASKSHEET_VAULT_DIR` | No | current directory | Root of the markdown tree |
//! | `TASKSHEET_CUSTOMERS_FOLDER` | No | `Customers` | Customers root, relative to the vault |
//! | `TASKSHEET_OUTPUT_PATH` | No | `outstanding_tasks.csv` | CSV path, relative to the vault unless absolute |
//! | `TASKSHEET_DELIMITER` | No | `,` | `,`, `;`, `comma` or `semicolon` |
//! | `TASKSHEET_COMPRESS_LEVELS` | No | `false` | Drop empty hierarchy columns |
//! | `TASKSHEET_INCLUDE_HEADER` | No | `true` | Write the header row |
//! | `TASKSHEET_DEBOUNCE_SECS` | No | 3 | Quiet period before a watch-triggered export (1-30) |
//! | `TASKSHEET_COMPLETION_MARKER` | No | `✅` | Glyph that, followed by a date, marks a task done; set but empty disables the check |
//!
//! # Example
//!
//! ```no_run
//! use tasksheet_exporter::config::Config;
//!
//! let config = Config::from_env().expect("Failed to load configuration");
//! println!("Writing to: {}", config.output_file().display());
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::parser::DEFAULT_COMPLETION_MARKER;
use crate::types::Delimiter;

/// Default customers folder name relative to the vault.
pub const DEFAULT_CUSTOMERS_FOLDER: &str = "Customers";

/// Default CSV output path relative to the vault.
pub const DEFAULT_OUTPUT_PATH: &str = "outstanding_tasks.csv";

/// Default debounce delay for watch mode (in seconds).
pub const DEFAULT_DEBOUNCE_SECS: u64 = 3;

/// Minimum allowed debounce delay.
pub const MIN_DEBOUNCE_SECS: u64 = 1;

/// Maximum allowed debounce delay.
pub const MAX_DEBOUNCE_SECS: u64 = 30;

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to determine the current directory (needed for the default vault).
    #[error("failed to determine current directory: {0}")]
    NoWorkingDirectory(#[source] std::io::Error),
}

/// CSV layout options handed to the writer on every export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    /// Field separator.
    pub delimiter: Delimiter,

    /// Drop empty hierarchy slots and emit ragged rows.
    pub compress_levels: bool,

    /// Emit the `CustomerName,ProjectName,...` header row.
    pub include_header: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: Delimiter::Comma,
            compress_levels: false,
            include_header: true,
        }
    }
}

/// Configuration for Tasksheet.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory all relative paths are resolved against.
    pub vault_dir: PathBuf,

    /// Customers root, relative to `vault_dir` (or absolute).
    pub customers_folder: PathBuf,

    /// CSV output path, relative to `vault_dir` (or absolute).
    pub output_path: PathBuf,

    /// CSV layout.
    pub csv: CsvOptions,

    /// Quiet period before a watch-triggered export, in seconds.
    pub debounce_secs: u64,

    /// Glyph that marks a dated, already-done task.
    pub completion_marker: String,
}

impl Config {
    /// Creates a configuration with defaults rooted at `vault_dir`.
    #[must_use]
    pub fn new(vault_dir: impl Into<PathBuf>) -> Self {
        Self {
            vault_dir: vault_dir.into(),
            customers_folder: PathBuf::from(DEFAULT_CUSTOMERS_FOLDER),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            csv: CsvOptions::default(),
            debounce_secs: DEFAULT_DEBOUNCE_SECS,
            completion_marker: DEFAULT_COMPLETION_MARKER.to_string(),
        }
    }

    /// Creates a new `Config` by parsing environment variables.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if:
    /// - `TASKSHEET_DELIMITER` is not one of the supported delimiters
    /// - a boolean variable is not `true`/`false`/`1`/`0`/`yes`/`no`/`on`/`off`
    /// - `TASKSHEET_DEBOUNCE_SECS` is not an integer between 1 and 30
    /// - `TASKSHEET_VAULT_DIR` is unset and the current directory is unavailable
    pub fn from_env() -> Result<Self, ConfigError> {
        // Optional: TASKSHEET_VAULT_DIR (default: current directory)
        let vault_dir = match non_empty_var("TASKSHEET_VAULT_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => env::current_dir().map_err(ConfigError::NoWorkingDirectory)?,
        };

        let mut config = Self::new(vault_dir);

        // Optional: TASKSHEET_CUSTOMERS_FOLDER (empty falls back to default)
        if let Some(folder) = non_empty_var("TASKSHEET_CUSTOMERS_FOLDER") {
            config.customers_folder = PathBuf::from(folder);
        }

        // Optional: TASKSHEET_OUTPUT_PATH (empty falls back to default)
        if let Some(output) = non_empty_var("TASKSHEET_OUTPUT_PATH") {
            config.output_path = PathBuf::from(output);
        }

        // Optional: TASKSHEET_DELIMITER (default: ',')
        if let Some(val) = non_empty_var("TASKSHEET_DELIMITER") {
            config.csv.delimiter =
                val.parse::<Delimiter>()
                    .map_err(|e| ConfigError::InvalidValue {
                        key: "TASKSHEET_DELIMITER".to_string(),
                        message: e.to_string(),
                    })?;
        }

        // Optional: TASKSHEET_COMPRESS_LEVELS (default: false)
        if let Some(val) = non_empty_var("TASKSHEET_COMPRESS_LEVELS") {
            config.csv.compress_levels = parse_bool("TASKSHEET_COMPRESS_LEVELS", &val)?;
        }

        // Optional: TASKSHEET_INCLUDE_HEADER (default: true)
        if let Some(val) = non_empty_var("TASKSHEET_INCLUDE_HEADER") {
            config.csv.include_header = parse_bool("TASKSHEET_INCLUDE_HEADER", &val)?;
        }

        // Optional: TASKSHEET_DEBOUNCE_SECS (default: 3, must be 1-30)
        if let Some(val) = non_empty_var("TASKSHEET_DEBOUNCE_SECS") {
            config.debounce_secs = parse_debounce_secs(&val)?;
        }

        // Optional: TASKSHEET_COMPLETION_MARKER (default: ✅, set but empty disables)
        if let Ok(marker) = env::var("TASKSHEET_COMPLETION_MARKER") {
            config.completion_marker = marker.trim().to_string();
        }

        Ok(config)
    }

    /// Absolute (or vault-relative) path of the customers root.
    #[must_use]
    pub fn customers_dir(&self) -> PathBuf {
        resolve(&self.vault_dir, &self.customers_folder)
    }

    /// Path the CSV is written to.
    #[must_use]
    pub fn output_file(&self) -> PathBuf {
        resolve(&self.vault_dir, &self.output_path)
    }

    /// Debounce interval for watch mode.
    #[must_use]
    pub fn debounce_interval(&self) -> Duration {
        Duration::from_secs(self.debounce_secs)
    }
}

/// Joins `path` onto `base` unless it is already absolute.
fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Reads an environment variable, treating empty or whitespace-only values as unset.
fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|val| !val.trim().is_empty())
}

/// Parses a boolean flag value.
pub(crate) fn parse_bool(key: &str, val: &str) -> Result<bool, ConfigError> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected true or false, got '{val}'"),
        }),
    }
}

/// Parses and range-checks the debounce delay.
pub fn parse_debounce_secs(val: &str) -> Result<u64, ConfigError> {
    let secs = val
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidValue {
            key: "TASKSHEET_DEBOUNCE_SECS".to_string(),
            message: format!("expected integer {MIN_DEBOUNCE_SECS}-{MAX_DEBOUNCE_SECS}, got '{val}'"),
        })?;

    if !(MIN_DEBOUNCE_SECS..=MAX_DEBOUNCE_SECS).contains(&secs) {
        return Err(ConfigError::InvalidValue {
            key: "TASKSHEET_DEBOUNCE_SECS".to_string(),
            message: format!(
                "debounce delay must be between {MIN_DEBOUNCE_SECS} and {MAX_DEBOUNCE_SECS} seconds, got {secs}"
            ),
        });
    }

    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::MarkdownParser;
    use serial_test::serial;
    use std::env;

    /// Helper to run tests with isolated environment variables.
    /// Clears all TASKSHEET_* vars before the test and restores them after.
    fn with_clean_env<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let saved_vars: Vec<(String, String)> = env::vars()
            .filter(|(k, _)| k.starts_with("TASKSHEET_"))
            .collect();

        for (key, _) in &saved_vars {
            env::remove_var(key);
        }

        let result = f();

        // Drop anything the test set, then restore the originals
        let set_by_test: Vec<String> = env::vars()
            .map(|(k, _)| k)
            .filter(|k| k.starts_with("TASKSHEET_"))
            .collect();
        for key in set_by_test {
            env::remove_var(key);
        }
        for (key, value) in saved_vars {
            env::set_var(key, value);
        }

        result
    }

    #[test]
    #[serial]
    fn test_defaults() {
        with_clean_env(|| {
            let config = Config::from_env().expect("should parse default config");

            assert_eq!(config.vault_dir, env::current_dir().unwrap());
            assert_eq!(config.customers_folder, PathBuf::from(DEFAULT_CUSTOMERS_FOLDER));
            assert_eq!(config.output_path, PathBuf::from(DEFAULT_OUTPUT_PATH));
            assert_eq!(config.csv, CsvOptions::default());
            assert_eq!(config.debounce_secs, DEFAULT_DEBOUNCE_SECS);
            assert_eq!(config.completion_marker, DEFAULT_COMPLETION_MARKER);
        });
    }

    #[test]
    #[serial]
    fn test_full_config() {
        with_clean_env(|| {
            env::set_var("TASKSHEET_VAULT_DIR", "/notes");
            env::set_var("TASKSHEET_CUSTOMERS_FOLDER", "Clients");
            env::set_var("TASKSHEET_OUTPUT_PATH", "exports/tasks.csv");
            env::set_var("TASKSHEET_DELIMITER", ";");
            env::set_var("TASKSHEET_COMPRESS_LEVELS", "yes");
            env::set_var("TASKSHEET_INCLUDE_HEADER", "0");
            env::set_var("TASKSHEET_DEBOUNCE_SECS", "10");
            env::set_var("TASKSHEET_COMPLETION_MARKER", "✔");

            let config = Config::from_env().expect("should parse full config");

            assert_eq!(config.vault_dir, PathBuf::from("/notes"));
            assert_eq!(config.customers_dir(), PathBuf::from("/notes/Clients"));
            assert_eq!(config.output_file(), PathBuf::from("/notes/exports/tasks.csv"));
            assert_eq!(config.csv.delimiter, Delimiter::Semicolon);
            assert!(config.csv.compress_levels);
            assert!(!config.csv.include_header);
            assert_eq!(config.debounce_interval(), Duration::from_secs(10));
            assert_eq!(config.completion_marker, "✔");
        });
    }

    #[test]
    #[serial]
    fn test_empty_values_fall_back_to_defaults() {
        with_clean_env(|| {
            env::set_var("TASKSHEET_VAULT_DIR", "/notes");
            env::set_var("TASKSHEET_CUSTOMERS_FOLDER", "");
            env::set_var("TASKSHEET_OUTPUT_PATH", "   ");

            let config = Config::from_env().expect("should parse config");

            assert_eq!(config.customers_dir(), PathBuf::from("/notes/Customers"));
            assert_eq!(
                config.output_file(),
                PathBuf::from("/notes/outstanding_tasks.csv")
            );
        });
    }

    #[test]
    #[serial]
    fn test_empty_completion_marker_disables_check() {
        with_clean_env(|| {
            env::set_var("TASKSHEET_VAULT_DIR", "/notes");
            env::set_var("TASKSHEET_COMPLETION_MARKER", "  ");

            let config = Config::from_env().expect("should parse config");
            assert_eq!(config.completion_marker, "");

            let records = MarkdownParser::with_completion_marker(&config.completion_marker)
                .parse("- [ ] Shipped \u{2705} 2024-01-01\n", "c", "p");
            assert_eq!(records.len(), 1);
        });
    }

    #[test]
    #[serial]
    fn test_absolute_output_path_ignores_vault() {
        with_clean_env(|| {
            env::set_var("TASKSHEET_VAULT_DIR", "/notes");
            env::set_var("TASKSHEET_OUTPUT_PATH", "/tmp/out.csv");

            let config = Config::from_env().expect("should parse config");
            assert_eq!(config.output_file(), PathBuf::from("/tmp/out.csv"));
        });
    }

    #[test]
    #[serial]
    fn test_invalid_delimiter() {
        with_clean_env(|| {
            env::set_var("TASKSHEET_DELIMITER", "|");

            let err = Config::from_env().unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue { ref key, .. } if key == "TASKSHEET_DELIMITER"
            ));
        });
    }

    #[test]
    #[serial]
    fn test_invalid_bool() {
        with_clean_env(|| {
            env::set_var("TASKSHEET_COMPRESS_LEVELS", "maybe");

            let err = Config::from_env().unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue { ref key, ref message }
                    if key == "TASKSHEET_COMPRESS_LEVELS" && message.contains("maybe")
            ));
        });
    }

    #[test]
    #[serial]
    fn test_debounce_zero_rejected() {
        with_clean_env(|| {
            env::set_var("TASKSHEET_DEBOUNCE_SECS", "0");

            let err = Config::from_env().unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue { ref key, ref message }
                    if key == "TASKSHEET_DEBOUNCE_SECS" && message.contains("between 1 and 30")
            ));
        });
    }

    #[test]
    #[serial]
    fn test_debounce_thirty_one_rejected() {
        with_clean_env(|| {
            env::set_var("TASKSHEET_DEBOUNCE_SECS", "31");
            assert!(Config::from_env().is_err());
        });
    }

    #[test]
    #[serial]
    fn test_debounce_not_a_number() {
        with_clean_env(|| {
            env::set_var("TASKSHEET_DEBOUNCE_SECS", "soon");

            let err = Config::from_env().unwrap_err();
            assert_eq!(
                err.to_string(),
                "invalid value for TASKSHEET_DEBOUNCE_SECS: expected integer 1-30, got 'soon'"
            );
        });
    }

    #[test]
    fn test_parse_bool_variants() {
        for truthy in ["1", "true", "TRUE", " yes ", "on"] {
            assert!(parse_bool("K", truthy).unwrap(), "{truthy}");
        }
        for falsy in ["0", "false", "No", "off"] {
            assert!(!parse_bool("K", falsy).unwrap(), "{falsy}");
        }
    }

    #[test]
    fn test_debounce_bounds_inclusive() {
        assert_eq!(parse_debounce_secs("1").unwrap(), 1);
        assert_eq!(parse_debounce_secs("30").unwrap(), 30);
    }
}
