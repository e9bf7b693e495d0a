//! CSV serialization of task records.
//!
//! Produces a single text blob with a leading UTF-8 byte-order mark so that
//! spreadsheet tools pick the right encoding.
//!
//! # Column layout
//!
//! ```text
//! CustomerName,ProjectName,Level1,...,LevelN,Task
//! ```
//!
//! In the default (aligned) layout every row has exactly `N` level columns,
//! where `N` is the longest `levels` across all records; missing levels are
//! empty fields. In the compressed layout empty levels are dropped and each
//! row only carries its own non-empty levels, so rows may be ragged.
//!
//! Fields are escaped per RFC 4180: a field containing the delimiter, a
//! double quote, `\n` or `\r` is quoted and inner quotes are doubled.

use thiserror::Error;

use crate::types::{Delimiter, TaskRecord};

/// Byte-order mark prepended to every generated document.
pub const UTF8_BOM: char = '\u{FEFF}';

/// Names of the fixed header columns.
const CUSTOMER_COLUMN: &str = "CustomerName";
const PROJECT_COLUMN: &str = "ProjectName";
const TASK_COLUMN: &str = "Task";

/// Errors that can occur while generating CSV.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CsvError {
    /// No records were supplied.
    #[error("no tasks to export")]
    EmptyInput,
}

/// Serializes [`TaskRecord`]s to CSV text.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvWriter {
    delimiter: Delimiter,
}

impl CsvWriter {
    /// Creates a writer using `delimiter` between fields.
    #[must_use]
    pub fn new(delimiter: Delimiter) -> Self {
        Self { delimiter }
    }

    /// Returns the configured delimiter.
    #[must_use]
    pub fn delimiter(&self) -> Delimiter {
        self.delimiter
    }

    /// Generates the CSV document for `records`.
    ///
    /// # Errors
    ///
    /// Returns [`CsvError::EmptyInput`] when `records` is empty, whatever the
    /// flags. Callers are expected to skip the export instead of writing a
    /// header-only file.
    pub fn generate(
        &self,
        records: &[TaskRecord],
        compress_levels: bool,
        include_header: bool,
    ) -> Result<String, CsvError> {
        if records.is_empty() {
            return Err(CsvError::EmptyInput);
        }

        let max_depth = if compress_levels {
            max_occupied_depth(records)
        } else {
            max_level_depth(records)
        };

        let mut csv = String::new();
        csv.push(UTF8_BOM);

        if include_header {
            let mut header: Vec<String> = Vec::with_capacity(max_depth + 3);
            header.push(CUSTOMER_COLUMN.to_string());
            header.push(PROJECT_COLUMN.to_string());
            header.extend((1..=max_depth).map(|i| format!("Level{i}")));
            header.push(TASK_COLUMN.to_string());
            self.push_row(&mut csv, header.iter().map(String::as_str));
        }

        for record in records {
            let mut fields: Vec<&str> = Vec::with_capacity(max_depth + 3);
            fields.push(&record.customer);
            fields.push(&record.project);

            if compress_levels {
                fields.extend(record.occupied_levels());
            } else {
                fields.extend(
                    (0..max_depth).map(|i| record.levels.get(i).map_or("", String::as_str)),
                );
            }

            fields.push(&record.task);
            self.push_row(&mut csv, fields.into_iter());
        }

        Ok(csv)
    }

    /// Appends one delimiter-joined, newline-terminated row.
    fn push_row<'a>(&self, out: &mut String, fields: impl Iterator<Item = &'a str>) {
        for (i, field) in fields.enumerate() {
            if i > 0 {
                out.push(self.delimiter.as_char());
            }
            out.push_str(&self.escape_field(field));
        }
        out.push('\n');
    }

    /// Quotes a field if it contains the delimiter, a quote, or a line break.
    fn escape_field(&self, field: &str) -> String {
        if field.is_empty() {
            return String::new();
        }

        let needs_quotes = field.contains(self.delimiter.as_char())
            || field.contains('"')
            || field.contains('\n')
            || field.contains('\r');

        if needs_quotes {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }
}

/// Longest `levels` across all records, placeholders included.
fn max_level_depth(records: &[TaskRecord]) -> usize {
    records.iter().map(|r| r.levels.len()).max().unwrap_or(0)
}

/// Largest number of non-empty levels held by any single record.
fn max_occupied_depth(records: &[TaskRecord]) -> usize {
    records
        .iter()
        .map(|r| r.occupied_levels().count())
        .max()
        .unwrap_or(0)
}
