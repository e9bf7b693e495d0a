//! Record types shared by the parser, the CSV writer and the exporter.
//!
//! Records serialize to camelCase JSON for the `list --json` preview.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// A single outstanding task together with its hierarchical context.
///
/// One record becomes one CSV data row. Records are built once by the
/// parser and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    /// Top-level grouping, taken from the first folder under the customers root.
    pub customer: String,

    /// Sub-grouping, taken from the document's file stem.
    pub project: String,

    /// Header trail (one slot per heading depth, empty for skipped depths)
    /// followed by the ancestor tasks, outermost first.
    pub levels: Vec<String>,

    /// The task's own text, trimmed.
    pub task: String,
}

impl TaskRecord {
    /// Creates a new record.
    #[must_use]
    pub fn new(
        customer: impl Into<String>,
        project: impl Into<String>,
        levels: Vec<String>,
        task: impl Into<String>,
    ) -> Self {
        Self {
            customer: customer.into(),
            project: project.into(),
            levels,
            task: task.into(),
        }
    }

    /// Iterates over the non-empty entries of `levels`.
    pub fn occupied_levels(&self) -> impl Iterator<Item = &str> {
        self.levels
            .iter()
            .map(String::as_str)
            .filter(|level| !level.is_empty())
    }
}

/// Field separator for the CSV output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delimiter {
    /// `,` - the RFC 4180 default.
    #[default]
    Comma,
    /// `;` - common for spreadsheet locales that use `,` as decimal mark.
    Semicolon,
}

impl Delimiter {
    /// Returns the separator character.
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Comma => ',',
            Self::Semicolon => ';',
        }
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Error returned when a delimiter name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported delimiter '{0}' (expected ',' or ';')")]
pub struct ParseDelimiterError(pub String);

impl FromStr for Delimiter {
    type Err = ParseDelimiterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "," | "comma" => Ok(Self::Comma),
            ";" | "semicolon" => Ok(Self::Semicolon),
            _ => Err(ParseDelimiterError(s.to_string())),
        }
    }
}
