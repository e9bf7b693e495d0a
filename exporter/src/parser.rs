//! Markdown task parser for Tasksheet.
//!
//! Extracts outstanding (unchecked) tasks from a markdown document together
//! with the context they live in: the trail of `##`-and-deeper headings above
//! them and the chain of unchecked parent tasks they are nested under.
//!
//! Only a narrow subset of markdown is understood:
//!
//! | Line form | Example | Effect |
//! |-----------|---------|--------|
//! | Heading (two or more `#`) | `### Backend` | Sets the header trail, clears parent tasks |
//! | Completed task | `- [x] Done` | Ignored entirely |
//! | Open task | `    - [ ] Write docs` | Parent or leaf, depending on what follows |
//! | Anything else | prose, blank lines, `* item` | Ignored |
//!
//! Only leaf tasks (open tasks without more-indented tasks below them) become
//! [`TaskRecord`]s. A parent task shows up in the `levels` of its leaves.
//!
//! # Example
//!
//! ```
//! use tasksheet_exporter::parser::parse_tasks;
//!
//! let content = "## Setup\n- [ ] Configure env\n    - [ ] Set API key\n";
//! let records = parse_tasks(content, "Acme", "Widgets");
//!
//! assert_eq!(records.len(), 1);
//! assert_eq!(records[0].levels, vec!["Setup", "Configure env"]);
//! assert_eq!(records[0].task, "Set API key");
//! ```

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use crate::types::TaskRecord;

/// Glyph that, followed by a date, marks a task as done even though its box
/// is still unchecked (U+2705 WHITE HEAVY CHECK MARK).
pub const DEFAULT_COMPLETION_MARKER: &str = "\u{2705}";

/// `## Heading` and deeper. Single `#` titles are not part of the trail.
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{2,})\s+(.+)$").expect("heading regex"));

/// `- [x]` / `- [X]` at any indentation.
static COMPLETED_TASK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*-\s+\[[xX]\]").expect("completed task regex"));

/// `- [ ] text`, capturing the indentation and the text.
static OPEN_TASK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)-\s+\[ \]\s+(\S.*)$").expect("open task regex"));

/// A task with text, checked or not. Used when looking ahead for subtasks.
///
/// Must accept the same line shape as [`OPEN_TASK_RE`]: a box the parser
/// would never emit (`- [ ]`, `- [ ]text`) cannot make its predecessor a parent.
static ANY_TASK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)-\s+\[[ xX]\]\s+\S").expect("task regex"));

static DEFAULT_PARSER: LazyLock<MarkdownParser> = LazyLock::new(MarkdownParser::new);

/// Parses `content` with the default completion marker.
///
/// See [`MarkdownParser::parse`].
#[must_use]
pub fn parse_tasks(content: &str, customer: &str, project: &str) -> Vec<TaskRecord> {
    DEFAULT_PARSER.parse(content, customer, project)
}

/// Classification of a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind<'a> {
    Heading { depth: usize, text: &'a str },
    CompletedTask,
    OpenTask { indent: usize, text: &'a str },
    Other,
}

/// An open task that currently acts as an ancestor for deeper tasks.
#[derive(Debug, Clone)]
struct ParentTask {
    indent: usize,
    text: String,
}

/// Line-oriented parser for outstanding markdown tasks.
///
/// The parser holds no per-document state; one instance can parse any
/// number of documents, from any number of threads.
#[derive(Debug, Clone)]
pub struct MarkdownParser {
    /// Matches `<marker> YYYY-MM-DD` inside task text. `None` disables the check.
    completion_re: Option<Regex>,
}

impl Default for MarkdownParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownParser {
    /// Creates a parser using [`DEFAULT_COMPLETION_MARKER`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_completion_marker(DEFAULT_COMPLETION_MARKER)
    }

    /// Creates a parser that treats `marker` followed by whitespace and an
    /// ISO date as "already done".
    ///
    /// An empty (or all-whitespace) marker disables the check, so no open
    /// task is ever dropped for carrying a date.
    #[must_use]
    pub fn with_completion_marker(marker: &str) -> Self {
        let marker = marker.trim();
        let completion_re = if marker.is_empty() {
            None
        } else {
            let pattern = format!(r"{}\s+[0-9]{{4}}-[0-9]{{2}}-[0-9]{{2}}", regex::escape(marker));
            Some(Regex::new(&pattern).expect("escaped marker always forms a valid regex"))
        };

        Self { completion_re }
    }

    /// Extracts the leaf tasks of a document.
    ///
    /// `customer` and `project` are copied into every record. Records come out
    /// in the order their lines appear. Lines that don't match any recognised
    /// form are skipped, so this never fails.
    #[must_use]
    pub fn parse(&self, content: &str, customer: &str, project: &str) -> Vec<TaskRecord> {
        let lines: Vec<&str> = content.lines().collect();

        let mut headers: Vec<String> = Vec::new();
        let mut parents: Vec<ParentTask> = Vec::new();
        let mut records = Vec::new();

        for (index, line) in lines.iter().enumerate() {
            match classify_line(line) {
                LineKind::Heading { depth, text } => {
                    if headers.len() <= depth {
                        headers.resize(depth + 1, String::new());
                    }
                    headers[depth] = text.to_string();
                    // Deeper slots are blanked, never removed.
                    for deeper in &mut headers[depth + 1..] {
                        deeper.clear();
                    }
                    parents.clear();
                }
                LineKind::CompletedTask | LineKind::Other => {}
                LineKind::OpenTask { indent, text } => {
                    let has_subtasks = has_subtasks(&lines[index + 1..], indent);

                    while parents.last().is_some_and(|parent| parent.indent >= indent) {
                        parents.pop();
                    }

                    if has_subtasks {
                        parents.push(ParentTask {
                            indent,
                            text: text.to_string(),
                        });
                        continue;
                    }

                    if self.is_marked_complete(text) {
                        trace!(line = index + 1, "Skipping task carrying a completion date");
                        continue;
                    }

                    let mut levels = Vec::with_capacity(headers.len() + parents.len());
                    levels.extend(headers.iter().cloned());
                    levels.extend(parents.iter().map(|parent| parent.text.clone()));

                    records.push(TaskRecord::new(customer, project, levels, text));
                }
            }
        }

        records
    }

    /// Returns `true` if the task text carries `<marker> YYYY-MM-DD`.
    fn is_marked_complete(&self, text: &str) -> bool {
        self.completion_re
            .as_ref()
            .is_some_and(|re| re.is_match(text))
    }
}

/// Classifies a line, checking headings first, then completed tasks, then
/// open tasks.
fn classify_line(line: &str) -> LineKind<'_> {
    if let Some(caps) = HEADING_RE.captures(line) {
        let hashes = caps.get(1).map_or(0, |m| m.as_str().len());
        let text = caps.get(2).map_or("", |m| m.as_str().trim());
        return LineKind::Heading {
            depth: hashes.saturating_sub(2),
            text,
        };
    }

    if COMPLETED_TASK_RE.is_match(line) {
        return LineKind::CompletedTask;
    }

    if let Some(caps) = OPEN_TASK_RE.captures(line) {
        let indent = caps.get(1).map_or(0, |m| m.as_str().chars().count());
        let text = caps.get(2).map_or("", |m| m.as_str().trim());
        return LineKind::OpenTask { indent, text };
    }

    LineKind::Other
}

/// Looks ahead from the line after a task to decide whether it has subtasks.
///
/// Blank lines and prose are skipped. The first heading or task line decides:
/// a heading, or a task at the same or a shallower indent, means no subtasks.
fn has_subtasks(following: &[&str], indent: usize) -> bool {
    for line in following {
        if line.trim().is_empty() {
            continue;
        }

        if HEADING_RE.is_match(line) {
            return false;
        }

        if let Some(caps) = ANY_TASK_RE.captures(line) {
            let next_indent = caps.get(1).map_or(0, |m| m.as_str().chars().count());
            return next_indent > indent;
        }
    }

    false
}
