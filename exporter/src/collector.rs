//! Discovery of task documents below the customers root.
//!
//! The tree is expected to look like:
//!
//! ```text
//! <customers root>/
//!   Acme/
//!     Widgets.md          -> customer "Acme", project "Widgets"
//!     archive/Old.md      -> customer "Acme", project "Old"
//!   .trash/Gone.md        -> skipped (hidden customer)
//!   Loose.md              -> customer "Loose.md", project "Loose"
//! ```
//!
//! The customer is always the first path segment under the root and the
//! project is the file stem, however deep the file sits.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, error, trace, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::parser::MarkdownParser;
use crate::types::TaskRecord;

/// Extension of files that are scanned for tasks.
const DOCUMENT_EXTENSION: &str = "md";

/// A markdown file together with the names derived from its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDocument {
    /// Full path of the file.
    pub path: PathBuf,

    /// First path segment below the customers root.
    pub customer: String,

    /// File name without extension.
    pub project: String,
}

/// Walks the customers root and parses every task document it finds.
#[derive(Debug, Clone)]
pub struct Collector {
    customers_dir: PathBuf,
    parser: MarkdownParser,
}

impl Collector {
    /// Creates a collector for `customers_dir` using `parser` on each file.
    #[must_use]
    pub fn new(customers_dir: impl Into<PathBuf>, parser: MarkdownParser) -> Self {
        Self {
            customers_dir: customers_dir.into(),
            parser,
        }
    }

    /// Creates a collector from the configured customers root and completion marker.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.customers_dir(),
            MarkdownParser::with_completion_marker(&config.completion_marker),
        )
    }

    /// Returns the customers root.
    #[must_use]
    pub fn customers_dir(&self) -> &Path {
        &self.customers_dir
    }

    /// Lists every task document in sorted path order.
    ///
    /// A missing customers root is logged and yields an empty list. Entries
    /// the walk cannot read are logged and skipped.
    #[must_use]
    pub fn documents(&self) -> Vec<TaskDocument> {
        if !self.customers_dir.is_dir() {
            error!(
                customers_dir = %self.customers_dir.display(),
                "Customers folder not found"
            );
            return Vec::new();
        }

        let mut documents = Vec::new();

        for entry in WalkDir::new(&self.customers_dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Failed to read directory entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            if let Some(document) = identify_document(entry.path(), &self.customers_dir) {
                trace!(path = %document.path.display(), "Found task document");
                documents.push(document);
            }
        }

        documents
    }

    /// Parses every task document and concatenates the records.
    ///
    /// Records keep document order, then line order within each document.
    /// Unreadable files are logged and skipped.
    #[must_use]
    pub fn collect(&self) -> Vec<TaskRecord> {
        let mut records = Vec::new();

        for document in self.documents() {
            let content = match fs::read_to_string(&document.path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(
                        path = %document.path.display(),
                        error = %e,
                        "Failed to read task document, skipping"
                    );
                    continue;
                }
            };

            let found = self
                .parser
                .parse(&content, &document.customer, &document.project);

            debug!(
                path = %document.path.display(),
                task_count = found.len(),
                "Parsed task document"
            );

            records.extend(found);
        }

        records
    }
}

/// Returns `true` if `path` names a task document below `customers_dir`.
///
/// The file itself does not need to exist, so removal events qualify too.
#[must_use]
pub fn is_task_document(path: &Path, customers_dir: &Path) -> bool {
    identify_document(path, customers_dir).is_some()
}

/// Derives customer and project names for `path`.
///
/// Returns `None` for paths outside `customers_dir`, files that are not
/// markdown, and files whose customer segment is hidden.
#[must_use]
pub fn identify_document(path: &Path, customers_dir: &Path) -> Option<TaskDocument> {
    if path.extension().is_none_or(|ext| ext != DOCUMENT_EXTENSION) {
        return None;
    }

    let relative = path.strip_prefix(customers_dir).ok()?;

    let customer = match relative.components().next()? {
        Component::Normal(segment) => segment.to_string_lossy().into_owned(),
        _ => return None,
    };

    if customer.starts_with('.') {
        return None;
    }

    let project = path.file_stem()?.to_string_lossy().into_owned();

    Some(TaskDocument {
        path: path.to_path_buf(),
        customer,
        project,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn collector(root: &Path) -> Collector {
        Collector::new(root, MarkdownParser::new())
    }

    #[test]
    fn identify_uses_first_segment_and_stem() {
        let root = Path::new("/vault/Customers");
        let doc = identify_document(&root.join("Acme/archive/2024/Old.md"), root).unwrap();
        assert_eq!(doc.customer, "Acme");
        assert_eq!(doc.project, "Old");
    }

    #[test]
    fn identify_file_in_root_uses_file_name_as_customer() {
        let root = Path::new("/vault/Customers");
        let doc = identify_document(&root.join("Loose.md"), root).unwrap();
        assert_eq!(doc.customer, "Loose.md");
        assert_eq!(doc.project, "Loose");
    }

    #[test]
    fn identify_rejects_hidden_customer() {
        let root = Path::new("/vault/Customers");
        assert!(identify_document(&root.join(".trash/Gone.md"), root).is_none());
    }

    #[test]
    fn identify_rejects_non_markdown_and_outside_paths() {
        let root = Path::new("/vault/Customers");
        assert!(identify_document(&root.join("Acme/notes.txt"), root).is_none());
        assert!(identify_document(Path::new("/vault/Other/Acme/a.md"), root).is_none());
        assert!(identify_document(&root.join("Acme/README"), root).is_none());
    }

    #[test]
    fn is_task_document_matches_identify() {
        let root = Path::new("/vault/Customers");
        assert!(is_task_document(&root.join("Acme/Widgets.md"), root));
        assert!(!is_task_document(&root.join("Acme/Widgets.markdown"), root));
    }

    #[test]
    fn documents_are_sorted_by_path() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "Zeta/b.md", "");
        write(dir.path(), "Acme/z.md", "");
        write(dir.path(), "Acme/a.md", "");
        write(dir.path(), "Acme/notes.txt", "");

        let names: Vec<(String, String)> = collector(dir.path())
            .documents()
            .into_iter()
            .map(|d| (d.customer, d.project))
            .collect();

        assert_eq!(
            names,
            vec![
                ("Acme".to_string(), "a".to_string()),
                ("Acme".to_string(), "z".to_string()),
                ("Zeta".to_string(), "b".to_string()),
            ]
        );
    }

    #[test]
    fn missing_customers_dir_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let c = collector(&dir.path().join("does-not-exist"));
        assert!(c.documents().is_empty());
        assert!(c.collect().is_empty());
    }

    #[test]
    fn collect_tags_records_with_customer_and_project() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "Acme/Widgets.md", "## Setup\n- [ ] Install deps\n");
        write(dir.path(), "Beta/Portal.md", "- [ ] Launch\n- [x] Done already\n");
        write(dir.path(), ".hidden/Secret.md", "- [ ] Never seen\n");

        let records = collector(dir.path()).collect();

        assert_eq!(
            records,
            vec![
                TaskRecord::new("Acme", "Widgets", vec!["Setup".into()], "Install deps"),
                TaskRecord::new("Beta", "Portal", vec![], "Launch"),
            ]
        );
    }

    #[test]
    fn collect_skips_files_that_are_not_utf8() {
        let dir = TempDir::new().unwrap();
        let bad = dir.path().join("Acme/Broken.md");
        fs::create_dir_all(bad.parent().unwrap()).unwrap();
        fs::write(&bad, [0xff, 0xfe, 0x00, 0x80]).unwrap();
        write(dir.path(), "Acme/Good.md", "- [ ] Still exported\n");

        let records = collector(dir.path()).collect();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].project, "Good");
    }

    #[test]
    fn from_config_honours_completion_marker() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "Customers/Acme/Widgets.md",
            "- [ ] Ship DONE 2024-01-01\n- [ ] Keep\n",
        );

        let mut config = Config::new(dir.path());
        config.completion_marker = "DONE".to_string();

        let records = Collector::from_config(&config).collect();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].task, "Keep");
    }
}
