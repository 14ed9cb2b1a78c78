//! Issue and result types shared by the library and the CLI.

use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The session cannot be replayed as recorded
    Error,
    /// Replay works but the file is suspicious
    Warning,
    Info,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

/// One finding in a session file.
#[derive(Debug, Clone, Serialize)]
pub struct LintIssue {
    pub severity: Severity,
    /// Stable code such as `E004` or `W002`
    pub code: String,
    pub message: String,
    #[serde(serialize_with = "path_as_string")]
    pub file: PathBuf,
    /// Position inside the document, `host/port/signature[.field]`
    pub location: Option<String>,
    pub suggestion: Option<String>,
}

fn path_as_string<S>(path: &Path, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&path.to_string_lossy())
}

impl LintIssue {
    fn with_severity(
        severity: Severity,
        code: impl Into<String>,
        message: impl Into<String>,
        file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            file: file.into(),
            location: None,
            suggestion: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self::with_severity(Severity::Error, code, message, file)
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self::with_severity(Severity::Warning, code, message, file)
    }

    pub fn info(code: impl Into<String>, message: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self::with_severity(Severity::Info, code, message, file)
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Issues and counters for one or more linted session files.
#[derive(Debug, Default, Serialize)]
pub struct LintResult {
    pub issues: Vec<LintIssue>,
    pub files_checked: usize,
    /// Recorded exchanges seen across all files
    pub exchanges_checked: usize,
    pub errors: usize,
    pub warnings: usize,
}

impl LintResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_issue(&mut self, issue: LintIssue) {
        match issue.severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
            Severity::Info => {}
        }
        self.issues.push(issue);
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn has_warnings(&self) -> bool {
        self.warnings > 0
    }

    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }

    /// Whether any issue carries `code`
    pub fn has_code(&self, code: &str) -> bool {
        self.issues.iter().any(|issue| issue.code == code)
    }

    /// Fold another result into this one, counters included.
    pub fn merge(&mut self, other: LintResult) {
        self.files_checked += other.files_checked;
        self.exchanges_checked += other.exchanges_checked;
        self.errors += other.errors;
        self.warnings += other.warnings;
        self.issues.extend(other.issues);
    }
}

#[derive(Debug, Clone)]
pub struct LintOptions {
    /// Recompute each request's signature and compare it with its key
    pub check_signatures: bool,
    pub verbose: bool,
}

impl Default for LintOptions {
    fn default() -> Self {
        Self {
            check_signatures: true,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_follow_severity() {
        let mut result = LintResult::new();
        result.add_issue(LintIssue::error("E002", "bad", "a.json"));
        result.add_issue(LintIssue::warning("W001", "meh", "a.json"));
        result.add_issue(LintIssue::info("I001", "fyi", "a.json"));

        assert_eq!(result.errors, 1);
        assert_eq!(result.warnings, 1);
        assert_eq!(result.issues.len(), 3);
        assert!(!result.is_valid());
        assert!(result.has_code("W001"));
    }

    #[test]
    fn test_merge_adds_counts() {
        let mut first = LintResult::new();
        first.files_checked = 1;
        first.exchanges_checked = 2;
        let mut second = LintResult::new();
        second.files_checked = 1;
        second.add_issue(LintIssue::warning("W003", "x", "b.json"));

        first.merge(second);
        assert_eq!(first.files_checked, 2);
        assert_eq!(first.exchanges_checked, 2);
        assert_eq!(first.warnings, 1);
        assert!(first.is_valid());
    }

    #[test]
    fn test_issue_serializes_path_as_string() {
        let issue = LintIssue::error("E004", "bad port", "dir/s.json").with_location("h/0");
        let value = serde_json::to_value(&issue).unwrap();
        assert_eq!(value["file"], "dir/s.json");
        assert_eq!(value["severity"], "error");
        assert_eq!(value["location"], "h/0");
    }
}
