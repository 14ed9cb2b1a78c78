//! Linter for mockwire session files.
//!
//! Session files are written by the record/replay path of `mockwire`, one per
//! namespace. They are plain JSON and often edited by hand or merged across
//! branches; this crate catches the mistakes that would otherwise surface as
//! a corrupt-session error or a silent cache miss in the middle of a test run.
//!
//! # Example
//!
//! ```no_run
//! use mockwire_lint::{lint_directory, LintOptions};
//! use std::path::Path;
//!
//! let result = lint_directory(Path::new("tests/recordings"), &LintOptions::default());
//! if result.has_errors() {
//!     eprintln!("{} broken recording(s)", result.errors);
//! }
//! ```

mod types;
mod validator;

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub use types::{LintIssue, LintOptions, LintResult, Severity};
pub use validator::{validate_exchange, validate_gzip_indices, validate_session};

/// Read and parse a session file, reporting E001/E002 on failure.
pub fn load_session(path: &Path, result: &mut LintResult) -> Option<Value> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            result.add_issue(LintIssue::error("E001", format!("Failed to read file: {e}"), path));
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            result.add_issue(
                LintIssue::error("E002", format!("Invalid JSON: {e}"), path)
                    .with_suggestion("mockwire treats this file as empty and will overwrite it"),
            );
            None
        }
    }
}

pub fn lint_file(path: &Path, options: &LintOptions) -> LintResult {
    let mut result = LintResult::new();
    result.files_checked = 1;
    debug!("Linting {}", path.display());

    if let Some(session) = load_session(path, &mut result) {
        validate_session(path, &session, &mut result, options);
    }
    result
}

/// Session files (`*.json`) directly inside `path`, sorted
pub fn session_files(path: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

/// Lint every session file in a directory (not recursive).
pub fn lint_directory(path: &Path, options: &LintOptions) -> LintResult {
    let mut result = LintResult::new();
    match session_files(path) {
        Ok(files) => {
            for file in files {
                result.merge(lint_file(&file, options));
            }
        }
        Err(e) => result.add_issue(LintIssue::error(
            "E001",
            format!("Failed to read directory: {e}"),
            path,
        )),
    }
    result
}

pub fn lint_json(json: &str, source_name: &str, options: &LintOptions) -> LintResult {
    let mut result = LintResult::new();
    result.files_checked = 1;
    match serde_json::from_str::<Value>(json) {
        Ok(session) => validate_session(Path::new(source_name), &session, &mut result, options),
        Err(e) => {
            result.add_issue(LintIssue::error("E002", format!("Invalid JSON: {e}"), source_name))
        }
    }
    result
}

pub fn lint_value(session: &Value, source_name: &str, options: &LintOptions) -> LintResult {
    let mut result = LintResult::new();
    result.files_checked = 1;
    validate_session(Path::new(source_name), session, &mut result, options);
    result
}

/// Report exchanges recorded under the same host, port and signature in
/// several files with different responses (W004).
///
/// Only one of them can be right, and which one a test sees depends on
/// the namespace it runs under.
pub fn find_conflicts(sessions: &[(PathBuf, Value)]) -> LintResult {
    let mut seen: BTreeMap<(String, String, String), Vec<(&Path, &Value)>> = BTreeMap::new();

    for (file, session) in sessions {
        for (host, port, signature, exchange) in exchanges(session) {
            if let Some(response) = exchange.get("response") {
                seen.entry((host.to_string(), port.to_string(), signature.to_string()))
                    .or_default()
                    .push((file.as_path(), response));
            }
        }
    }

    let mut result = LintResult::new();
    for ((host, port, signature), recordings) in seen {
        let Some(&(first_file, first_response)) = recordings.first() else {
            continue;
        };
        let differing: Vec<String> = recordings[1..]
            .iter()
            .filter(|(_, response)| *response != first_response)
            .map(|(file, _)| file_name(file))
            .collect();
        if differing.is_empty() {
            continue;
        }
        result.add_issue(
            LintIssue::warning(
                "W004",
                format!(
                    "Same request recorded with a different response in: {}",
                    differing.join(", ")
                ),
                first_file,
            )
            .with_location(format!("{host}/{port}/{signature}"))
            .with_suggestion("Re-record the affected namespaces or drop the stale file"),
        );
    }
    result
}

/// Sort and deduplicate every well-formed `gzip` list in place.
///
/// Returns the number of exchanges that changed.
pub fn fix_gzip_indices(session: &mut Value) -> usize {
    let mut fixed = 0;
    let Some(hosts) = session.as_object_mut() else {
        return 0;
    };
    let exchanges = hosts
        .values_mut()
        .filter_map(Value::as_object_mut)
        .flat_map(|ports| ports.values_mut())
        .filter_map(Value::as_object_mut)
        .flat_map(|signatures| signatures.values_mut());

    for exchange in exchanges {
        let Some(Value::Array(indices)) = exchange.get_mut("gzip") else {
            continue;
        };
        let Some(original) = indices
            .iter()
            .map(Value::as_u64)
            .collect::<Option<Vec<u64>>>()
        else {
            continue;
        };
        let mut numbers = original.clone();
        numbers.sort_unstable();
        numbers.dedup();
        if numbers != original {
            *indices = numbers.into_iter().map(Value::from).collect();
            fixed += 1;
        }
    }
    fixed
}

#[derive(Debug, thiserror::Error)]
pub enum FixError {
    #[error("failed to serialize fixed session: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Apply [`fix_gzip_indices`] and rewrite `path` if anything changed.
pub fn apply_fixes(path: &Path, session: &mut Value) -> Result<usize, FixError> {
    let fixed = fix_gzip_indices(session);
    if fixed > 0 {
        let content = serde_json::to_string_pretty(session)?;
        std::fs::write(path, content).map_err(|source| FixError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Rewrote {} with {} fix(es)", path.display(), fixed);
    }
    Ok(fixed)
}

fn exchanges(session: &Value) -> impl Iterator<Item = (&str, &str, &str, &Value)> {
    session
        .as_object()
        .into_iter()
        .flatten()
        .filter_map(|(host, ports)| Some((host.as_str(), ports.as_object()?)))
        .flat_map(|(host, ports)| {
            ports
                .iter()
                .filter_map(move |(port, sigs)| Some((host, port.as_str(), sigs.as_object()?)))
        })
        .flat_map(|(host, port, sigs)| {
            sigs.iter()
                .map(move |(sig, exchange)| (host, port, sig.as_str(), exchange))
        })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    #[test]
    fn test_lint_missing_file() {
        let result = lint_file(Path::new("/no/such/session.json"), &LintOptions::default());
        assert!(result.has_code("E001"));
        assert_eq!(result.files_checked, 1);
    }

    #[test]
    fn test_lint_invalid_json() {
        let result = lint_json("{ nope", "inline.json", &LintOptions::default());
        assert!(result.has_code("E002"));
    }

    #[test]
    fn test_lint_directory_only_json_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        fs::write(dir.path().join("b.json"), "[]").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let result = lint_directory(dir.path(), &LintOptions::default());
        assert_eq!(result.files_checked, 2);
        assert_eq!(result.errors, 1);
    }

    #[test]
    fn test_lint_directory_missing() {
        let result = lint_directory(Path::new("/no/such/dir"), &LintOptions::default());
        assert!(result.has_code("E001"));
    }

    #[test]
    fn test_session_written_by_mockwire_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ns.json");
        let request = b"GET / HTTP/1.1\r\n\r\n";
        let mut raw = b"HTTP/1.1 200 OK\r\n\r\n".to_vec();
        raw.extend_from_slice(&mockwire::recording::codec::gzip(b"zipped").unwrap());

        let mut store = mockwire::SessionStore::new();
        store.insert(
            &mockwire::Location::new("example.com", 443),
            mockwire::RequestSignature::from_request(request),
            mockwire::RecordedExchange::capture(request, &raw).unwrap(),
        );
        store.save(&path).unwrap();

        let result = lint_file(&path, &LintOptions::default());
        assert!(result.issues.is_empty(), "{:?}", result.issues);
        assert_eq!(result.exchanges_checked, 1);
    }

    #[test]
    fn test_conflicting_recordings() {
        let sessions = vec![
            (
                PathBuf::from("one.json"),
                json!({"h": {"80": {"sig": {"request": "r", "response": ["a"]}}}}),
            ),
            (
                PathBuf::from("two.json"),
                json!({"h": {"80": {"sig": {"request": "r", "response": ["b"]}}}}),
            ),
            (
                PathBuf::from("three.json"),
                json!({"h": {"80": {"sig": {"request": "r", "response": ["a"]}}}}),
            ),
        ];

        let result = find_conflicts(&sessions);
        assert_eq!(result.warnings, 1);
        let issue = &result.issues[0];
        assert_eq!(issue.code, "W004");
        assert_eq!(issue.file, PathBuf::from("one.json"));
        assert!(issue.message.contains("two.json"));
        assert!(!issue.message.contains("three.json"));
    }

    #[test]
    fn test_identical_recordings_do_not_conflict() {
        let session = json!({"h": {"80": {"sig": {"request": "r", "response": ["a"]}}}});
        let sessions = vec![
            (PathBuf::from("one.json"), session.clone()),
            (PathBuf::from("two.json"), session),
        ];
        assert!(find_conflicts(&sessions).issues.is_empty());
    }

    #[test]
    fn test_fix_gzip_indices() {
        let mut session = json!({
            "h": {"80": {
                "a": {"request": "", "response": ["x", "y"], "gzip": [2, 1, 2]},
                "b": {"request": "", "response": ["x"], "gzip": [1]},
                "c": {"request": "", "response": ["x"], "gzip": ["bad"]}
            }}
        });

        assert_eq!(fix_gzip_indices(&mut session), 1);
        assert_eq!(session["h"]["80"]["a"]["gzip"], json!([1, 2]));
        assert_eq!(session["h"]["80"]["c"]["gzip"], json!(["bad"]));
        assert_eq!(fix_gzip_indices(&mut session), 0);
    }

    #[test]
    fn test_apply_fixes_rewrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ns.json");
        let mut session = json!({"h": {"80": {"a": {"request": "", "response": ["x"], "gzip": [1, 1]}}}});
        fs::write(&path, session.to_string()).unwrap();

        assert_eq!(apply_fixes(&path, &mut session).unwrap(), 1);
        let on_disk: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["h"]["80"]["a"]["gzip"], json!([1]));
    }

    #[test]
    fn test_apply_fixes_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("ns.json");
        let mut session = json!({"h": {"80": {"a": {"request": "", "response": ["x"], "gzip": [1, 1]}}}});

        let err = apply_fixes(&path, &mut session).unwrap_err();
        assert!(matches!(err, FixError::Write { .. }));
    }
}
