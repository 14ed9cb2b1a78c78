//! Structural and consistency checks for session documents.
//!
//! A session document maps `host -> port -> signature -> exchange`, where an
//! exchange is `{ "request": str, "response": [str], "gzip": [int] }`.

use crate::types::{LintIssue, LintOptions, LintResult};
use mockwire::RequestSignature;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

fn signature_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[0-9a-f]{64}$").ok())
        .as_ref()
}

/// Validate a whole session document.
pub fn validate_session(
    file: &Path,
    session: &Value,
    result: &mut LintResult,
    options: &LintOptions,
) {
    let Some(hosts) = session.as_object() else {
        result.add_issue(
            LintIssue::error("E003", "Session document must be an object keyed by host", file)
                .with_suggestion("Expected {\"host\": {\"port\": {\"signature\": {...}}}}"),
        );
        return;
    };

    if hosts.is_empty() {
        result.add_issue(LintIssue::info("I001", "Session file has no recordings", file));
    }

    for (host, ports) in hosts {
        let Some(ports) = ports.as_object() else {
            result.add_issue(
                LintIssue::error("E003", "Host entry must be an object keyed by port", file)
                    .with_location(host),
            );
            continue;
        };
        for (port, signatures) in ports {
            validate_port(file, host, port, signatures, result, options);
        }
    }
}

fn validate_port(
    file: &Path,
    host: &str,
    port: &str,
    signatures: &Value,
    result: &mut LintResult,
    options: &LintOptions,
) {
    let location = format!("{host}/{port}");
    if !matches!(port.parse::<u16>(), Ok(p) if p > 0) {
        result.add_issue(
            LintIssue::error(
                "E004",
                format!("Port key '{port}' is not an integer in 1-65535"),
                file,
            )
            .with_location(&location),
        );
    }

    let Some(signatures) = signatures.as_object() else {
        result.add_issue(
            LintIssue::error("E003", "Port entry must be an object keyed by signature", file)
                .with_location(location),
        );
        return;
    };

    for (signature, exchange) in signatures {
        result.exchanges_checked += 1;
        validate_exchange(
            file,
            signature,
            exchange,
            &format!("{location}/{signature}"),
            result,
            options,
        );
    }
}

/// Validate one recorded exchange stored under `signature`.
pub fn validate_exchange(
    file: &Path,
    signature: &str,
    exchange: &Value,
    location: &str,
    result: &mut LintResult,
    options: &LintOptions,
) {
    let Some(fields) = exchange.as_object() else {
        result.add_issue(
            LintIssue::error("E003", "Recorded exchange must be an object", file)
                .with_location(location),
        );
        return;
    };

    let request = check_request(file, fields, location, result);
    let fragments = check_response(file, fields, location, result);

    match fields.get("gzip") {
        None => {}
        Some(Value::Array(indices)) => {
            validate_gzip_indices(file, indices, fragments, location, result)
        }
        Some(_) => result.add_issue(
            LintIssue::error("E005", "'gzip' must be an array of fragment indices", file)
                .with_location(format!("{location}.gzip")),
        ),
    }

    let well_formed = check_signature_format(file, signature, location, result);
    if let (true, true, Some(request)) = (options.check_signatures, well_formed, request) {
        let expected = RequestSignature::from_text(request);
        if expected.as_str() != signature {
            result.add_issue(
                LintIssue::warning(
                    "W002",
                    "Signature does not match the recorded request; it will never be replayed",
                    file,
                )
                .with_location(location)
                .with_suggestion(format!("Expected key {expected}")),
            );
        }
    }
}

fn check_request<'a>(
    file: &Path,
    fields: &'a Map<String, Value>,
    location: &str,
    result: &mut LintResult,
) -> Option<&'a str> {
    match fields.get("request") {
        Some(Value::String(request)) => Some(request.as_str()),
        Some(_) => {
            result.add_issue(
                LintIssue::error("E005", "'request' must be a string", file)
                    .with_location(format!("{location}.request")),
            );
            None
        }
        None => {
            result.add_issue(
                LintIssue::error("E005", "Missing required field: request", file)
                    .with_location(location),
            );
            None
        }
    }
}

/// Number of response fragments, if the field is usable.
fn check_response(
    file: &Path,
    fields: &Map<String, Value>,
    location: &str,
    result: &mut LintResult,
) -> Option<usize> {
    match fields.get("response") {
        Some(Value::Array(fragments)) => {
            for (idx, fragment) in fragments.iter().enumerate() {
                if !fragment.is_string() {
                    result.add_issue(
                        LintIssue::error("E005", "Response fragments must be strings", file)
                            .with_location(format!("{location}.response[{idx}]")),
                    );
                }
            }
            Some(fragments.len())
        }
        Some(_) => {
            result.add_issue(
                LintIssue::error("E005", "'response' must be an array of strings", file)
                    .with_location(format!("{location}.response")),
            );
            None
        }
        None => {
            result.add_issue(
                LintIssue::error("E005", "Missing required field: response", file)
                    .with_location(location),
            );
            None
        }
    }
}

/// Check 1-based gzip indices against the fragment count.
pub fn validate_gzip_indices(
    file: &Path,
    indices: &[Value],
    fragments: Option<usize>,
    location: &str,
    result: &mut LintResult,
) {
    let mut seen = HashSet::new();
    for (pos, value) in indices.iter().enumerate() {
        let item = format!("{location}.gzip[{pos}]");
        let Some(index) = value.as_u64() else {
            result.add_issue(
                LintIssue::error("E005", "gzip indices must be non-negative integers", file)
                    .with_location(item),
            );
            continue;
        };

        if !seen.insert(index) {
            result.add_issue(
                LintIssue::warning("W001", format!("Duplicate gzip index {index}"), file)
                    .with_location(&item)
                    .with_suggestion("Run with --fix to deduplicate"),
            );
        }

        if let Some(count) = fragments {
            if index == 0 || index > count as u64 {
                result.add_issue(
                    LintIssue::error(
                        "E006",
                        format!("gzip index {index} is out of range for {count} response fragment(s)"),
                        file,
                    )
                    .with_location(item)
                    .with_suggestion("Indices are 1-based positions in 'response'"),
                );
            }
        }
    }
}

fn check_signature_format(
    file: &Path,
    signature: &str,
    location: &str,
    result: &mut LintResult,
) -> bool {
    let valid = signature_pattern().is_some_and(|re| re.is_match(signature));
    if !valid {
        result.add_issue(
            LintIssue::warning(
                "W003",
                "Signature is not a 64-character lowercase hex digest",
                file,
            )
            .with_location(location),
        );
    }
    valid
}
