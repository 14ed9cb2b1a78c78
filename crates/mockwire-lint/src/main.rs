//! mockwire session file linter.
//!
//! Usage:
//!   mockwire-lint <directory_or_file> [OPTIONS]

use clap::{Parser, ValueEnum};
use mockwire_lint::{
    find_conflicts, lint_file, load_session, session_files, LintIssue,
    LintOptions, LintResult, Severity,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const RULE: &str = "────────────────────────────────────────────";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Check recorded mockwire sessions for replay problems
#[derive(Parser, Debug)]
#[command(name = "mockwire-lint", author, version)]
struct Args {
    /// Session file, or directory of session files
    path: PathBuf,

    /// Sort and deduplicate gzip indices, rewriting the files
    #[arg(short, long)]
    fix: bool,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Hide warnings and infos
    #[arg(short = 'e', long)]
    errors_only: bool,

    /// Log what the linter is doing
    #[arg(short, long)]
    verbose: bool,

    /// Fail on warnings too
    #[arg(short, long)]
    strict: bool,

    /// Do not recompute request signatures
    #[arg(long)]
    skip_signatures: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let options = LintOptions {
        check_signatures: !args.skip_signatures,
        verbose: args.verbose,
    };

    let files = match collect_session_files(&args.path) {
        Ok(files) => files,
        Err(e) => {
            eprintln!("{RED}error:{RESET} cannot read {}: {e}", args.path.display());
            std::process::exit(2);
        }
    };
    if files.is_empty() {
        warn!("No session files found in {}", args.path.display());
        println!("{YELLOW}No session files found in {}{RESET}", args.path.display());
        std::process::exit(0);
    }
    debug!("Linting {} session file(s)", files.len());

    let mut result = LintResult::new();
    let mut sessions: Vec<(PathBuf, Value)> = Vec::new();
    for file in &files {
        result.merge(lint_file(file, &options));
        // Parse failures were already reported by lint_file.
        if let Some(session) = load_session(file, &mut LintResult::new()) {
            sessions.push((file.clone(), session));
        }
    }
    result.merge(find_conflicts(&sessions));

    match args.output {
        OutputFormat::Json => print_json(&result),
        OutputFormat::Text => print_text(&result, &args),
    }

    if args.fix {
        apply_fixes(&mut sessions);
    }

    let failed = result.has_errors() || (args.strict && result.has_warnings());
    std::process::exit(if failed { 1 } else { 0 });
}

fn collect_session_files(path: &Path) -> std::io::Result<Vec<PathBuf>> {
    if path.is_dir() {
        session_files(path)
    } else {
        Ok(vec![path.to_path_buf()])
    }
}

fn print_json(result: &LintResult) {
    match serde_json::to_string_pretty(result) {
        Ok(output) => println!("{output}"),
        Err(e) => eprintln!("{RED}error:{RESET} failed to serialize results: {e}"),
    }
}

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => RED,
        Severity::Warning => YELLOW,
        Severity::Info => CYAN,
    }
}

fn print_text(result: &LintResult, args: &Args) {
    let mut by_file: BTreeMap<&Path, Vec<&LintIssue>> = BTreeMap::new();
    for issue in &result.issues {
        if args.errors_only && issue.severity != Severity::Error {
            continue;
        }
        by_file.entry(issue.file.as_path()).or_default().push(issue);
    }

    for (file, mut issues) in by_file {
        issues.sort_by(|a, b| a.severity.cmp(&b.severity).then_with(|| a.code.cmp(&b.code)));
        let failing = issues.iter().any(|i| i.severity == Severity::Error);
        let status = if failing {
            format!("{RED}FAIL{RESET}")
        } else {
            format!("{YELLOW}WARN{RESET}")
        };
        println!("{status} {BOLD}{}{RESET} {DIM}({} issue(s)){RESET}", file.display(), issues.len());

        for issue in issues {
            let color = severity_color(issue.severity);
            let location = issue
                .location
                .as_deref()
                .map(|l| format!(" {DIM}[{l}]{RESET}"))
                .unwrap_or_default();
            println!(
                "  {color}{}{RESET} {BOLD}{}{RESET}{location}: {}",
                issue.code,
                issue.severity.label(),
                issue.message
            );
            if let Some(suggestion) = &issue.suggestion {
                println!("      {GREEN}-> {suggestion}{RESET}");
            }
        }
        println!();
    }

    println!("{DIM}{RULE}{RESET}");
    println!(
        "  files: {BOLD}{}{RESET}  exchanges: {BOLD}{}{RESET}  errors: {BOLD}{}{}{RESET}  warnings: {BOLD}{}{}{RESET}",
        result.files_checked,
        result.exchanges_checked,
        if result.errors > 0 { RED } else { GREEN },
        result.errors,
        if result.warnings > 0 { YELLOW } else { GREEN },
        result.warnings,
    );
    if result.is_valid() && !result.has_warnings() {
        println!("{GREEN}{BOLD}All session files replay cleanly{RESET}");
    } else if result.is_valid() {
        println!("{YELLOW}{BOLD}Passed with warnings{RESET}");
    } else {
        println!("{RED}{BOLD}Some recordings cannot be replayed{RESET}");
    }
}

fn apply_fixes(sessions: &mut [(PathBuf, Value)]) {
    let mut total = 0;
    for (file, session) in sessions.iter_mut() {
        match mockwire_lint::apply_fixes(file, session) {
            Ok(0) => {}
            Ok(fixed) => {
                total += fixed;
                println!("{GREEN}Fixed {fixed} exchange(s) in {}{RESET}", file.display());
            }
            Err(e) => eprintln!("{RED}error:{RESET} {e}"),
        }
    }
    println!("{DIM}Applied {total} fix(es){RESET}");
}
