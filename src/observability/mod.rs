//! Structured logging and run-level diagnostics.
//!
//! This module provides:
//! - [`init_logging`]: stderr subscriber configured from [`LoggingConfig`] and `RUST_LOG`
//! - [`RunDiagnostics`]: Thread-safe counters and partial-failure records for one run
//! - [`DiagnosticsReport`]: Serializable snapshot of those counters

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::config::schema::{LoggingConfig, DEFAULT_LOG_FILTER};

/// Install the stderr subscriber for the binary.
///
/// Filter directives come from `RUST_LOG` when set, else from
/// `config.filter`; an unparsable set falls back to `impactgraph=info`.
/// Stdout stays clean for query output. Returns `false` when a subscriber
/// was already installed (the first configuration wins).
pub fn init_logging(config: &LoggingConfig) -> bool {
    let directives = filter_directives(config, std::env::var("RUST_LOG").ok());
    let filter =
        EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(config.targets)
        .compact()
        .try_init()
        .is_ok()
}

fn filter_directives(config: &LoggingConfig, rust_log: Option<String>) -> String {
    match rust_log {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => config.filter.clone(),
    }
}

// ---------------------------------------------------------------------------
// PartialFactFailure
// ---------------------------------------------------------------------------

/// A file whose structural facts could not be used. The file still takes
/// part in the run as an empty leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialFactFailure {
    pub path: String,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// RunDiagnostics
// ---------------------------------------------------------------------------

/// Counters shared by every stage of a run, including the parallel scan.
#[derive(Debug, Default)]
pub struct RunDiagnostics {
    files_scanned: AtomicUsize,
    files_matched: AtomicUsize,
    files_discovered: AtomicUsize,
    closure_iterations: AtomicUsize,
    stray_occurrences: AtomicUsize,
    stubs_synthesized: AtomicUsize,
    rows_reclassified: AtomicUsize,
    ambiguous_resolutions: AtomicUsize,
    partial_failures: Mutex<Vec<PartialFactFailure>>,
}

impl RunDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_scanned(&self) {
        self.files_scanned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn file_matched(&self) {
        self.files_matched.fetch_add(1, Ordering::Relaxed);
    }

    /// A file entered the scope through closure discovery or sequential
    /// expansion rather than a literal match.
    pub fn file_discovered(&self) {
        self.files_discovered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn closure_iteration(&self) {
        self.closure_iterations.fetch_add(1, Ordering::Relaxed);
    }

    /// A literal occurrence outside any template function.
    pub fn stray_occurrence(&self) {
        self.stray_occurrences.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stub_synthesized(&self) {
        self.stubs_synthesized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn row_reclassified(&self) {
        self.rows_reclassified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ambiguous_resolution(&self) {
        self.ambiguous_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn partial_failure(&self, path: impl Into<String>, reason: impl Into<String>) {
        let failure = PartialFactFailure {
            path: path.into(),
            reason: reason.into(),
        };
        tracing::warn!("no usable facts for {}: {}", failure.path, failure.reason);
        self.partial_failures.lock().push(failure);
    }

    pub fn report(&self) -> DiagnosticsReport {
        let mut partial_failures = self.partial_failures.lock().clone();
        partial_failures.sort_by(|a, b| a.path.cmp(&b.path));
        DiagnosticsReport {
            files_scanned: self.files_scanned.load(Ordering::Relaxed),
            files_matched: self.files_matched.load(Ordering::Relaxed),
            files_discovered: self.files_discovered.load(Ordering::Relaxed),
            closure_iterations: self.closure_iterations.load(Ordering::Relaxed),
            stray_occurrences: self.stray_occurrences.load(Ordering::Relaxed),
            stubs_synthesized: self.stubs_synthesized.load(Ordering::Relaxed),
            rows_reclassified: self.rows_reclassified.load(Ordering::Relaxed),
            ambiguous_resolutions: self.ambiguous_resolutions.load(Ordering::Relaxed),
            partial_failures,
        }
    }
}

/// Point-in-time copy of [`RunDiagnostics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsReport {
    pub files_scanned: usize,
    pub files_matched: usize,
    pub files_discovered: usize,
    pub closure_iterations: usize,
    pub stray_occurrences: usize,
    pub stubs_synthesized: usize,
    pub rows_reclassified: usize,
    pub ambiguous_resolutions: usize,
    pub partial_failures: Vec<PartialFactFailure>,
}

impl DiagnosticsReport {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn init_logging_twice_is_harmless() {
        let config = LoggingConfig::default();
        init_logging(&config);
        assert!(!init_logging(&config));
    }

    #[test]
    fn rust_log_replaces_configured_filter() {
        let config = LoggingConfig {
            filter: "impactgraph=debug".into(),
            targets: false,
        };
        assert_eq!(filter_directives(&config, None), "impactgraph=debug");
        assert_eq!(filter_directives(&config, Some("  ".into())), "impactgraph=debug");
        assert_eq!(filter_directives(&config, Some("warn".into())), "warn");
    }

    #[test]
    fn counters_accumulate_across_threads() {
        let diag = Arc::new(RunDiagnostics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let diag = Arc::clone(&diag);
                std::thread::spawn(move || {
                    diag.file_scanned();
                    diag.file_matched();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let report = diag.report();
        assert_eq!(report.files_scanned, 8);
        assert_eq!(report.files_matched, 8);
        assert_eq!(report.stubs_synthesized, 0);
    }

    #[test]
    fn partial_failures_are_sorted_in_report() {
        let diag = RunDiagnostics::new();
        diag.partial_failure("b.go", "malformed facts");
        diag.partial_failure("a.go", "unreadable");
        let report = diag.report();
        let paths: Vec<&str> = report.partial_failures.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.go", "b.go"]);
        assert_eq!(report.to_json()["partial_failures"][0]["reason"], "unreadable");
    }
}
