//! Parallel scan of the candidate files.
//!
//! Every candidate is read once, tested against the target literal, and
//! handed to the fact provider, on a bounded worker pool. A file whose
//! facts are unusable stays in the universe as an empty leaf and its reason
//! is recorded in the run diagnostics; it never stops the scan.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rayon::ThreadPool;
use regex::Regex;
use walkdir::WalkDir;

use crate::config::AnalysisConfig;
use crate::error::{ImpactGraphError, Result};
use crate::indexer::facts::{FactError, FactProvider, FileFacts};
use crate::indexer::universe::{service_for_path, UniverseFile};
use crate::observability::RunDiagnostics;

/// Candidate files under `root`, sorted. Excluded directories are pruned
/// without being descended into.
pub fn collect_candidates(root: &Path, config: &AnalysisConfig) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !config
                    .scan
                    .exclude_dirs
                    .iter()
                    .any(|d| e.file_name().to_string_lossy() == d.as_str())
        });
    for entry in walker {
        let entry = entry.map_err(|e| ImpactGraphError::Other(format!("walk error: {e}")))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if config.is_candidate(&name) && !name.ends_with(config.scan.facts_suffix.as_str()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Whole-word matcher for the target identifier.
pub fn literal_pattern(resource: &str) -> Result<Regex> {
    Regex::new(&format!(r"\b{}\b", regex::escape(resource)))
        .map_err(|e| ImpactGraphError::Other(format!("bad target identifier {resource:?}: {e}")))
}

/// Worker pool sized from the config.
pub fn build_pool(config: &AnalysisConfig) -> Result<ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(config.worker_count())
        .thread_name(|i| format!("impactgraph-scan-{i}"))
        .build()
        .map_err(|e| ImpactGraphError::Other(format!("cannot start scan workers: {e}")))
}

/// Path of `path` relative to `root`, `/`-separated.
pub fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

pub struct Scanner<'a> {
    pub root: &'a Path,
    pub config: &'a AnalysisConfig,
    pub pattern: &'a Regex,
    pub provider: &'a dyn FactProvider,
    pub diagnostics: &'a RunDiagnostics,
}

impl Scanner<'_> {
    /// Scan `candidates` on `pool`. Output order follows the input order.
    pub fn scan(&self, candidates: &[PathBuf], pool: &ThreadPool) -> Vec<UniverseFile> {
        tracing::info!(
            "scanning {} candidate file(s) on {} worker(s)",
            candidates.len(),
            pool.current_num_threads()
        );
        let files: Vec<UniverseFile> =
            pool.install(|| candidates.par_iter().map(|p| self.scan_one(p)).collect());
        tracing::info!(
            "scan complete: {} file(s) contain the target literal",
            files.iter().filter(|f| f.matched).count()
        );
        files
    }

    fn scan_one(&self, path: &Path) -> UniverseFile {
        let relative = relative_path(self.root, path);
        self.diagnostics.file_scanned();
        let service = service_for_path(&relative, &self.config.services.roots);

        let (matched, facts) = match std::fs::read_to_string(path) {
            Ok(text) => {
                let matched = self.pattern.is_match(&text);
                if matched {
                    self.diagnostics.file_matched();
                }
                (matched, self.facts_for(&relative, path, &text))
            }
            Err(e) => {
                let err = FactError::Unreadable(e.to_string());
                self.diagnostics.partial_failure(relative.clone(), err.to_string());
                (false, FileFacts::default())
            }
        };

        UniverseFile {
            path: relative,
            service,
            matched,
            facts,
        }
    }

    fn facts_for(&self, relative: &str, path: &Path, text: &str) -> FileFacts {
        match self.provider.extract(path, text) {
            Ok(facts) => facts,
            Err(e) => {
                self.diagnostics.partial_failure(relative, e.to_string());
                FileFacts::default()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
