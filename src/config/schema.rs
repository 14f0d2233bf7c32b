//! Configuration data structures for an analysis run.
//!
//! Defines the YAML config format: which files are candidates, how test
//! functions and services are recognised, and how far sequential expansion
//! may widen the scope. Every field has a default so a partial (or absent)
//! file is always valid.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration.
///
/// Loaded from YAML, environment variables, and CLI flags; see
/// [`super::loader::load_config`] for the merge order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Config format version (currently "1.0").
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub tests: TestsConfig,

    #[serde(default)]
    pub services: ServicesConfig,

    #[serde(default)]
    pub sequential: SequentialConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            scan: ScanConfig::default(),
            tests: TestsConfig::default(),
            services: ServicesConfig::default(),
            sequential: SequentialConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Number of scan workers: available parallelism capped by
    /// `scan.max_workers`, never zero.
    pub fn worker_count(&self) -> usize {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        available.min(self.scan.max_workers).max(1)
    }

    /// Whether `path` has one of the candidate extensions.
    pub fn is_candidate(&self, path: &str) -> bool {
        self.scan
            .extensions
            .iter()
            .any(|ext| path.ends_with(ext.as_str()))
    }

    /// Longest configured test prefix that `name` starts with.
    pub fn test_prefix<'a>(&'a self, name: &str) -> Option<&'a str> {
        self.tests
            .prefixes
            .iter()
            .filter(|p| !p.is_empty() && name.starts_with(p.as_str()))
            .max_by_key(|p| p.len())
            .map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// ScanConfig
// ---------------------------------------------------------------------------

/// Which files are candidates and how they are read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// File suffixes (including the dot) that make a file a candidate.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Directory names skipped while walking the source tree.
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,

    /// Upper bound on scan workers; the scan is I/O-bound.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Suffix appended to a source path to find its sidecar facts file.
    #[serde(default = "default_facts_suffix")]
    pub facts_suffix: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            exclude_dirs: default_exclude_dirs(),
            max_workers: default_max_workers(),
            facts_suffix: default_facts_suffix(),
        }
    }
}

// ---------------------------------------------------------------------------
// TestsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestsConfig {
    /// Name prefixes that mark a function as a test.
    #[serde(default = "default_test_prefixes")]
    pub prefixes: Vec<String>,
}

impl Default for TestsConfig {
    fn default() -> Self {
        Self {
            prefixes: default_test_prefixes(),
        }
    }
}

// ---------------------------------------------------------------------------
// ServicesConfig
// ---------------------------------------------------------------------------

/// How a file's owning service is inferred from its path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicesConfig {
    /// Directories whose immediate children are services,
    /// e.g. `internal/services` for `internal/services/<svc>/...`.
    #[serde(default = "default_service_roots")]
    pub roots: Vec<String>,

    /// Abort with a missing-input error when no configured root exists
    /// under the source tree.
    #[serde(default)]
    pub require_root: bool,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            roots: default_service_roots(),
            require_root: false,
        }
    }
}

// ---------------------------------------------------------------------------
// SequentialConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequentialConfig {
    /// Pull files defining out-of-scope sequential targets into the scope
    /// and resume closure discovery from them.
    #[serde(default)]
    pub follow_targets: bool,
}

// ---------------------------------------------------------------------------
// LoggingConfig
// ---------------------------------------------------------------------------

/// Log output on stderr. `RUST_LOG`, when set, replaces `filter`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directives, e.g. `impactgraph=debug`.
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Prefix each line with the emitting module.
    #[serde(default)]
    pub targets: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            targets: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_LOG_FILTER: &str = "impactgraph=info";

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_extensions() -> Vec<String> {
    vec![".go".to_string()]
}

fn default_exclude_dirs() -> Vec<String> {
    ["vendor", ".git", "node_modules", "target"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_workers() -> usize {
    8
}

fn default_facts_suffix() -> String {
    ".facts.json".to_string()
}

fn default_test_prefixes() -> Vec<String> {
    vec!["Test".to_string()]
}

fn default_service_roots() -> Vec<String> {
    vec!["internal/services".to_string()]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.scan.extensions, vec![".go"]);
        assert_eq!(config.scan.max_workers, 8);
        assert_eq!(config.tests.prefixes, vec!["Test"]);
        assert_eq!(config.services.roots, vec!["internal/services"]);
        assert!(!config.services.require_root);
        assert!(!config.sequential.follow_targets);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
tests:
  prefixes: ["TestAcc", "Test"]
sequential:
  follow_targets: true
"#;
        let config: AnalysisConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.tests.prefixes, vec!["TestAcc", "Test"]);
        assert!(config.sequential.follow_targets);
        assert_eq!(config.scan, ScanConfig::default());
        assert_eq!(config.version, "1.0");
    }

    #[test]
    fn test_full_yaml_config() {
        let yaml = r#"
version: "1.0"
scan:
  extensions: [".go", ".tf"]
  exclude_dirs: ["vendor"]
  max_workers: 2
  facts_suffix: ".json"
services:
  roots: ["internal/services", "internal/legacy"]
  require_root: true
"#;
        let config: AnalysisConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.scan.extensions, vec![".go", ".tf"]);
        assert_eq!(config.scan.max_workers, 2);
        assert_eq!(config.scan.facts_suffix, ".json");
        assert!(config.services.require_root);
        assert_eq!(config.services.roots.len(), 2);
    }

    #[test]
    fn test_invalid_yaml_returns_error() {
        let result: Result<AnalysisConfig, _> = serde_yaml::from_str("{{invalid yaml}}");
        assert!(result.is_err());
    }

    #[test]
    fn test_serde_json_roundtrip() {
        let config = AnalysisConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: AnalysisConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test_case("TestAccThing_basic", Some("TestAcc") ; "longest prefix wins")]
    #[test_case("TestThing", Some("Test") ; "short prefix")]
    #[test_case("testHelper", None ; "lowercase is not a test")]
    #[test_case("", None ; "empty name")]
    fn test_prefix_matching(name: &str, expected: Option<&str>) {
        let mut config = AnalysisConfig::default();
        config.tests.prefixes = vec!["Test".into(), "TestAcc".into()];
        assert_eq!(config.test_prefix(name), expected);
    }

    #[test]
    fn test_worker_count_is_bounded() {
        let mut config = AnalysisConfig::default();
        config.scan.max_workers = 1;
        assert_eq!(config.worker_count(), 1);
        config.scan.max_workers = 0;
        assert_eq!(config.worker_count(), 1);
    }

    #[test]
    fn test_is_candidate() {
        let config = AnalysisConfig::default();
        assert!(config.is_candidate("internal/services/a/a_test.go"));
        assert!(!config.is_candidate("README.md"));
    }
}
