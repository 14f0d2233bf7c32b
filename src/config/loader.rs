//! Multi-source configuration loading.
//!
//! Priority, lowest to highest: built-in defaults, the YAML file, environment
//! variables, CLI overrides. The environment is passed in as a lookup
//! function so nothing here reads process-wide state on its own.

use std::path::Path;

use crate::config::schema::AnalysisConfig;
use crate::error::{ImpactGraphError, Result};

/// Config file looked up in the source root when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = ".impactgraph.yaml";

pub const ENV_WORKERS: &str = "IMPACTGRAPH_WORKERS";
pub const ENV_TEST_PREFIXES: &str = "IMPACTGRAPH_TEST_PREFIXES";
pub const ENV_SERVICE_ROOTS: &str = "IMPACTGRAPH_SERVICE_ROOTS";
pub const ENV_EXTENSIONS: &str = "IMPACTGRAPH_EXTENSIONS";

/// Values supplied on the command line; `None` leaves the lower layer alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub workers: Option<usize>,
    pub test_prefixes: Option<Vec<String>>,
    pub service_roots: Option<Vec<String>>,
    pub follow_targets: Option<bool>,
}

/// Build the effective config for a run over `source_root`.
///
/// An explicit `file` that does not exist is a missing-input error; the
/// implicit `<source_root>/.impactgraph.yaml` is optional.
pub fn load_config(
    source_root: &Path,
    file: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
    overrides: &ConfigOverrides,
) -> Result<AnalysisConfig> {
    let mut config = match file {
        Some(path) => {
            if !path.is_file() {
                return Err(ImpactGraphError::missing_input(
                    path,
                    "config file does not exist",
                ));
            }
            read_yaml(path)?
        }
        None => {
            let implicit = source_root.join(DEFAULT_CONFIG_FILE);
            if implicit.is_file() {
                read_yaml(&implicit)?
            } else {
                AnalysisConfig::default()
            }
        }
    };

    apply_env(&mut config, env)?;
    apply_overrides(&mut config, overrides);
    validate(&config)?;
    Ok(config)
}

/// Convenience lookup over the real process environment, for the binary.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn read_yaml(path: &Path) -> Result<AnalysisConfig> {
    let contents = std::fs::read_to_string(path)?;
    let config = serde_yaml::from_str(&contents)?;
    tracing::debug!("loaded config from {}", path.display());
    Ok(config)
}

fn apply_env(config: &mut AnalysisConfig, env: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(raw) = env(ENV_WORKERS) {
        config.scan.max_workers = raw.trim().parse().map_err(|_| {
            ImpactGraphError::Config(format!("{ENV_WORKERS} must be a positive integer, got {raw:?}"))
        })?;
    }
    if let Some(raw) = env(ENV_TEST_PREFIXES) {
        config.tests.prefixes = split_list(&raw);
    }
    if let Some(raw) = env(ENV_SERVICE_ROOTS) {
        config.services.roots = split_list(&raw);
    }
    if let Some(raw) = env(ENV_EXTENSIONS) {
        config.scan.extensions = split_list(&raw);
    }
    Ok(())
}

fn apply_overrides(config: &mut AnalysisConfig, overrides: &ConfigOverrides) {
    if let Some(workers) = overrides.workers {
        config.scan.max_workers = workers;
    }
    if let Some(prefixes) = &overrides.test_prefixes {
        config.tests.prefixes = prefixes.clone();
    }
    if let Some(roots) = &overrides.service_roots {
        config.services.roots = roots.clone();
    }
    if let Some(follow) = overrides.follow_targets {
        config.sequential.follow_targets = follow;
    }
}

fn validate(config: &AnalysisConfig) -> Result<()> {
    if config.scan.max_workers == 0 {
        return Err(ImpactGraphError::Config("scan.max_workers must be at least 1".into()));
    }
    if config.scan.extensions.is_empty() {
        return Err(ImpactGraphError::Config("scan.extensions must not be empty".into()));
    }
    if config.tests.prefixes.iter().all(|p| p.is_empty()) {
        return Err(ImpactGraphError::Config("tests.prefixes must name at least one prefix".into()));
    }
    if let Err(e) = tracing_subscriber::EnvFilter::try_new(&config.logging.filter) {
        return Err(ImpactGraphError::Config(format!(
            "logging.filter {:?} is not a valid filter: {e}",
            config.logging.filter
        )));
    }
    Ok(())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_when_no_file() {
        let dir = TempDir::new().unwrap();
        let config = load_config(dir.path(), None, no_env, &ConfigOverrides::default()).unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn implicit_file_is_picked_up() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            "tests:\n  prefixes: [\"TestAcc\"]\n",
        )
        .unwrap();
        let config = load_config(dir.path(), None, no_env, &ConfigOverrides::default()).unwrap();
        assert_eq!(config.tests.prefixes, vec!["TestAcc"]);
    }

    #[test]
    fn explicit_missing_file_is_missing_input() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.yaml");
        let err = load_config(dir.path(), Some(&missing), no_env, &ConfigOverrides::default())
            .unwrap_err();
        assert!(matches!(err, ImpactGraphError::MissingInput { .. }));
    }

    #[test]
    fn env_beats_file_and_cli_beats_env() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            "scan:\n  max_workers: 3\n",
        )
        .unwrap();
        let env: HashMap<&str, &str> = [
            (ENV_WORKERS, "5"),
            (ENV_TEST_PREFIXES, "TestAcc, Test"),
        ]
        .into_iter()
        .collect();
        let lookup = |k: &str| env.get(k).map(|v| v.to_string());

        let config = load_config(dir.path(), None, lookup, &ConfigOverrides::default()).unwrap();
        assert_eq!(config.scan.max_workers, 5);
        assert_eq!(config.tests.prefixes, vec!["TestAcc", "Test"]);

        let overrides = ConfigOverrides {
            workers: Some(2),
            follow_targets: Some(true),
            ..Default::default()
        };
        let config = load_config(dir.path(), None, lookup, &overrides).unwrap();
        assert_eq!(config.scan.max_workers, 2);
        assert!(config.sequential.follow_targets);
    }

    #[test]
    fn bad_env_value_is_config_error() {
        let dir = TempDir::new().unwrap();
        let lookup = |k: &str| (k == ENV_WORKERS).then(|| "many".to_string());
        let err = load_config(dir.path(), None, lookup, &ConfigOverrides::default()).unwrap_err();
        assert!(matches!(err, ImpactGraphError::Config(_)));
    }

    #[test]
    fn zero_workers_rejected() {
        let dir = TempDir::new().unwrap();
        let overrides = ConfigOverrides {
            workers: Some(0),
            ..Default::default()
        };
        assert!(load_config(dir.path(), None, no_env, &overrides).is_err());
    }

    #[test]
    fn logging_section_is_read_and_validated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "logging:\n  filter: impactgraph=debug\n  targets: true\n").unwrap();
        let config = load_config(dir.path(), None, no_env, &ConfigOverrides::default()).unwrap();
        assert_eq!(config.logging.filter, "impactgraph=debug");
        assert!(config.logging.targets);

        std::fs::write(&path, "logging:\n  filter: impactgraph=loud\n").unwrap();
        let err = load_config(dir.path(), None, no_env, &ConfigOverrides::default()).unwrap_err();
        assert!(matches!(err, ImpactGraphError::Config(_)));
    }
}
