//! End-to-end discovery for one target identifier.
//!
//! Stages, in order:
//!
//! 1. **Scan** candidate files in parallel (read, literal test, facts).
//! 2. **Seed** the scope with the files containing the literal, populated
//!    in parallel.
//! 3. **Closure** discovery along template calls (single-threaded).
//! 4. **Sequential** expansion; with `sequential.follow_targets` the files
//!    it pulls in are fed back to the closure until nothing changes.
//! 5. **Refinement** of every provisional edge.
//!
//! Missing inputs abort before the store is touched. A run whose literal
//! matches no file ends with [`DiscoveryOutcome::NotFound`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::error::{ImpactGraphError, Result};
use crate::graph::closure::ClosureEngine;
use crate::graph::context::AnalysisContext;
use crate::graph::populate::populate_files;
use crate::graph::query::ImpactQuery;
use crate::graph::refine::refine;
use crate::graph::sequential::SequentialExpander;
use crate::graph::store::{RelationalStore, StoreStats};
use crate::indexer::facts::{FactProvider, SidecarFactProvider};
use crate::indexer::scan::{build_pool, collect_candidates, literal_pattern, Scanner};
use crate::indexer::universe::CandidateUniverse;
use crate::observability::{DiagnosticsReport, RunDiagnostics};
use crate::types::ResourceId;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A finished discovery run.
pub struct AnalysisRun {
    pub resource: String,
    pub resource_id: ResourceId,
    pub store: RelationalStore,
    pub diagnostics: DiagnosticsReport,
    /// Discovered scope, sorted.
    pub scope: Vec<String>,
}

impl AnalysisRun {
    pub fn query(&self) -> ImpactQuery<'_> {
        ImpactQuery::new(&self.store)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            resource: self.resource.clone(),
            files_in_scope: self.scope.len(),
            stats: self.store.stats(),
            diagnostics: self.diagnostics.clone(),
        }
    }
}

impl std::fmt::Debug for AnalysisRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisRun")
            .field("resource", &self.resource)
            .field("scope", &self.scope.len())
            .field("stats", &self.store.stats())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub resource: String,
    pub files_in_scope: usize,
    pub stats: StoreStats,
    pub diagnostics: DiagnosticsReport,
}

#[derive(Debug)]
pub enum DiscoveryOutcome {
    Discovered(Box<AnalysisRun>),
    /// No candidate file contains the target literal.
    NotFound {
        resource: String,
        files_scanned: usize,
    },
}

impl DiscoveryOutcome {
    pub fn run(&self) -> Option<&AnalysisRun> {
        match self {
            Self::Discovered(run) => Some(run),
            Self::NotFound { .. } => None,
        }
    }

    pub fn into_run(self) -> Option<AnalysisRun> {
        match self {
            Self::Discovered(run) => Some(*run),
            Self::NotFound { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// DiscoveryPipeline
// ---------------------------------------------------------------------------

pub struct DiscoveryPipeline {
    source_root: PathBuf,
    config: AnalysisConfig,
    provider: Arc<dyn FactProvider>,
}

impl DiscoveryPipeline {
    /// Validate the inputs and build a pipeline over `source_root`.
    pub fn new(
        source_root: impl Into<PathBuf>,
        config: AnalysisConfig,
        provider: Arc<dyn FactProvider>,
    ) -> Result<Self> {
        let source_root = source_root.into();
        check_inputs(&source_root, &config)?;
        Ok(Self {
            source_root,
            config,
            provider,
        })
    }

    /// Pipeline reading the extractor's sidecar JSON files.
    pub fn with_sidecar_facts(source_root: impl Into<PathBuf>, config: AnalysisConfig) -> Result<Self> {
        let provider = Arc::new(SidecarFactProvider::new(config.scan.facts_suffix.clone()));
        Self::new(source_root, config, provider)
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn discover(&self, resource: &str) -> Result<DiscoveryOutcome> {
        let resource = resource.trim();
        if resource.is_empty() {
            return Err(ImpactGraphError::Config("target identifier must not be empty".into()));
        }
        tracing::info!("discovering tests for {resource} under {}", self.source_root.display());

        let diagnostics = RunDiagnostics::new();
        let pattern = literal_pattern(resource)?;
        let pool = build_pool(&self.config)?;
        let candidates = collect_candidates(&self.source_root, &self.config)?;
        let scanner = Scanner {
            root: &self.source_root,
            config: &self.config,
            pattern: &pattern,
            provider: self.provider.as_ref(),
            diagnostics: &diagnostics,
        };
        let universe = CandidateUniverse::new(scanner.scan(&candidates, &pool));

        let seeds = universe.matched_paths();
        if seeds.is_empty() {
            tracing::info!("{resource}: no file contains the target literal");
            return Ok(DiscoveryOutcome::NotFound {
                resource: resource.to_string(),
                files_scanned: diagnostics.report().files_scanned,
            });
        }

        let store = RelationalStore::new();
        let resource_id = store.get_or_create_resource(resource)?;
        let scope = {
            let ctx = AnalysisContext {
                config: &self.config,
                universe: &universe,
                store: &store,
                diagnostics: &diagnostics,
                resource: resource_id,
            };
            run_stages(&ctx, &seeds, &pool)?
        };

        let run = AnalysisRun {
            resource: resource.to_string(),
            resource_id,
            store,
            diagnostics: diagnostics.report(),
            scope,
        };
        tracing::info!(
            "{resource}: {} file(s) in scope, {:?}",
            run.scope.len(),
            run.store.stats()
        );
        Ok(DiscoveryOutcome::Discovered(Box::new(run)))
    }

    /// One outcome per identifier, in input order.
    pub fn discover_all(&self, resources: &[String]) -> Result<Vec<DiscoveryOutcome>> {
        resources.iter().map(|r| self.discover(r)).collect()
    }
}

fn run_stages(
    ctx: &AnalysisContext<'_>,
    seeds: &[String],
    pool: &rayon::ThreadPool,
) -> Result<Vec<String>> {
    let seeded = populate_files(ctx, seeds, Some(pool))?;
    tracing::info!("seeded scope with {} file(s)", seeded.len());

    let mut closure = ClosureEngine::new(ctx);
    closure.enqueue(seeded);
    closure.run()?;

    let mut expander = SequentialExpander::new(ctx);
    loop {
        let report = expander.expand()?;
        if report.pulled_in.is_empty() {
            break;
        }
        closure.enqueue(report.pulled_in);
        closure.run()?;
    }

    refine(ctx)?;
    Ok(closure.scope())
}

fn check_inputs(source_root: &Path, config: &AnalysisConfig) -> Result<()> {
    if !source_root.is_dir() {
        return Err(ImpactGraphError::missing_input(
            source_root,
            "source tree does not exist or is not a directory",
        ));
    }
    if config.services.require_root
        && !config
            .services
            .roots
            .iter()
            .any(|r| source_root.join(r).is_dir())
    {
        return Err(ImpactGraphError::missing_input(
            source_root,
            format!(
                "none of the service roots {:?} exist under the source tree",
                config.services.roots
            ),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
