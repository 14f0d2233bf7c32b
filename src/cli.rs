//! Command-line surface: `discover` runs the pipeline and exports one
//! database per target identifier; `query` reads an export back and prints
//! an impact view.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;

use crate::config::{load_config, loader::process_env, ConfigOverrides, LoggingConfig};
use crate::db::{export_store, import_store};
use crate::error::Result;
use crate::graph::query::{ImpactKind, ImpactQuery, ImpactedTest};
use crate::indexer::pipeline::{DiscoveryOutcome, DiscoveryPipeline};
use crate::observability::init_logging;

/// Exit status when no target identifier matched any file.
pub const EXIT_NOT_FOUND: u8 = 2;

#[derive(Debug, Parser)]
#[command(
    name = "impactgraph",
    version,
    about = "Find the tests that must re-run when a named configuration entity changes"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Trace one or more target identifiers and export each run.
    Discover(DiscoverArgs),
    /// Print an impact view from an exported run.
    Query(QueryArgs),
}

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    /// Root of the source tree
    #[arg(long, value_name = "DIR")]
    pub source: PathBuf,
    /// Target identifier to trace (repeatable)
    #[arg(long = "resource", value_name = "ID", required = true)]
    pub resources: Vec<String>,
    /// Directory receiving `<resource>.db` exports
    #[arg(long, value_name = "DIR")]
    pub output: PathBuf,
    /// YAML config (default: <source>/.impactgraph.yaml if present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Scan worker count
    #[arg(long)]
    pub workers: Option<usize>,
    /// Test name prefixes, comma separated
    #[arg(long, value_delimiter = ',')]
    pub test_prefixes: Option<Vec<String>>,
    /// Pull out-of-scope sequential targets into the scope
    #[arg(long)]
    pub follow_targets: bool,
    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Exported run database
    #[arg(long, value_name = "PATH")]
    pub input: PathBuf,
    #[arg(long, value_enum, default_value_t = View::Combined)]
    pub view: View,
    /// Print only the distinct runnable test names
    #[arg(long)]
    pub names: bool,
    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum View {
    Direct,
    Indirect,
    Sequential,
    Combined,
}

impl View {
    pub fn kind(self) -> Option<ImpactKind> {
        match self {
            Self::Direct => Some(ImpactKind::Direct),
            Self::Indirect => Some(ImpactKind::TemplateIndirect),
            Self::Sequential => Some(ImpactKind::Sequential),
            Self::Combined => None,
        }
    }
}

/// Run a parsed command. Returns the process exit status.
pub fn run(cli: Cli) -> Result<u8> {
    match cli.command {
        Command::Discover(args) => discover(&args),
        Command::Query(args) => query(&args),
    }
}

fn discover(args: &DiscoverArgs) -> Result<u8> {
    let overrides = ConfigOverrides {
        workers: args.workers,
        test_prefixes: args.test_prefixes.clone(),
        service_roots: None,
        follow_targets: args.follow_targets.then_some(true),
    };
    let config = load_config(&args.source, args.config.as_deref(), process_env, &overrides)?;
    init_logging(&config.logging);
    let pipeline = DiscoveryPipeline::with_sidecar_facts(&args.source, config)?;
    std::fs::create_dir_all(&args.output)?;

    let mut reports = Vec::new();
    let mut found = 0usize;
    for resource in &args.resources {
        match pipeline.discover(resource)? {
            DiscoveryOutcome::NotFound {
                resource,
                files_scanned,
            } => {
                if !args.json {
                    println!("{resource}: not found ({files_scanned} file(s) scanned)");
                }
                reports.push(json!({
                    "resource": resource,
                    "status": "not_found",
                    "files_scanned": files_scanned,
                }));
            }
            DiscoveryOutcome::Discovered(run) => {
                found += 1;
                let path = export_path(&args.output, &run.resource);
                export_store(&run.store, &path)?;
                let query = run.query();
                let combined = query.combined();
                if !args.json {
                    println!(
                        "{}: {} file(s) in scope, {} impacted test(s), {} to run -> {}",
                        run.resource,
                        run.scope.len(),
                        combined.len(),
                        query.run_names().len(),
                        path.display()
                    );
                }
                reports.push(json!({
                    "resource": run.resource,
                    "status": "discovered",
                    "export": path.display().to_string(),
                    "summary": run.summary(),
                    "run": query.run_names(),
                }));
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }
    if found == 0 {
        return Ok(EXIT_NOT_FOUND);
    }
    Ok(0)
}

fn query(args: &QueryArgs) -> Result<u8> {
    init_logging(&LoggingConfig::default());
    let store = import_store(&args.input)?;
    let query = ImpactQuery::new(&store);

    if args.names {
        let names = query.run_names();
        if args.json {
            println!("{}", serde_json::to_string_pretty(&names)?);
        } else {
            for name in names {
                println!("{name}");
            }
        }
        return Ok(0);
    }

    let rows = query.view(args.view.kind());
    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        for row in &rows {
            println!("{}", render_row(row));
        }
    }
    Ok(0)
}

fn render_row(row: &ImpactedTest) -> String {
    format!(
        "{:<17} {:<40} {:<50} via {}",
        row.kind.as_str(),
        row.name,
        row.file.as_deref().unwrap_or("-"),
        row.via
    )
}

/// `<dir>/<resource>.db`, with path-hostile characters replaced.
pub fn export_path(dir: &Path, resource: &str) -> PathBuf {
    let safe: String = resource
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    dir.join(format!("{safe}.db"))
}
