//! ImpactGraph: test impact analysis for configuration-driven test suites.
//!
//! Given a source tree and a target identifier, discovers the files that
//! mention it, follows template calls and sequential test orchestration to a
//! fixed point, and records the result in a typed relational store that can
//! be queried for the tests to re-run and exported to SQLite.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod graph;
pub mod indexer;
pub mod observability;
pub mod types;

pub use error::{ImpactGraphError, Result};
pub use indexer::pipeline::{AnalysisRun, DiscoveryOutcome, DiscoveryPipeline};
