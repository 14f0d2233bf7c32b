//! Indexer pipeline: scan the source tree, load structural facts, and drive
//! discovery over the relational store.

pub mod facts;
pub mod pipeline;
pub mod scan;
pub mod universe;

pub use facts::{FactProvider, FileFacts, SidecarFactProvider, StaticFactProvider};
pub use pipeline::{AnalysisRun, DiscoveryOutcome, DiscoveryPipeline};
pub use universe::CandidateUniverse;
