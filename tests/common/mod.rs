//! Shared fixtures: source trees on disk with extractor sidecar files.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use impactgraph::config::AnalysisConfig;
use impactgraph::indexer::facts::{
    CallSite, FileFacts, FunctionDecl, LiteralOccurrence, SequentialEntry,
};
use impactgraph::indexer::pipeline::{AnalysisRun, DiscoveryOutcome, DiscoveryPipeline};
use impactgraph::types::OccurrenceKind;
use tempfile::TempDir;

pub const RESOURCE: &str = "azurerm_thing";
pub const SIDECAR: &str = ".facts.json";

/// A temporary source tree. Each file gets its text plus a JSON sidecar
/// holding its structural facts.
pub struct Tree {
    dir: TempDir,
}

impl Tree {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Write `rel` with `text` and its facts sidecar.
    pub fn file(&self, rel: &str, text: &str, facts: &FileFacts) -> &Self {
        self.source(rel, text);
        std::fs::write(
            self.path(&format!("{rel}{SIDECAR}")),
            serde_json::to_string_pretty(facts).unwrap(),
        )
        .unwrap();
        self
    }

    /// Write `rel` without any sidecar.
    pub fn source(&self, rel: &str, text: &str) -> &Self {
        let path = self.path(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
        self
    }

    pub fn raw_sidecar(&self, rel: &str, contents: &str) -> &Self {
        std::fs::write(self.path(&format!("{rel}{SIDECAR}")), contents).unwrap();
        self
    }

    pub fn discover_with(&self, config: AnalysisConfig) -> DiscoveryOutcome {
        DiscoveryPipeline::with_sidecar_facts(self.root(), config)
            .unwrap()
            .discover(RESOURCE)
            .unwrap()
    }

    pub fn run(&self) -> AnalysisRun {
        self.discover_with(AnalysisConfig::default())
            .into_run()
            .expect("target literal should be found")
    }
}

// ---------------------------------------------------------------------------
// Fact builders
// ---------------------------------------------------------------------------

pub fn func(name: &str, line: u32) -> FunctionDecl {
    FunctionDecl {
        name: name.into(),
        owner: None,
        line,
        produces_artifact: false,
        anonymous: false,
        enclosing: None,
    }
}

pub fn method(owner: &str, name: &str, line: u32) -> FunctionDecl {
    FunctionDecl {
        owner: Some(owner.into()),
        ..func(name, line)
    }
}

pub fn template(owner: &str, name: &str, line: u32) -> FunctionDecl {
    FunctionDecl {
        produces_artifact: true,
        ..method(owner, name, line)
    }
}

pub fn call(caller: &str, callee: &str, receiver: Option<&str>, line: u32) -> CallSite {
    CallSite {
        caller: caller.into(),
        callee: callee.into(),
        receiver_type: receiver.map(String::from),
        line,
    }
}

pub fn literal(function: &str, kind: OccurrenceKind, line: u32) -> LiteralOccurrence {
    LiteralOccurrence {
        function: function.into(),
        kind,
        line,
        column: 1,
    }
}

pub fn entry(orchestrator: &str, group: &str, key: &str, target: &str, line: u32) -> SequentialEntry {
    SequentialEntry {
        orchestrator: orchestrator.into(),
        group: group.into(),
        key: key.into(),
        target: target.into(),
        line,
    }
}

/// Source text that contains the target literal.
pub fn matching_text() -> String {
    format!("resource \"{RESOURCE}\" \"test\" {{}}\n")
}
