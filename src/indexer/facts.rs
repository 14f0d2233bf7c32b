//! Structural facts: the boundary with the external extractor.
//!
//! The extractor turns raw source text into typed [`FileFacts`]; this crate
//! never re-parses source text itself (apart from the literal pre-filter in
//! the scan). Providers are best-effort: a file whose facts are missing or
//! malformed yields a [`FactError`], which the scan records as a partial
//! failure before treating the file as an empty leaf.
//!
//! # Design decisions
//!
//! - **Sidecar files.** [`SidecarFactProvider`] reads the extractor's JSON
//!   output stored next to each source file, so any extractor that can write
//!   JSON plugs in without linking into this crate.
//! - **Validation on load.** Facts are checked once, when loaded; downstream
//!   stages rely on every name being non-empty.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::OccurrenceKind;

// ---------------------------------------------------------------------------
// Fact records
// ---------------------------------------------------------------------------

/// Everything the extractor knows about one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFacts {
    #[serde(default)]
    pub functions: Vec<FunctionDecl>,
    #[serde(default)]
    pub calls: Vec<CallSite>,
    #[serde(default)]
    pub literals: Vec<LiteralOccurrence>,
    #[serde(default)]
    pub sequential: Vec<SequentialEntry>,
}

/// A function or method declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    /// Receiver struct, for methods.
    #[serde(default)]
    pub owner: Option<String>,
    pub line: u32,
    /// True when the function renders a configuration artifact.
    #[serde(default)]
    pub produces_artifact: bool,
    /// Closures and other unnamed functions.
    #[serde(default)]
    pub anonymous: bool,
    /// Function whose body embeds this one.
    #[serde(default)]
    pub enclosing: Option<String>,
}

/// A call from `caller` to `callee`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub caller: String,
    pub callee: String,
    /// Struct the call is dispatched on, when the extractor knows it.
    #[serde(default)]
    pub receiver_type: Option<String>,
    pub line: u32,
}

/// An occurrence of the target identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiteralOccurrence {
    /// Function containing the occurrence.
    pub function: String,
    pub kind: OccurrenceKind,
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

/// One group/key entry in an orchestrator's keyed collection of tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequentialEntry {
    pub orchestrator: String,
    pub group: String,
    pub key: String,
    /// Name of the test invoked by reference.
    pub target: String,
    pub line: u32,
}

impl FileFacts {
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
            && self.calls.is_empty()
            && self.literals.is_empty()
            && self.sequential.is_empty()
    }

    /// Reject facts with empty names; downstream resolution keys on them.
    pub fn validate(&self) -> Result<(), FactError> {
        if let Some(f) = self.functions.iter().find(|f| f.name.is_empty()) {
            return Err(FactError::Malformed(format!(
                "function declared at line {} has no name",
                f.line
            )));
        }
        if let Some(c) = self
            .calls
            .iter()
            .find(|c| c.caller.is_empty() || c.callee.is_empty())
        {
            return Err(FactError::Malformed(format!(
                "call at line {} is missing caller or callee",
                c.line
            )));
        }
        if let Some(l) = self.literals.iter().find(|l| l.function.is_empty()) {
            return Err(FactError::Malformed(format!(
                "literal at line {} has no containing function",
                l.line
            )));
        }
        if let Some(s) = self
            .sequential
            .iter()
            .find(|s| s.orchestrator.is_empty() || s.target.is_empty())
        {
            return Err(FactError::Malformed(format!(
                "sequential entry {}/{} at line {} is missing orchestrator or target",
                s.group, s.key, s.line
            )));
        }
        Ok(())
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Calls made from the body of `function`, in source order. Calls made
    /// from closures embedded in it count as its own.
    pub fn calls_from(&self, function: &str) -> Vec<&CallSite> {
        let mut calls: Vec<&CallSite> = self
            .calls
            .iter()
            .filter(|c| {
                c.caller == function
                    || self
                        .function(&c.caller)
                        .is_some_and(|d| d.anonymous && d.enclosing.as_deref() == Some(function))
            })
            .collect();
        calls.sort_by(|a, b| (a.line, &a.callee).cmp(&(b.line, &b.callee)));
        calls
    }

    /// Sequential entries declared by `orchestrator`, in source order.
    pub fn sequential_for<'a>(
        &'a self,
        orchestrator: &'a str,
    ) -> impl Iterator<Item = &'a SequentialEntry> + 'a {
        let mut entries: Vec<&SequentialEntry> = self
            .sequential
            .iter()
            .filter(|s| s.orchestrator == orchestrator)
            .collect();
        entries.sort_by(|a, b| (a.line, &a.group, &a.key).cmp(&(b.line, &b.group, &b.key)));
        entries.into_iter()
    }
}

// ---------------------------------------------------------------------------
// FactError
// ---------------------------------------------------------------------------

/// Why a file contributes no facts. Never aborts a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactError {
    #[error("unreadable: {0}")]
    Unreadable(String),
    #[error("malformed facts: {0}")]
    Malformed(String),
    #[error("no facts available: {0}")]
    Unsupported(String),
}

// ---------------------------------------------------------------------------
// FactProvider
// ---------------------------------------------------------------------------

/// Source of structural facts. Called concurrently from scan workers.
pub trait FactProvider: Send + Sync {
    /// Extract facts for the file at `path` whose text is `source`.
    fn extract(&self, path: &Path, source: &str) -> Result<FileFacts, FactError>;
}

/// Reads `<source path><suffix>` JSON files written by the extractor.
#[derive(Debug, Clone)]
pub struct SidecarFactProvider {
    suffix: String,
}

impl SidecarFactProvider {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    pub fn sidecar_path(&self, path: &Path) -> PathBuf {
        let mut raw = path.as_os_str().to_owned();
        raw.push(&self.suffix);
        PathBuf::from(raw)
    }
}

impl FactProvider for SidecarFactProvider {
    fn extract(&self, path: &Path, _source: &str) -> Result<FileFacts, FactError> {
        let sidecar = self.sidecar_path(path);
        if !sidecar.is_file() {
            return Err(FactError::Unsupported(format!(
                "{} not found",
                sidecar.display()
            )));
        }
        let raw = std::fs::read_to_string(&sidecar)
            .map_err(|e| FactError::Unreadable(format!("{}: {e}", sidecar.display())))?;
        let facts: FileFacts =
            serde_json::from_str(&raw).map_err(|e| FactError::Malformed(e.to_string()))?;
        facts.validate()?;
        Ok(facts)
    }
}

/// In-memory facts keyed by path relative to the source root.
#[derive(Debug, Clone, Default)]
pub struct StaticFactProvider {
    root: PathBuf,
    facts: HashMap<String, FileFacts>,
}

impl StaticFactProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            facts: HashMap::new(),
        }
    }

    pub fn with(mut self, relative_path: &str, facts: FileFacts) -> Self {
        self.facts.insert(relative_path.to_string(), facts);
        self
    }
}

impl FactProvider for StaticFactProvider {
    fn extract(&self, path: &Path, _source: &str) -> Result<FileFacts, FactError> {
        let relative = path
            .strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        let facts = self
            .facts
            .get(&relative)
            .cloned()
            .ok_or_else(|| FactError::Unsupported(format!("no facts registered for {relative}")))?;
        facts.validate()?;
        Ok(facts)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> FileFacts {
        FileFacts {
            functions: vec![FunctionDecl {
                name: "basic".into(),
                owner: Some("ThingResource".into()),
                line: 10,
                produces_artifact: true,
                anonymous: false,
                enclosing: None,
            }],
            calls: vec![
                CallSite {
                    caller: "TestThing".into(),
                    callee: "basic".into(),
                    receiver_type: Some("ThingResource".into()),
                    line: 5,
                },
                CallSite {
                    caller: "TestThing".into(),
                    callee: "template".into(),
                    receiver_type: None,
                    line: 3,
                },
            ],
            literals: vec![LiteralOccurrence {
                function: "basic".into(),
                kind: OccurrenceKind::Block,
                line: 12,
                column: 10,
            }],
            sequential: vec![],
        }
    }

    #[test]
    fn sidecar_roundtrip() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("thing_test.go");
        std::fs::write(&src, "package thing").unwrap();
        let provider = SidecarFactProvider::new(".facts.json");
        std::fs::write(
            provider.sidecar_path(&src),
            serde_json::to_string(&sample()).unwrap(),
        )
        .unwrap();
        let facts = provider.extract(&src, "package thing").unwrap();
        assert_eq!(facts, sample());
    }

    #[test]
    fn missing_sidecar_is_unsupported() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.go");
        let err = SidecarFactProvider::new(".facts.json")
            .extract(&src, "")
            .unwrap_err();
        assert!(matches!(err, FactError::Unsupported(_)));
    }

    #[test]
    fn garbage_sidecar_is_malformed() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.go");
        let provider = SidecarFactProvider::new(".facts.json");
        std::fs::write(provider.sidecar_path(&src), "{ not json").unwrap();
        assert!(matches!(
            provider.extract(&src, ""),
            Err(FactError::Malformed(_))
        ));
    }

    #[test]
    fn empty_names_are_malformed() {
        let mut facts = sample();
        facts.calls[0].callee.clear();
        assert!(matches!(facts.validate(), Err(FactError::Malformed(_))));
    }

    #[test]
    fn calls_from_are_in_line_order() {
        let facts = sample();
        let callees: Vec<&str> = facts.calls_from("TestThing").iter().map(|c| c.callee.as_str()).collect();
        assert_eq!(callees, vec!["template", "basic"]);
    }

    #[test]
    fn minimal_json_uses_defaults() {
        let facts: FileFacts =
            serde_json::from_str(r#"{"functions":[{"name":"f","line":1}]}"#).unwrap();
        assert!(!facts.functions[0].produces_artifact);
        assert!(facts.calls.is_empty());
    }

    #[test]
    fn static_provider_keys_on_relative_path() {
        let provider = StaticFactProvider::new("/src").with("svc/a.go", sample());
        assert!(provider.extract(Path::new("/src/svc/a.go"), "").is_ok());
        assert!(provider.extract(Path::new("/src/svc/b.go"), "").is_err());
    }
}
