//! The candidate universe: every scanned file's facts, indexed by name.
//!
//! Scope expansion and sequential resolution search the *whole* universe,
//! not just the discovered scope, because the definition of a referenced
//! function frequently lives in a file with no path back to the target.
//!
//! # Ambiguity policy
//!
//! When several files define the same name, [`CandidateUniverse::resolve`]
//! narrows by receiver struct (if the call site names one), then prefers the
//! caller's own file, then the caller's service, then the lexicographically
//! smallest path, then the lowest line. Picking among several remaining
//! candidates without a unique same-file match is reported as ambiguous.
//! That includes two definitions in the caller's own file (methods of
//! different structs called without a known receiver): the edge keeps its
//! same-file tag, and the tie shows up only in the run diagnostics.
//!
//! [`CandidateUniverse::resolve_preferring`] puts a caller-chosen class of
//! definitions (for example those already in scope) ahead of all of that.

use std::collections::{BTreeMap, HashMap};

use crate::indexer::facts::FileFacts;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One candidate file.
#[derive(Debug, Clone)]
pub struct UniverseFile {
    /// Path relative to the source root, `/`-separated.
    pub path: String,
    pub service: String,
    /// Whether the raw text contains the target literal.
    pub matched: bool,
    /// Empty when the extractor had nothing usable for this file.
    pub facts: FileFacts,
}

/// Where a function name is defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefSite {
    pub name: String,
    pub file: String,
    pub service: String,
    pub owner: Option<String>,
    pub line: u32,
    pub produces_artifact: bool,
    pub anonymous: bool,
    pub enclosing: Option<String>,
}

/// Which definitions a lookup accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefFilter {
    Any,
    /// Only functions that render a configuration artifact.
    Artifact,
}

/// The call site a lookup is made from.
#[derive(Debug, Clone, Copy)]
pub struct ResolveFrom<'a> {
    pub file: &'a str,
    pub service: &'a str,
    pub receiver: Option<&'a str>,
}

/// Outcome of a successful lookup.
#[derive(Debug, Clone, Copy)]
pub struct Lookup<'u> {
    pub site: &'u DefSite,
    /// More than one candidate survived filtering and the pick was not a
    /// unique same-file match.
    pub ambiguous: bool,
}

// ---------------------------------------------------------------------------
// CandidateUniverse
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct CandidateUniverse {
    files: BTreeMap<String, UniverseFile>,
    by_name: HashMap<String, Vec<DefSite>>,
}

impl CandidateUniverse {
    pub fn new(files: impl IntoIterator<Item = UniverseFile>) -> Self {
        let mut universe = Self::default();
        for file in files {
            for decl in &file.facts.functions {
                universe
                    .by_name
                    .entry(decl.name.clone())
                    .or_default()
                    .push(DefSite {
                        name: decl.name.clone(),
                        file: file.path.clone(),
                        service: file.service.clone(),
                        owner: decl.owner.clone(),
                        line: decl.line,
                        produces_artifact: decl.produces_artifact,
                        anonymous: decl.anonymous,
                        enclosing: decl.enclosing.clone(),
                    });
            }
            universe.files.insert(file.path.clone(), file);
        }
        for defs in universe.by_name.values_mut() {
            defs.sort_by(|a, b| (&a.file, a.line).cmp(&(&b.file, b.line)));
        }
        universe
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn file(&self, path: &str) -> Option<&UniverseFile> {
        self.files.get(path)
    }

    /// All files, sorted by path.
    pub fn files(&self) -> impl Iterator<Item = &UniverseFile> {
        self.files.values()
    }

    /// Files whose text contains the target literal, sorted by path.
    pub fn matched_paths(&self) -> Vec<String> {
        self.files
            .values()
            .filter(|f| f.matched)
            .map(|f| f.path.clone())
            .collect()
    }

    pub fn definitions(&self, name: &str) -> &[DefSite] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Find the definition `name` most likely refers to from `from`.
    pub fn resolve(&self, name: &str, from: ResolveFrom<'_>, filter: DefFilter) -> Option<Lookup<'_>> {
        self.resolve_preferring(name, from, filter, |_| true)
    }

    /// Like [`Self::resolve`], but definitions for which `prefer` holds rank
    /// ahead of every other candidate.
    pub fn resolve_preferring(
        &self,
        name: &str,
        from: ResolveFrom<'_>,
        filter: DefFilter,
        prefer: impl Fn(&DefSite) -> bool,
    ) -> Option<Lookup<'_>> {
        let mut candidates: Vec<&DefSite> = self
            .definitions(name)
            .iter()
            .filter(|d| filter == DefFilter::Any || d.produces_artifact)
            .collect();

        if let Some(receiver) = from.receiver {
            let owned: Vec<&DefSite> = candidates
                .iter()
                .copied()
                .filter(|d| d.owner.as_deref() == Some(receiver))
                .collect();
            if !owned.is_empty() {
                candidates = owned;
            }
        }

        let rank = |d: &DefSite| {
            (
                !prefer(d),
                d.file != from.file,
                d.service != from.service,
                d.file.clone(),
                d.line,
            )
        };
        let site = *candidates.iter().min_by_key(|d| rank(d))?;

        let same_file = candidates.iter().filter(|d| d.file == from.file).count();
        Some(Lookup {
            site,
            ambiguous: candidates.len() > 1 && same_file != 1,
        })
    }
}

/// Package directory of `path`: everything before the last `/`, or `""`
/// for files at the top level.
pub fn package_of(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

// ---------------------------------------------------------------------------
// Service inference
// ---------------------------------------------------------------------------

/// Service owning `path` (relative, `/`-separated).
///
/// The directory right below a configured root names the service; failing
/// that, the file's parent directory does; files at the top level belong to
/// `root`.
pub fn service_for_path(path: &str, roots: &[String]) -> String {
    for root in roots {
        let root = root.trim_matches('/');
        if root.is_empty() {
            continue;
        }
        let marker = format!("{root}/");
        let rest = if let Some(rest) = path.strip_prefix(&marker) {
            Some(rest)
        } else {
            path.find(&format!("/{marker}"))
                .map(|pos| &path[pos + marker.len() + 1..])
        };
        if let Some((service, _)) = rest.and_then(|r| r.split_once('/')) {
            if !service.is_empty() {
                return service.to_string();
            }
        }
    }

    match path.rsplit_once('/') {
        Some((dir, _)) => dir.rsplit('/').next().unwrap_or(dir).to_string(),
        None => "root".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
