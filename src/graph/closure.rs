//! Transitive closure discovery along the template-call graph.
//!
//! The scope starts as the files containing the target literal and grows by
//! following calls out of template functions: a callee defined in a file
//! outside the scope pulls that file in, and the next iteration walks the
//! new file's templates in turn. The candidate universe is searched as a
//! whole, so a callee is found wherever it is defined.
//!
//! The loop is an explicit worklist. A file enters the frontier at most once
//! (the seen-set is keyed by path), so the number of iterations is bounded
//! by the number of candidate files and the final scope does not depend on
//! the order in which a frontier is processed.

use std::collections::{BTreeSet, HashSet};

use crate::error::{ImpactGraphError, Result};
use crate::graph::classify::{classify, RawEdge};
use crate::graph::context::AnalysisContext;
use crate::graph::populate::{is_test_decl, populate_files, template_key};
use crate::graph::records::TemplateCall;
use crate::indexer::facts::{CallSite, FunctionDecl};
use crate::indexer::universe::{DefFilter, Lookup, ResolveFrom, UniverseFile};
use crate::types::{TemplateCallId, TemplateFunctionId};

/// What one call to [`ClosureEngine::run`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClosureReport {
    pub iterations: usize,
    pub files_added: usize,
    pub template_calls: usize,
}

/// A template call waiting for its target file to be declared.
struct PendingCall<'a> {
    source_id: TemplateFunctionId,
    source: &'a FunctionDecl,
    file: &'a UniverseFile,
    call: &'a CallSite,
    target: Option<Lookup<'a>>,
}

pub struct ClosureEngine<'c, 'a> {
    ctx: &'c AnalysisContext<'a>,
    seen: HashSet<String>,
    frontier: BTreeSet<String>,
}

impl<'c, 'a> ClosureEngine<'c, 'a> {
    pub fn new(ctx: &'c AnalysisContext<'a>) -> Self {
        Self {
            ctx,
            seen: HashSet::new(),
            frontier: BTreeSet::new(),
        }
    }

    /// Queue already-populated files for expansion. Files seen before are
    /// ignored. Returns how many were queued.
    pub fn enqueue(&mut self, paths: impl IntoIterator<Item = String>) -> usize {
        let mut queued = 0;
        for path in paths {
            if self.seen.insert(path.clone()) {
                self.frontier.insert(path);
                queued += 1;
            }
        }
        queued
    }

    /// Every file that has entered the frontier, sorted.
    pub fn scope(&self) -> Vec<String> {
        let mut scope: Vec<String> = self.seen.iter().cloned().collect();
        scope.sort();
        scope
    }

    /// Expand until an iteration adds no new file.
    pub fn run(&mut self) -> Result<ClosureReport> {
        let mut report = ClosureReport::default();
        while !self.frontier.is_empty() {
            report.iterations += 1;
            self.ctx.diagnostics.closure_iteration();
            let frontier = std::mem::take(&mut self.frontier);

            let (pending, discovered) = self.collect_calls(&frontier)?;

            let discovered: Vec<String> = discovered.into_iter().collect();
            let entered = populate_files(self.ctx, &discovered, None)?;
            for _ in &entered {
                self.ctx.diagnostics.file_discovered();
            }
            report.files_added += entered.len();

            for call in &pending {
                self.insert_call(call)?;
                report.template_calls += 1;
            }

            tracing::info!(
                "closure iteration {}: {} frontier file(s), {} template call(s), {} new file(s)",
                report.iterations,
                frontier.len(),
                pending.len(),
                entered.len()
            );
            self.enqueue(entered);
        }
        Ok(report)
    }

    /// Enumerate the configuration calls out of every template in
    /// `frontier`, and the out-of-scope files they land in.
    fn collect_calls(
        &self,
        frontier: &BTreeSet<String>,
    ) -> Result<(Vec<PendingCall<'a>>, BTreeSet<String>)> {
        let ctx = self.ctx;
        let mut pending = Vec::new();
        let mut discovered = BTreeSet::new();

        for path in frontier {
            let file = ctx.universe_file(path)?;
            let file_id = ctx.store.file_by_path(path).ok_or_else(|| {
                ImpactGraphError::Other(format!("{path} queued for closure but never declared"))
            })?;
            let templates = file
                .facts
                .functions
                .iter()
                .filter(|d| d.produces_artifact && !d.anonymous && !is_test_decl(ctx, d));

            for source in templates {
                let source_id = template_key(ctx, source, file_id)
                    .and_then(|k| ctx.store.template_by_key(&k))
                    .ok_or_else(|| {
                        ImpactGraphError::Other(format!(
                            "template {} in {path} was not declared",
                            source.name
                        ))
                    })?;

                for call in file.facts.calls_from(&source.name) {
                    let from = ResolveFrom {
                        file: &file.path,
                        service: &file.service,
                        receiver: call.receiver_type.as_deref(),
                    };
                    let target = ctx.universe.resolve(&call.callee, from, DefFilter::Artifact);
                    // calls into plain helpers are not configuration edges
                    if target.is_none()
                        && ctx.universe.resolve(&call.callee, from, DefFilter::Any).is_some()
                    {
                        continue;
                    }
                    if let Some(hit) = target {
                        if hit.ambiguous {
                            ctx.diagnostics.ambiguous_resolution();
                        }
                        if !self.seen.contains(&hit.site.file) && !ctx.in_scope(&hit.site.file) {
                            discovered.insert(hit.site.file.clone());
                        }
                    }
                    pending.push(PendingCall {
                        source_id,
                        source,
                        file,
                        call,
                        target,
                    });
                }
            }
        }
        Ok((pending, discovered))
    }

    fn insert_call(&self, pending: &PendingCall<'a>) -> Result<TemplateCallId> {
        let ctx = self.ctx;
        let row = pending.target.and_then(|hit| ctx.template_row_for(hit.site));
        let target_service = row
            .as_ref()
            .and_then(|(_, r)| r.file_id())
            .and_then(|f| ctx.service_name(f));
        let class = classify(&RawEdge {
            caller: &pending.source.name,
            caller_file: &pending.file.path,
            caller_service: Some(&pending.file.service),
            subject: &pending.call.callee,
            subject_anonymous: pending.target.is_some_and(|t| t.site.anonymous),
            target: pending.target,
            target_service: target_service.as_deref(),
        });
        ctx.store.insert_template_call(TemplateCall {
            id: TemplateCallId(0),
            source_id: pending.source_id,
            target_id: row.map(|(id, _)| id),
            callee: pending.call.callee.clone(),
            line: pending.call.line,
            class,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::graph::records::TemplateFunction;
    use crate::graph::store::RelationalStore;
    use crate::indexer::facts::{FileFacts, LiteralOccurrence};
    use crate::indexer::universe::CandidateUniverse;
    use crate::observability::RunDiagnostics;
    use crate::types::{OccurrenceKind, Resolution, ServiceImpact, Visibility};

    fn template(name: &str, line: u32) -> FunctionDecl {
        FunctionDecl {
            name: name.into(),
            owner: None,
            line,
            produces_artifact: true,
            anonymous: false,
            enclosing: None,
        }
    }

    fn calls(pairs: &[(&str, &str, u32)]) -> Vec<CallSite> {
        pairs
            .iter()
            .map(|(caller, callee, line)| CallSite {
                caller: caller.to_string(),
                callee: callee.to_string(),
                receiver_type: None,
                line: *line,
            })
            .collect()
    }

    fn file(path: &str, service: &str, matched: bool, facts: FileFacts) -> UniverseFile {
        UniverseFile {
            path: path.into(),
            service: service.into(),
            matched,
            facts,
        }
    }

    /// a.go (literal) -> b.go -> c.go, plus an unreachable d.go and a call
    /// that resolves nowhere.
    fn chain() -> CandidateUniverse {
        CandidateUniverse::new(vec![
            file(
                "svc/a/a.go",
                "a",
                true,
                FileFacts {
                    functions: vec![template("withTarget", 1)],
                    calls: calls(&[("withTarget", "base", 2), ("withTarget", "missing", 3)]),
                    literals: vec![LiteralOccurrence {
                        function: "withTarget".into(),
                        kind: OccurrenceKind::Block,
                        line: 4,
                        column: 1,
                    }],
                    sequential: vec![],
                },
            ),
            file(
                "svc/a/b.go",
                "a",
                false,
                FileFacts {
                    functions: vec![template("base", 1)],
                    calls: calls(&[("base", "provider", 2)]),
                    ..Default::default()
                },
            ),
            file(
                "svc/b/c.go",
                "b",
                false,
                FileFacts {
                    functions: vec![template("provider", 1)],
                    ..Default::default()
                },
            ),
            file(
                "svc/b/d.go",
                "b",
                false,
                FileFacts {
                    functions: vec![template("unrelated", 1)],
                    ..Default::default()
                },
            ),
        ])
    }

    #[test]
    fn follows_template_calls_to_fixed_point() {
        let config = AnalysisConfig::default();
        let universe = chain();
        let store = RelationalStore::new();
        let diagnostics = RunDiagnostics::new();
        let resource = store.get_or_create_resource("azurerm_thing").unwrap();
        let ctx = AnalysisContext {
            config: &config,
            universe: &universe,
            store: &store,
            diagnostics: &diagnostics,
            resource,
        };

        let seeds = populate_files(&ctx, &universe.matched_paths(), None).unwrap();
        let mut engine = ClosureEngine::new(&ctx);
        engine.enqueue(seeds);
        let report = engine.run().unwrap();

        assert_eq!(engine.scope(), vec!["svc/a/a.go", "svc/a/b.go", "svc/b/c.go"]);
        assert_eq!(report.files_added, 2);
        assert_eq!(report.iterations, 3);
        assert_eq!(report.template_calls, 3);

        let calls = store.all::<TemplateCall>();
        let by_callee = |name: &str| calls.iter().find(|c| c.callee == name).unwrap().clone();

        let base = by_callee("base");
        assert_eq!(base.class.resolution, Resolution::CrossFile);
        assert_eq!(base.class.visibility, Visibility::Private);
        assert_eq!(base.class.service_impact, Some(ServiceImpact::SameService));
        let target = store.get::<TemplateFunction>(base.target_id.unwrap()).unwrap();
        assert_eq!(target.name, "base");

        let provider = by_callee("provider");
        assert_eq!(provider.class.service_impact, Some(ServiceImpact::CrossService));

        let missing = by_callee("missing");
        assert_eq!(missing.target_id, None);
        assert!(missing.class.is_external());
        assert_eq!(missing.class.visibility, Visibility::External);

        // running again over a drained frontier is a no-op
        assert_eq!(engine.run().unwrap(), ClosureReport::default());
        assert_eq!(engine.enqueue(vec!["svc/a/a.go".to_string()]), 0);
    }

    #[test]
    fn ranks_templates_ahead_of_same_file_helpers() {
        let helper = FunctionDecl {
            produces_artifact: false,
            ..template("shared", 9)
        };
        let universe = CandidateUniverse::new(vec![
            file(
                "svc/a/a.go",
                "a",
                true,
                FileFacts {
                    functions: vec![
                        template("withTarget", 1),
                        helper,
                        FunctionDecl {
                            produces_artifact: false,
                            ..template("formatName", 12)
                        },
                    ],
                    calls: calls(&[("withTarget", "shared", 2), ("withTarget", "formatName", 3)]),
                    ..Default::default()
                },
            ),
            file(
                "svc/b/t.go",
                "b",
                false,
                FileFacts {
                    functions: vec![template("shared", 4)],
                    ..Default::default()
                },
            ),
        ]);
        let config = AnalysisConfig::default();
        let store = RelationalStore::new();
        let diagnostics = RunDiagnostics::new();
        let resource = store.get_or_create_resource("azurerm_thing").unwrap();
        let ctx = AnalysisContext {
            config: &config,
            universe: &universe,
            store: &store,
            diagnostics: &diagnostics,
            resource,
        };

        let seeds = populate_files(&ctx, &universe.matched_paths(), None).unwrap();
        let mut engine = ClosureEngine::new(&ctx);
        engine.enqueue(seeds);
        engine.run().unwrap();

        assert_eq!(engine.scope(), vec!["svc/a/a.go", "svc/b/t.go"]);
        // the helper-only call is not an edge
        let calls = store.all::<TemplateCall>();
        assert_eq!(calls.len(), 1);
        let shared = &calls[0];
        assert_eq!(shared.callee, "shared");
        assert_eq!(shared.class.resolution, Resolution::CrossFile);
        assert_eq!(shared.class.service_impact, Some(ServiceImpact::CrossService));
        let target = store.get::<TemplateFunction>(shared.target_id.unwrap()).unwrap();
        assert_eq!(target.file_id(), store.file_by_path("svc/b/t.go"));
    }
}
