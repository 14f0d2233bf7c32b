//! Sequential pattern expansion.
//!
//! An orchestrator is a test that runs other tests by reference, through a
//! keyed collection (`group -> key -> test`) instead of calling them. The
//! referenced tests often live in files the closure never reached, so every
//! name is resolved against the whole candidate universe. Each group/key
//! entry yields exactly one [`SequentialLink`]; a target that is out of
//! scope or defined nowhere is given an external stub row so the link
//! always points at a real test function.

use std::collections::{BTreeSet, HashSet};

use crate::error::{ImpactGraphError, Result};
use crate::graph::classify::{classify, RawEdge};
use crate::graph::context::AnalysisContext;
use crate::graph::populate::{link_test, owner_struct, populate_files};
use crate::graph::records::{SequentialLink, SourceFile, TestFunction, TestOrigin};
use crate::graph::store::TestKey;
use crate::indexer::facts::{FunctionDecl, SequentialEntry};
use crate::indexer::universe::{DefFilter, DefSite, ResolveFrom, UniverseFile};
use crate::types::{SequentialLinkId, SourceFileId, TestFunctionId};

/// What one call to [`SequentialExpander::expand`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequentialReport {
    pub orchestrators: usize,
    pub links: usize,
    pub stubs: usize,
    /// Files brought into scope to host a target (`sequential.follow_targets`).
    pub pulled_in: Vec<String>,
}

pub struct SequentialExpander<'c, 'a> {
    ctx: &'c AnalysisContext<'a>,
    processed: HashSet<TestFunctionId>,
}

impl<'c, 'a> SequentialExpander<'c, 'a> {
    pub fn new(ctx: &'c AnalysisContext<'a>) -> Self {
        Self {
            ctx,
            processed: HashSet::new(),
        }
    }

    /// Materialize links for every orchestrator in scope not yet expanded.
    pub fn expand(&mut self) -> Result<SequentialReport> {
        let ctx = self.ctx;
        let mut report = SequentialReport::default();
        let mut files = ctx.store.all::<SourceFile>();
        files.sort_by(|a, b| a.path.cmp(&b.path));

        for source in files {
            let file = ctx.universe_file(&source.path)?;
            let orchestrators: BTreeSet<&str> = file
                .facts
                .sequential
                .iter()
                .map(|e| e.orchestrator.as_str())
                .collect();

            for name in orchestrators {
                let Some(decl) = file.facts.function(name) else {
                    ctx.diagnostics.partial_failure(
                        source.path.clone(),
                        format!("sequential entries name undeclared orchestrator {name}"),
                    );
                    continue;
                };
                let orchestrator = self.ensure_test(file, source.id, decl)?;
                if !self.processed.insert(orchestrator) {
                    continue;
                }
                ctx.store.mark_sequential_entry(orchestrator)?;
                report.orchestrators += 1;

                for entry in file.facts.sequential_for(name) {
                    self.link_entry(orchestrator, file, entry, &mut report)?;
                }
            }
        }

        tracing::info!(
            "sequential expansion: {} orchestrator(s), {} link(s), {} stub(s), {} file(s) pulled in",
            report.orchestrators,
            report.links,
            report.stubs,
            report.pulled_in.len()
        );
        Ok(report)
    }

    fn link_entry(
        &self,
        orchestrator: TestFunctionId,
        file: &'a UniverseFile,
        entry: &SequentialEntry,
        report: &mut SequentialReport,
    ) -> Result<SequentialLinkId> {
        let ctx = self.ctx;
        let from = ResolveFrom {
            file: &file.path,
            service: &file.service,
            receiver: None,
        };
        // a definition already in scope beats an out-of-scope namesake
        let lookup = ctx
            .universe
            .resolve_preferring(&entry.target, from, DefFilter::Any, |d| ctx.in_scope(&d.file));
        if lookup.is_some_and(|l| l.ambiguous) {
            ctx.diagnostics.ambiguous_resolution();
        }

        let resolved = match lookup {
            Some(hit) => self.resolve_in_scope(hit.site, report)?,
            None => None,
        };
        let (target, target_service) = match resolved {
            Some((id, file_id)) => (id, ctx.service_name(file_id)),
            None => (self.stub(orchestrator, &entry.target, report)?, None),
        };

        let class = classify(&RawEdge {
            caller: &entry.orchestrator,
            caller_file: &file.path,
            caller_service: Some(&file.service),
            subject: &entry.target,
            subject_anonymous: lookup.is_some_and(|l| l.site.anonymous),
            target: lookup,
            target_service: target_service.as_deref(),
        });
        let id = ctx.store.insert_sequential_link(SequentialLink {
            id: SequentialLinkId(0),
            orchestrator_id: orchestrator,
            target_id: target,
            group: entry.group.clone(),
            key: entry.key.clone(),
            line: entry.line,
            class,
        })?;
        if target != orchestrator {
            ctx.store.set_sequential_parent(target, orchestrator)?;
        }
        report.links += 1;
        Ok(id)
    }

    /// Real test row for a universe definition, pulling its file into scope
    /// first when configured to. `None` when the file stays out of scope.
    fn resolve_in_scope(
        &self,
        site: &'a DefSite,
        report: &mut SequentialReport,
    ) -> Result<Option<(TestFunctionId, SourceFileId)>> {
        let ctx = self.ctx;
        if !ctx.in_scope(&site.file) {
            if !ctx.config.sequential.follow_targets {
                return Ok(None);
            }
            let added = populate_files(ctx, std::slice::from_ref(&site.file), None)?;
            for path in added {
                ctx.diagnostics.file_discovered();
                report.pulled_in.push(path);
            }
        }

        let file = ctx.universe_file(&site.file)?;
        let file_id = ctx.store.file_by_path(&site.file).ok_or_else(|| {
            ImpactGraphError::Other(format!("{} should be in scope", site.file))
        })?;
        let decl = file
            .facts
            .functions
            .iter()
            .find(|d| d.name == site.name && d.line == site.line)
            .ok_or_else(|| {
                ImpactGraphError::Other(format!("{} not declared in {}", site.name, site.file))
            })?;
        let id = self.ensure_test(file, file_id, decl)?;
        Ok(Some((id, file_id)))
    }

    /// Test row for a declaration in an in-scope file. A row created here
    /// (a helper not matching any test prefix) gets its steps recorded too.
    fn ensure_test(
        &self,
        file: &'a UniverseFile,
        file_id: SourceFileId,
        decl: &FunctionDecl,
    ) -> Result<TestFunctionId> {
        let ctx = self.ctx;
        if let Some(id) = ctx
            .store
            .test_by_key(&TestKey::Defined(file_id, decl.name.clone()))
        {
            return Ok(id);
        }
        let struct_id = owner_struct(ctx, decl, file_id)?;
        let (id, created) = ctx.store.get_or_create_test_function(TestFunction {
            id: TestFunctionId(0),
            name: decl.name.clone(),
            prefix: test_prefix(ctx, &decl.name),
            origin: TestOrigin::Resolved {
                file_id,
                struct_id,
                line: decl.line,
            },
            sequential_parent: None,
            sequential_entry: false,
        })?;
        if created {
            link_test(ctx, file, id, &decl.name)?;
        }
        Ok(id)
    }

    fn stub(
        &self,
        orchestrator: TestFunctionId,
        name: &str,
        report: &mut SequentialReport,
    ) -> Result<TestFunctionId> {
        let ctx = self.ctx;
        let (id, created) = ctx.store.get_or_create_test_function(TestFunction {
            id: TestFunctionId(0),
            name: name.to_string(),
            prefix: test_prefix(ctx, name),
            origin: TestOrigin::External {
                referenced_by: orchestrator,
            },
            sequential_parent: None,
            sequential_entry: false,
        })?;
        if created {
            ctx.diagnostics.stub_synthesized();
            report.stubs += 1;
            tracing::debug!("synthesized external test {name}");
        }
        Ok(id)
    }
}

/// Configured prefix of `name`, else its leading lowercase run
/// (`testHelper` -> `test`).
pub fn test_prefix(ctx: &AnalysisContext<'_>, name: &str) -> String {
    if let Some(prefix) = ctx.config.test_prefix(name) {
        return prefix.to_string();
    }
    name.chars().take_while(|c| c.is_lowercase()).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
