//! Turns one candidate file's facts into store rows.
//!
//! Population is split in two phases so that edges see as many target rows
//! as possible:
//!
//! 1. [`declare_file`] registers the file, its service, structs, template
//!    and test functions, and the direct references to the target literal.
//! 2. [`link_file`] records the steps of every test in the file.
//!
//! Both phases are safe to run from several workers at once; every row with
//! a natural key goes through the store's atomic get-or-create. A step whose
//! target definition lives in a file not yet declared is left provisional
//! (cross-file, no target) for the refinement pass to settle.

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::error::{ImpactGraphError, Result};
use crate::graph::classify::{classify, visibility_for, RawEdge};
use crate::graph::context::AnalysisContext;
use crate::graph::records::{
    DirectReference, Step, TemplateFunction, TemplateOrigin, TestFunction, TestOrigin,
};
use crate::graph::store::{TemplateKey, TestKey};
use crate::indexer::facts::FunctionDecl;
use crate::indexer::universe::{DefFilter, ResolveFrom, UniverseFile};
use crate::types::{
    DirectReferenceId, Resolution, SourceFileId, StepId, StructId, TemplateFunctionId,
    TestFunctionId,
};

// ---------------------------------------------------------------------------
// Batch entry point
// ---------------------------------------------------------------------------

/// Declare then link every path not yet in scope. Returns the paths that
/// entered the scope through this call, sorted.
pub fn populate_files(
    ctx: &AnalysisContext<'_>,
    paths: &[String],
    pool: Option<&ThreadPool>,
) -> Result<Vec<String>> {
    let declare = || -> Result<Vec<(String, SourceFileId)>> {
        let declared: Vec<Option<(String, SourceFileId)>> = match pool {
            Some(_) => paths
                .par_iter()
                .map(|p| declare_file(ctx, p).map(|id| id.map(|id| (p.clone(), id))))
                .collect::<Result<_>>()?,
            None => paths
                .iter()
                .map(|p| declare_file(ctx, p).map(|id| id.map(|id| (p.clone(), id))))
                .collect::<Result<_>>()?,
        };
        Ok(declared.into_iter().flatten().collect())
    };

    let mut added = match pool {
        Some(pool) => pool.install(declare)?,
        None => declare()?,
    };
    added.sort();

    let link = || -> Result<()> {
        match pool {
            Some(_) => added
                .par_iter()
                .try_for_each(|(path, file_id)| link_file(ctx, path, *file_id)),
            None => added
                .iter()
                .try_for_each(|(path, file_id)| link_file(ctx, path, *file_id)),
        }
    };
    match pool {
        Some(pool) => pool.install(link)?,
        None => link()?,
    }

    Ok(added.into_iter().map(|(path, _)| path).collect())
}

// ---------------------------------------------------------------------------
// Declaration phase
// ---------------------------------------------------------------------------

/// Register `path` and its declarations. Returns `None` when the file was
/// already in scope.
pub fn declare_file(ctx: &AnalysisContext<'_>, path: &str) -> Result<Option<SourceFileId>> {
    let file = ctx.universe_file(path)?;
    let service_id = ctx.store.get_or_create_service(&file.service)?;
    let (file_id, created) = ctx
        .store
        .get_or_create_source_file(ctx.resource, path, service_id)?;
    if !created {
        return Ok(None);
    }

    for decl in &file.facts.functions {
        let is_test = is_test_decl(ctx, decl);
        if !is_test && !decl.produces_artifact {
            continue;
        }
        let struct_id = owner_struct(ctx, decl, file_id)?;
        if is_test {
            let prefix = ctx.config.test_prefix(&decl.name).unwrap_or_default();
            ctx.store.get_or_create_test_function(TestFunction {
                id: TestFunctionId(0),
                name: decl.name.clone(),
                prefix: prefix.to_string(),
                origin: TestOrigin::Resolved {
                    file_id,
                    struct_id,
                    line: decl.line,
                },
                sequential_parent: None,
                sequential_entry: false,
            })?;
        } else {
            ctx.store.get_or_create_template_function(TemplateFunction {
                id: TemplateFunctionId(0),
                name: decl.name.clone(),
                origin: TemplateOrigin::Resolved {
                    file_id,
                    struct_id,
                    line: decl.line,
                },
                produces_artifact: true,
            })?;
        }
    }

    declare_direct_references(ctx, file, file_id)?;
    tracing::debug!("declared {path} (service {})", file.service);
    Ok(Some(file_id))
}

fn declare_direct_references(
    ctx: &AnalysisContext<'_>,
    file: &UniverseFile,
    file_id: SourceFileId,
) -> Result<Vec<DirectReferenceId>> {
    let mut ids = Vec::new();
    for occurrence in &file.facts.literals {
        let Some(decl) = file
            .facts
            .function(&occurrence.function)
            .filter(|d| d.produces_artifact && !is_test_decl(ctx, d))
        else {
            ctx.diagnostics.stray_occurrence();
            continue;
        };
        let key = template_key(ctx, decl, file_id);
        let template_id = key
            .as_ref()
            .and_then(|k| ctx.store.template_by_key(k))
            .ok_or_else(|| {
                ImpactGraphError::Other(format!(
                    "template {} in {} was not declared",
                    decl.name, file.path
                ))
            })?;
        ids.push(ctx.store.insert_direct_reference(DirectReference {
            id: DirectReferenceId(0),
            resource_id: ctx.resource,
            template_function_id: template_id,
            kind: occurrence.kind,
            line: occurrence.line,
            column: occurrence.column,
            visibility: visibility_for(&decl.name, decl.anonymous, Resolution::SameFunction),
        })?);
    }
    Ok(ids)
}

pub(crate) fn is_test_decl(ctx: &AnalysisContext<'_>, decl: &FunctionDecl) -> bool {
    !decl.anonymous && ctx.config.test_prefix(&decl.name).is_some()
}

pub(crate) fn owner_struct(
    ctx: &AnalysisContext<'_>,
    decl: &FunctionDecl,
    file_id: SourceFileId,
) -> Result<Option<StructId>> {
    decl.owner
        .as_deref()
        .map(|owner| ctx.store.get_or_create_struct(owner, file_id))
        .transpose()
}

pub(crate) fn template_key(
    ctx: &AnalysisContext<'_>,
    decl: &FunctionDecl,
    file_id: SourceFileId,
) -> Option<TemplateKey> {
    match &decl.owner {
        Some(owner) => ctx
            .store
            .struct_for(file_id, owner)
            .map(|s| TemplateKey::Method(s, decl.name.clone())),
        None => Some(TemplateKey::Free(file_id, decl.name.clone())),
    }
}

// ---------------------------------------------------------------------------
// Link phase
// ---------------------------------------------------------------------------

/// Record the steps of every test declared in `path`.
pub fn link_file(ctx: &AnalysisContext<'_>, path: &str, file_id: SourceFileId) -> Result<()> {
    let file = ctx.universe_file(path)?;
    for decl in file.facts.functions.iter().filter(|d| is_test_decl(ctx, d)) {
        let key = TestKey::Defined(file_id, decl.name.clone());
        if let Some(test_id) = ctx.store.test_by_key(&key) {
            link_test(ctx, file, test_id, &decl.name)?;
        }
    }
    Ok(())
}

/// Record the steps of one test, in source order. Calls made from closures
/// embedded in the test body count as the test's own.
pub fn link_test(
    ctx: &AnalysisContext<'_>,
    file: &UniverseFile,
    test_id: TestFunctionId,
    test_name: &str,
) -> Result<Vec<StepId>> {
    let mut steps = Vec::new();
    for call in file.facts.calls_from(test_name) {
        let from = ResolveFrom {
            file: &file.path,
            service: &file.service,
            receiver: call.receiver_type.as_deref(),
        };
        let lookup = ctx.universe.resolve(&call.callee, from, DefFilter::Artifact);
        if lookup.is_none() && call.receiver_type.is_none() {
            continue;
        }
        if lookup.is_some_and(|l| l.ambiguous) {
            ctx.diagnostics.ambiguous_resolution();
        }

        let target = lookup.and_then(|l| ctx.template_row_for(l.site));
        let target_service = target
            .as_ref()
            .and_then(|(_, row)| row.file_id())
            .and_then(|f| ctx.service_name(f));
        let class = classify(&RawEdge {
            caller: test_name,
            caller_file: &file.path,
            caller_service: Some(&file.service),
            subject: test_name,
            subject_anonymous: lookup.is_some_and(|l| l.site.anonymous),
            target: lookup,
            target_service: target_service.as_deref(),
        });

        steps.push(ctx.store.insert_step(Step {
            id: StepId(0),
            test_function_id: test_id,
            index: steps.len() as u32,
            template_function_id: target.map(|(id, _)| id),
            callee: call.callee.clone(),
            line: call.line,
            class,
        })?);
    }
    Ok(steps)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::graph::store::RelationalStore;
    use crate::indexer::facts::{CallSite, FileFacts, LiteralOccurrence};
    use crate::indexer::universe::CandidateUniverse;
    use crate::observability::RunDiagnostics;
    use crate::types::{OccurrenceKind, Visibility};

    fn func(name: &str, owner: Option<&str>, line: u32, artifact: bool) -> FunctionDecl {
        FunctionDecl {
            name: name.into(),
            owner: owner.map(String::from),
            line,
            produces_artifact: artifact,
            anonymous: false,
            enclosing: None,
        }
    }

    fn call(caller: &str, callee: &str, receiver: Option<&str>, line: u32) -> CallSite {
        CallSite {
            caller: caller.into(),
            callee: callee.into(),
            receiver_type: receiver.map(String::from),
            line,
        }
    }

    fn universe() -> CandidateUniverse {
        let facts = FileFacts {
            functions: vec![
                func("basic", Some("ThingResource"), 10, true),
                func("helper", None, 20, false),
                func("TestThing_basic", Some("ThingResource"), 30, false),
            ],
            calls: vec![
                call("TestThing_basic", "helper", None, 32),
                call("TestThing_basic", "basic", Some("ThingResource"), 31),
                call("TestThing_basic", "elsewhere", Some("OtherResource"), 33),
                call("TestThing_basic", "fmt.Sprintf", None, 34),
            ],
            literals: vec![
                LiteralOccurrence {
                    function: "basic".into(),
                    kind: OccurrenceKind::Block,
                    line: 12,
                    column: 10,
                },
                LiteralOccurrence {
                    function: "helper".into(),
                    kind: OccurrenceKind::Attribute,
                    line: 21,
                    column: 4,
                },
            ],
            sequential: vec![],
        };
        CandidateUniverse::new(vec![UniverseFile {
            path: "internal/services/thing/thing_test.go".into(),
            service: "thing".into(),
            matched: true,
            facts,
        }])
    }

    #[test]
    fn declare_then_link_single_file() {
        let config = AnalysisConfig::default();
        let universe = universe();
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

        let added =
            populate_files(&ctx, &["internal/services/thing/thing_test.go".to_string()], None)
                .unwrap();
        assert_eq!(added.len(), 1);

        let stats = store.stats();
        assert_eq!(stats.test_functions, 1);
        assert_eq!(stats.template_functions, 1);
        assert_eq!(stats.structs, 1);
        assert_eq!(stats.direct_references, 1);
        assert_eq!(diagnostics.report().stray_occurrences, 1);

        // helper resolves to a plain function, fmt.Sprintf nowhere: no steps
        let steps = store.all::<Step>();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].callee, "basic");
        assert_eq!(steps[0].index, 0);
        assert_eq!(steps[0].class.resolution, Resolution::SameFile);
        assert_eq!(steps[0].class.visibility, Visibility::Public);
        assert!(steps[0].template_function_id.is_some());
        assert_eq!(steps[1].callee, "elsewhere");
        assert!(steps[1].class.is_external());
        assert_eq!(steps[1].template_function_id, None);

        // a second pass over the same file changes nothing
        let again =
            populate_files(&ctx, &["internal/services/thing/thing_test.go".to_string()], None)
                .unwrap();
        assert!(again.is_empty());
        assert_eq!(store.stats(), stats);
    }

    #[test]
    fn closure_calls_belong_to_enclosing_function() {
        let facts = FileFacts {
            functions: vec![
                func("TestA", None, 1, false),
                FunctionDecl {
                    name: "func1".into(),
                    owner: None,
                    line: 2,
                    produces_artifact: false,
                    anonymous: true,
                    enclosing: Some("TestA".into()),
                },
            ],
            calls: vec![call("func1", "basic", None, 3), call("TestA", "other", None, 5)],
            ..Default::default()
        };
        let callees: Vec<&str> = facts
            .calls_from("TestA")
            .iter()
            .map(|c| c.callee.as_str())
            .collect();
        assert_eq!(callees, vec!["basic", "other"]);
    }
}
