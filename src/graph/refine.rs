//! Final integrity refinement.
//!
//! Runs once discovery and expansion are complete. Every edge still in a
//! provisional state is settled against the now-complete tables:
//!
//! - a step or template call left cross-file without a target is matched
//!   again; when a row exists now it gets the target and the usual tags,
//!   otherwise it is reclassified external;
//! - a step that still has no target is pointed at an external stub
//!   template so it always references a real row;
//! - an edge whose target is known but whose service impact was never
//!   computed gets it now.
//!
//! Finalized rows are never selected again, so the pass is idempotent.

use crate::error::Result;
use crate::graph::classify::{classify, RawEdge};
use crate::graph::context::AnalysisContext;
use crate::graph::records::{
    SequentialLink, Step, TemplateCall, TemplateFunction, TemplateOrigin, TestFunction,
};
use crate::indexer::universe::{DefFilter, ResolveFrom, UniverseFile};
use crate::types::{Classification, SourceFileId, TemplateFunctionId, TestFunctionId};

/// What one refinement pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefineReport {
    pub resolved: usize,
    pub externalized: usize,
    pub stubs: usize,
    pub service_impacts: usize,
}

impl RefineReport {
    pub fn changed(&self) -> usize {
        self.resolved + self.externalized + self.service_impacts
    }
}

pub fn refine(ctx: &AnalysisContext<'_>) -> Result<RefineReport> {
    let mut report = RefineReport::default();
    refine_steps(ctx, &mut report)?;
    refine_template_calls(ctx, &mut report)?;
    refine_sequential_links(ctx, &mut report)?;
    for _ in 0..report.changed() {
        ctx.diagnostics.row_reclassified();
    }
    tracing::info!(
        "refinement: {} resolved, {} externalized, {} stub(s), {} service impact(s)",
        report.resolved,
        report.externalized,
        report.stubs,
        report.service_impacts
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

fn refine_steps(ctx: &AnalysisContext<'_>, report: &mut RefineReport) -> Result<()> {
    let pending: Vec<Step> = ctx
        .store
        .query::<Step, _>(|s| {
            s.template_function_id.is_none()
                || (s.class.service_impact.is_none() && !s.class.is_external())
        })
        .iter()
        .collect();

    for step in pending {
        let test = ctx.test(step.test_function_id)?;
        let caller_file = test
            .file_id()
            .and_then(|f| ctx.store.file_path(f))
            .and_then(|p| ctx.universe.file(&p));

        if step.class.is_external() {
            let stub = stub_template(ctx, &step.callee, test.id, report)?;
            ctx.store.reclassify_step(step.id, Some(stub), step.class)?;
            continue;
        }

        let Some(file) = caller_file else {
            externalize_step(ctx, &step, test.id, report)?;
            continue;
        };
        let receiver = file
            .facts
            .calls_from(&test.name)
            .into_iter()
            .find(|c| c.callee == step.callee && c.line == step.line)
            .and_then(|c| c.receiver_type.as_deref());
        let lookup = ctx.universe.resolve(
            &step.callee,
            ResolveFrom {
                file: &file.path,
                service: &file.service,
                receiver,
            },
            DefFilter::Artifact,
        );
        let row = lookup.and_then(|l| ctx.template_row_for(l.site));
        let Some((target, target_row)) = row else {
            externalize_step(ctx, &step, test.id, report)?;
            continue;
        };

        let target_service = service_of(ctx, target_row.file_id());
        let class = classify(&RawEdge {
            caller: &test.name,
            caller_file: &file.path,
            caller_service: Some(&file.service),
            subject: &test.name,
            subject_anonymous: lookup.is_some_and(|l| l.site.anonymous),
            target: lookup,
            target_service: target_service.as_deref(),
        });
        if step.template_function_id.is_none() {
            report.resolved += 1;
        } else if class.service_impact.is_some() {
            report.service_impacts += 1;
        }
        ctx.store.reclassify_step(step.id, Some(target), class)?;
    }
    Ok(())
}

fn externalize_step(
    ctx: &AnalysisContext<'_>,
    step: &Step,
    test: TestFunctionId,
    report: &mut RefineReport,
) -> Result<()> {
    let stub = stub_template(ctx, &step.callee, test, report)?;
    ctx.store
        .reclassify_step(step.id, Some(stub), Classification::external())?;
    report.externalized += 1;
    Ok(())
}

fn stub_template(
    ctx: &AnalysisContext<'_>,
    name: &str,
    referenced_by: TestFunctionId,
    report: &mut RefineReport,
) -> Result<TemplateFunctionId> {
    let (id, created) = ctx.store.get_or_create_template_function(TemplateFunction {
        id: TemplateFunctionId(0),
        name: name.to_string(),
        origin: TemplateOrigin::External { referenced_by },
        produces_artifact: true,
    })?;
    if created {
        ctx.diagnostics.stub_synthesized();
        report.stubs += 1;
    }
    Ok(id)
}

// ---------------------------------------------------------------------------
// Template calls
// ---------------------------------------------------------------------------

fn refine_template_calls(ctx: &AnalysisContext<'_>, report: &mut RefineReport) -> Result<()> {
    let pending: Vec<TemplateCall> = ctx
        .store
        .query::<TemplateCall, _>(|c| {
            !c.class.is_external() && (c.target_id.is_none() || c.class.service_impact.is_none())
        })
        .iter()
        .collect();

    for call in pending {
        let source = ctx.store.get::<TemplateFunction>(call.source_id);
        let file = source
            .as_ref()
            .and_then(|s| s.file_id())
            .and_then(|f| universe_file_of(ctx, f));
        let (Some(source), Some(file)) = (source, file) else {
            ctx.store
                .reclassify_template_call(call.id, None, Classification::external())?;
            report.externalized += 1;
            continue;
        };

        let receiver = file
            .facts
            .calls_from(&source.name)
            .into_iter()
            .find(|c| c.callee == call.callee && c.line == call.line)
            .and_then(|c| c.receiver_type.as_deref());
        let lookup = ctx.universe.resolve(
            &call.callee,
            ResolveFrom {
                file: &file.path,
                service: &file.service,
                receiver,
            },
            DefFilter::Artifact,
        );
        let Some((target, target_row)) = lookup.and_then(|l| ctx.template_row_for(l.site)) else {
            ctx.store
                .reclassify_template_call(call.id, None, Classification::external())?;
            report.externalized += 1;
            continue;
        };

        let target_service = service_of(ctx, target_row.file_id());
        let class = classify(&RawEdge {
            caller: &source.name,
            caller_file: &file.path,
            caller_service: Some(&file.service),
            subject: &call.callee,
            subject_anonymous: lookup.is_some_and(|l| l.site.anonymous),
            target: lookup,
            target_service: target_service.as_deref(),
        });
        if call.target_id.is_none() {
            report.resolved += 1;
        } else if class.service_impact.is_some() {
            report.service_impacts += 1;
        }
        ctx.store
            .reclassify_template_call(call.id, Some(target), class)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Sequential links
// ---------------------------------------------------------------------------

/// Links to real rows whose service impact was left open. Links to stubs
/// keep it unset: a stub has no owning service.
fn refine_sequential_links(ctx: &AnalysisContext<'_>, report: &mut RefineReport) -> Result<()> {
    let pending: Vec<SequentialLink> = ctx
        .store
        .query::<SequentialLink, _>(|l| !l.class.is_external() && l.class.service_impact.is_none())
        .iter()
        .collect();

    for link in pending {
        let orchestrator = ctx.test(link.orchestrator_id)?;
        let target = ctx.test(link.target_id)?;
        let (Some(a), Some(b)) = (
            test_service(ctx, &orchestrator),
            test_service(ctx, &target),
        ) else {
            continue;
        };
        let class = Classification {
            service_impact: crate::graph::classify::service_impact_for(Some(&a), Some(&b)),
            ..link.class
        };
        ctx.store.reclassify_sequential_link(link.id, class)?;
        report.service_impacts += 1;
    }
    Ok(())
}

fn test_service(ctx: &AnalysisContext<'_>, test: &TestFunction) -> Option<String> {
    service_of(ctx, test.file_id())
}

fn service_of(ctx: &AnalysisContext<'_>, file: Option<SourceFileId>) -> Option<String> {
    file.and_then(|f| ctx.service_name(f))
}

fn universe_file_of<'a>(ctx: &AnalysisContext<'a>, file: SourceFileId) -> Option<&'a UniverseFile> {
    let path = ctx.store.file_path(file)?;
    ctx.universe.file(&path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
