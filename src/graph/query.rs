//! Read-only impact views over a finished store.
//!
//! - **direct**: tests with a step into a template that renders the target
//!   literal itself.
//! - **template-indirect**: tests whose step reaches such a template only
//!   through template calls.
//! - **sequential**: orchestrators and the tests they run by reference,
//!   when not already impacted another way.
//! - **combined**: the union, each test tagged with its strongest relation.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::graph::records::{DirectReference, SequentialLink, Step, TemplateCall, TestFunction};
use crate::graph::store::RelationalStore;
use crate::types::{TemplateFunctionId, TestFunctionId};

/// How a test is connected to the target. Ordered strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactKind {
    Direct,
    TemplateIndirect,
    Sequential,
}

impl ImpactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::TemplateIndirect => "template_indirect",
            Self::Sequential => "sequential",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "direct" => Some(Self::Direct),
            "indirect" | "template_indirect" | "template-indirect" => Some(Self::TemplateIndirect),
            "sequential" | "seq" => Some(Self::Sequential),
            _ => None,
        }
    }
}

impl std::fmt::Display for ImpactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of an impact view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImpactedTest {
    pub test: TestFunctionId,
    pub name: String,
    /// `None` for external stubs.
    pub file: Option<String>,
    pub kind: ImpactKind,
    /// Template, or orchestrator/target name, the relation goes through.
    pub via: String,
}

pub struct ImpactQuery<'s> {
    store: &'s RelationalStore,
    tests: HashMap<TestFunctionId, TestFunction>,
}

impl<'s> ImpactQuery<'s> {
    pub fn new(store: &'s RelationalStore) -> Self {
        let tests = store
            .all::<TestFunction>()
            .into_iter()
            .map(|t| (t.id, t))
            .collect();
        Self { store, tests }
    }

    pub fn direct(&self) -> Vec<ImpactedTest> {
        let referenced = self.referenced_templates();
        self.tests_stepping_into(&referenced, ImpactKind::Direct)
    }

    pub fn template_indirect(&self) -> Vec<ImpactedTest> {
        let referenced = self.referenced_templates();
        let reaching: HashSet<TemplateFunctionId> = self
            .templates_reaching(&referenced)
            .into_iter()
            .filter(|t| !referenced.contains(t))
            .collect();
        let direct: HashSet<TestFunctionId> = self.direct().into_iter().map(|t| t.test).collect();
        self.tests_stepping_into(&reaching, ImpactKind::TemplateIndirect)
            .into_iter()
            .filter(|t| !direct.contains(&t.test))
            .collect()
    }

    pub fn sequential(&self) -> Vec<ImpactedTest> {
        let mut seen: HashSet<TestFunctionId> = self
            .direct()
            .into_iter()
            .chain(self.template_indirect())
            .map(|t| t.test)
            .collect();
        let mut out = Vec::new();
        for link in self.store.all::<SequentialLink>() {
            let target_name = self.name_of(link.target_id);
            let orchestrator_name = self.name_of(link.orchestrator_id);
            let endpoints = [
                (link.orchestrator_id, format!("{}/{} -> {target_name}", link.group, link.key)),
                (link.target_id, orchestrator_name),
            ];
            for (test, via) in endpoints {
                if seen.insert(test) {
                    if let Some(row) = self.impacted(test, ImpactKind::Sequential, via) {
                        out.push(row);
                    }
                }
            }
        }
        sorted(out)
    }

    pub fn combined(&self) -> Vec<ImpactedTest> {
        let mut best: BTreeMap<TestFunctionId, ImpactedTest> = BTreeMap::new();
        for row in self
            .direct()
            .into_iter()
            .chain(self.template_indirect())
            .chain(self.sequential())
        {
            match best.get(&row.test) {
                Some(existing) if existing.kind <= row.kind => {}
                _ => {
                    best.insert(row.test, row);
                }
            }
        }
        sorted(best.into_values().collect())
    }

    pub fn view(&self, kind: Option<ImpactKind>) -> Vec<ImpactedTest> {
        match kind {
            Some(ImpactKind::Direct) => self.direct(),
            Some(ImpactKind::TemplateIndirect) => self.template_indirect(),
            Some(ImpactKind::Sequential) => self.sequential(),
            None => self.combined(),
        }
    }

    /// Names of the impacted tests that can be run on their own: public
    /// tests and sequential entry points. Stubs are never runnable.
    pub fn run_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .combined()
            .into_iter()
            .filter_map(|row| self.tests.get(&row.test))
            .filter(|t| !t.is_external())
            .filter(|t| t.sequential_entry || t.name.chars().next().is_some_and(char::is_uppercase))
            .map(|t| t.name.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    // -- helpers -----------------------------------------------------------

    fn referenced_templates(&self) -> HashSet<TemplateFunctionId> {
        self.store
            .all::<DirectReference>()
            .into_iter()
            .map(|r| r.template_function_id)
            .collect()
    }

    /// Templates from which one of `targets` is reachable over template
    /// calls, `targets` included.
    fn templates_reaching(&self, targets: &HashSet<TemplateFunctionId>) -> HashSet<TemplateFunctionId> {
        let mut callers: HashMap<TemplateFunctionId, Vec<TemplateFunctionId>> = HashMap::new();
        for call in self.store.all::<TemplateCall>() {
            if let Some(target) = call.target_id {
                callers.entry(target).or_default().push(call.source_id);
            }
        }
        let mut reached: HashSet<TemplateFunctionId> = targets.clone();
        let mut queue: VecDeque<TemplateFunctionId> = targets.iter().copied().collect();
        while let Some(t) = queue.pop_front() {
            for &caller in callers.get(&t).into_iter().flatten() {
                if reached.insert(caller) {
                    queue.push_back(caller);
                }
            }
        }
        reached
    }

    fn tests_stepping_into(
        &self,
        templates: &HashSet<TemplateFunctionId>,
        kind: ImpactKind,
    ) -> Vec<ImpactedTest> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let steps = self.store.query::<Step, _>(|s| {
            s.template_function_id
                .is_some_and(|t| templates.contains(&t))
        });
        for step in steps.iter() {
            if seen.insert(step.test_function_id) {
                if let Some(row) = self.impacted(step.test_function_id, kind, step.callee.clone()) {
                    out.push(row);
                }
            }
        }
        sorted(out)
    }

    fn impacted(&self, test: TestFunctionId, kind: ImpactKind, via: String) -> Option<ImpactedTest> {
        let row = self.tests.get(&test)?;
        Some(ImpactedTest {
            test,
            name: row.name.clone(),
            file: row.file_id().and_then(|f| self.store.file_path(f)),
            kind,
            via,
        })
    }

    fn name_of(&self, test: TestFunctionId) -> String {
        self.tests
            .get(&test)
            .map(|t| t.name.clone())
            .unwrap_or_default()
    }
}

fn sorted(mut rows: Vec<ImpactedTest>) -> Vec<ImpactedTest> {
    rows.sort_by(|a, b| (&a.file, &a.name, a.test).cmp(&(&b.file, &b.name, b.test)));
    rows
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
