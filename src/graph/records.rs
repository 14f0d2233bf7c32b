//! Row types for every table in the relational store.
//!
//! Rows are append-only. Structural fields (names, owning rows, lines) are
//! fixed at insertion; only the classification fields on edges and the
//! sequential markers on test functions are ever rewritten, and only through
//! the field-scoped `reclassify_*` operations on the store.

use serde::{Deserialize, Serialize};

use crate::types::{
    Classification, DirectReferenceId, OccurrenceKind, ResourceId, SequentialLinkId, ServiceId,
    SourceFileId, StepId, StructId, TemplateCallId, TemplateFunctionId, TestFunctionId,
    Visibility,
};

// ---------------------------------------------------------------------------
// Record trait
// ---------------------------------------------------------------------------

/// Common surface of every table row.
pub trait Record: Clone + Send + Sync + 'static {
    type Id: Copy + Eq + std::hash::Hash + From<u32> + Into<u32> + std::fmt::Debug;

    /// Table name, as used in exports and integrity errors.
    const TABLE: &'static str;

    fn id(&self) -> Self::Id;

    /// Called by the store exactly once, when the row is inserted.
    fn assign_id(&mut self, id: Self::Id);
}

macro_rules! impl_record {
    ($ty:ty, $id:ty, $table:literal) => {
        impl Record for $ty {
            type Id = $id;
            const TABLE: &'static str = $table;

            fn id(&self) -> $id {
                self.id
            }

            fn assign_id(&mut self, id: $id) {
                self.id = id;
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Ownership rows
// ---------------------------------------------------------------------------

/// The target identifier one run traces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
}

/// A file inside the discovered scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub id: SourceFileId,
    pub resource_id: ResourceId,
    pub path: String,
    pub service_id: ServiceId,
}

/// A configuration-owning type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Struct {
    pub id: StructId,
    pub name: String,
    pub file_id: SourceFileId,
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

/// Where a test function came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TestOrigin {
    /// Found in a scanned file.
    Resolved {
        file_id: SourceFileId,
        struct_id: Option<StructId>,
        line: u32,
    },
    /// Placeholder for a test referenced by an orchestrator whose definition
    /// was never scanned.
    External { referenced_by: TestFunctionId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFunction {
    pub id: TestFunctionId,
    pub name: String,
    pub prefix: String,
    pub origin: TestOrigin,
    /// Orchestrator that invokes this test by reference, if any.
    pub sequential_parent: Option<TestFunctionId>,
    /// True when this test orchestrates others through a keyed collection.
    pub sequential_entry: bool,
}

impl TestFunction {
    pub fn file_id(&self) -> Option<SourceFileId> {
        match self.origin {
            TestOrigin::Resolved { file_id, .. } => Some(file_id),
            TestOrigin::External { .. } => None,
        }
    }

    pub fn struct_id(&self) -> Option<StructId> {
        match self.origin {
            TestOrigin::Resolved { struct_id, .. } => struct_id,
            TestOrigin::External { .. } => None,
        }
    }

    pub fn line(&self) -> Option<u32> {
        match self.origin {
            TestOrigin::Resolved { line, .. } => Some(line),
            TestOrigin::External { .. } => None,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self.origin, TestOrigin::External { .. })
    }
}

/// Where a template function came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TemplateOrigin {
    Resolved {
        file_id: SourceFileId,
        struct_id: Option<StructId>,
        line: u32,
    },
    /// Placeholder for a configuration call whose definition was never found.
    External { referenced_by: TestFunctionId },
}

/// A function that renders a configuration artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateFunction {
    pub id: TemplateFunctionId,
    pub name: String,
    pub origin: TemplateOrigin,
    pub produces_artifact: bool,
}

impl TemplateFunction {
    pub fn file_id(&self) -> Option<SourceFileId> {
        match self.origin {
            TemplateOrigin::Resolved { file_id, .. } => Some(file_id),
            TemplateOrigin::External { .. } => None,
        }
    }

    pub fn struct_id(&self) -> Option<StructId> {
        match self.origin {
            TemplateOrigin::Resolved { struct_id, .. } => struct_id,
            TemplateOrigin::External { .. } => None,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self.origin, TemplateOrigin::External { .. })
    }
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

/// One configuration invocation inside a test body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub test_function_id: TestFunctionId,
    /// Position of this step within its test, starting at 0.
    pub index: u32,
    pub template_function_id: Option<TemplateFunctionId>,
    /// Callee name as written at the call site.
    pub callee: String,
    pub line: u32,
    pub class: Classification,
}

/// Template-to-template call. `target_id` is `None` only when the callee
/// resolves nowhere, in which case the resolution tag is `External`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateCall {
    pub id: TemplateCallId,
    pub source_id: TemplateFunctionId,
    pub target_id: Option<TemplateFunctionId>,
    pub callee: String,
    pub line: u32,
    pub class: Classification,
}

/// Orchestrator-to-test edge declared through a keyed collection entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequentialLink {
    pub id: SequentialLinkId,
    pub orchestrator_id: TestFunctionId,
    pub target_id: TestFunctionId,
    pub group: String,
    pub key: String,
    pub line: u32,
    pub class: Classification,
}

/// An occurrence of the target literal inside a template's rendered output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectReference {
    pub id: DirectReferenceId,
    pub resource_id: ResourceId,
    pub template_function_id: TemplateFunctionId,
    pub kind: OccurrenceKind,
    pub line: u32,
    pub column: u32,
    pub visibility: Visibility,
}

impl_record!(Resource, ResourceId, "resources");
impl_record!(Service, ServiceId, "services");
impl_record!(SourceFile, SourceFileId, "source_files");
impl_record!(Struct, StructId, "structs");
impl_record!(TestFunction, TestFunctionId, "test_functions");
impl_record!(TemplateFunction, TemplateFunctionId, "template_functions");
impl_record!(Step, StepId, "steps");
impl_record!(TemplateCall, TemplateCallId, "template_calls");
impl_record!(SequentialLink, SequentialLinkId, "sequential_links");
impl_record!(DirectReference, DirectReferenceId, "direct_references");
