//! In-memory relational store for one analysis run.
//!
//! Every entity lives in an append-only [`Table`] whose surrogate keys are
//! assigned at insertion (1-based, dense, insertion order). Natural keys are
//! deduplicated through `DashMap` indexes: [`RelationalStore`]'s
//! `get_or_create_*` methods hold the key's shard lock across the lookup and
//! the insert, so concurrent callers racing on the same key always observe
//! a single row.
//!
//! Foreign keys are checked on every insert. A dangling key is reported as
//! [`ImpactGraphError::Integrity`], which signals a bug in discovery, never
//! a data condition.

use std::hash::Hash;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;

use crate::error::{ImpactGraphError, Result};
use crate::graph::records::{
    DirectReference, Record, Resource, SequentialLink, Service, SourceFile, Step, Struct,
    TemplateCall, TemplateFunction, TemplateOrigin, TestFunction, TestOrigin,
};
use crate::indexer::universe::package_of;
use crate::types::{
    Classification, ResourceId, SequentialLinkId, ServiceId, SourceFileId, StepId, StructId,
    TemplateCallId, TemplateFunctionId, TestFunctionId,
};

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Append-only row vector. Row `n` (0-based) always has id `n + 1`.
pub struct Table<T: Record> {
    rows: RwLock<Vec<T>>,
}

impl<T: Record> Table<T> {
    fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    pub fn get(&self, id: T::Id) -> Option<T> {
        let raw: u32 = id.into();
        let idx = (raw as usize).checked_sub(1)?;
        self.rows.read().get(idx).cloned()
    }

    pub fn contains(&self, id: T::Id) -> bool {
        let raw: u32 = id.into();
        raw >= 1 && (raw as usize) <= self.rows.read().len()
    }

    /// Copy of every row, in insertion order.
    pub fn snapshot(&self) -> Vec<T> {
        self.rows.read().clone()
    }

    fn row_at(&self, idx: usize) -> Option<T> {
        self.rows.read().get(idx).cloned()
    }

    fn push(&self, mut row: T) -> T::Id {
        let mut rows = self.rows.write();
        let id = T::Id::from(rows.len() as u32 + 1);
        row.assign_id(id);
        rows.push(row);
        id
    }

    fn update(&self, id: T::Id, f: impl FnOnce(&mut T)) -> bool {
        let raw: u32 = id.into();
        let Some(idx) = (raw as usize).checked_sub(1) else {
            return false;
        };
        match self.rows.write().get_mut(idx) {
            Some(row) => {
                f(row);
                true
            }
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// A lazy, restartable selection over one table.
///
/// Nothing is read until [`Query::iter`] is driven; calling `iter` again
/// starts over from the first row and sees rows appended in the meantime.
pub struct Query<'s, T: Record, P> {
    table: &'s Table<T>,
    predicate: P,
}

impl<'s, T: Record, P: Fn(&T) -> bool> Query<'s, T, P> {
    pub fn iter(&self) -> QueryIter<'_, T, P> {
        QueryIter {
            table: self.table,
            predicate: &self.predicate,
            cursor: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }

    pub fn first(&self) -> Option<T> {
        self.iter().next()
    }
}

pub struct QueryIter<'q, T: Record, P> {
    table: &'q Table<T>,
    predicate: &'q P,
    cursor: usize,
}

impl<T: Record, P: Fn(&T) -> bool> Iterator for QueryIter<'_, T, P> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        loop {
            let row = self.table.row_at(self.cursor)?;
            self.cursor += 1;
            if (self.predicate)(&row) {
                return Some(row);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Natural keys
// ---------------------------------------------------------------------------

/// Natural key of a template function: owner plus name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TemplateKey {
    Method(StructId, String),
    Free(SourceFileId, String),
    External(String),
}

impl TemplateKey {
    fn of(row: &TemplateFunction) -> Self {
        match row.origin {
            TemplateOrigin::Resolved {
                struct_id: Some(s), ..
            } => Self::Method(s, row.name.clone()),
            TemplateOrigin::Resolved { file_id, .. } => Self::Free(file_id, row.name.clone()),
            TemplateOrigin::External { .. } => Self::External(row.name.clone()),
        }
    }
}

/// Natural key of a struct: its package directory plus its name. Two
/// packages may each define a struct of the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructKey {
    pub package: String,
    pub name: String,
}

/// Natural key of a test function. Stubs are keyed by name alone so a name
/// referenced by several orchestrators gets one placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TestKey {
    Defined(SourceFileId, String),
    External(String),
}

impl TestKey {
    fn of(row: &TestFunction) -> Self {
        match row.origin {
            TestOrigin::Resolved { file_id, .. } => Self::Defined(file_id, row.name.clone()),
            TestOrigin::External { .. } => Self::External(row.name.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// StoreStats
// ---------------------------------------------------------------------------

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub resources: usize,
    pub services: usize,
    pub source_files: usize,
    pub structs: usize,
    pub test_functions: usize,
    pub template_functions: usize,
    pub steps: usize,
    pub template_calls: usize,
    pub sequential_links: usize,
    pub direct_references: usize,
}

// ---------------------------------------------------------------------------
// RelationalStore
// ---------------------------------------------------------------------------

/// Typed tables plus natural-key and by-name indexes for one run.
pub struct RelationalStore {
    resources: Table<Resource>,
    services: Table<Service>,
    source_files: Table<SourceFile>,
    structs: Table<Struct>,
    test_functions: Table<TestFunction>,
    template_functions: Table<TemplateFunction>,
    steps: Table<Step>,
    template_calls: Table<TemplateCall>,
    sequential_links: Table<SequentialLink>,
    direct_references: Table<DirectReference>,

    resource_index: DashMap<String, ResourceId>,
    service_index: DashMap<String, ServiceId>,
    file_index: DashMap<String, SourceFileId>,
    struct_index: DashMap<StructKey, StructId>,
    template_index: DashMap<TemplateKey, TemplateFunctionId>,
    test_index: DashMap<TestKey, TestFunctionId>,

    templates_by_name: DashMap<String, Vec<TemplateFunctionId>>,
    tests_by_name: DashMap<String, Vec<TestFunctionId>>,
}

impl std::fmt::Debug for RelationalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationalStore")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Default for RelationalStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Access to the table holding rows of type `T`.
pub trait HasTable<T: Record> {
    fn table_ref(&self) -> &Table<T>;
}

macro_rules! has_table {
    ($ty:ty, $field:ident) => {
        impl HasTable<$ty> for RelationalStore {
            fn table_ref(&self) -> &Table<$ty> {
                &self.$field
            }
        }
    };
}

has_table!(Resource, resources);
has_table!(Service, services);
has_table!(SourceFile, source_files);
has_table!(Struct, structs);
has_table!(TestFunction, test_functions);
has_table!(TemplateFunction, template_functions);
has_table!(Step, steps);
has_table!(TemplateCall, template_calls);
has_table!(SequentialLink, sequential_links);
has_table!(DirectReference, direct_references);

impl RelationalStore {
    pub fn new() -> Self {
        Self {
            resources: Table::new(),
            services: Table::new(),
            source_files: Table::new(),
            structs: Table::new(),
            test_functions: Table::new(),
            template_functions: Table::new(),
            steps: Table::new(),
            template_calls: Table::new(),
            sequential_links: Table::new(),
            direct_references: Table::new(),
            resource_index: DashMap::new(),
            service_index: DashMap::new(),
            file_index: DashMap::new(),
            struct_index: DashMap::new(),
            template_index: DashMap::new(),
            test_index: DashMap::new(),
            templates_by_name: DashMap::new(),
            tests_by_name: DashMap::new(),
        }
    }

    // -- Generic access ----------------------------------------------------

    pub fn table<T: Record>(&self) -> &Table<T>
    where
        Self: HasTable<T>,
    {
        self.table_ref()
    }

    pub fn get<T: Record>(&self, id: T::Id) -> Option<T>
    where
        Self: HasTable<T>,
    {
        self.table::<T>().get(id)
    }

    /// Select rows of `T` matching `predicate`, lazily, in insertion order.
    pub fn query<T: Record, P: Fn(&T) -> bool>(&self, predicate: P) -> Query<'_, T, P>
    where
        Self: HasTable<T>,
    {
        Query {
            table: self.table::<T>(),
            predicate,
        }
    }

    pub fn all<T: Record>(&self) -> Vec<T>
    where
        Self: HasTable<T>,
    {
        self.table::<T>().snapshot()
    }

    fn require<T: Record>(&self, id: T::Id, table: &'static str, column: &'static str) -> Result<()>
    where
        Self: HasTable<T>,
    {
        if self.table::<T>().contains(id) {
            Ok(())
        } else {
            Err(ImpactGraphError::Integrity {
                table,
                column,
                id: id.into(),
            })
        }
    }

    /// Check foreign keys, then append. Callers with a natural key must go
    /// through [`Self::get_or_create_in`] instead.
    fn insert<T: Record + ForeignKeys>(&self, row: T) -> Result<T::Id>
    where
        Self: HasTable<T>,
    {
        row.check_foreign_keys(self)?;
        Ok(self.table::<T>().push(row))
    }

    /// Atomic get-or-create keyed by `key`. Returns the id and whether a row
    /// was inserted by this call.
    fn get_or_create_in<K, T>(
        &self,
        index: &DashMap<K, T::Id>,
        key: K,
        build: impl FnOnce() -> T,
    ) -> Result<(T::Id, bool)>
    where
        K: Eq + Hash,
        T: Record + ForeignKeys,
        Self: HasTable<T>,
    {
        match index.entry(key) {
            Entry::Occupied(e) => Ok((*e.get(), false)),
            Entry::Vacant(v) => {
                let id = self.insert(build())?;
                v.insert(id);
                Ok((id, true))
            }
        }
    }

    // -- Ownership rows ----------------------------------------------------

    pub fn get_or_create_resource(&self, name: &str) -> Result<ResourceId> {
        self.get_or_create_in(&self.resource_index, name.to_string(), || Resource {
            id: ResourceId(0),
            name: name.to_string(),
        })
        .map(|(id, _)| id)
    }

    pub fn get_or_create_service(&self, name: &str) -> Result<ServiceId> {
        self.get_or_create_in(&self.service_index, name.to_string(), || Service {
            id: ServiceId(0),
            name: name.to_string(),
        })
        .map(|(id, _)| id)
    }

    /// Register a file in the discovered scope. Returns `(id, created)`.
    pub fn get_or_create_source_file(
        &self,
        resource_id: ResourceId,
        path: &str,
        service_id: ServiceId,
    ) -> Result<(SourceFileId, bool)> {
        self.get_or_create_in(&self.file_index, path.to_string(), || SourceFile {
            id: SourceFileId(0),
            resource_id,
            path: path.to_string(),
            service_id,
        })
    }

    /// Struct `name` in the package of `file_id`. The row's file is the
    /// first file of that package to declare a method on it.
    pub fn get_or_create_struct(&self, name: &str, file_id: SourceFileId) -> Result<StructId> {
        let key = self.struct_key(file_id, name)?;
        self.get_or_create_in(&self.struct_index, key, || Struct {
            id: StructId(0),
            name: name.to_string(),
            file_id,
        })
        .map(|(id, _)| id)
    }

    fn struct_key(&self, file_id: SourceFileId, name: &str) -> Result<StructKey> {
        let file = self
            .get::<SourceFile>(file_id)
            .ok_or(ImpactGraphError::Integrity {
                table: Struct::TABLE,
                column: "file_id",
                id: file_id.get(),
            })?;
        Ok(StructKey {
            package: package_of(&file.path).to_string(),
            name: name.to_string(),
        })
    }

    // -- Functions ---------------------------------------------------------

    pub fn get_or_create_template_function(
        &self,
        row: TemplateFunction,
    ) -> Result<(TemplateFunctionId, bool)> {
        let key = TemplateKey::of(&row);
        let name = row.name.clone();
        let (id, created) = self.get_or_create_in(&self.template_index, key, move || row)?;
        if created {
            self.templates_by_name.entry(name).or_default().push(id);
        }
        Ok((id, created))
    }

    pub fn get_or_create_test_function(
        &self,
        row: TestFunction,
    ) -> Result<(TestFunctionId, bool)> {
        let key = TestKey::of(&row);
        let name = row.name.clone();
        let (id, created) = self.get_or_create_in(&self.test_index, key, move || row)?;
        if created {
            self.tests_by_name.entry(name).or_default().push(id);
        }
        Ok((id, created))
    }

    // -- Edges -------------------------------------------------------------

    pub fn insert_step(&self, row: Step) -> Result<StepId> {
        self.insert(row)
    }

    pub fn insert_template_call(&self, row: TemplateCall) -> Result<TemplateCallId> {
        self.insert(row)
    }

    pub fn insert_sequential_link(&self, row: SequentialLink) -> Result<SequentialLinkId> {
        self.insert(row)
    }

    pub fn insert_direct_reference(
        &self,
        row: DirectReference,
    ) -> Result<crate::types::DirectReferenceId> {
        self.insert(row)
    }

    // -- Field-scoped reclassification --------------------------------------

    /// Rewrite a step's target and tags. Used only by the refinement pass.
    pub fn reclassify_step(
        &self,
        id: StepId,
        target: Option<TemplateFunctionId>,
        class: Classification,
    ) -> Result<()> {
        if let Some(t) = target {
            self.require::<TemplateFunction>(t, Step::TABLE, "template_function_id")?;
        }
        let found = self.steps.update(id, |row| {
            row.template_function_id = target;
            row.class = class;
        });
        self.found_or_integrity(found, Step::TABLE, id.get())
    }

    /// Rewrite a template call's target and tags. Used only by the
    /// refinement pass.
    pub fn reclassify_template_call(
        &self,
        id: TemplateCallId,
        target: Option<TemplateFunctionId>,
        class: Classification,
    ) -> Result<()> {
        if let Some(t) = target {
            self.require::<TemplateFunction>(t, TemplateCall::TABLE, "target_id")?;
        }
        let found = self.template_calls.update(id, |row| {
            row.target_id = target;
            row.class = class;
        });
        self.found_or_integrity(found, TemplateCall::TABLE, id.get())
    }

    pub fn reclassify_sequential_link(
        &self,
        id: SequentialLinkId,
        class: Classification,
    ) -> Result<()> {
        let found = self.sequential_links.update(id, |row| row.class = class);
        self.found_or_integrity(found, SequentialLink::TABLE, id.get())
    }

    /// Tag a test as a sequential entry point.
    pub fn mark_sequential_entry(&self, id: TestFunctionId) -> Result<()> {
        let found = self.test_functions.update(id, |row| row.sequential_entry = true);
        self.found_or_integrity(found, TestFunction::TABLE, id.get())
    }

    /// Record the orchestrator of `id`. The first orchestrator wins.
    pub fn set_sequential_parent(&self, id: TestFunctionId, parent: TestFunctionId) -> Result<()> {
        self.require::<TestFunction>(parent, TestFunction::TABLE, "sequential_parent")?;
        let found = self.test_functions.update(id, |row| {
            if row.sequential_parent.is_none() {
                row.sequential_parent = Some(parent);
            }
        });
        self.found_or_integrity(found, TestFunction::TABLE, id.get())
    }

    fn found_or_integrity(&self, found: bool, table: &'static str, id: u32) -> Result<()> {
        if found {
            Ok(())
        } else {
            Err(ImpactGraphError::Integrity {
                table,
                column: "id",
                id,
            })
        }
    }

    // -- Lookups -----------------------------------------------------------

    pub fn resource_by_name(&self, name: &str) -> Option<ResourceId> {
        self.resource_index.get(name).map(|r| *r)
    }

    pub fn service_by_name(&self, name: &str) -> Option<ServiceId> {
        self.service_index.get(name).map(|r| *r)
    }

    pub fn file_by_path(&self, path: &str) -> Option<SourceFileId> {
        self.file_index.get(path).map(|r| *r)
    }

    /// Struct `name` as seen from `file_id`: the one in the same package.
    pub fn struct_for(&self, file_id: SourceFileId, name: &str) -> Option<StructId> {
        let key = self.struct_key(file_id, name).ok()?;
        self.struct_index.get(&key).map(|r| *r)
    }

    pub fn template_by_key(&self, key: &TemplateKey) -> Option<TemplateFunctionId> {
        self.template_index.get(key).map(|r| *r)
    }

    pub fn test_by_key(&self, key: &TestKey) -> Option<TestFunctionId> {
        self.test_index.get(key).map(|r| *r)
    }

    /// Template functions with this name, in insertion order.
    pub fn templates_named(&self, name: &str) -> Vec<TemplateFunctionId> {
        self.templates_by_name
            .get(name)
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    /// Test functions with this name, in insertion order.
    pub fn tests_named(&self, name: &str) -> Vec<TestFunctionId> {
        self.tests_by_name
            .get(name)
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    pub fn service_of_file(&self, file_id: SourceFileId) -> Option<ServiceId> {
        self.source_files.get(file_id).map(|f| f.service_id)
    }

    pub fn file_path(&self, file_id: SourceFileId) -> Option<String> {
        self.source_files.get(file_id).map(|f| f.path)
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            resources: self.resources.len(),
            services: self.services.len(),
            source_files: self.source_files.len(),
            structs: self.structs.len(),
            test_functions: self.test_functions.len(),
            template_functions: self.template_functions.len(),
            steps: self.steps.len(),
            template_calls: self.template_calls.len(),
            sequential_links: self.sequential_links.len(),
            direct_references: self.direct_references.len(),
        }
    }

    // -- Restore (re-import) -----------------------------------------------

    /// Append previously exported rows, keeping their ids.
    ///
    /// Rows must arrive sorted by id with no gaps, starting after the rows
    /// already present; foreign keys are checked like any other insert.
    /// Natural-key and by-name indexes are rebuilt as rows land.
    pub fn restore<T: Record + ForeignKeys>(&self, rows: Vec<T>) -> Result<()>
    where
        Self: HasTable<T>,
    {
        for row in rows {
            let expected = self.table::<T>().len() as u32 + 1;
            let id: u32 = row.id().into();
            if id != expected {
                return Err(ImpactGraphError::Other(format!(
                    "{}: expected row id {expected}, found {id}",
                    T::TABLE
                )));
            }
            row.check_foreign_keys(self)?;
            row.index_into(self);
            self.table::<T>().push(row);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Foreign keys
// ---------------------------------------------------------------------------

/// Per-table foreign-key validation and natural-key indexing.
pub trait ForeignKeys: Record {
    fn check_foreign_keys(&self, store: &RelationalStore) -> Result<()>;

    /// Register this row in the store's natural-key indexes. Only used when
    /// restoring rows that bypass `get_or_create_*`.
    fn index_into(&self, _store: &RelationalStore) {}
}

impl ForeignKeys for Resource {
    fn check_foreign_keys(&self, _store: &RelationalStore) -> Result<()> {
        Ok(())
    }

    fn index_into(&self, store: &RelationalStore) {
        store.resource_index.insert(self.name.clone(), self.id);
    }
}

impl ForeignKeys for Service {
    fn check_foreign_keys(&self, _store: &RelationalStore) -> Result<()> {
        Ok(())
    }

    fn index_into(&self, store: &RelationalStore) {
        store.service_index.insert(self.name.clone(), self.id);
    }
}

impl ForeignKeys for SourceFile {
    fn check_foreign_keys(&self, store: &RelationalStore) -> Result<()> {
        store.require::<Resource>(self.resource_id, Self::TABLE, "resource_id")?;
        store.require::<Service>(self.service_id, Self::TABLE, "service_id")
    }

    fn index_into(&self, store: &RelationalStore) {
        store.file_index.insert(self.path.clone(), self.id);
    }
}

impl ForeignKeys for Struct {
    fn check_foreign_keys(&self, store: &RelationalStore) -> Result<()> {
        store.require::<SourceFile>(self.file_id, Self::TABLE, "file_id")
    }

    fn index_into(&self, store: &RelationalStore) {
        if let Ok(key) = store.struct_key(self.file_id, &self.name) {
            store.struct_index.insert(key, self.id);
        }
    }
}

impl ForeignKeys for TestFunction {
    fn check_foreign_keys(&self, store: &RelationalStore) -> Result<()> {
        match self.origin {
            TestOrigin::Resolved {
                file_id, struct_id, ..
            } => {
                store.require::<SourceFile>(file_id, Self::TABLE, "file_id")?;
                if let Some(s) = struct_id {
                    store.require::<Struct>(s, Self::TABLE, "struct_id")?;
                }
            }
            TestOrigin::External { referenced_by } => {
                store.require::<TestFunction>(referenced_by, Self::TABLE, "referenced_by")?;
            }
        }
        if let Some(parent) = self.sequential_parent {
            store.require::<TestFunction>(parent, Self::TABLE, "sequential_parent")?;
        }
        Ok(())
    }

    fn index_into(&self, store: &RelationalStore) {
        store.test_index.insert(TestKey::of(self), self.id);
        store
            .tests_by_name
            .entry(self.name.clone())
            .or_default()
            .push(self.id);
    }
}

impl ForeignKeys for TemplateFunction {
    fn check_foreign_keys(&self, store: &RelationalStore) -> Result<()> {
        match self.origin {
            TemplateOrigin::Resolved {
                file_id, struct_id, ..
            } => {
                store.require::<SourceFile>(file_id, Self::TABLE, "file_id")?;
                if let Some(s) = struct_id {
                    store.require::<Struct>(s, Self::TABLE, "struct_id")?;
                }
                Ok(())
            }
            TemplateOrigin::External { referenced_by } => {
                store.require::<TestFunction>(referenced_by, Self::TABLE, "referenced_by")
            }
        }
    }

    fn index_into(&self, store: &RelationalStore) {
        store.template_index.insert(TemplateKey::of(self), self.id);
        store
            .templates_by_name
            .entry(self.name.clone())
            .or_default()
            .push(self.id);
    }
}

impl ForeignKeys for Step {
    fn check_foreign_keys(&self, store: &RelationalStore) -> Result<()> {
        store.require::<TestFunction>(self.test_function_id, Self::TABLE, "test_function_id")?;
        if let Some(t) = self.template_function_id {
            store.require::<TemplateFunction>(t, Self::TABLE, "template_function_id")?;
        }
        Ok(())
    }
}

impl ForeignKeys for TemplateCall {
    fn check_foreign_keys(&self, store: &RelationalStore) -> Result<()> {
        store.require::<TemplateFunction>(self.source_id, Self::TABLE, "source_id")?;
        if let Some(t) = self.target_id {
            store.require::<TemplateFunction>(t, Self::TABLE, "target_id")?;
        }
        Ok(())
    }
}

impl ForeignKeys for SequentialLink {
    fn check_foreign_keys(&self, store: &RelationalStore) -> Result<()> {
        store.require::<TestFunction>(self.orchestrator_id, Self::TABLE, "orchestrator_id")?;
        store.require::<TestFunction>(self.target_id, Self::TABLE, "target_id")
    }
}

impl ForeignKeys for DirectReference {
    fn check_foreign_keys(&self, store: &RelationalStore) -> Result<()> {
        store.require::<Resource>(self.resource_id, Self::TABLE, "resource_id")?;
        store.require::<TemplateFunction>(
            self.template_function_id,
            Self::TABLE,
            "template_function_id",
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
