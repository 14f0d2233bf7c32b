//! Explicit run context handed to every graph stage.
//!
//! Nothing downstream of the scan reads process-wide state: the effective
//! config, the candidate universe, the store, and the diagnostics sink all
//! travel together in one [`AnalysisContext`].

use crate::config::AnalysisConfig;
use crate::error::{ImpactGraphError, Result};
use crate::graph::records::{TemplateFunction, TestFunction};
use crate::graph::store::{RelationalStore, TemplateKey, TestKey};
use crate::indexer::universe::{CandidateUniverse, DefSite, UniverseFile};
use crate::observability::RunDiagnostics;
use crate::types::{ResourceId, SourceFileId, TemplateFunctionId, TestFunctionId};

pub struct AnalysisContext<'a> {
    pub config: &'a AnalysisConfig,
    pub universe: &'a CandidateUniverse,
    pub store: &'a RelationalStore,
    pub diagnostics: &'a RunDiagnostics,
    pub resource: ResourceId,
}

impl<'a> AnalysisContext<'a> {
    pub fn universe_file(&self, path: &str) -> Result<&'a UniverseFile> {
        self.universe
            .file(path)
            .ok_or_else(|| ImpactGraphError::Other(format!("{path} is not a candidate file")))
    }

    /// Whether `path` is already in the discovered scope.
    pub fn in_scope(&self, path: &str) -> bool {
        self.store.file_by_path(path).is_some()
    }

    /// Service name of an in-scope file.
    pub fn service_name(&self, file_id: SourceFileId) -> Option<String> {
        let service_id = self.store.service_of_file(file_id)?;
        self.store
            .get::<crate::graph::records::Service>(service_id)
            .map(|s| s.name)
    }

    /// Natural key of the template row a universe definition maps to, if
    /// its file is in scope.
    pub fn template_key_for(&self, site: &DefSite) -> Option<TemplateKey> {
        let file_id = self.store.file_by_path(&site.file)?;
        match &site.owner {
            Some(owner) => {
                let struct_id = self.store.struct_for(file_id, owner)?;
                Some(TemplateKey::Method(struct_id, site.name.clone()))
            }
            None => Some(TemplateKey::Free(file_id, site.name.clone())),
        }
    }

    /// Existing template row for a universe definition.
    pub fn template_row_for(&self, site: &DefSite) -> Option<(TemplateFunctionId, TemplateFunction)> {
        let key = self.template_key_for(site)?;
        let id = self.store.template_by_key(&key)?;
        self.store.get::<TemplateFunction>(id).map(|row| (id, row))
    }

    /// Existing test row for a universe definition.
    pub fn test_row_for(&self, site: &DefSite) -> Option<TestFunctionId> {
        let file_id = self.store.file_by_path(&site.file)?;
        self.store
            .test_by_key(&TestKey::Defined(file_id, site.name.clone()))
    }

    pub fn test(&self, id: TestFunctionId) -> Result<TestFunction> {
        self.store
            .get::<TestFunction>(id)
            .ok_or(ImpactGraphError::Integrity {
                table: "test_functions",
                column: "id",
                id: id.get(),
            })
    }
}
