//! Export a relational store to SQLite and read it back.
//!
//! Every table is written with its surrogate keys unchanged, so foreign keys
//! survive the trip. Classification tags are stored as [`ReferenceType`]
//! codes; the code table and its version travel in the same file. Import
//! refuses a file written with a different enumeration version.

use std::path::Path;

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::Serialize;

use crate::db::schema::{initialize_database, SCHEMA_VERSION};
use crate::error::{ImpactGraphError, Result};
use crate::graph::records::{
    DirectReference, Record, Resource, SequentialLink, Service, SourceFile, Step, Struct, TemplateCall,
    TemplateFunction, TemplateOrigin, TestFunction, TestOrigin,
};
use crate::graph::store::{RelationalStore, StoreStats};
use crate::types::{
    Classification, OccurrenceKind, ReferenceType, Resolution, ServiceImpact, TestFunctionId,
    Visibility, REFERENCE_TYPE_VERSION,
};

#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub path: String,
    pub exported_at: String,
    pub stats: StoreStats,
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Write `store` to a fresh SQLite file at `path`, replacing any existing
/// file.
pub fn export_store(store: &RelationalStore, path: &Path) -> Result<ExportSummary> {
    for stale in [path.to_path_buf(), sidecar(path, "-wal"), sidecar(path, "-shm")] {
        if stale.exists() {
            std::fs::remove_file(&stale)?;
        }
    }
    let mut conn = initialize_database(path)?;
    let exported_at = chrono::Utc::now().to_rfc3339();

    let tx = conn.transaction()?;
    // test_functions.sequential_parent may point at a later row
    tx.pragma_update(None, "defer_foreign_keys", "ON")?;
    write_meta(&tx, store, &exported_at)?;
    write_ownership(&tx, store)?;
    write_functions(&tx, store)?;
    write_edges(&tx, store)?;
    tx.commit()?;
    // single self-contained file
    conn.pragma_update(None, "journal_mode", "DELETE")?;

    let stats = store.stats();
    tracing::info!("exported {:?} to {}", stats, path.display());
    Ok(ExportSummary {
        path: path.display().to_string(),
        exported_at,
        stats,
    })
}

fn sidecar(path: &Path, suffix: &str) -> std::path::PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push(suffix);
    raw.into()
}

fn write_meta(conn: &Connection, store: &RelationalStore, exported_at: &str) -> Result<()> {
    let mut stmt = conn.prepare("INSERT OR REPLACE INTO export_meta (key, value) VALUES (?1, ?2)")?;
    let resources: Vec<String> = store.all::<Resource>().into_iter().map(|r| r.name).collect();
    stmt.execute(params!["resource", resources.join(",")])?;
    stmt.execute(params!["schema_version", SCHEMA_VERSION.to_string()])?;
    stmt.execute(params!["reference_type_version", REFERENCE_TYPE_VERSION.to_string()])?;
    stmt.execute(params!["exported_at", exported_at])?;
    stmt.execute(params!["generator", concat!("impactgraph ", env!("CARGO_PKG_VERSION"))])?;
    Ok(())
}

fn write_ownership(conn: &Connection, store: &RelationalStore) -> Result<()> {
    let mut stmt = conn.prepare("INSERT INTO resources (id, name) VALUES (?1, ?2)")?;
    for r in store.all::<Resource>() {
        stmt.execute(params![r.id.get(), r.name])?;
    }
    let mut stmt = conn.prepare("INSERT INTO services (id, name) VALUES (?1, ?2)")?;
    for s in store.all::<Service>() {
        stmt.execute(params![s.id.get(), s.name])?;
    }
    let mut stmt = conn.prepare(
        "INSERT INTO source_files (id, resource_id, path, service_id) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for f in store.all::<SourceFile>() {
        stmt.execute(params![f.id.get(), f.resource_id.get(), f.path, f.service_id.get()])?;
    }
    let mut stmt = conn.prepare("INSERT INTO structs (id, name, file_id) VALUES (?1, ?2, ?3)")?;
    for s in store.all::<Struct>() {
        stmt.execute(params![s.id.get(), s.name, s.file_id.get()])?;
    }
    Ok(())
}

fn write_functions(conn: &Connection, store: &RelationalStore) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO test_functions
           (id, name, prefix, origin, file_id, struct_id, line, referenced_by, sequential_parent, sequential_entry)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?;
    for t in store.all::<TestFunction>() {
        let o = OriginCols::from_test(&t.origin);
        stmt.execute(params![
            t.id.get(),
            t.name,
            t.prefix,
            o.kind,
            o.file_id,
            o.struct_id,
            o.line,
            o.referenced_by,
            t.sequential_parent.map(|p| p.get()),
            t.sequential_entry,
        ])?;
    }

    let mut stmt = conn.prepare(
        "INSERT INTO template_functions
           (id, name, origin, file_id, struct_id, line, referenced_by, produces_artifact)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for t in store.all::<TemplateFunction>() {
        let o = OriginCols::from_template(&t.origin);
        stmt.execute(params![
            t.id.get(),
            t.name,
            o.kind,
            o.file_id,
            o.struct_id,
            o.line,
            o.referenced_by,
            t.produces_artifact,
        ])?;
    }
    Ok(())
}

fn write_edges(conn: &Connection, store: &RelationalStore) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO steps
           (id, test_function_id, step_index, template_function_id, callee, line, resolution, visibility, service_impact)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    for s in store.all::<Step>() {
        let (res, vis, impact) = class_codes(&s.class);
        stmt.execute(params![
            s.id.get(),
            s.test_function_id.get(),
            s.index,
            s.template_function_id.map(|t| t.get()),
            s.callee,
            s.line,
            res,
            vis,
            impact,
        ])?;
    }

    let mut stmt = conn.prepare(
        "INSERT INTO template_calls
           (id, source_id, target_id, callee, line, resolution, visibility, service_impact)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for c in store.all::<TemplateCall>() {
        let (res, vis, impact) = class_codes(&c.class);
        stmt.execute(params![
            c.id.get(),
            c.source_id.get(),
            c.target_id.map(|t| t.get()),
            c.callee,
            c.line,
            res,
            vis,
            impact,
        ])?;
    }

    let mut stmt = conn.prepare(
        "INSERT INTO sequential_links
           (id, orchestrator_id, target_id, group_name, entry_key, line, resolution, visibility, service_impact)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    for l in store.all::<SequentialLink>() {
        let (res, vis, impact) = class_codes(&l.class);
        stmt.execute(params![
            l.id.get(),
            l.orchestrator_id.get(),
            l.target_id.get(),
            l.group,
            l.key,
            l.line,
            res,
            vis,
            impact,
        ])?;
    }

    let mut stmt = conn.prepare(
        "INSERT INTO direct_references
           (id, resource_id, template_function_id, kind, line, col, visibility)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for d in store.all::<DirectReference>() {
        stmt.execute(params![
            d.id.get(),
            d.resource_id.get(),
            d.template_function_id.get(),
            d.kind.as_str(),
            d.line,
            d.column,
            d.visibility.reference_type().code(),
        ])?;
    }
    Ok(())
}

fn class_codes(class: &Classification) -> (u32, u32, Option<u32>) {
    (
        class.resolution.reference_type().code(),
        class.visibility.reference_type().code(),
        class.service_impact.map(|s| s.reference_type().code()),
    )
}

// ---------------------------------------------------------------------------
// Origin columns
// ---------------------------------------------------------------------------

struct OriginCols {
    kind: String,
    file_id: Option<u32>,
    struct_id: Option<u32>,
    line: Option<u32>,
    referenced_by: Option<u32>,
}

impl OriginCols {
    fn resolved(file_id: u32, struct_id: Option<u32>, line: u32) -> Self {
        Self {
            kind: "resolved".into(),
            file_id: Some(file_id),
            struct_id,
            line: Some(line),
            referenced_by: None,
        }
    }

    fn external(referenced_by: u32) -> Self {
        Self {
            kind: "external".into(),
            file_id: None,
            struct_id: None,
            line: None,
            referenced_by: Some(referenced_by),
        }
    }

    fn from_test(origin: &TestOrigin) -> Self {
        match *origin {
            TestOrigin::Resolved {
                file_id,
                struct_id,
                line,
            } => Self::resolved(file_id.get(), struct_id.map(|s| s.get()), line),
            TestOrigin::External { referenced_by } => Self::external(referenced_by.get()),
        }
    }

    fn from_template(origin: &TemplateOrigin) -> Self {
        match *origin {
            TemplateOrigin::Resolved {
                file_id,
                struct_id,
                line,
            } => Self::resolved(file_id.get(), struct_id.map(|s| s.get()), line),
            TemplateOrigin::External { referenced_by } => Self::external(referenced_by.get()),
        }
    }

    fn from_row(row: &rusqlite::Row<'_>, first: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            kind: row.get(first)?,
            file_id: row.get(first + 1)?,
            struct_id: row.get(first + 2)?,
            line: row.get(first + 3)?,
            referenced_by: row.get(first + 4)?,
        })
    }

    fn malformed(&self, table: &str, id: u32) -> ImpactGraphError {
        ImpactGraphError::Other(format!("{table} row {id}: malformed origin {:?}", self.kind))
    }

    fn into_test(self, id: u32) -> Result<TestOrigin> {
        match (self.kind.as_str(), self.file_id, self.line, self.referenced_by) {
            ("resolved", Some(file_id), Some(line), _) => Ok(TestOrigin::Resolved {
                file_id: file_id.into(),
                struct_id: self.struct_id.map(Into::into),
                line,
            }),
            ("external", _, _, Some(by)) => Ok(TestOrigin::External {
                referenced_by: by.into(),
            }),
            _ => Err(self.malformed(TestFunction::TABLE, id)),
        }
    }

    fn into_template(self, id: u32) -> Result<TemplateOrigin> {
        match (self.kind.as_str(), self.file_id, self.line, self.referenced_by) {
            ("resolved", Some(file_id), Some(line), _) => Ok(TemplateOrigin::Resolved {
                file_id: file_id.into(),
                struct_id: self.struct_id.map(Into::into),
                line,
            }),
            ("external", _, _, Some(by)) => Ok(TemplateOrigin::External {
                referenced_by: by.into(),
            }),
            _ => Err(self.malformed(TemplateFunction::TABLE, id)),
        }
    }
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// Read an exported file back into a fresh store.
pub fn import_store(path: &Path) -> Result<RelationalStore> {
    if !path.is_file() {
        return Err(ImpactGraphError::missing_input(path, "export file does not exist"));
    }
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    check_versions(&conn)?;

    let store = RelationalStore::new();
    store.restore(read_rows(&conn, "SELECT id, name FROM resources ORDER BY id", |r| {
        Ok(Resource {
            id: r.get::<_, u32>(0)?.into(),
            name: r.get(1)?,
        })
    })?)?;
    store.restore(read_rows(&conn, "SELECT id, name FROM services ORDER BY id", |r| {
        Ok(Service {
            id: r.get::<_, u32>(0)?.into(),
            name: r.get(1)?,
        })
    })?)?;
    store.restore(read_rows(
        &conn,
        "SELECT id, resource_id, path, service_id FROM source_files ORDER BY id",
        |r| {
            Ok(SourceFile {
                id: r.get::<_, u32>(0)?.into(),
                resource_id: r.get::<_, u32>(1)?.into(),
                path: r.get(2)?,
                service_id: r.get::<_, u32>(3)?.into(),
            })
        },
    )?)?;
    store.restore(read_rows(&conn, "SELECT id, name, file_id FROM structs ORDER BY id", |r| {
        Ok(Struct {
            id: r.get::<_, u32>(0)?.into(),
            name: r.get(1)?,
            file_id: r.get::<_, u32>(2)?.into(),
        })
    })?)?;

    import_tests(&conn, &store)?;
    import_templates(&conn, &store)?;
    import_edges(&conn, &store)?;

    tracing::info!("imported {:?} from {}", store.stats(), path.display());
    Ok(store)
}

fn check_versions(conn: &Connection) -> Result<()> {
    let meta = |key: &str| -> Result<Option<String>> {
        Ok(conn
            .query_row(
                "SELECT value FROM export_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    };
    let expect = |key: &str, want: u32| -> Result<()> {
        match meta(key)? {
            Some(v) if v == want.to_string() => Ok(()),
            found => Err(ImpactGraphError::Other(format!(
                "export {key} is {found:?}, this build reads {want}"
            ))),
        }
    };
    expect("schema_version", SCHEMA_VERSION)?;
    expect("reference_type_version", REFERENCE_TYPE_VERSION)
}

fn read_rows<T>(
    conn: &Connection,
    sql: &str,
    map: impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], map)?.collect::<rusqlite::Result<Vec<T>>>()?;
    Ok(rows)
}

fn import_tests(conn: &Connection, store: &RelationalStore) -> Result<()> {
    type Raw = (u32, String, String, OriginCols, Option<u32>, bool);
    let raw: Vec<Raw> = read_rows(
        conn,
        "SELECT id, name, prefix, origin, file_id, struct_id, line, referenced_by,
                sequential_parent, sequential_entry
         FROM test_functions ORDER BY id",
        |r| {
            Ok((
                r.get(0)?,
                r.get(1)?,
                r.get(2)?,
                OriginCols::from_row(r, 3)?,
                r.get(8)?,
                r.get(9)?,
            ))
        },
    )?;

    // Parents are applied after every row exists.
    let mut parents: Vec<(TestFunctionId, TestFunctionId)> = Vec::new();
    let mut rows = Vec::with_capacity(raw.len());
    for (id, name, prefix, origin, parent, entry) in raw {
        if let Some(p) = parent {
            parents.push((id.into(), p.into()));
        }
        rows.push(TestFunction {
            id: id.into(),
            name,
            prefix,
            origin: origin.into_test(id)?,
            sequential_parent: None,
            sequential_entry: entry,
        });
    }
    store.restore(rows)?;
    for (id, parent) in parents {
        store.set_sequential_parent(id, parent)?;
    }
    Ok(())
}

fn import_templates(conn: &Connection, store: &RelationalStore) -> Result<()> {
    let raw: Vec<(u32, String, OriginCols, bool)> = read_rows(
        conn,
        "SELECT id, name, origin, file_id, struct_id, line, referenced_by, produces_artifact
         FROM template_functions ORDER BY id",
        |r| Ok((r.get(0)?, r.get(1)?, OriginCols::from_row(r, 2)?, r.get(7)?)),
    )?;
    let rows = raw
        .into_iter()
        .map(|(id, name, origin, produces_artifact)| {
            Ok(TemplateFunction {
                id: id.into(),
                name,
                origin: origin.into_template(id)?,
                produces_artifact,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    store.restore(rows)
}

type ClassCodes = (u32, u32, Option<u32>);

fn class_from_codes(table: &str, id: u32, (res, vis, impact): ClassCodes) -> Result<Classification> {
    let tag = |code: u32| {
        ReferenceType::from_code(code).ok_or_else(|| {
            ImpactGraphError::Other(format!("{table} row {id}: unknown reference type {code}"))
        })
    };
    let wrong = |code: u32, dim: &str| {
        ImpactGraphError::Other(format!("{table} row {id}: code {code} is not a {dim} tag"))
    };
    let resolution = Resolution::from_reference_type(tag(res)?).ok_or_else(|| wrong(res, "resolution"))?;
    let visibility = Visibility::from_reference_type(tag(vis)?).ok_or_else(|| wrong(vis, "visibility"))?;
    let service_impact = match impact {
        Some(code) => Some(
            ServiceImpact::from_reference_type(tag(code)?).ok_or_else(|| wrong(code, "service impact"))?,
        ),
        None => None,
    };
    Ok(Classification {
        resolution,
        visibility,
        service_impact,
    })
}

fn class_cols(r: &rusqlite::Row<'_>, first: usize) -> rusqlite::Result<ClassCodes> {
    Ok((r.get(first)?, r.get(first + 1)?, r.get(first + 2)?))
}

fn import_edges(conn: &Connection, store: &RelationalStore) -> Result<()> {
    let steps = read_rows(
        conn,
        "SELECT id, test_function_id, step_index, template_function_id, callee, line,
                resolution, visibility, service_impact
         FROM steps ORDER BY id",
        |r| {
            Ok((
                r.get::<_, u32>(0)?,
                r.get::<_, u32>(1)?,
                r.get::<_, u32>(2)?,
                r.get::<_, Option<u32>>(3)?,
                r.get::<_, String>(4)?,
                r.get::<_, u32>(5)?,
                class_cols(r, 6)?,
            ))
        },
    )?
    .into_iter()
    .map(|(id, test, index, target, callee, line, codes)| {
        Ok(Step {
            id: id.into(),
            test_function_id: test.into(),
            index,
            template_function_id: target.map(Into::into),
            callee,
            line,
            class: class_from_codes(Step::TABLE, id, codes)?,
        })
    })
    .collect::<Result<Vec<_>>>()?;
    store.restore(steps)?;

    let calls = read_rows(
        conn,
        "SELECT id, source_id, target_id, callee, line, resolution, visibility, service_impact
         FROM template_calls ORDER BY id",
        |r| {
            Ok((
                r.get::<_, u32>(0)?,
                r.get::<_, u32>(1)?,
                r.get::<_, Option<u32>>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, u32>(4)?,
                class_cols(r, 5)?,
            ))
        },
    )?
    .into_iter()
    .map(|(id, source, target, callee, line, codes)| {
        Ok(TemplateCall {
            id: id.into(),
            source_id: source.into(),
            target_id: target.map(Into::into),
            callee,
            line,
            class: class_from_codes(TemplateCall::TABLE, id, codes)?,
        })
    })
    .collect::<Result<Vec<_>>>()?;
    store.restore(calls)?;

    let links = read_rows(
        conn,
        "SELECT id, orchestrator_id, target_id, group_name, entry_key, line,
                resolution, visibility, service_impact
         FROM sequential_links ORDER BY id",
        |r| {
            Ok((
                r.get::<_, u32>(0)?,
                r.get::<_, u32>(1)?,
                r.get::<_, u32>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
                r.get::<_, u32>(5)?,
                class_cols(r, 6)?,
            ))
        },
    )?
    .into_iter()
    .map(|(id, orchestrator, target, group, key, line, codes)| {
        Ok(SequentialLink {
            id: id.into(),
            orchestrator_id: orchestrator.into(),
            target_id: target.into(),
            group,
            key,
            line,
            class: class_from_codes(SequentialLink::TABLE, id, codes)?,
        })
    })
    .collect::<Result<Vec<_>>>()?;
    store.restore(links)?;

    let refs = read_rows(
        conn,
        "SELECT id, resource_id, template_function_id, kind, line, col, visibility
         FROM direct_references ORDER BY id",
        |r| {
            Ok((
                r.get::<_, u32>(0)?,
                r.get::<_, u32>(1)?,
                r.get::<_, u32>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, u32>(4)?,
                r.get::<_, u32>(5)?,
                r.get::<_, u32>(6)?,
            ))
        },
    )?
    .into_iter()
    .map(|(id, resource, template, kind, line, column, vis)| {
        let table = DirectReference::TABLE;
        let kind = OccurrenceKind::from_str_loose(&kind)
            .ok_or_else(|| ImpactGraphError::Other(format!("{table} row {id}: bad kind {kind:?}")))?;
        let visibility = ReferenceType::from_code(vis)
            .and_then(Visibility::from_reference_type)
            .ok_or_else(|| ImpactGraphError::Other(format!("{table} row {id}: bad visibility {vis}")))?;
        Ok(DirectReference {
            id: id.into(),
            resource_id: resource.into(),
            template_function_id: template.into(),
            kind,
            line,
            column,
            visibility,
        })
    })
    .collect::<Result<Vec<_>>>()?;
    store.restore(refs)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        DirectReferenceId, ResourceId, SequentialLinkId, SourceFileId, StepId, TemplateCallId,
        TemplateFunctionId,
    };
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn class(resolution: Resolution, impact: Option<ServiceImpact>) -> Classification {
        Classification {
            resolution,
            visibility: Visibility::Public,
            service_impact: impact,
        }
    }

    /// A store exercising every table, both origin kinds, and a forward
    /// sequential parent.
    fn sample() -> RelationalStore {
        let store = RelationalStore::new();
        let res = store.get_or_create_resource("azurerm_thing").unwrap();
        let svc = store.get_or_create_service("thing").unwrap();
        let (file, _) = store.get_or_create_source_file(res, "svc/thing/thing_test.go", svc).unwrap();
        let owner = store.get_or_create_struct("ThingResource", file).unwrap();

        let resolved = |name: &str, line: u32| TestFunction {
            id: TestFunctionId(0),
            name: name.into(),
            prefix: "test".into(),
            origin: TestOrigin::Resolved {
                file_id: file,
                struct_id: None,
                line,
            },
            sequential_parent: None,
            sequential_entry: false,
        };
        let (child, _) = store.get_or_create_test_function(resolved("testBasic", 5)).unwrap();
        let (orch, _) = store.get_or_create_test_function(resolved("TestSequential", 40)).unwrap();
        store.mark_sequential_entry(orch).unwrap();
        store.set_sequential_parent(child, orch).unwrap();
        let (stub, _) = store
            .get_or_create_test_function(TestFunction {
                id: TestFunctionId(0),
                name: "testElsewhere".into(),
                prefix: "test".into(),
                origin: TestOrigin::External { referenced_by: orch },
                sequential_parent: Some(orch),
                sequential_entry: false,
            })
            .unwrap();

        let (basic, _) = store
            .get_or_create_template_function(TemplateFunction {
                id: TemplateFunctionId(0),
                name: "basic".into(),
                origin: TemplateOrigin::Resolved {
                    file_id: file,
                    struct_id: Some(owner),
                    line: 60,
                },
                produces_artifact: true,
            })
            .unwrap();
        let (missing, _) = store
            .get_or_create_template_function(TemplateFunction {
                id: TemplateFunctionId(0),
                name: "template".into(),
                origin: TemplateOrigin::External { referenced_by: child },
                produces_artifact: true,
            })
            .unwrap();

        store
            .insert_step(Step {
                id: StepId(0),
                test_function_id: child,
                index: 0,
                template_function_id: Some(basic),
                callee: "basic".into(),
                line: 8,
                class: class(Resolution::SameFile, Some(ServiceImpact::SameService)),
            })
            .unwrap();
        store
            .insert_template_call(TemplateCall {
                id: TemplateCallId(0),
                source_id: basic,
                target_id: Some(missing),
                callee: "template".into(),
                line: 62,
                class: Classification::external(),
            })
            .unwrap();
        store
            .insert_sequential_link(SequentialLink {
                id: SequentialLinkId(0),
                orchestrator_id: orch,
                target_id: stub,
                group: "thing".into(),
                key: "elsewhere".into(),
                line: 44,
                class: class(Resolution::CrossFile, None),
            })
            .unwrap();
        store
            .insert_direct_reference(DirectReference {
                id: DirectReferenceId(0),
                resource_id: ResourceId(1),
                template_function_id: basic,
                kind: OccurrenceKind::Attribute,
                line: 63,
                column: 4,
                visibility: Visibility::Private,
            })
            .unwrap();
        store
    }

    #[test]
    fn roundtrip_preserves_every_row() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.db");
        let store = sample();
        let summary = export_store(&store, &path).unwrap();
        assert_eq!(summary.stats, store.stats());

        let back = import_store(&path).unwrap();
        assert_eq!(back.stats(), store.stats());
        assert_eq!(back.all::<TestFunction>(), store.all::<TestFunction>());
        assert_eq!(back.all::<TemplateFunction>(), store.all::<TemplateFunction>());
        assert_eq!(back.all::<Step>(), store.all::<Step>());
        assert_eq!(back.all::<TemplateCall>(), store.all::<TemplateCall>());
        assert_eq!(back.all::<SequentialLink>(), store.all::<SequentialLink>());
        assert_eq!(back.all::<DirectReference>(), store.all::<DirectReference>());
        assert_eq!(back.file_by_path("svc/thing/thing_test.go"), Some(SourceFileId(1)));
    }

    #[test]
    fn export_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.db");
        export_store(&sample(), &path).unwrap();
        export_store(&sample(), &path).unwrap();
        assert_eq!(import_store(&path).unwrap().stats(), sample().stats());
    }

    #[test]
    fn missing_file_is_missing_input() {
        let dir = TempDir::new().unwrap();
        let err = import_store(&dir.path().join("nope.db")).unwrap_err();
        assert!(matches!(err, ImpactGraphError::MissingInput { .. }));
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.db");
        export_store(&sample(), &path).unwrap();
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute(
                "UPDATE export_meta SET value = '999' WHERE key = 'reference_type_version'",
                [],
            )
            .unwrap();
        }
        let err = import_store(&path).unwrap_err();
        assert!(err.to_string().contains("reference_type_version"));
    }

    #[test]
    fn foreign_code_in_wrong_dimension_is_rejected() {
        let err = class_from_codes("steps", 1, (ReferenceType::Public.code(), 7, None)).unwrap_err();
        assert!(err.to_string().contains("not a resolution tag"));
        assert!(class_from_codes("steps", 1, (3, 7, Some(9))).is_ok());
    }
}
