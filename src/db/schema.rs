//! SQLite schema for exported analysis runs.
//!
//! One table per relational-store table, with the same surrogate keys, plus
//! the versioned `reference_types` enumeration that every classification
//! column points at, and an `export_meta` key/value table.

use std::path::Path;

use rusqlite::Connection;

use crate::types::ReferenceType;

/// Bumped whenever a table or column changes.
pub const SCHEMA_VERSION: u32 = 2;

// ---------------------------------------------------------------------------
// DDL constants
// ---------------------------------------------------------------------------

const CREATE_REFERENCE_TYPES: &str = "\
CREATE TABLE IF NOT EXISTS reference_types (
  code INTEGER PRIMARY KEY,
  name TEXT NOT NULL UNIQUE,
  dimensions TEXT NOT NULL
)";

const CREATE_EXPORT_META: &str = "\
CREATE TABLE IF NOT EXISTS export_meta (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
)";

const CREATE_RESOURCES: &str = "\
CREATE TABLE IF NOT EXISTS resources (
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL UNIQUE
)";

const CREATE_SERVICES: &str = "\
CREATE TABLE IF NOT EXISTS services (
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL UNIQUE
)";

const CREATE_SOURCE_FILES: &str = "\
CREATE TABLE IF NOT EXISTS source_files (
  id INTEGER PRIMARY KEY,
  resource_id INTEGER NOT NULL REFERENCES resources(id),
  path TEXT NOT NULL UNIQUE,
  service_id INTEGER NOT NULL REFERENCES services(id)
)";

const CREATE_STRUCTS: &str = "\
CREATE TABLE IF NOT EXISTS structs (
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL,
  file_id INTEGER NOT NULL REFERENCES source_files(id)
)";

const CREATE_TEST_FUNCTIONS: &str = "\
CREATE TABLE IF NOT EXISTS test_functions (
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL,
  prefix TEXT NOT NULL,
  origin TEXT NOT NULL CHECK (origin IN ('resolved', 'external')),
  file_id INTEGER REFERENCES source_files(id),
  struct_id INTEGER REFERENCES structs(id),
  line INTEGER,
  referenced_by INTEGER REFERENCES test_functions(id),
  sequential_parent INTEGER REFERENCES test_functions(id),
  sequential_entry INTEGER NOT NULL DEFAULT 0
)";

const CREATE_TEMPLATE_FUNCTIONS: &str = "\
CREATE TABLE IF NOT EXISTS template_functions (
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL,
  origin TEXT NOT NULL CHECK (origin IN ('resolved', 'external')),
  file_id INTEGER REFERENCES source_files(id),
  struct_id INTEGER REFERENCES structs(id),
  line INTEGER,
  referenced_by INTEGER REFERENCES test_functions(id),
  produces_artifact INTEGER NOT NULL DEFAULT 0
)";

const CREATE_STEPS: &str = "\
CREATE TABLE IF NOT EXISTS steps (
  id INTEGER PRIMARY KEY,
  test_function_id INTEGER NOT NULL REFERENCES test_functions(id),
  step_index INTEGER NOT NULL,
  template_function_id INTEGER REFERENCES template_functions(id),
  callee TEXT NOT NULL,
  line INTEGER NOT NULL,
  resolution INTEGER NOT NULL REFERENCES reference_types(code),
  visibility INTEGER NOT NULL REFERENCES reference_types(code),
  service_impact INTEGER REFERENCES reference_types(code)
)";

const CREATE_TEMPLATE_CALLS: &str = "\
CREATE TABLE IF NOT EXISTS template_calls (
  id INTEGER PRIMARY KEY,
  source_id INTEGER NOT NULL REFERENCES template_functions(id),
  target_id INTEGER REFERENCES template_functions(id),
  callee TEXT NOT NULL,
  line INTEGER NOT NULL,
  resolution INTEGER NOT NULL REFERENCES reference_types(code),
  visibility INTEGER NOT NULL REFERENCES reference_types(code),
  service_impact INTEGER REFERENCES reference_types(code)
)";

const CREATE_SEQUENTIAL_LINKS: &str = "\
CREATE TABLE IF NOT EXISTS sequential_links (
  id INTEGER PRIMARY KEY,
  orchestrator_id INTEGER NOT NULL REFERENCES test_functions(id),
  target_id INTEGER NOT NULL REFERENCES test_functions(id),
  group_name TEXT NOT NULL,
  entry_key TEXT NOT NULL,
  line INTEGER NOT NULL,
  resolution INTEGER NOT NULL REFERENCES reference_types(code),
  visibility INTEGER NOT NULL REFERENCES reference_types(code),
  service_impact INTEGER REFERENCES reference_types(code)
)";

const CREATE_DIRECT_REFERENCES: &str = "\
CREATE TABLE IF NOT EXISTS direct_references (
  id INTEGER PRIMARY KEY,
  resource_id INTEGER NOT NULL REFERENCES resources(id),
  template_function_id INTEGER NOT NULL REFERENCES template_functions(id),
  kind TEXT NOT NULL CHECK (kind IN ('block', 'attribute')),
  line INTEGER NOT NULL,
  col INTEGER NOT NULL,
  visibility INTEGER NOT NULL REFERENCES reference_types(code)
)";

// Indexes ----------------------------------------------------------------

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_structs_name ON structs(name)",
    "CREATE INDEX IF NOT EXISTS idx_test_functions_name ON test_functions(name)",
    "CREATE INDEX IF NOT EXISTS idx_template_functions_name ON template_functions(name)",
    "CREATE INDEX IF NOT EXISTS idx_steps_test ON steps(test_function_id)",
    "CREATE INDEX IF NOT EXISTS idx_steps_template ON steps(template_function_id)",
    "CREATE INDEX IF NOT EXISTS idx_template_calls_source ON template_calls(source_id)",
    "CREATE INDEX IF NOT EXISTS idx_template_calls_target ON template_calls(target_id)",
    "CREATE INDEX IF NOT EXISTS idx_sequential_links_orchestrator ON sequential_links(orchestrator_id)",
    "CREATE INDEX IF NOT EXISTS idx_direct_references_template ON direct_references(template_function_id)",
];

/// Tables in foreign-key order.
pub const TABLES: &[&str] = &[
    "resources",
    "services",
    "source_files",
    "structs",
    "test_functions",
    "template_functions",
    "steps",
    "template_calls",
    "sequential_links",
    "direct_references",
];

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Open (or create) the SQLite database at `db_path` and apply the export
/// schema, including the `reference_types` rows.
///
/// The returned connection has WAL mode, foreign keys, and synchronous
/// NORMAL already configured.
pub fn initialize_database(db_path: impl AsRef<Path>) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;

    // -- Pragmas ----------------------------------------------------------
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;

    // -- Tables -----------------------------------------------------------
    conn.execute_batch(CREATE_REFERENCE_TYPES)?;
    conn.execute_batch(CREATE_EXPORT_META)?;
    conn.execute_batch(CREATE_RESOURCES)?;
    conn.execute_batch(CREATE_SERVICES)?;
    conn.execute_batch(CREATE_SOURCE_FILES)?;
    conn.execute_batch(CREATE_STRUCTS)?;
    conn.execute_batch(CREATE_TEST_FUNCTIONS)?;
    conn.execute_batch(CREATE_TEMPLATE_FUNCTIONS)?;
    conn.execute_batch(CREATE_STEPS)?;
    conn.execute_batch(CREATE_TEMPLATE_CALLS)?;
    conn.execute_batch(CREATE_SEQUENTIAL_LINKS)?;
    conn.execute_batch(CREATE_DIRECT_REFERENCES)?;

    // -- Indexes ----------------------------------------------------------
    for ddl in CREATE_INDEXES {
        conn.execute_batch(ddl)?;
    }

    seed_reference_types(&conn)?;
    Ok(conn)
}

fn seed_reference_types(conn: &Connection) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO reference_types (code, name, dimensions) VALUES (?1, ?2, ?3)",
    )?;
    for tag in ReferenceType::ALL {
        let dims: Vec<&str> = tag.dimensions().iter().map(|d| d.as_str()).collect();
        stmt.execute(rusqlite::params![tag.code(), tag.as_str(), dims.join(",")])?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
