//! SQLite persistence for finished runs.

pub mod export;
pub mod schema;

pub use export::{export_store, import_store, ExportSummary};
pub use schema::initialize_database;
