//! Crate-wide error type.
//!
//! Only fatal conditions live here. A file whose facts cannot be extracted
//! is reported through [`crate::indexer::facts::FactError`] and recorded in
//! the run diagnostics; an unresolved reference is never an error at all.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort an analysis run or an export/import.
#[derive(Debug, Error)]
pub enum ImpactGraphError {
    /// The source tree (or an expected part of it) does not exist.
    #[error("missing input {}: {reason}", path.display())]
    MissingInput { path: PathBuf, reason: String },

    /// A row referenced a foreign key that does not exist. Always a bug.
    #[error("integrity violation: {table}.{column} references missing row {id}")]
    Integrity {
        table: &'static str,
        column: &'static str,
        id: u32,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl ImpactGraphError {
    pub fn missing_input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MissingInput {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for errors that indicate a logic bug rather than bad input.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity { .. })
    }
}

pub type Result<T> = std::result::Result<T, ImpactGraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_input_message_names_path() {
        let err = ImpactGraphError::missing_input("/nope/src", "source root does not exist");
        let msg = err.to_string();
        assert!(msg.contains("/nope/src"));
        assert!(msg.contains("does not exist"));
        assert!(!err.is_integrity());
    }

    #[test]
    fn integrity_message_names_table_and_column() {
        let err = ImpactGraphError::Integrity {
            table: "steps",
            column: "test_function_id",
            id: 42,
        };
        assert_eq!(
            err.to_string(),
            "integrity violation: steps.test_function_id references missing row 42"
        );
        assert!(err.is_integrity());
    }
}
