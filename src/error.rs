use crate::config::EngineKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbCliError {
    #[error("{engine} connection error: {message}")]
    Connection {
        engine: EngineKind,
        message: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{engine} error{}: {message}", format_code(.code))]
    Engine {
        engine: EngineKind,
        code: Option<String>,
        message: String,
    },

    /// Chunks before `chunk` stay committed.
    #[error("Import into '{table}' failed at chunk {chunk} after {rows_committed} committed row(s): {source}")]
    PartialImport {
        table: String,
        chunk: usize,
        rows_committed: u64,
        #[source]
        source: Box<DbCliError>,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error category carried by `QueryResult::Failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Connection,
    Validation,
    Engine,
    PartialImport,
    Io,
}

impl DbCliError {
    pub fn connection(engine: EngineKind, message: impl Into<String>) -> Self {
        DbCliError::Connection {
            engine,
            message: message.into(),
        }
    }

    pub fn engine(engine: EngineKind, code: Option<String>, message: impl Into<String>) -> Self {
        DbCliError::Engine {
            engine,
            code,
            message: message.into(),
        }
    }

    pub fn not_connected(engine: EngineKind) -> Self {
        DbCliError::connection(engine, "not connected")
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            DbCliError::Connection { .. } => FailureKind::Connection,
            DbCliError::Validation(_) => FailureKind::Validation,
            DbCliError::Engine { .. } => FailureKind::Engine,
            DbCliError::PartialImport { .. } => FailureKind::PartialImport,
            DbCliError::Csv(_) | DbCliError::Io(_) => FailureKind::Io,
        }
    }
}

fn format_code(code: &Option<String>) -> String {
    match code {
        Some(code) => format!(" {}", code),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, DbCliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_includes_native_code() {
        let err = DbCliError::engine(EngineKind::MySql, Some("1146".to_string()), "Table 'x' doesn't exist");
        assert_eq!(err.to_string(), "MySQL error 1146: Table 'x' doesn't exist");

        let err = DbCliError::engine(EngineKind::DuckDb, None, "Catalog Error");
        assert_eq!(err.to_string(), "DuckDB error: Catalog Error");
    }

    #[test]
    fn partial_import_reports_committed_rows() {
        let err = DbCliError::PartialImport {
            table: "users".to_string(),
            chunk: 2,
            rows_committed: 1000,
            source: Box::new(DbCliError::engine(EngineKind::Sqlite, None, "constraint failed")),
        };
        assert_eq!(err.kind(), FailureKind::PartialImport);
        assert!(err.to_string().contains("chunk 2 after 1000 committed row(s)"));
    }
}
