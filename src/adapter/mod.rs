//! Database adapters - one implementation per engine behind a common contract
//!
//! - `DatabaseAdapter` trait: connection lifecycle, statement execution,
//!   bulk loading and the engine's native type map
//! - `QueryResult`: the normalized result shape
//! - `create_adapter`: factory selecting the concrete adapter from `ConnectionParams`
//! - Engine implementations (MySQL, PostgreSQL, SQLite, DuckDB)

pub mod loader;
mod network;
pub mod result;
pub mod types;

// Engine implementations
pub mod duckdb_adapter;
pub mod mysql_adapter;
pub mod postgres_adapter;
pub mod sqlite_adapter;

pub use duckdb_adapter::DuckDbAdapter;
pub use loader::BulkLoader;
pub use mysql_adapter::MySqlAdapter;
pub use postgres_adapter::PostgresAdapter;
pub use result::QueryResult;
pub use sqlite_adapter::SqliteAdapter;
pub use types::{ColumnTypeMap, LogicalType};

use crate::config::{ConnectionParams, EngineKind};
use crate::error::Result;
use crate::schema::SchemaInspector;
use crate::value::Scalar;
use tracing::{debug, warn};

/// Statements starting with one of these (case-insensitive) take the read path.
/// `DESC` also covers `DESCRIBE`.
const READ_PREFIXES: [&str; 6] = ["SELECT", "SHOW", "DESC", "EXPLAIN", "WITH", "PRAGMA"];

/// Read/write classification of a statement.
///
/// This is a prefix test, not a parser: a `WITH ... DELETE` is classified as a
/// read, and anything not in the prefix list (e.g. `VALUES`) as a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Read,
    Write,
}

impl StatementKind {
    pub fn classify(sql: &str) -> Self {
        let head = sql.trim_start();
        let is_read = READ_PREFIXES.iter().any(|prefix| {
            head.get(..prefix.len())
                .map_or(false, |h| h.eq_ignore_ascii_case(prefix))
        });
        if is_read {
            StatementKind::Read
        } else {
            StatementKind::Write
        }
    }
}

/// Capability set every engine adapter implements.
///
/// Adapters are single-owner: one statement (or one bulk-load batch) is in
/// flight at a time and nothing here is meant to be shared across threads.
pub trait DatabaseAdapter: SchemaInspector {
    fn engine(&self) -> EngineKind;

    /// Open the underlying connection. Calling again after a failure retries
    /// from scratch; there is no automatic retry.
    fn connect(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Execute one statement on an open connection.
    fn run(&mut self, sql: &str, params: &[Scalar], kind: StatementKind) -> Result<QueryResult>;

    /// Connection string consumed by the bulk loader.
    fn connection_uri(&self) -> String;

    /// `connection_uri` with credentials masked, for logs.
    fn redacted_uri(&self) -> String {
        self.connection_uri()
    }

    fn current_database(&self) -> Option<String>;

    fn column_type_map(&self) -> ColumnTypeMap {
        ColumnTypeMap::for_engine(self.engine())
    }

    /// Open a bulk-load session appending to `columns` of `table`.
    /// The session is released when the returned loader is dropped.
    fn bulk_loader<'a>(&'a mut self, table: &str, columns: &[String]) -> Result<Box<dyn BulkLoader + 'a>>;

    /// Release the connection. Safe to call more than once.
    fn close(&mut self);

    fn ensure_connected(&mut self) -> Result<()> {
        if !self.is_connected() {
            self.connect()?;
        }
        Ok(())
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.engine().quote_identifier(ident)
    }

    /// Classify and execute, connecting first if needed.
    fn query(&mut self, sql: &str, params: &[Scalar]) -> Result<QueryResult> {
        self.ensure_connected()?;
        let kind = StatementKind::classify(sql);
        debug!(engine = %self.engine(), ?kind, params = params.len(), "executing statement");
        self.run(sql, params, kind)
    }

    /// Like [`DatabaseAdapter::query`] with errors folded into `QueryResult::Failure`.
    fn execute(&mut self, sql: &str, params: &[Scalar]) -> QueryResult {
        match self.query(sql, params) {
            Ok(result) => result,
            Err(err) => {
                warn!(engine = %self.engine(), error = %err, "statement failed");
                err.into()
            }
        }
    }
}

/// Build the adapter for `params` without connecting.
pub fn create_adapter(params: ConnectionParams) -> Result<Box<dyn DatabaseAdapter>> {
    let adapter: Box<dyn DatabaseAdapter> = match params {
        ConnectionParams::MySql(p) => Box::new(MySqlAdapter::new(p)?),
        ConnectionParams::Postgres(p) => Box::new(PostgresAdapter::new(p)?),
        ConnectionParams::Sqlite(p) => Box::new(SqliteAdapter::new(p)),
        ConnectionParams::DuckDb(p) => Box::new(DuckDbAdapter::new(p)),
    };
    Ok(adapter)
}

/// Build the adapter for `params` and connect it.
pub fn connect_adapter(params: ConnectionParams) -> Result<Box<dyn DatabaseAdapter>> {
    let mut adapter = create_adapter(params)?;
    adapter.connect()?;
    Ok(adapter)
}

/// Convert a text-protocol cell using the server-reported type name.
/// Shared by the MySQL and PostgreSQL adapters.
pub(crate) fn coerce_text_cell(type_name: &str, text: String) -> Scalar {
    let upper = type_name.to_ascii_uppercase();
    if upper.starts_with("BOOL") {
        return match text.as_str() {
            "1" | "t" | "true" | "TRUE" => Scalar::Bool(true),
            "0" | "f" | "false" | "FALSE" => Scalar::Bool(false),
            _ => Scalar::Text(text),
        };
    }
    if is_integer_type(&upper) {
        return text.parse::<i64>().map(Scalar::Int).unwrap_or(Scalar::Text(text));
    }
    if is_float_type(&upper) {
        return text.parse::<f64>().map(Scalar::Float).unwrap_or(Scalar::Text(text));
    }
    Scalar::Text(text)
}

pub(crate) fn is_integer_type(upper: &str) -> bool {
    matches!(
        upper.split_whitespace().next().unwrap_or(""),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" | "INT2" | "INT4" | "INT8" | "OID" | "YEAR"
    )
}

pub(crate) fn is_float_type(upper: &str) -> bool {
    matches!(
        upper.split_whitespace().next().unwrap_or(""),
        "FLOAT" | "DOUBLE" | "REAL" | "FLOAT4" | "FLOAT8"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_read_statements_case_insensitively() {
        for sql in [
            "SELECT 1",
            "  select * from t",
            "show tables",
            "DESCRIBE t",
            "desc t",
            "Explain select 1",
            "WITH x AS (SELECT 1) SELECT * FROM x",
            "pragma table_info(t)",
        ] {
            assert_eq!(StatementKind::classify(sql), StatementKind::Read, "{}", sql);
        }
    }

    #[test]
    fn classifies_everything_else_as_write() {
        for sql in ["INSERT INTO t VALUES (1)", "create table t(x int)", "USE shop", "", "VALUES (1)"] {
            assert_eq!(StatementKind::classify(sql), StatementKind::Write, "{}", sql);
        }
    }

    #[test]
    fn write_performing_cte_is_a_known_misclassification() {
        let sql = "WITH gone AS (DELETE FROM t RETURNING *) SELECT count(*) FROM gone";
        assert_eq!(StatementKind::classify(sql), StatementKind::Read);
    }

    #[test]
    fn coerces_text_protocol_cells() {
        assert_eq!(coerce_text_cell("BIGINT", "1".to_string()), Scalar::Int(1));
        assert_eq!(coerce_text_cell("INT4", "-7".to_string()), Scalar::Int(-7));
        assert_eq!(coerce_text_cell("BIGINT UNSIGNED", "18446744073709551615".to_string()),
            Scalar::Text("18446744073709551615".to_string()));
        assert_eq!(coerce_text_cell("BOOL", "t".to_string()), Scalar::Bool(true));
        assert_eq!(coerce_text_cell("BOOLEAN", "0".to_string()), Scalar::Bool(false));
        assert_eq!(coerce_text_cell("FLOAT8", "2.5".to_string()), Scalar::Float(2.5));
        assert_eq!(coerce_text_cell("DECIMAL", "1.50".to_string()), Scalar::Text("1.50".to_string()));
        assert_eq!(coerce_text_cell("VARCHAR", "abc".to_string()), Scalar::Text("abc".to_string()));
    }
}
