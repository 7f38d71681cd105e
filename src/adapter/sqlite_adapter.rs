//! SQLite adapter backed by rusqlite

use super::loader::{insert_statement, BulkLoader, Placeholder};
use super::{DatabaseAdapter, QueryResult, StatementKind};
use crate::config::{EmbeddedParams, EngineKind};
use crate::error::{DbCliError, Result};
use crate::schema::{self, SchemaInspector, COLUMN_COLUMNS, DATABASE_COLUMNS, TABLE_COLUMNS};
use crate::value::Scalar;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, Statement, ToSql};
use tracing::{debug, info, warn};

const ENGINE: EngineKind = EngineKind::Sqlite;

pub struct SqliteAdapter {
    params: EmbeddedParams,
    conn: Option<Connection>,
}

impl SqliteAdapter {
    pub fn new(params: EmbeddedParams) -> Self {
        Self { params, conn: None }
    }

    pub fn params(&self) -> &EmbeddedParams {
        &self.params
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or_else(|| DbCliError::not_connected(ENGINE))
    }

    fn database_size_mb(&self) -> Result<f64> {
        let conn = self.conn()?;
        let pages: i64 = conn
            .query_row("PRAGMA page_count", [], |row| row.get(0))
            .map_err(engine_error)?;
        let page_size: i64 = conn
            .query_row("PRAGMA page_size", [], |row| row.get(0))
            .map_err(engine_error)?;
        let mb = (pages * page_size) as f64 / (1024.0 * 1024.0);
        Ok((mb * 100.0).round() / 100.0)
    }
}

impl DatabaseAdapter for SqliteAdapter {
    fn engine(&self) -> EngineKind {
        ENGINE
    }

    fn connect(&mut self) -> Result<()> {
        self.close();
        let conn = if self.params.is_memory() {
            Connection::open_in_memory()
        } else {
            Connection::open(&self.params.database_path)
        }
        .map_err(|e| DbCliError::connection(ENGINE, e.to_string()))?;
        info!(engine = %ENGINE, database = %self.params.database_path, "connected");
        self.conn = Some(conn);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn run(&mut self, sql: &str, params: &[Scalar], kind: StatementKind) -> Result<QueryResult> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).map_err(engine_error)?;
        // Writes with a RETURNING clause produce rows; step them exactly once.
        if kind == StatementKind::Read || stmt.column_count() > 0 {
            return read_rows(&mut stmt, params);
        }
        let affected = stmt
            .execute(params_from_iter(params.iter()))
            .map_err(engine_error)?;
        Ok(QueryResult::affected(affected as u64))
    }

    fn connection_uri(&self) -> String {
        if self.params.is_memory() {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{}", self.params.database_path)
        }
    }

    fn current_database(&self) -> Option<String> {
        Some(self.params.display_name())
    }

    fn bulk_loader<'a>(&'a mut self, table: &str, columns: &[String]) -> Result<Box<dyn BulkLoader + 'a>> {
        self.ensure_connected()?;
        let sql = insert_statement(ENGINE, table, columns, 1, Placeholder::Question, None);
        let conn = self.conn.as_mut().ok_or_else(|| DbCliError::not_connected(ENGINE))?;
        debug!(engine = %ENGINE, table, "bulk loader opened");
        Ok(Box::new(SqliteBulkLoader { conn, sql }))
    }

    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, err)) = conn.close() {
                warn!(engine = %ENGINE, error = %err, "close failed");
            }
        }
    }
}

impl SchemaInspector for SqliteAdapter {
    fn databases(&mut self) -> Result<QueryResult> {
        self.ensure_connected()?;
        let size = self.database_size_mb()?;
        Ok(QueryResult::rows(
            schema::header(&DATABASE_COLUMNS),
            vec![vec![Scalar::Text(self.params.display_name()), Scalar::Float(size)]],
        ))
    }

    fn tables(&mut self) -> Result<QueryResult> {
        let result = self.query(
            "SELECT name, type, 'sqlite', 'N/A' FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            &[],
        )?;
        Ok(schema::relabel(result, &TABLE_COLUMNS))
    }

    fn columns(&mut self, table: &str) -> Result<QueryResult> {
        let sql = format!("PRAGMA table_info({})", ENGINE.quote_identifier(table));
        let result = self.query(&sql, &[])?;
        // cid, name, type, notnull, dflt_value, pk
        Ok(schema::reshape(result, &COLUMN_COLUMNS, |row| {
            vec![row[1].clone(), row[2].clone(), schema::nullable_from_notnull(&row[3])]
        }))
    }

    fn table_exists(&mut self, table: &str) -> Result<bool> {
        let result = self.query(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            &[Scalar::from(table)],
        )?;
        Ok(schema::count_is_positive(&result))
    }
}

impl Drop for SqliteAdapter {
    fn drop(&mut self) {
        self.close();
    }
}

/// Borrows the adapter connection so in-memory databases see the rows.
struct SqliteBulkLoader<'a> {
    conn: &'a mut Connection,
    sql: String,
}

impl BulkLoader for SqliteBulkLoader<'_> {
    fn append(&mut self, rows: &[Vec<Scalar>]) -> Result<u64> {
        let tx = self.conn.transaction().map_err(engine_error)?;
        {
            let mut stmt = tx.prepare_cached(&self.sql).map_err(engine_error)?;
            for row in rows {
                stmt.execute(params_from_iter(row.iter())).map_err(engine_error)?;
            }
        }
        tx.commit().map_err(engine_error)?;
        Ok(rows.len() as u64)
    }
}

impl Drop for SqliteBulkLoader<'_> {
    fn drop(&mut self) {
        debug!(engine = %ENGINE, "bulk loader released");
    }
}

fn read_rows(stmt: &mut Statement<'_>, params: &[Scalar]) -> Result<QueryResult> {
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let mut rows = stmt.query(params_from_iter(params.iter())).map_err(engine_error)?;
    let mut data = Vec::new();
    while let Some(row) = rows.next().map_err(engine_error)? {
        let mut values = Vec::with_capacity(width);
        for idx in 0..width {
            values.push(from_value_ref(row.get_ref(idx).map_err(engine_error)?));
        }
        data.push(values);
    }
    Ok(QueryResult::rows(columns, data))
}

fn from_value_ref(value: ValueRef<'_>) -> Scalar {
    match value {
        ValueRef::Null => Scalar::Null,
        ValueRef::Integer(i) => Scalar::Int(i),
        ValueRef::Real(f) => Scalar::Float(f),
        ValueRef::Text(bytes) => Scalar::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Scalar::Bytes(bytes.to_vec()),
    }
}

fn engine_error(err: rusqlite::Error) -> DbCliError {
    let code = match &err {
        rusqlite::Error::SqliteFailure(failure, _) => Some(failure.extended_code.to_string()),
        _ => None,
    };
    DbCliError::engine(ENGINE, code, err.to_string())
}

impl ToSql for Scalar {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Scalar::Null => ToSqlOutput::Owned(Value::Null),
            Scalar::Bool(b) => ToSqlOutput::Owned(Value::Integer(*b as i64)),
            Scalar::Int(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            Scalar::Float(f) => ToSqlOutput::Owned(Value::Real(*f)),
            Scalar::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Scalar::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}
