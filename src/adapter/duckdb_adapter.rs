//! DuckDB adapter backed by the embedded duckdb crate

use super::loader::{insert_statement, BulkLoader, Placeholder};
use super::{DatabaseAdapter, QueryResult, StatementKind};
use crate::config::{EmbeddedParams, EngineKind};
use crate::error::{DbCliError, Result};
use crate::schema::{self, SchemaInspector, COLUMN_COLUMNS, DATABASE_COLUMNS, NOT_AVAILABLE, TABLE_COLUMNS};
use crate::value::Scalar;
use chrono::{DateTime, NaiveDate};
use duckdb::types::{TimeUnit, ToSqlOutput, Value, ValueRef};
use duckdb::{params_from_iter, Connection, ToSql};
use tracing::{debug, info, warn};

const ENGINE: EngineKind = EngineKind::DuckDb;

/// DuckDB does not surface an affected-row count for arbitrary statements.
pub const WRITE_MESSAGE: &str = "Query executed successfully (affected row count not reported by DuckDB)";

/// Days between 0001-01-01 and 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub struct DuckDbAdapter {
    params: EmbeddedParams,
    conn: Option<Connection>,
}

impl DuckDbAdapter {
    pub fn new(params: EmbeddedParams) -> Self {
        Self { params, conn: None }
    }

    pub fn params(&self) -> &EmbeddedParams {
        &self.params
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or_else(|| DbCliError::not_connected(ENGINE))
    }
}

impl DatabaseAdapter for DuckDbAdapter {
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
        match kind {
            StatementKind::Read => read_rows(conn, sql, params),
            StatementKind::Write => {
                let mut stmt = conn.prepare(sql).map_err(engine_error)?;
                stmt.execute(params_from_iter(params.iter())).map_err(engine_error)?;
                Ok(QueryResult::effect(WRITE_MESSAGE, 0))
            }
        }
    }

    fn connection_uri(&self) -> String {
        format!("duckdb://{}", self.params.database_path)
    }

    fn current_database(&self) -> Option<String> {
        Some(self.params.display_name())
    }

    fn bulk_loader<'a>(&'a mut self, table: &str, columns: &[String]) -> Result<Box<dyn BulkLoader + 'a>> {
        self.ensure_connected()?;
        let sql = insert_statement(ENGINE, table, columns, 1, Placeholder::Question, None);
        let conn = self.conn.as_mut().ok_or_else(|| DbCliError::not_connected(ENGINE))?;
        debug!(engine = %ENGINE, table, "bulk loader opened");
        Ok(Box::new(DuckDbBulkLoader { conn, sql }))
    }

    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, err)) = conn.close() {
                warn!(engine = %ENGINE, error = %err, "close failed");
            }
        }
    }
}

impl SchemaInspector for DuckDbAdapter {
    fn databases(&mut self) -> Result<QueryResult> {
        let listed = self
            .query("SHOW DATABASES", &[])
            .map(|result| {
                schema::reshape(result, &DATABASE_COLUMNS, |row| {
                    vec![row[0].clone(), schema::text(NOT_AVAILABLE)]
                })
            });
        match listed {
            Ok(result) if result.row_count() > 0 => Ok(result),
            Err(err @ DbCliError::Connection { .. }) => Err(err),
            _ => Ok(QueryResult::rows(
                schema::header(&DATABASE_COLUMNS),
                vec![vec![Scalar::Text(self.params.display_name()), schema::text(NOT_AVAILABLE)]],
            )),
        }
    }

    fn tables(&mut self) -> Result<QueryResult> {
        let result = self.query("SHOW TABLES", &[])?;
        Ok(schema::reshape(result, &TABLE_COLUMNS, |row| {
            vec![
                row[0].clone(),
                schema::text("BASE TABLE"),
                schema::text(ENGINE.tag()),
                schema::text(NOT_AVAILABLE),
            ]
        }))
    }

    fn columns(&mut self, table: &str) -> Result<QueryResult> {
        let sql = format!("DESCRIBE {}", ENGINE.quote_identifier(table));
        let result = self.query(&sql, &[])?;
        // column_name, column_type, null, key, default, extra
        Ok(schema::reshape(result, &COLUMN_COLUMNS, |row| {
            vec![row[0].clone(), row[1].clone(), row[2].clone()]
        }))
    }

    fn table_exists(&mut self, table: &str) -> Result<bool> {
        // Identifiers resolve case-insensitively.
        let result = self.query(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = current_schema() AND lower(table_name) = lower(?)",
            &[Scalar::from(table)],
        )?;
        Ok(schema::count_is_positive(&result))
    }
}

impl Drop for DuckDbAdapter {
    fn drop(&mut self) {
        self.close();
    }
}

struct DuckDbBulkLoader<'a> {
    conn: &'a mut Connection,
    sql: String,
}

impl BulkLoader for DuckDbBulkLoader<'_> {
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

impl Drop for DuckDbBulkLoader<'_> {
    fn drop(&mut self) {
        debug!(engine = %ENGINE, "bulk loader released");
    }
}

fn read_rows(conn: &Connection, sql: &str, params: &[Scalar]) -> Result<QueryResult> {
    let mut stmt = conn.prepare(sql).map_err(engine_error)?;
    let mut rows = stmt.query(params_from_iter(params.iter())).map_err(engine_error)?;
    // Column metadata is only available once the statement has run.
    let columns: Vec<String> = rows.as_ref().map(|s| s.column_names()).unwrap_or_default();
    let width = columns.len();

    let mut data = Vec::new();
    while let Some(row) = rows.next().map_err(engine_error)? {
        let mut values = Vec::with_capacity(width);
        for idx in 0..width {
            values.push(from_value(row.get_ref(idx).map_err(engine_error)?.to_owned()));
        }
        data.push(values);
    }
    Ok(QueryResult::rows(columns, data))
}

fn from_value(value: Value) -> Scalar {
    match value {
        Value::Null => Scalar::Null,
        Value::Boolean(b) => Scalar::Bool(b),
        Value::TinyInt(i) => Scalar::Int(i.into()),
        Value::SmallInt(i) => Scalar::Int(i.into()),
        Value::Int(i) => Scalar::Int(i.into()),
        Value::BigInt(i) => Scalar::Int(i),
        Value::UTinyInt(i) => Scalar::Int(i.into()),
        Value::USmallInt(i) => Scalar::Int(i.into()),
        Value::UInt(i) => Scalar::Int(i.into()),
        Value::UBigInt(i) => i64::try_from(i).map(Scalar::Int).unwrap_or_else(|_| Scalar::Text(i.to_string())),
        Value::HugeInt(i) => i64::try_from(i).map(Scalar::Int).unwrap_or_else(|_| Scalar::Text(i.to_string())),
        Value::Float(f) => Scalar::Float(f.into()),
        Value::Double(f) => Scalar::Float(f),
        Value::Decimal(d) => Scalar::Text(d.to_string()),
        Value::Text(s) => Scalar::Text(s),
        Value::Enum(s) => Scalar::Text(s),
        Value::Blob(b) => Scalar::Bytes(b),
        Value::Date32(days) => NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
            .map(|d| Scalar::Text(d.to_string()))
            .unwrap_or(Scalar::Int(days.into())),
        Value::Timestamp(unit, raw) => {
            let micros = match unit {
                TimeUnit::Second => raw.saturating_mul(1_000_000),
                TimeUnit::Millisecond => raw.saturating_mul(1_000),
                TimeUnit::Microsecond => raw,
                TimeUnit::Nanosecond => raw / 1_000,
            };
            DateTime::from_timestamp(micros.div_euclid(1_000_000), (micros.rem_euclid(1_000_000) * 1_000) as u32)
                .map(|ts| Scalar::Text(ts.naive_utc().to_string()))
                .unwrap_or(Scalar::Int(raw))
        }
        other => Scalar::Text(format!("{:?}", other)),
    }
}

fn engine_error(err: duckdb::Error) -> DbCliError {
    DbCliError::engine(ENGINE, None, err.to_string())
}

impl ToSql for Scalar {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Scalar::Null => ToSqlOutput::Owned(Value::Null),
            Scalar::Bool(b) => ToSqlOutput::Owned(Value::Boolean(*b)),
            Scalar::Int(i) => ToSqlOutput::Owned(Value::BigInt(*i)),
            Scalar::Float(f) => ToSqlOutput::Owned(Value::Double(*f)),
            Scalar::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Scalar::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_temporal_values_to_text() {
        assert_eq!(from_value(Value::Date32(0)), Scalar::from("1970-01-01"));
        assert_eq!(
            from_value(Value::Timestamp(TimeUnit::Second, 86_400)),
            Scalar::from("1970-01-02 00:00:00")
        );
    }

    #[test]
    fn widens_integers_and_keeps_oversized_as_text() {
        assert_eq!(from_value(Value::TinyInt(-3)), Scalar::Int(-3));
        assert_eq!(from_value(Value::UBigInt(u64::MAX)), Scalar::Text(u64::MAX.to_string()));
    }

    #[test]
    fn writes_report_zero_affected_rows() {
        let mut db = DuckDbAdapter::new(EmbeddedParams::in_memory());
        db.query("CREATE TABLE t (x INTEGER)", &[]).unwrap();
        let result = db.query("INSERT INTO t VALUES (1), (2)", &[]).unwrap();
        assert_eq!(result, QueryResult::effect(WRITE_MESSAGE, 0));
    }

    #[test]
    fn table_exists_checks_the_catalog() {
        let mut db = DuckDbAdapter::new(EmbeddedParams::in_memory());
        assert!(!db.table_exists("nope").unwrap());
        db.query("CREATE TABLE yes (x INTEGER)", &[]).unwrap();
        assert!(db.table_exists("yes").unwrap());
        assert!(db.table_exists("YES").unwrap());
        assert!(!db.table_exists("odd \"name").unwrap());
    }

    #[test]
    fn table_exists_surfaces_connection_failures() {
        let missing_dir = std::env::temp_dir().join("multidb-no-such-dir").join("x.duckdb");
        let mut db = DuckDbAdapter::new(EmbeddedParams::new(missing_dir.to_string_lossy()));
        assert!(matches!(db.table_exists("t"), Err(DbCliError::Connection { .. })));
    }
}
