//! MySQL adapter backed by sqlx
//!
//! Statements without parameters go over the text protocol (`raw_sql`), which
//! also accepts statements MySQL cannot prepare (`USE`, most DDL). Parameterized
//! statements are prepared and decoded from the binary protocol by column type.

use super::loader::{insert_statement, rows_per_statement, BulkLoader, Placeholder};
use super::network;
use super::{coerce_text_cell, is_float_type, is_integer_type, DatabaseAdapter, QueryResult, StatementKind};
use crate::config::{EngineKind, NetworkParams};
use crate::error::{DbCliError, Result};
use crate::schema::{self, SchemaInspector, COLUMN_COLUMNS, DATABASE_COLUMNS, NOT_AVAILABLE, TABLE_COLUMNS};
use crate::value::Scalar;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, ConnectOptions, Connection, Executor, Row, Statement, TypeInfo};
use std::str::FromStr;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

const ENGINE: EngineKind = EngineKind::MySql;

const DATABASES_SQL: &str = "\
    SELECT s.SCHEMA_NAME, ROUND(COALESCE(SUM(t.DATA_LENGTH + t.INDEX_LENGTH), 0) / 1024 / 1024, 2) \
    FROM information_schema.SCHEMATA s \
    LEFT JOIN information_schema.TABLES t ON t.TABLE_SCHEMA = s.SCHEMA_NAME \
    WHERE s.SCHEMA_NAME NOT IN ('information_schema', 'performance_schema', 'mysql', 'sys') \
    GROUP BY s.SCHEMA_NAME \
    ORDER BY s.SCHEMA_NAME";

const TABLES_SQL: &str = "\
    SELECT TABLE_NAME, TABLE_TYPE, COALESCE(ENGINE, 'N/A'), COALESCE(CAST(TABLE_ROWS AS CHAR), 'N/A') \
    FROM information_schema.TABLES \
    WHERE TABLE_SCHEMA = DATABASE() \
    ORDER BY TABLE_NAME";

const COLUMNS_SQL: &str = "\
    SELECT COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE \
    FROM information_schema.COLUMNS \
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
    ORDER BY ORDINAL_POSITION";

const TABLE_EXISTS_SQL: &str = "\
    SELECT COUNT(*) FROM information_schema.TABLES \
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?";

pub struct MySqlAdapter {
    params: NetworkParams,
    runtime: Runtime,
    conn: Option<MySqlConnection>,
    current_db: Option<String>,
}

impl MySqlAdapter {
    pub fn new(params: NetworkParams) -> Result<Self> {
        let runtime = network::runtime(ENGINE)?;
        let current_db = params.database.clone();
        Ok(Self {
            params,
            runtime,
            conn: None,
            current_db,
        })
    }

    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    fn uri(&self, redacted: bool) -> String {
        let db = self.current_db.as_deref();
        let base = if redacted {
            self.params.redacted_uri("mysql", db)
        } else {
            self.params.uri("mysql", db)
        };

        let mut options = Vec::new();
        if let Some(charset) = &self.params.charset {
            options.push(format!("charset={}", charset));
        }
        if self.params.ssl_disabled {
            options.push("ssl-mode=disabled".to_string());
        }
        if options.is_empty() {
            base
        } else {
            format!("{}?{}", base, options.join("&"))
        }
    }

    fn open_connection(&self) -> Result<MySqlConnection> {
        let options = MySqlConnectOptions::from_str(&self.connection_uri())
            .map_err(|e| DbCliError::connection(ENGINE, e.to_string()))?;
        network::connect_with_timeout(&self.runtime, ENGINE, self.params.timeout_secs, options.connect())
    }
}

impl DatabaseAdapter for MySqlAdapter {
    fn engine(&self) -> EngineKind {
        ENGINE
    }

    fn connect(&mut self) -> Result<()> {
        self.close();
        let conn = self.open_connection()?;
        info!(engine = %ENGINE, uri = %self.redacted_uri(), "connected");
        self.conn = Some(conn);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn run(&mut self, sql: &str, params: &[Scalar], kind: StatementKind) -> Result<QueryResult> {
        let conn = self.conn.as_mut().ok_or_else(|| DbCliError::not_connected(ENGINE))?;
        let result = self.runtime.block_on(run_statement(conn, sql, params, kind))?;

        if kind == StatementKind::Write {
            if let Some(db) = use_target(sql) {
                let message = format!("Database changed to '{}'", db);
                self.current_db = Some(db);
                return Ok(QueryResult::effect(message, 0));
            }
        }
        Ok(result)
    }

    fn connection_uri(&self) -> String {
        self.uri(false)
    }

    fn redacted_uri(&self) -> String {
        self.uri(true)
    }

    fn current_database(&self) -> Option<String> {
        self.current_db.clone()
    }

    fn bulk_loader<'a>(&'a mut self, table: &str, columns: &[String]) -> Result<Box<dyn BulkLoader + 'a>> {
        let conn = self.open_connection()?;
        debug!(engine = %ENGINE, table, uri = %self.redacted_uri(), "bulk loader opened");
        Ok(Box::new(MySqlBulkLoader {
            runtime: &self.runtime,
            conn: Some(conn),
            table: table.to_string(),
            columns: columns.to_vec(),
        }))
    }

    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(err) = self.runtime.block_on(conn.close()) {
                warn!(engine = %ENGINE, error = %err, "close failed");
            }
        }
    }
}

impl SchemaInspector for MySqlAdapter {
    fn databases(&mut self) -> Result<QueryResult> {
        match self.query(DATABASES_SQL, &[]) {
            Ok(result) => Ok(schema::relabel(result, &DATABASE_COLUMNS)),
            Err(DbCliError::Engine { message, .. }) => {
                debug!(engine = %ENGINE, error = %message, "falling back to SHOW DATABASES");
                let result = self.query("SHOW DATABASES", &[])?;
                Ok(schema::reshape(result, &DATABASE_COLUMNS, |row| {
                    vec![row[0].clone(), schema::text(NOT_AVAILABLE)]
                }))
            }
            Err(err) => Err(err),
        }
    }

    fn tables(&mut self) -> Result<QueryResult> {
        match self.query(TABLES_SQL, &[]) {
            Ok(result) => Ok(schema::relabel(result, &TABLE_COLUMNS)),
            Err(DbCliError::Engine { message, .. }) => {
                debug!(engine = %ENGINE, error = %message, "falling back to SHOW TABLES");
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
            Err(err) => Err(err),
        }
    }

    fn columns(&mut self, table: &str) -> Result<QueryResult> {
        let result = self.query(COLUMNS_SQL, &[Scalar::from(table)])?;
        Ok(schema::relabel(result, &COLUMN_COLUMNS))
    }

    fn table_exists(&mut self, table: &str) -> Result<bool> {
        let result = self.query(TABLE_EXISTS_SQL, &[Scalar::from(table)])?;
        Ok(schema::count_is_positive(&result))
    }
}

impl Drop for MySqlAdapter {
    fn drop(&mut self) {
        self.close();
    }
}

/// Dedicated connection for one import, closed on drop.
struct MySqlBulkLoader<'a> {
    runtime: &'a Runtime,
    conn: Option<MySqlConnection>,
    table: String,
    columns: Vec<String>,
}

impl BulkLoader for MySqlBulkLoader<'_> {
    fn append(&mut self, rows: &[Vec<Scalar>]) -> Result<u64> {
        let Self {
            runtime,
            conn,
            table,
            columns,
        } = self;
        let conn = conn.as_mut().ok_or_else(|| DbCliError::not_connected(ENGINE))?;
        let per_statement = rows_per_statement(columns.len());

        runtime.block_on(async {
            let mut tx = conn.begin().await.map_err(engine_error)?;
            for batch in rows.chunks(per_statement) {
                let sql = insert_statement(ENGINE, table, columns, batch.len(), Placeholder::Question, None);
                let mut query = sqlx::query(&sql);
                for row in batch {
                    query = bind_params(query, row);
                }
                query.execute(&mut *tx).await.map_err(engine_error)?;
            }
            tx.commit().await.map_err(engine_error)?;
            Ok(rows.len() as u64)
        })
    }
}

impl Drop for MySqlBulkLoader<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(err) = self.runtime.block_on(conn.close()) {
                warn!(engine = %ENGINE, error = %err, "bulk loader close failed");
            }
        }
        debug!(engine = %ENGINE, table = %self.table, "bulk loader released");
    }
}

async fn run_statement(
    conn: &mut MySqlConnection,
    sql: &str,
    params: &[Scalar],
    kind: StatementKind,
) -> Result<QueryResult> {
    let text_protocol = params.is_empty();
    match kind {
        StatementKind::Read => {
            let rows = if text_protocol {
                sqlx::raw_sql(sql).fetch_all(&mut *conn).await
            } else {
                bind_params(sqlx::query(sql), params).fetch_all(&mut *conn).await
            }
            .map_err(engine_error)?;

            let columns = match rows.first() {
                Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
                None => prepared_columns(conn, sql).await,
            };
            let data = rows
                .iter()
                .map(|row| decode_row(row, text_protocol))
                .collect::<Result<Vec<_>>>()?;
            Ok(QueryResult::rows(columns, data))
        }
        StatementKind::Write => {
            let done = if text_protocol {
                sqlx::raw_sql(sql).execute(&mut *conn).await
            } else {
                bind_params(sqlx::query(sql), params).execute(&mut *conn).await
            }
            .map_err(engine_error)?;
            Ok(QueryResult::affected(done.rows_affected()))
        }
    }
}

/// Column names of an empty result, taken from the prepared statement.
async fn prepared_columns(conn: &mut MySqlConnection, sql: &str) -> Vec<String> {
    match Executor::prepare(&mut *conn, sql).await {
        Ok(stmt) => stmt.columns().iter().map(|c| c.name().to_string()).collect(),
        Err(_) => Vec::new(),
    }
}

fn bind_params<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &[Scalar],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            Scalar::Null => query.bind(None::<String>),
            Scalar::Bool(b) => query.bind(*b),
            Scalar::Int(i) => query.bind(*i),
            Scalar::Float(f) => query.bind(*f),
            Scalar::Text(s) => query.bind(s.clone()),
            Scalar::Bytes(b) => query.bind(b.clone()),
        };
    }
    query
}

fn decode_row(row: &MySqlRow, text_protocol: bool) -> Result<Vec<Scalar>> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let type_name = column.type_info().name();
            if text_protocol {
                match text_or_bytes(row, idx)? {
                    Scalar::Text(text) => Ok(coerce_text_cell(type_name, text)),
                    other => Ok(other),
                }
            } else {
                decode_binary(row, idx, type_name)
            }
        })
        .collect()
}

fn decode_binary(row: &MySqlRow, idx: usize, type_name: &str) -> Result<Scalar> {
    let upper = type_name.to_ascii_uppercase();
    let value = if upper.starts_with("BOOL") {
        row.try_get_unchecked::<Option<bool>, _>(idx).map(Scalar::from)
    } else if is_integer_type(&upper) {
        if upper.contains("UNSIGNED") {
            row.try_get_unchecked::<Option<u64>, _>(idx).map(|v| match v {
                Some(u) => i64::try_from(u).map(Scalar::Int).unwrap_or_else(|_| Scalar::Text(u.to_string())),
                None => Scalar::Null,
            })
        } else {
            row.try_get_unchecked::<Option<i64>, _>(idx).map(Scalar::from)
        }
    } else if upper == "FLOAT" {
        row.try_get_unchecked::<Option<f32>, _>(idx)
            .map(|v| Scalar::from(v.map(f64::from)))
    } else if is_float_type(&upper) {
        row.try_get_unchecked::<Option<f64>, _>(idx).map(Scalar::from)
    } else if upper == "DATETIME" || upper == "TIMESTAMP" {
        row.try_get_unchecked::<Option<NaiveDateTime>, _>(idx)
            .map(|v| Scalar::from(v.map(|ts| ts.to_string())))
    } else if upper == "DATE" {
        row.try_get_unchecked::<Option<NaiveDate>, _>(idx)
            .map(|v| Scalar::from(v.map(|d| d.to_string())))
    } else if upper == "TIME" {
        row.try_get_unchecked::<Option<NaiveTime>, _>(idx)
            .map(|v| Scalar::from(v.map(|t| t.to_string())))
    } else {
        return text_or_bytes(row, idx);
    };
    value.map_err(engine_error)
}

/// UTF-8 text when the cell decodes as such, raw bytes otherwise.
fn text_or_bytes(row: &MySqlRow, idx: usize) -> Result<Scalar> {
    match row.try_get_unchecked::<Option<String>, _>(idx) {
        Ok(text) => Ok(Scalar::from(text)),
        Err(_) => row
            .try_get_unchecked::<Option<Vec<u8>>, _>(idx)
            .map(|bytes| bytes.map_or(Scalar::Null, Scalar::Bytes))
            .map_err(engine_error),
    }
}

/// Database named by a `USE <db>` statement.
fn use_target(sql: &str) -> Option<String> {
    let mut words = sql.split_whitespace();
    if !words.next()?.eq_ignore_ascii_case("USE") {
        return None;
    }
    let name = words.next()?.trim_end_matches(';').trim_matches('`');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn engine_error(err: sqlx::Error) -> DbCliError {
    network::sqlx_error(ENGINE, err)
}
