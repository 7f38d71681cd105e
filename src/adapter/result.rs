//! Query Result - Standardized result shape returned by every adapter

use crate::error::{DbCliError, FailureKind};
use crate::value::Scalar;
use serde::Serialize;

/// Exactly one of: a row set, a write effect, or a failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum QueryResult {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Scalar>>,
    },
    Effect {
        message: String,
        affected_rows: u64,
    },
    Failure {
        kind: FailureKind,
        detail: String,
    },
}

impl QueryResult {
    /// Build a row set. Rows shorter than the header are padded with NULL and
    /// longer ones truncated so every row has `columns.len()` cells.
    pub fn rows(columns: Vec<String>, rows: Vec<Vec<Scalar>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Scalar::Null);
                row
            })
            .collect();
        QueryResult::Rows { columns, rows }
    }

    pub fn effect(message: impl Into<String>, affected_rows: u64) -> Self {
        QueryResult::Effect {
            message: message.into(),
            affected_rows,
        }
    }

    /// Write effect with the conventional "Query OK" message.
    pub fn affected(affected_rows: u64) -> Self {
        QueryResult::effect(
            format!("Query OK, {} row(s) affected", affected_rows),
            affected_rows,
        )
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, QueryResult::Failure { .. })
    }

    pub fn columns(&self) -> &[String] {
        match self {
            QueryResult::Rows { columns, .. } => columns,
            _ => &[],
        }
    }

    pub fn row_data(&self) -> &[Vec<Scalar>] {
        match self {
            QueryResult::Rows { rows, .. } => rows,
            _ => &[],
        }
    }

    pub fn row_count(&self) -> usize {
        self.row_data().len()
    }

    /// First cell of the first row, if any.
    pub fn first_value(&self) -> Option<&Scalar> {
        self.row_data().first().and_then(|row| row.first())
    }

    /// Values of one column across all rows.
    pub fn column_values(&self, index: usize) -> Vec<&Scalar> {
        self.row_data().iter().filter_map(|row| row.get(index)).collect()
    }
}

impl From<DbCliError> for QueryResult {
    fn from(err: DbCliError) -> Self {
        QueryResult::Failure {
            kind: err.kind(),
            detail: err.to_string(),
        }
    }
}
