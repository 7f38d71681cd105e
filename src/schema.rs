//! Schema inspection - catalog queries normalized to one shape per listing
//!
//! Every adapter answers the same three listings:
//! - databases: `(Database, SizeMB)`
//! - tables: `(Table, Type, Engine, Rows)` where `Rows` is an estimate or `N/A`
//! - columns: `(Column, Type, Nullable)`

use crate::adapter::QueryResult;
use crate::error::{DbCliError, Result};
use crate::value::Scalar;

pub const DATABASE_COLUMNS: [&str; 2] = ["Database", "SizeMB"];
pub const TABLE_COLUMNS: [&str; 4] = ["Table", "Type", "Engine", "Rows"];
pub const COLUMN_COLUMNS: [&str; 3] = ["Column", "Type", "Nullable"];

/// Placeholder for values an engine cannot report.
pub const NOT_AVAILABLE: &str = "N/A";

pub trait SchemaInspector {
    fn databases(&mut self) -> Result<QueryResult>;

    fn tables(&mut self) -> Result<QueryResult>;

    fn columns(&mut self, table: &str) -> Result<QueryResult>;

    fn table_exists(&mut self, table: &str) -> Result<bool>;

    fn list_databases(&mut self) -> QueryResult {
        self.databases().unwrap_or_else(QueryResult::from)
    }

    fn list_tables(&mut self) -> QueryResult {
        self.tables().unwrap_or_else(QueryResult::from)
    }

    fn list_columns(&mut self, table: &str) -> QueryResult {
        self.columns(table).unwrap_or_else(QueryResult::from)
    }

    /// Live column names of `table`, in table order.
    fn table_column_names(&mut self, table: &str) -> Result<Vec<String>> {
        let result = self.columns(table)?;
        let names: Vec<String> = result
            .column_values(0)
            .into_iter()
            .map(|value| value.to_string())
            .collect();
        if names.is_empty() {
            return Err(DbCliError::Validation(format!(
                "Table '{}' has no columns or does not exist",
                table
            )));
        }
        Ok(names)
    }
}

pub fn header(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Rebuild a row set under the normalized header, mapping each source row.
/// Non-row results pass through unchanged.
pub fn reshape<F>(result: QueryResult, names: &[&str], project: F) -> QueryResult
where
    F: Fn(&[Scalar]) -> Vec<Scalar>,
{
    match result {
        QueryResult::Rows { rows, .. } => {
            let rows = rows.iter().map(|row| project(row)).collect();
            QueryResult::rows(header(names), rows)
        }
        other => other,
    }
}

/// Rename the columns of a row set that already has the right layout.
pub fn relabel(result: QueryResult, names: &[&str]) -> QueryResult {
    reshape(result, names, |row| row.to_vec())
}

/// `true` when the first cell of a `COUNT(*)` style result is positive.
pub fn count_is_positive(result: &QueryResult) -> bool {
    result
        .first_value()
        .and_then(Scalar::as_i64)
        .map_or(false, |count| count > 0)
}

pub fn text(value: &str) -> Scalar {
    Scalar::Text(value.to_string())
}

/// Map `0/1`, `NO/YES` style not-null flags to `YES`/`NO` nullability.
pub fn nullable_from_notnull(flag: &Scalar) -> Scalar {
    let not_null = match flag {
        Scalar::Int(i) => *i != 0,
        Scalar::Bool(b) => *b,
        other => other.to_string() == "1",
    };
    text(if not_null { "NO" } else { "YES" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reshape_projects_rows_under_new_header() {
        let raw = QueryResult::rows(
            header(&["cid", "name", "type", "notnull"]),
            vec![vec![Scalar::Int(0), text("id"), text("INTEGER"), Scalar::Int(1)]],
        );
        let shaped = reshape(raw, &COLUMN_COLUMNS, |row| {
            vec![row[1].clone(), row[2].clone(), nullable_from_notnull(&row[3])]
        });
        assert_eq!(shaped.columns(), &header(&COLUMN_COLUMNS)[..]);
        assert_eq!(shaped.row_data()[0], vec![text("id"), text("INTEGER"), text("NO")]);
    }

    #[test]
    fn counts_from_first_cell() {
        let one = QueryResult::rows(header(&["COUNT(*)"]), vec![vec![Scalar::Int(1)]]);
        let zero = QueryResult::rows(header(&["COUNT(*)"]), vec![vec![Scalar::Int(0)]]);
        assert!(count_is_positive(&one));
        assert!(!count_is_positive(&zero));
        assert!(!count_is_positive(&QueryResult::affected(0)));
    }

    #[test]
    fn relabel_keeps_effects() {
        let effect = QueryResult::affected(2);
        assert_eq!(relabel(effect.clone(), &TABLE_COLUMNS), effect);
    }
}
