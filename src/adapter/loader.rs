//! Bulk loading - append-only batch inserts used by the CSV import pipeline

use crate::config::EngineKind;
use crate::error::Result;
use crate::value::Scalar;

/// Upper bound on bind parameters per statement (PostgreSQL and MySQL both
/// cap at 65535).
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Append rows to one table.
///
/// Each `append` call is one batch: it commits entirely or fails entirely.
/// Batches already committed are not undone by a later failure.
pub trait BulkLoader {
    fn append(&mut self, rows: &[Vec<Scalar>]) -> Result<u64>;
}

/// Placeholder dialect for generated INSERT statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// `?`
    Question,
    /// `$1, $2, ...`
    Numbered,
}

/// `INSERT INTO table (cols) VALUES (...), (...)` for `row_count` rows.
///
/// `casts` optionally wraps each placeholder in `CAST(.. AS type)`, indexed by column.
pub fn insert_statement(
    engine: EngineKind,
    table: &str,
    columns: &[String],
    row_count: usize,
    placeholder: Placeholder,
    casts: Option<&[Option<String>]>,
) -> String {
    let column_list = columns
        .iter()
        .map(|c| engine.quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");

    let mut next = 1usize;
    let mut groups = Vec::with_capacity(row_count);
    for _ in 0..row_count {
        let mut cells = Vec::with_capacity(columns.len());
        for col_idx in 0..columns.len() {
            let marker = match placeholder {
                Placeholder::Question => "?".to_string(),
                Placeholder::Numbered => format!("${}", next),
            };
            next += 1;
            let cast = casts.and_then(|c| c.get(col_idx)).and_then(|c| c.as_deref());
            cells.push(match cast {
                Some(sql_type) => format!("CAST({} AS {})", marker, sql_type),
                None => marker,
            });
        }
        groups.push(format!("({})", cells.join(", ")));
    }

    format!("INSERT INTO {} ({}) VALUES {}", table, column_list, groups.join(", "))
}

/// How many rows fit in one statement without exceeding [`MAX_BIND_PARAMS`].
pub fn rows_per_statement(column_count: usize) -> usize {
    if column_count == 0 {
        return 1;
    }
    (MAX_BIND_PARAMS / column_count).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn builds_single_row_insert_with_question_marks() {
        let sql = insert_statement(EngineKind::Sqlite, "users", &cols(&["id", "name"]), 1, Placeholder::Question, None);
        assert_eq!(sql, r#"INSERT INTO users ("id", "name") VALUES (?, ?)"#);
    }

    #[test]
    fn builds_multi_row_insert_with_numbered_casts() {
        let casts = vec![Some("integer".to_string()), None];
        let sql = insert_statement(
            EngineKind::Postgres,
            "t",
            &cols(&["a", "b"]),
            2,
            Placeholder::Numbered,
            Some(&casts),
        );
        assert_eq!(
            sql,
            r#"INSERT INTO t ("a", "b") VALUES (CAST($1 AS integer), $2), (CAST($3 AS integer), $4)"#
        );
    }

    #[test]
    fn mysql_uses_backticks() {
        let sql = insert_statement(EngineKind::MySql, "t", &cols(&["order"]), 2, Placeholder::Question, None);
        assert_eq!(sql, "INSERT INTO t (`order`) VALUES (?), (?)");
    }

    #[test]
    fn statement_size_respects_bind_limit() {
        assert_eq!(rows_per_statement(1), MAX_BIND_PARAMS);
        assert_eq!(rows_per_statement(100), 655);
        assert_eq!(rows_per_statement(70_000), 1);
    }
}
