//! Table Builder - CREATE TABLE statements from an inferred schema

use crate::config::EngineKind;
use crate::ingestion::schema_inference::InferredSchema;

/// DDL for `schema`. Column names are quoted for `engine`; the table name is
/// used as given so it may carry a schema prefix.
pub fn create_table_sql(engine: EngineKind, schema: &InferredSchema) -> String {
    let columns = schema
        .columns
        .iter()
        .map(|column| format!("  {} {}", engine.quote_identifier(&column.cleaned_name), column.engine_type))
        .collect::<Vec<_>>()
        .join(",\n");
    format!("CREATE TABLE {} (\n{}\n)", schema.table_name, columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::LogicalType;
    use crate::ingestion::csv_reader::PrimitiveKind;
    use crate::ingestion::schema_inference::InferredColumn;

    fn column(name: &str, logical_type: LogicalType, engine_type: &str) -> InferredColumn {
        InferredColumn {
            source_name: name.to_string(),
            cleaned_name: name.to_string(),
            logical_type,
            engine_type: engine_type.to_string(),
            is_candidate_primary_key: logical_type == LogicalType::AutoIncrementPk,
            kind: PrimitiveKind::Integer,
        }
    }

    #[test]
    fn quotes_columns_per_engine() {
        let schema = InferredSchema {
            table_name: "orders".to_string(),
            columns: vec![
                column("id", LogicalType::AutoIncrementPk, "INT AUTO_INCREMENT PRIMARY KEY"),
                column("order", LogicalType::IntSmall, "TINYINT"),
            ],
        };
        assert_eq!(
            create_table_sql(EngineKind::MySql, &schema),
            "CREATE TABLE orders (\n  `id` INT AUTO_INCREMENT PRIMARY KEY,\n  `order` TINYINT\n)"
        );
        assert!(create_table_sql(EngineKind::Postgres, &schema).contains("\"order\" TINYINT"));
    }
}
