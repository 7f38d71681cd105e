//! Logical column types and their per-engine native spellings

use crate::config::EngineKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Engine-independent type category chosen by schema inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalType {
    IntSmall,
    IntMedium,
    IntLarge,
    IntXlarge,
    Float,
    Bool,
    StringSmall,
    StringMedium,
    StringLarge,
    Text,
    AutoIncrementPk,
}

impl LogicalType {
    pub const ALL: [LogicalType; 11] = [
        LogicalType::IntSmall,
        LogicalType::IntMedium,
        LogicalType::IntLarge,
        LogicalType::IntXlarge,
        LogicalType::Float,
        LogicalType::Bool,
        LogicalType::StringSmall,
        LogicalType::StringMedium,
        LogicalType::StringLarge,
        LogicalType::Text,
        LogicalType::AutoIncrementPk,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            LogicalType::IntSmall => "int_small",
            LogicalType::IntMedium => "int_medium",
            LogicalType::IntLarge => "int_large",
            LogicalType::IntXlarge => "int_xlarge",
            LogicalType::Float => "float",
            LogicalType::Bool => "bool",
            LogicalType::StringSmall => "string_small",
            LogicalType::StringMedium => "string_medium",
            LogicalType::StringLarge => "string_large",
            LogicalType::Text => "text",
            LogicalType::AutoIncrementPk => "auto_increment_pk",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Logical type → engine-native type string. Every tag is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnTypeMap {
    engine: EngineKind,
    native: [&'static str; 11],
}

impl ColumnTypeMap {
    pub fn for_engine(engine: EngineKind) -> Self {
        // Order follows `LogicalType::ALL`.
        let native = match engine {
            EngineKind::MySql => [
                "TINYINT",
                "SMALLINT",
                "INT",
                "BIGINT",
                "DECIMAL(10,2)",
                "BOOLEAN",
                "VARCHAR(50)",
                "VARCHAR(255)",
                "VARCHAR(1000)",
                "TEXT",
                "INT AUTO_INCREMENT PRIMARY KEY",
            ],
            EngineKind::Postgres => [
                "SMALLINT",
                "INTEGER",
                "INTEGER",
                "BIGINT",
                "DECIMAL(10,2)",
                "BOOLEAN",
                "VARCHAR(50)",
                "VARCHAR(255)",
                "VARCHAR(1000)",
                "TEXT",
                "SERIAL PRIMARY KEY",
            ],
            EngineKind::Sqlite => [
                "INTEGER",
                "INTEGER",
                "INTEGER",
                "INTEGER",
                "REAL",
                "INTEGER",
                "TEXT",
                "TEXT",
                "TEXT",
                "TEXT",
                "INTEGER PRIMARY KEY AUTOINCREMENT",
            ],
            // No AUTO_INCREMENT in DuckDB.
            EngineKind::DuckDb => [
                "TINYINT",
                "SMALLINT",
                "INTEGER",
                "BIGINT",
                "DOUBLE",
                "BOOLEAN",
                "VARCHAR",
                "VARCHAR",
                "VARCHAR",
                "VARCHAR",
                "INTEGER PRIMARY KEY",
            ],
        };
        Self { engine, native }
    }

    pub fn engine(&self) -> EngineKind {
        self.engine
    }

    pub fn native(&self, logical: LogicalType) -> &'static str {
        self.native[logical as usize]
    }

    /// Lookup by textual tag (`"int_small"`, ...).
    pub fn get(&self, tag: &str) -> Option<&'static str> {
        LogicalType::from_tag(tag).map(|t| self.native(t))
    }

    pub fn iter(&self) -> impl Iterator<Item = (LogicalType, &'static str)> + '_ {
        LogicalType::ALL.into_iter().map(move |t| (t, self.native(t)))
    }
}
