//! Schema Inference - engine-native column types from a bounded CSV sample

use crate::adapter::{ColumnTypeMap, LogicalType};
use crate::ingestion::column_mapping::{ColumnMapper, MappingOutcome};
use crate::ingestion::csv_reader::{CsvSample, PrimitiveKind};
use serde::Serialize;
use std::collections::HashSet;

/// Rows read for inference unless the request says otherwise.
pub const DEFAULT_SAMPLE_ROWS: usize = 100;

/// Integer columns with one of these names (case-insensitive) may become the
/// generated primary key.
pub const PRIMARY_KEY_NAMES: [&str; 3] = ["id", "pk", "primary_key"];

const INT_SMALL_MAX: u64 = 127;
const INT_MEDIUM_MAX: u64 = 32_767;
const INT_LARGE_MAX: u64 = 2_147_483_647;

const STRING_SMALL_MAX: usize = 50;
const STRING_MEDIUM_MAX: usize = 255;
const STRING_LARGE_MAX: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferredColumn {
    pub source_name: String,
    pub cleaned_name: String,
    pub logical_type: LogicalType,
    pub engine_type: String,
    pub is_candidate_primary_key: bool,
    pub kind: PrimitiveKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferredSchema {
    pub table_name: String,
    pub columns: Vec<InferredColumn>,
}

impl InferredSchema {
    pub fn column(&self, cleaned_name: &str) -> Option<&InferredColumn> {
        self.columns.iter().find(|c| c.cleaned_name == cleaned_name)
    }

    /// CSV field → generated column, one pair per field, for tables created
    /// from this schema.
    pub fn column_mapping(&self, headers: &[String]) -> MappingOutcome {
        let columns: Vec<String> = self.columns.iter().map(|c| c.cleaned_name.clone()).collect();
        ColumnMapper::positional(headers, &columns)
    }
}

/// Proposes one engine type per CSV column.
pub struct TypeInferencer {
    type_map: ColumnTypeMap,
}

impl TypeInferencer {
    pub fn new(type_map: ColumnTypeMap) -> Self {
        Self { type_map }
    }

    pub fn infer(&self, table_name: &str, sample: &CsvSample) -> InferredSchema {
        let names = unique_column_names(&sample.headers);
        let mut has_primary_key = false;

        let columns = sample
            .headers
            .iter()
            .zip(names)
            .enumerate()
            .map(|(idx, (source_name, cleaned_name))| {
                let cells = sample.column(idx);
                let kind = sample.kind_of(idx);
                let mut logical_type = classify(source_name, kind, &cells);

                // Only one generated key per table.
                if logical_type == LogicalType::AutoIncrementPk {
                    if has_primary_key {
                        logical_type = integer_width(max_magnitude(&cells));
                    }
                    has_primary_key = true;
                }

                InferredColumn {
                    source_name: source_name.clone(),
                    cleaned_name,
                    logical_type,
                    engine_type: self.type_map.native(logical_type).to_string(),
                    is_candidate_primary_key: logical_type == LogicalType::AutoIncrementPk,
                    kind,
                }
            })
            .collect();

        InferredSchema {
            table_name: table_name.to_string(),
            columns,
        }
    }
}

/// Logical type for one column given its name, sampled kind and cells.
pub fn classify(name: &str, kind: PrimitiveKind, cells: &[Option<&str>]) -> LogicalType {
    match kind {
        PrimitiveKind::Empty => LogicalType::StringMedium,
        PrimitiveKind::Integer => {
            if is_primary_key_candidate(name, cells) {
                LogicalType::AutoIncrementPk
            } else {
                integer_width(max_magnitude(cells))
            }
        }
        PrimitiveKind::Float => LogicalType::Float,
        PrimitiveKind::Boolean => LogicalType::Bool,
        PrimitiveKind::String => {
            let longest = cells.iter().flatten().map(|c| c.chars().count()).max().unwrap_or(0);
            string_width(longest)
        }
    }
}

/// Named like a key, no nulls, every value ≥ 1 and distinct.
fn is_primary_key_candidate(name: &str, cells: &[Option<&str>]) -> bool {
    if !PRIMARY_KEY_NAMES.iter().any(|k| name.trim().eq_ignore_ascii_case(k)) {
        return false;
    }
    let mut seen = HashSet::new();
    !cells.is_empty()
        && cells.iter().all(|cell| {
            cell.and_then(|c| c.parse::<i64>().ok())
                .map_or(false, |v| v >= 1 && seen.insert(v))
        })
}

fn max_magnitude(cells: &[Option<&str>]) -> u64 {
    cells
        .iter()
        .flatten()
        .filter_map(|c| c.parse::<i64>().ok())
        .map(i64::unsigned_abs)
        .max()
        .unwrap_or(0)
}

/// Smallest integer type holding `magnitude`.
pub fn integer_width(magnitude: u64) -> LogicalType {
    if magnitude <= INT_SMALL_MAX {
        LogicalType::IntSmall
    } else if magnitude <= INT_MEDIUM_MAX {
        LogicalType::IntMedium
    } else if magnitude <= INT_LARGE_MAX {
        LogicalType::IntLarge
    } else {
        LogicalType::IntXlarge
    }
}

/// Smallest string type holding `length` characters.
pub fn string_width(length: usize) -> LogicalType {
    if length <= STRING_SMALL_MAX {
        LogicalType::StringSmall
    } else if length <= STRING_MEDIUM_MAX {
        LogicalType::StringMedium
    } else if length <= STRING_LARGE_MAX {
        LogicalType::StringLarge
    } else {
        LogicalType::Text
    }
}

/// Trim, turn spaces and hyphens into `_`, drop anything that is neither
/// alphanumeric nor `_`.
pub fn sanitize_column_name(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

/// Sanitized names made usable as DDL identifiers: empty names become
/// `column_<n>` (1-based) and repeats get `_2`, `_3`, ... suffixes.
pub fn unique_column_names(headers: &[String]) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    headers
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            let mut base = sanitize_column_name(header);
            if base.is_empty() {
                base = format!("column_{}", idx + 1);
            }
            let mut name = base.clone();
            let mut suffix = 2;
            while !taken.insert(name.to_lowercase()) {
                name = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            name
        })
        .collect()
}
