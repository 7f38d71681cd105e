//! Ingestion Module - CSV to table import
//!
//! Handles loading a CSV file into any supported engine with:
//! - Schema inference from a bounded sample
//! - Optional table creation
//! - Header to column mapping
//! - Chunked streaming inserts with progress reporting

pub mod column_mapping;
pub mod confirmation;
pub mod csv_reader;
pub mod orchestrator;
pub mod schema_inference;
pub mod table_builder;

pub use column_mapping::{ColumnMapper, ColumnMapping, MappingOutcome};
pub use confirmation::{AutoApprove, ConfirmationPolicy, Deny, ProposedAction};
pub use csv_reader::{CsvChunkReader, CsvSample, PrimitiveKind};
pub use orchestrator::CsvImportPipeline;
pub use schema_inference::{InferredColumn, InferredSchema, TypeInferencer};

use crate::error::{DbCliError, FailureKind};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// What to import and how.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImportRequest {
    pub csv_path: PathBuf,
    pub table_name: String,
    /// Replaces automatic mapping when set.
    #[serde(default)]
    pub column_mapping: Option<ColumnMapping>,
    pub chunk_size: usize,
    #[serde(default)]
    pub create_table_if_missing: bool,
    /// Consult the confirmation policy before creating tables or accepting a
    /// partial mapping.
    #[serde(default)]
    pub interactive: bool,
    /// Decides partial mappings for non-interactive requests.
    pub allow_partial_mapping: bool,
    pub sample_rows: usize,
}

impl ImportRequest {
    pub fn new(csv_path: impl Into<PathBuf>, table_name: impl Into<String>) -> Self {
        Self {
            csv_path: csv_path.into(),
            table_name: table_name.into(),
            column_mapping: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            create_table_if_missing: false,
            interactive: false,
            allow_partial_mapping: true,
            sample_rows: schema_inference::DEFAULT_SAMPLE_ROWS,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Success,
    Cancelled,
    Failed,
}

/// Emitted after every committed chunk.
#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
pub struct ProgressEvent {
    /// 1-based.
    pub chunk_index: usize,
    pub rows_so_far: u64,
    pub elapsed_seconds: f64,
    pub rows_per_second: f64,
}

/// Pipeline states, logged on every transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportStage {
    Start,
    SampleRead,
    TableCheck,
    CreateTable,
    ColumnMapping,
    Streaming,
    Done,
    Failed,
    Cancelled,
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImportStage::Start => "start",
            ImportStage::SampleRead => "sample_read",
            ImportStage::TableCheck => "table_check",
            ImportStage::CreateTable => "create_table",
            ImportStage::ColumnMapping => "column_mapping",
            ImportStage::Streaming => "streaming",
            ImportStage::Done => "done",
            ImportStage::Failed => "failed",
            ImportStage::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Outcome of one import. `total_rows` counts committed rows only.
#[derive(Debug, Serialize)]
pub struct ImportResult {
    pub status: ImportStatus,
    pub total_rows: u64,
    pub chunks: usize,
    pub elapsed_seconds: f64,
    pub rows_per_second: f64,
    pub table_created: bool,
    /// DDL that was executed when the table was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ddl: Option<String>,
    pub unmapped_columns: Vec<String>,
    pub message: String,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<DbCliError>,
}

impl ImportResult {
    pub fn is_success(&self) -> bool {
        self.status == ImportStatus::Success
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.error.as_ref().map(DbCliError::kind)
    }
}

#[derive(Serialize)]
struct ErrorReport {
    kind: FailureKind,
    detail: String,
}

fn serialize_error<S: Serializer>(error: &Option<DbCliError>, serializer: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(err) => serializer.serialize_some(&ErrorReport {
            kind: err.kind(),
            detail: err.to_string(),
        }),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults() {
        let request = ImportRequest::new("data.csv", "users");
        assert_eq!(request.chunk_size, 1000);
        assert_eq!(request.sample_rows, 100);
        assert!(request.allow_partial_mapping);
        assert!(!request.create_table_if_missing);
        assert!(!request.interactive);
    }

    #[test]
    fn result_serializes_error_kind() {
        let result = ImportResult {
            status: ImportStatus::Failed,
            total_rows: 0,
            chunks: 0,
            elapsed_seconds: 0.0,
            rows_per_second: 0.0,
            table_created: false,
            ddl: None,
            unmapped_columns: Vec::new(),
            message: "Import failed".to_string(),
            error: Some(DbCliError::Validation("chunk size must be greater than 0".to_string())),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"]["kind"], "validation");
        assert!(json.get("ddl").is_none());
    }
}
