pub mod adapter;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod schema;
pub mod value;

pub use adapter::{
    connect_adapter, create_adapter, BulkLoader, ColumnTypeMap, DatabaseAdapter, LogicalType, QueryResult,
    StatementKind,
};
pub use config::{ConnectionParams, EmbeddedParams, EngineKind, NetworkParams};
pub use error::{DbCliError, FailureKind, Result};
pub use ingestion::{
    AutoApprove, ColumnMapper, ColumnMapping, ConfirmationPolicy, CsvImportPipeline, Deny, ImportRequest,
    ImportResult, ImportStatus, ProgressEvent, ProposedAction, TypeInferencer,
};
pub use schema::SchemaInspector;
pub use value::Scalar;
