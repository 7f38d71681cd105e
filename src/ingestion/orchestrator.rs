//! CSV import pipeline
//!
//! Drives one import through its stages:
//! `Start → SampleRead → TableCheck → [CreateTable] → ColumnMapping → Streaming → Done`,
//! ending in `Failed` or `Cancelled` when a stage stops it.
//!
//! Nothing touches the database before the request and the CSV sample have
//! been validated. Streaming is chunked: each chunk is one `BulkLoader::append`
//! and commits on its own, so a failure in chunk N leaves chunks 1..N-1 in
//! the table.

use crate::adapter::DatabaseAdapter;
use crate::error::{DbCliError, Result};
use crate::ingestion::column_mapping::{ColumnMapper, MappingOutcome};
use crate::ingestion::confirmation::{AutoApprove, ConfirmationPolicy, ProposedAction};
use crate::ingestion::csv_reader::{normalize_cell, CsvChunkReader, CsvSample, PrimitiveKind};
use crate::ingestion::schema_inference::TypeInferencer;
use crate::ingestion::table_builder::create_table_sql;
use crate::ingestion::{ImportRequest, ImportResult, ImportStage, ImportStatus, ProgressEvent};
use crate::value::Scalar;
use csv::StringRecord;
use std::time::Instant;
use tracing::{debug, info, warn};

type ProgressCallback<'a> = Box<dyn FnMut(&ProgressEvent) + 'a>;

/// How a pipeline run ended when it did not fail.
enum Completion {
    Done,
    Cancelled(String),
}

/// Bookkeeping that survives a failed run so the result can report it.
#[derive(Default)]
struct ImportStats {
    stage: Option<ImportStage>,
    table_created: bool,
    ddl: Option<String>,
    unmapped: Vec<String>,
    total_rows: u64,
    chunks: usize,
    elapsed_seconds: f64,
}

impl ImportStats {
    fn enter(&mut self, stage: ImportStage, table: &str) {
        debug!(table, stage = %stage, "import stage");
        self.stage = Some(stage);
    }

    fn rows_per_second(&self) -> f64 {
        if self.elapsed_seconds > 0.0 {
            self.total_rows as f64 / self.elapsed_seconds
        } else {
            0.0
        }
    }
}

/// Imports CSV files through a borrowed adapter.
pub struct CsvImportPipeline<'a> {
    adapter: &'a mut dyn DatabaseAdapter,
    confirmation: Box<dyn ConfirmationPolicy + 'a>,
    progress: Option<ProgressCallback<'a>>,
}

impl<'a> CsvImportPipeline<'a> {
    /// Pipeline that approves every proposed action and reports progress to
    /// the log only.
    pub fn new(adapter: &'a mut dyn DatabaseAdapter) -> Self {
        Self {
            adapter,
            confirmation: Box::new(AutoApprove),
            progress: None,
        }
    }

    /// Consulted by interactive requests before creating a table or
    /// accepting a partial mapping.
    pub fn with_confirmation(mut self, policy: impl ConfirmationPolicy + 'a) -> Self {
        self.confirmation = Box::new(policy);
        self
    }

    /// Called after every committed chunk.
    pub fn with_progress(mut self, callback: impl FnMut(&ProgressEvent) + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Run one import. Never panics; every failure is reported in the result.
    pub fn import(&mut self, request: &ImportRequest) -> ImportResult {
        let mut stats = ImportStats::default();
        stats.enter(ImportStage::Start, &request.table_name);

        let (status, message, error) = match self.run(request, &mut stats) {
            Ok(Completion::Done) => {
                stats.enter(ImportStage::Done, &request.table_name);
                info!(
                    table = %request.table_name,
                    rows = stats.total_rows,
                    chunks = stats.chunks,
                    elapsed = stats.elapsed_seconds,
                    "import complete"
                );
                let message = format!(
                    "Imported {} row(s) into '{}' in {:.2}s ({:.0} rows/s)",
                    stats.total_rows,
                    request.table_name,
                    stats.elapsed_seconds,
                    stats.rows_per_second()
                );
                (ImportStatus::Success, message, None)
            }
            Ok(Completion::Cancelled(reason)) => {
                stats.enter(ImportStage::Cancelled, &request.table_name);
                info!(table = %request.table_name, %reason, "import cancelled");
                (ImportStatus::Cancelled, reason, None)
            }
            Err(err) => {
                let failed_at = stats.stage.unwrap_or(ImportStage::Start);
                stats.enter(ImportStage::Failed, &request.table_name);
                warn!(table = %request.table_name, stage = %failed_at, error = %err, "import failed");
                (ImportStatus::Failed, err.to_string(), Some(err))
            }
        };

        let rows_per_second = stats.rows_per_second();
        ImportResult {
            status,
            total_rows: stats.total_rows,
            chunks: stats.chunks,
            elapsed_seconds: stats.elapsed_seconds,
            rows_per_second,
            table_created: stats.table_created,
            ddl: stats.ddl,
            unmapped_columns: stats.unmapped,
            message,
            error,
        }
    }

    fn run(&mut self, request: &ImportRequest, stats: &mut ImportStats) -> Result<Completion> {
        let table = request.table_name.as_str();
        validate_request(request)?;

        // Step 1: Typed sample, read before touching the database
        stats.enter(ImportStage::SampleRead, table);
        let sample = CsvSample::read(&request.csv_path, request.sample_rows)?;
        debug!(table, headers = sample.headers.len(), rows = sample.len(), "sample read");

        // Step 2: Table check
        stats.enter(ImportStage::TableCheck, table);
        self.adapter.ensure_connected()?;
        let exists = self.adapter.table_exists(table)?;
        if !exists && !request.create_table_if_missing {
            return Err(DbCliError::Validation(format!(
                "Table '{}' does not exist; pass --create-table to create it from the CSV",
                table
            )));
        }

        // Step 3: Create the table from the inferred schema
        let mut created_mapping: Option<MappingOutcome> = None;
        if !exists {
            stats.enter(ImportStage::CreateTable, table);
            let schema = TypeInferencer::new(self.adapter.column_type_map()).infer(table, &sample);
            let ddl = create_table_sql(self.adapter.engine(), &schema);

            if request.interactive {
                let action = ProposedAction::CreateTable {
                    table: table.to_string(),
                    ddl: ddl.clone(),
                };
                if !self.confirmation.approve(&action) {
                    return Ok(Completion::Cancelled(format!(
                        "Creation of table '{}' was declined",
                        table
                    )));
                }
            }

            self.adapter.query(&ddl, &[])?;
            info!(table, engine = %self.adapter.engine(), columns = schema.columns.len(), "created table");
            stats.table_created = true;
            stats.ddl = Some(ddl);
            created_mapping = Some(schema.column_mapping(&sample.headers));
        }

        // Step 4: Column mapping
        stats.enter(ImportStage::ColumnMapping, table);
        let live = self.adapter.table_column_names(table)?;
        let outcome = match (&request.column_mapping, created_mapping) {
            (Some(explicit), _) => ColumnMapper::explicit(&sample.headers, explicit)?,
            (None, Some(generated)) => generated,
            (None, None) => ColumnMapper::auto_map(&sample.headers, &live),
        };
        outcome.mapping.validate(&live)?;
        if outcome.mapping.is_empty() {
            return Err(DbCliError::Validation(format!(
                "No CSV columns match the columns of '{}' (CSV: {}; table: {})",
                table,
                sample.headers.join(", "),
                live.join(", ")
            )));
        }
        stats.unmapped = outcome.unmapped.clone();

        if outcome.is_partial() && request.column_mapping.is_none() {
            warn!(table, unmapped = ?outcome.unmapped, "CSV columns without a table column");
            if !self.approve_partial(request, &outcome, &live) {
                return Ok(Completion::Cancelled(format!(
                    "Import cancelled: {} CSV column(s) could not be mapped ({})",
                    outcome.unmapped.len(),
                    outcome.unmapped.join(", ")
                )));
            }
        }

        // Step 5: Stream the file chunk by chunk
        stats.enter(ImportStage::Streaming, table);
        let plan = StreamPlan::new(&sample, &outcome);
        stream_chunks(&mut *self.adapter, &mut self.progress, request, &plan, stats)?;
        Ok(Completion::Done)
    }

    fn approve_partial(&mut self, request: &ImportRequest, outcome: &MappingOutcome, live: &[String]) -> bool {
        if !request.interactive {
            return request.allow_partial_mapping;
        }
        let action = ProposedAction::PartialMapping {
            table: request.table_name.clone(),
            mapped: outcome.mapping.pairs().to_vec(),
            unmapped: outcome.unmapped.clone(),
            available: live.to_vec(),
        };
        self.confirmation.approve(&action)
    }
}

fn validate_request(request: &ImportRequest) -> Result<()> {
    if request.table_name.trim().is_empty() {
        return Err(DbCliError::Validation("table name must not be empty".to_string()));
    }
    if request.chunk_size == 0 {
        return Err(DbCliError::Validation("chunk size must be greater than 0".to_string()));
    }
    if request.sample_rows == 0 {
        return Err(DbCliError::Validation("sample size must be greater than 0".to_string()));
    }
    if !request.csv_path.is_file() {
        return Err(DbCliError::Validation(format!(
            "CSV file not found: {}",
            request.csv_path.display()
        )));
    }
    Ok(())
}

/// Which CSV field feeds each target column, and how to coerce it.
struct StreamPlan {
    columns: Vec<String>,
    sources: Vec<(usize, PrimitiveKind)>,
}

impl StreamPlan {
    fn new(sample: &CsvSample, outcome: &MappingOutcome) -> Self {
        let (columns, sources) = outcome
            .targets()
            .map(|(idx, column)| (column.to_string(), (idx, sample.kind_of(idx))))
            .unzip();
        Self { columns, sources }
    }

    fn convert(&self, records: &[StringRecord]) -> Vec<Vec<Scalar>> {
        records
            .iter()
            .map(|record| {
                self.sources
                    .iter()
                    .map(|(idx, kind)| {
                        record
                            .get(*idx)
                            .and_then(normalize_cell)
                            .map_or(Scalar::Null, |cell| kind.coerce(cell))
                    })
                    .collect()
            })
            .collect()
    }
}

fn stream_chunks(
    adapter: &mut dyn DatabaseAdapter,
    progress: &mut Option<ProgressCallback<'_>>,
    request: &ImportRequest,
    plan: &StreamPlan,
    stats: &mut ImportStats,
) -> Result<()> {
    let table = request.table_name.as_str();
    let reader = CsvChunkReader::open(&request.csv_path, request.chunk_size)?;
    let started = Instant::now();

    let mut loader = adapter.bulk_loader(table, &plan.columns)?;
    debug!(table, columns = plan.columns.len(), chunk_size = request.chunk_size, "bulk loader opened");

    for chunk in reader {
        let chunk_index = stats.chunks + 1;
        let committed = chunk
            .map(|records| plan.convert(&records))
            .and_then(|rows| loader.append(&rows).map(|inserted| (rows.len() as u64, inserted)));

        let (row_count, inserted) = committed.map_err(|source| DbCliError::PartialImport {
            table: table.to_string(),
            chunk: chunk_index,
            rows_committed: stats.total_rows,
            source: Box::new(source),
        })?;

        stats.total_rows += row_count;
        stats.chunks = chunk_index;
        stats.elapsed_seconds = started.elapsed().as_secs_f64();

        let event = ProgressEvent {
            chunk_index,
            rows_so_far: stats.total_rows,
            elapsed_seconds: stats.elapsed_seconds,
            rows_per_second: stats.rows_per_second(),
        };
        info!(
            table,
            chunk = event.chunk_index,
            rows = event.rows_so_far,
            inserted,
            rows_per_second = event.rows_per_second,
            "chunk committed"
        );
        if let Some(callback) = progress.as_mut() {
            callback(&event);
        }
    }

    drop(loader);
    debug!(table, "bulk loader released");
    stats.elapsed_seconds = started.elapsed().as_secs_f64();
    Ok(())
}
