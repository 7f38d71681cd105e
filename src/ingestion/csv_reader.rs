//! CSV access for the import pipeline: a bounded typed sample and a
//! fixed-size chunk reader over the same file.

use crate::error::{DbCliError, Result};
use crate::value::Scalar;
use csv::{Reader, ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// Cell contents read as NULL after trimming.
pub const NULL_TOKENS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Trimmed cell, or `None` for empty and NA-like tokens.
pub fn normalize_cell(raw: &str) -> Option<&str> {
    let cell = raw.trim();
    if NULL_TOKENS.contains(&cell) {
        None
    } else {
        Some(cell)
    }
}

/// Value category shared by every non-null cell of a sampled column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    /// No non-null value seen.
    Empty,
    Integer,
    Float,
    Boolean,
    String,
}

impl PrimitiveKind {
    /// Category of a single non-null cell.
    pub fn of(cell: &str) -> Self {
        if cell.parse::<i64>().is_ok() {
            PrimitiveKind::Integer
        } else if cell.parse::<f64>().map_or(false, f64::is_finite) {
            PrimitiveKind::Float
        } else if parse_bool(cell).is_some() {
            PrimitiveKind::Boolean
        } else {
            PrimitiveKind::String
        }
    }

    /// Narrowest category covering both.
    pub fn merge(self, other: Self) -> Self {
        use PrimitiveKind::*;
        match (self, other) {
            (Empty, kind) | (kind, Empty) => kind,
            (a, b) if a == b => a,
            (Integer, Float) | (Float, Integer) => Float,
            _ => String,
        }
    }

    /// Convert a normalized cell. Cells that do not fit the column's kind
    /// (an outlier past the sample) stay text.
    pub fn coerce(&self, cell: &str) -> Scalar {
        match self {
            PrimitiveKind::Integer => cell
                .parse::<i64>()
                .map(Scalar::Int)
                .unwrap_or_else(|_| Scalar::from(cell)),
            PrimitiveKind::Float => cell
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Scalar::Float)
                .unwrap_or_else(|| Scalar::from(cell)),
            PrimitiveKind::Boolean => parse_bool(cell)
                .map(Scalar::Bool)
                .unwrap_or_else(|| Scalar::from(cell)),
            PrimitiveKind::String | PrimitiveKind::Empty => Scalar::from(cell),
        }
    }
}

fn parse_bool(cell: &str) -> Option<bool> {
    if cell.eq_ignore_ascii_case("true") {
        Some(true)
    } else if cell.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn open_reader(path: &Path) -> Result<Reader<File>> {
    ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(DbCliError::from)
}

fn read_headers(reader: &mut Reader<File>, path: &Path) -> Result<Vec<String>> {
    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(DbCliError::Validation(format!(
            "CSV file has no header row: {}",
            path.display()
        )));
    }
    Ok(headers)
}

/// The header row plus the first `max_rows` records, with cells normalized.
#[derive(Debug, Clone)]
pub struct CsvSample {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl CsvSample {
    pub fn read(path: &Path, max_rows: usize) -> Result<Self> {
        let mut reader = open_reader(path)?;
        let headers = read_headers(&mut reader, path)?;

        let mut rows = Vec::new();
        for record in reader.records().take(max_rows) {
            let record = record?;
            rows.push(
                (0..headers.len())
                    .map(|idx| record.get(idx).and_then(normalize_cell).map(String::from))
                    .collect(),
            );
        }
        Ok(Self { headers, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cells of column `idx` in row order.
    pub fn column(&self, idx: usize) -> Vec<Option<&str>> {
        self.rows
            .iter()
            .map(|row| row.get(idx).and_then(|cell| cell.as_deref()))
            .collect()
    }

    pub fn kind_of(&self, idx: usize) -> PrimitiveKind {
        self.column(idx)
            .into_iter()
            .flatten()
            .fold(PrimitiveKind::Empty, |kind, cell| kind.merge(PrimitiveKind::of(cell)))
    }

    pub fn kinds(&self) -> Vec<PrimitiveKind> {
        (0..self.headers.len()).map(|idx| self.kind_of(idx)).collect()
    }
}

/// Yields the data records of a CSV file in chunks of at most `chunk_size`.
/// Only the current chunk is held in memory.
pub struct CsvChunkReader {
    reader: Reader<File>,
    headers: Vec<String>,
    chunk_size: usize,
    finished: bool,
}

impl CsvChunkReader {
    pub fn open(path: &Path, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(DbCliError::Validation("chunk size must be greater than 0".to_string()));
        }
        let mut reader = open_reader(path)?;
        let headers = read_headers(&mut reader, path)?;
        Ok(Self {
            reader,
            headers,
            chunk_size,
            finished: false,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn read_chunk(&mut self) -> Result<Vec<StringRecord>> {
        let mut chunk = Vec::with_capacity(self.chunk_size);
        let mut record = StringRecord::new();
        while chunk.len() < self.chunk_size {
            if !self.reader.read_record(&mut record)? {
                self.finished = true;
                break;
            }
            chunk.push(record.clone());
        }
        Ok(chunk)
    }
}

impl Iterator for CsvChunkReader {
    type Item = Result<Vec<StringRecord>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_chunk() {
            Ok(chunk) if chunk.is_empty() => None,
            Ok(chunk) => Some(Ok(chunk)),
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn na_tokens_become_null() {
        for token in ["", "  ", "nan", "NaN", "NA", "N/A", "NULL", "null", "None", "#N/A"] {
            assert_eq!(normalize_cell(token), None, "{:?}", token);
        }
        assert_eq!(normalize_cell("  alice "), Some("alice"));
        assert_eq!(normalize_cell("0"), Some("0"));
    }

    #[test]
    fn kinds_widen_across_cells() {
        assert_eq!(PrimitiveKind::of("42"), PrimitiveKind::Integer);
        assert_eq!(PrimitiveKind::of("4.2"), PrimitiveKind::Float);
        assert_eq!(PrimitiveKind::of("TRUE"), PrimitiveKind::Boolean);
        assert_eq!(PrimitiveKind::of("inf"), PrimitiveKind::String);
        assert_eq!(PrimitiveKind::Integer.merge(PrimitiveKind::Float), PrimitiveKind::Float);
        assert_eq!(PrimitiveKind::Boolean.merge(PrimitiveKind::Integer), PrimitiveKind::String);
        assert_eq!(PrimitiveKind::Empty.merge(PrimitiveKind::Boolean), PrimitiveKind::Boolean);
    }

    #[test]
    fn coercion_falls_back_to_text() {
        assert_eq!(PrimitiveKind::Integer.coerce("7"), Scalar::Int(7));
        assert_eq!(PrimitiveKind::Integer.coerce("7x"), Scalar::from("7x"));
        assert_eq!(PrimitiveKind::Float.coerce("3"), Scalar::Float(3.0));
        assert_eq!(PrimitiveKind::Boolean.coerce("False"), Scalar::Bool(false));
    }

    #[test]
    fn sample_is_bounded_and_typed() {
        let file = csv_file("id,name,score\n1,a,1.5\n2,,2\n3,c,NA\n4,d,4\n");
        let sample = CsvSample::read(file.path(), 3).unwrap();
        assert_eq!(sample.headers, vec!["id", "name", "score"]);
        assert_eq!(sample.len(), 3);
        assert_eq!(sample.column(1), vec![Some("a"), None, Some("c")]);
        assert_eq!(
            sample.kinds(),
            vec![PrimitiveKind::Integer, PrimitiveKind::String, PrimitiveKind::Float]
        );
    }

    #[test]
    fn short_records_are_padded_with_nulls() {
        let file = csv_file("a,b\n1\n");
        let sample = CsvSample::read(file.path(), 10).unwrap();
        assert_eq!(sample.rows[0], vec![Some("1".to_string()), None]);
    }

    #[test]
    fn chunk_reader_yields_fixed_size_chunks() {
        let file = csv_file("x\n1\n2\n3\n4\n5\n");
        let reader = CsvChunkReader::open(file.path(), 2).unwrap();
        let sizes: Vec<usize> = reader.map(|chunk| chunk.unwrap().len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn chunk_reader_on_header_only_file_yields_nothing() {
        let file = csv_file("x,y\n");
        let mut reader = CsvChunkReader::open(file.path(), 10).unwrap();
        assert_eq!(reader.headers(), &["x".to_string(), "y".to_string()][..]);
        assert!(reader.next().is_none());
    }

    #[test]
    fn empty_file_has_no_header() {
        let file = csv_file("");
        assert!(matches!(
            CsvSample::read(file.path(), 10),
            Err(DbCliError::Validation(_))
        ));
    }
}
