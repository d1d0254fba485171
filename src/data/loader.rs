//! CSV Data Loader Module
//! Reads a CSV file into generic records and checks header columns using Polars.

use polars::prelude::*;
use serde_json::{Map, Number, Value};
use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

/// Data rows read alongside the header when only column names are needed.
const HEADER_SAMPLE_ROWS: usize = 1;

/// One row of the source file, keyed by column name in header order.
pub type Record = Map<String, Value>;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to open file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Not a regular file: {}", .0.display())]
    NotAFile(PathBuf),
    #[error("Failed to load CSV: {0}")]
    CsvError(#[from] PolarsError),
}

/// Receives read failures that the absorbing operations swallow.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, path: &Path, error: &LoaderError);
}

/// Default sink: one `tracing` error event per failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, path: &Path, err: &LoaderError) {
        error!(path = %path.display(), error = %err, "Error reading CSV file");
    }
}

/// Loads records and header names from a single CSV file.
///
/// Every call re-reads the file; nothing is cached between calls.
#[derive(Clone)]
pub struct DataLoader {
    data_path: PathBuf,
    sink: Arc<dyn DiagnosticSink>,
}

impl fmt::Debug for DataLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataLoader")
            .field("data_path", &self.data_path)
            .finish_non_exhaustive()
    }
}

impl DataLoader {
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self::with_sink(data_path, Arc::new(TracingSink))
    }

    /// Build a loader that reports failures to `sink` instead of the log.
    pub fn with_sink(data_path: impl Into<PathBuf>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            data_path: data_path.into(),
            sink,
        }
    }

    /// Get file path.
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Load every row as a record, in file order.
    ///
    /// Read failures are reported to the diagnostic sink and yield an empty vector,
    /// so an empty result does not tell an empty file apart from a failed read.
    /// Use [`DataLoader::try_load_all_records`] when that matters.
    pub fn load_all_records(&self) -> Vec<Record> {
        self.try_load_all_records().unwrap_or_else(|err| {
            self.sink.report(&self.data_path, &err);
            Vec::new()
        })
    }

    /// Check that every name in `required_columns` appears in the header.
    ///
    /// Read failures are reported to the diagnostic sink and yield `false`.
    pub fn validate_columns<S: AsRef<str>>(&self, required_columns: &[S]) -> bool {
        self.try_validate_columns(required_columns)
            .unwrap_or_else(|err| {
                self.sink.report(&self.data_path, &err);
                false
            })
    }

    pub fn try_load_all_records(&self) -> Result<Vec<Record>, LoaderError> {
        let Some(df) = self.read_frame(None)? else {
            return Ok(Vec::new());
        };
        debug!(
            path = %self.data_path.display(),
            rows = df.height(),
            columns = df.width(),
            "Loaded CSV"
        );
        Ok(frame_to_records(&df))
    }

    /// Header names of the file, read from the header and a single data row.
    ///
    /// Polars de-duplicates repeated header names, so a header `a,a` yields
    /// `a` and `a_duplicated_0`.
    pub fn try_columns(&self) -> Result<HashSet<String>, LoaderError> {
        let columns = self
            .read_frame(Some(HEADER_SAMPLE_ROWS))?
            .map(|df| {
                df.get_column_names()
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default();
        Ok(columns)
    }

    pub fn try_validate_columns<S: AsRef<str>>(
        &self,
        required_columns: &[S],
    ) -> Result<bool, LoaderError> {
        let actual = self.try_columns()?;
        let missing: Vec<&str> = required_columns
            .iter()
            .map(|name| name.as_ref())
            .filter(|name| !actual.contains(*name))
            .collect();
        if !missing.is_empty() {
            debug!(path = %self.data_path.display(), ?missing, "Required columns missing");
        }
        Ok(missing.is_empty())
    }

    /// Read the file with Polars.
    ///
    /// A file with nothing but whitespace has no header and reads as `None`.
    /// With `n_rows` unset every row feeds schema inference, so a late float in an
    /// integer-looking column still parses.
    fn read_frame(&self, n_rows: Option<usize>) -> Result<Option<DataFrame>, LoaderError> {
        let metadata = fs::metadata(&self.data_path)?;
        if !metadata.is_file() {
            return Err(LoaderError::NotAFile(self.data_path.clone()));
        }
        if metadata.len() == 0 || !has_content(&self.data_path)? {
            return Ok(None);
        }

        let df = LazyCsvReader::new(&self.data_path)
            .with_has_header(true)
            .with_infer_schema_length(n_rows)
            .with_n_rows(n_rows)
            .finish()?
            .collect()?;

        Ok(Some(df))
    }
}

/// True once a non-whitespace byte is found.
fn has_content(path: &Path) -> std::io::Result<bool> {
    for byte in BufReader::new(File::open(path)?).bytes() {
        if !byte?.is_ascii_whitespace() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Turn a column-oriented frame into one record per row.
fn frame_to_records(df: &DataFrame) -> Vec<Record> {
    let mut records: Vec<Record> = (0..df.height())
        .map(|_| Record::with_capacity(df.width()))
        .collect();

    for column in df.get_columns() {
        let name = column.name().to_string();
        // The parallel reader hands back multi-chunk columns; `iter` needs one chunk.
        let series = column.as_materialized_series().rechunk();
        for (record, cell) in records.iter_mut().zip(series.iter()) {
            record.insert(name.clone(), cell_to_value(cell));
        }
    }

    records
}

fn cell_to_value(cell: AnyValue) -> Value {
    match cell {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(b),
        AnyValue::String(s) => Value::String(s.to_string()),
        AnyValue::StringOwned(s) => Value::String(s.to_string()),
        AnyValue::Int8(v) => Value::from(v),
        AnyValue::Int16(v) => Value::from(v),
        AnyValue::Int32(v) => Value::from(v),
        AnyValue::Int64(v) => Value::from(v),
        AnyValue::UInt8(v) => Value::from(v),
        AnyValue::UInt16(v) => Value::from(v),
        AnyValue::UInt32(v) => Value::from(v),
        AnyValue::UInt64(v) => Value::from(v),
        AnyValue::Float32(v) => float_to_value(f64::from(v)),
        AnyValue::Float64(v) => float_to_value(v),
        other => Value::String(other.to_string().trim_matches('"').to_string()),
    }
}

// JSON has no NaN or infinity.
fn float_to_value(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}
