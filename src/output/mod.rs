//! Tabular output
//!
//! [`flatten`] turns a match's stored documents into one [`schema::Row`];
//! [`csv`] writes rows; [`export`] ties both to the store layout.
//! [`report`] checks which required documents each stored match has.

pub mod csv;
pub mod export;
pub mod flatten;
pub mod report;
pub mod schema;

pub use self::csv::CsvRowWriter;
pub use export::{CsvExporter, ExportReport, ExportedFile};
pub use flatten::{flatten_documents, FlattenError, Flattener, MatchDocuments};
pub use report::{CompletenessReport, Tally, DEFAULT_REQUIRED};
pub use schema::{CellValue, Column, ColumnType, Row, COLUMNS};

use crate::store::StoreError;

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV write error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Buffer flush error
    #[error("flush error: {0}")]
    FlushError(String),

    /// Store could not be read
    #[error(transparent)]
    Store(#[from] StoreError),

    /// No documents stored for the requested match
    #[error("match {0} not found in store")]
    UnknownMatch(u64),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Generic output writer trait
pub trait OutputWriter {
    /// Flush any buffered data to disk
    fn flush(&mut self) -> OutputResult<()>;

    /// Close the writer and finalize output
    fn close(self) -> OutputResult<()>;
}

/// Trait for writing flattened match rows
pub trait RowWriter: OutputWriter {
    /// Write one row; `false` when it was dropped as a duplicate
    fn write_row(&mut self, row: &Row) -> OutputResult<bool>;

    /// Write several rows, returning how many were kept
    fn write_rows(&mut self, rows: &[Row]) -> OutputResult<u64> {
        let mut kept = 0;
        for row in rows {
            if self.write_row(row)? {
                kept += 1;
            }
        }
        Ok(kept)
    }
}
