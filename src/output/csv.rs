//! CSV row writer

use csv::Writer;
use std::collections::HashSet;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::schema::{header, Row};
use super::{OutputError, OutputResult, OutputWriter, RowWriter};

const DEFAULT_BUFFER_SIZE: usize = 8192; // 8KB buffer

/// CSV writer for flattened match rows
///
/// Rows go to a temp file next to the destination, which replaces the
/// destination only on [`OutputWriter::close`]. An interrupted export leaves
/// the previous file intact. The header is written on creation, so a file
/// with no rows still has the full schema. Records are deduplicated by key;
/// the first record seen for a key wins.
pub struct CsvRowWriter {
    path: PathBuf,
    writer: Writer<BufWriter<NamedTempFile>>,
    rows_written: u64,
    seen_ids: HashSet<i64>,
    duplicates_skipped: u64,
}

impl CsvRowWriter {
    /// Create a match-row writer at `path`, creating parent directories.
    pub fn new<P: AsRef<Path>>(path: P) -> OutputResult<Self> {
        Self::new_with_buffer_size(path, DEFAULT_BUFFER_SIZE)
    }

    /// Create a match-row writer with a custom buffer size in bytes.
    pub fn new_with_buffer_size<P: AsRef<Path>>(
        path: P,
        buffer_size: usize,
    ) -> OutputResult<Self> {
        Self::open(path.as_ref(), &header(), buffer_size)
    }

    /// Create a writer for records with their own `columns`.
    pub fn with_header<P: AsRef<Path>>(path: P, columns: &[&str]) -> OutputResult<Self> {
        Self::open(path.as_ref(), columns, DEFAULT_BUFFER_SIZE)
    }

    fn open(path: &Path, columns: &[&str], buffer_size: usize) -> OutputResult<Self> {
        info!(path = %path.display(), "Creating CSV writer");

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)
            .map_err(|e| OutputError::IoError(format!("Failed to create directory: {}", e)))?;

        let file = NamedTempFile::new_in(parent)
            .map_err(|e| OutputError::IoError(format!("Failed to create temp file: {}", e)))?;

        let mut writer = Writer::from_writer(BufWriter::with_capacity(buffer_size, file));
        writer
            .write_record(columns)
            .map_err(|e| OutputError::CsvError(format!("Failed to write header: {}", e)))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            rows_written: 0,
            seen_ids: HashSet::new(),
            duplicates_skipped: 0,
        })
    }

    /// Output path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written so far
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Rows dropped as duplicates
    pub fn duplicates_skipped(&self) -> u64 {
        self.duplicates_skipped
    }

    /// Write one record; `false` when `key` was already written.
    pub fn write_record<I, F>(&mut self, key: Option<i64>, fields: I) -> OutputResult<bool>
    where
        I: IntoIterator<Item = F>,
        F: AsRef<[u8]>,
    {
        if let Some(id) = key {
            if !self.seen_ids.insert(id) {
                self.duplicates_skipped += 1;
                debug!(key = id, "Skipping duplicate row");
                return Ok(false);
            }
        }

        self.writer
            .write_record(fields)
            .map_err(|e| OutputError::CsvError(format!("Failed to write row: {}", e)))?;
        self.rows_written += 1;

        // Flush periodically (every 1000 rows)
        if self.rows_written % 1000 == 0 {
            self.flush()?;
            debug!(rows = self.rows_written, "CSV progress");
        }

        Ok(true)
    }
}

impl RowWriter for CsvRowWriter {
    fn write_row(&mut self, row: &Row) -> OutputResult<bool> {
        self.write_record(row.match_id(), row.to_record())
    }
}

impl OutputWriter for CsvRowWriter {
    fn flush(&mut self) -> OutputResult<()> {
        self.writer
            .flush()
            .map_err(|e| OutputError::FlushError(format!("Failed to flush: {}", e)))
    }

    fn close(mut self) -> OutputResult<()> {
        self.flush()?;

        let buf_writer = self.writer.into_inner().map_err(|e| {
            OutputError::IoError(format!("Failed to get inner writer: {}", e))
        })?;
        let mut file = buf_writer.into_inner().map_err(|e| {
            OutputError::IoError(format!("Failed to get file handle: {}", e))
        })?;
        file.flush()
            .map_err(|e| OutputError::FlushError(format!("Failed to flush: {}", e)))?;
        file.as_file()
            .sync_all()
            .map_err(|e| OutputError::IoError(format!("Failed to sync file: {}", e)))?;
        file.persist(&self.path).map_err(|e| {
            OutputError::IoError(format!("Failed to persist {}: {}", self.path.display(), e))
        })?;

        info!(
            path = %self.path.display(),
            rows = self.rows_written,
            duplicates = self.duplicates_skipped,
            "CSV writer closed"
        );
        Ok(())
    }
}
