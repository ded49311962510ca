//! Buffered chunk writing for the tabular issue artifact
//!
//! Issues accumulate in memory and are flushed to the CSV file whenever the
//! buffer reaches the configured threshold, so arbitrarily large exports run
//! in bounded memory. The first flush fixes the header; later flushes append
//! rows only.

use crate::error::Result;
use crate::types::IssueRecord;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;

/// Counters reported once the artifact is finished
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SheetStats {
    /// Data rows written (header excluded)
    pub rows: u64,
    /// Flush operations performed
    pub flushes: u32,
}

/// Chunk-buffered CSV writer for opaque issue records
///
/// Columns are fixed at the first flush as the sorted union of keys across
/// the buffered records. Later records fill missing columns with empty cells;
/// keys outside the header are dropped (the remote's schema is stable within
/// one export).
pub struct SheetWriter {
    path: PathBuf,
    flush_threshold: usize,
    buffer: Vec<IssueRecord>,
    columns: Option<Vec<String>>,
    rows: u64,
    flushes: u32,
}

impl SheetWriter {
    /// Create a writer; nothing touches disk until the first flush
    pub fn new(path: PathBuf, flush_threshold: usize) -> Self {
        Self {
            path,
            // A threshold of 0 would flush forever on an empty buffer
            flush_threshold: flush_threshold.max(1),
            buffer: Vec::new(),
            columns: None,
            rows: 0,
            flushes: 0,
        }
    }

    /// Buffer one record, flushing when the threshold is reached
    ///
    /// # Errors
    ///
    /// Returns an I/O or CSV error when a triggered flush fails.
    pub fn push(&mut self, record: IssueRecord) -> Result<()> {
        self.buffer.push(record);
        if self.buffer.len() >= self.flush_threshold {
            self.flush()?;
        }
        Ok(())
    }

    /// Drain the remaining buffer and close out the artifact
    ///
    /// The artifact file exists afterwards even when no record was ever
    /// pushed, keeping the downstream two-file contract intact.
    pub fn finish(mut self) -> Result<SheetStats> {
        if !self.buffer.is_empty() {
            self.flush()?;
        }
        if self.flushes == 0 {
            File::create(&self.path)?;
        }
        Ok(SheetStats {
            rows: self.rows,
            flushes: self.flushes,
        })
    }

    /// Write the buffered chunk to disk and clear the buffer
    fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        tracing::debug!(
            records = self.buffer.len(),
            path = %self.path.display(),
            "flushing issue chunk"
        );

        if self.columns.is_none() {
            let keys: BTreeSet<&str> = self
                .buffer
                .iter()
                .flat_map(|record| record.keys().map(String::as_str))
                .collect();
            self.columns = Some(keys.into_iter().map(str::to_string).collect());
        }
        // Set directly above when absent
        let columns = self.columns.as_deref().unwrap_or_default();

        let first_flush = self.flushes == 0;
        let file = if first_flush {
            File::create(&self.path)?
        } else {
            OpenOptions::new().append(true).open(&self.path)?
        };

        let mut writer = csv::Writer::from_writer(file);
        if first_flush {
            writer.write_record(columns)?;
        }
        for record in &self.buffer {
            let row: Vec<String> = columns
                .iter()
                .map(|column| cell(record.get(column)))
                .collect();
            writer.write_record(&row)?;
        }
        writer.flush()?;

        self.rows += self.buffer.len() as u64;
        self.flushes += 1;
        self.buffer.clear();
        Ok(())
    }
}

/// Render one JSON value as a CSV cell
///
/// Strings pass through unquoted; missing keys and nulls become empty cells;
/// everything else is rendered as compact JSON.
fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
