//! Table sink: in-memory row accumulation with full CSV rewrite.
//!
//! Epistemic foundation:
//! - K_i: The persisted table always carries the full, current column set
//! - K_i: Columns discovered late apply retroactively → full rewrite, never append
//! - K_i: Rewrite is write-then-rename, so a crash leaves the previous table intact
//! - B_i: A table from an earlier run may exist → loaded on resume

use crate::models::{FetchError, Result, Row, StructuralError};
use crate::table::ColumnSet;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Owns the accumulated rows and the live column set.
#[derive(Debug)]
pub struct TableSink {
    /// Output CSV path
    path: PathBuf,
    /// Temp file the rewrite goes to before rename
    temp_path: PathBuf,
    /// Current column set
    columns: ColumnSet,
    /// Accumulated rows
    rows: Vec<Row>,
}

impl TableSink {
    /// Create an empty sink starting from `initial` columns.
    pub fn new(path: impl Into<PathBuf>, initial: ColumnSet) -> Self {
        let path = path.into();
        let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
        temp_name.push(".tmp");
        let temp_path = path.with_file_name(temp_name);
        Self {
            path,
            temp_path,
            columns: initial,
            rows: Vec::new(),
        }
    }

    /// Read a previously persisted table into memory.
    ///
    /// The header becomes the column set, followed by any initial columns it lacks.
    /// A missing file leaves the sink empty. Returns the number of rows loaded.
    pub fn load_existing(&mut self) -> Result<usize> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No existing table");
            return Ok(0);
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)?;

        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Err(self.invalid("no header row"));
        }
        if !headers.iter().any(|h| h == "id") {
            return Err(self.invalid("header has no `id` column"));
        }

        let mut columns = ColumnSet::new(headers.iter());
        for name in self.columns.iter() {
            columns.insert(name);
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let fields: HashMap<String, String> = headers
                .iter()
                .zip(record.iter())
                .filter(|(_, value)| !value.is_empty())
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect();
            rows.push(Row::from_fields(fields));
        }

        self.columns = columns;
        self.rows = rows;

        info!(
            path = %self.path.display(),
            rows = self.rows.len(),
            columns = self.columns.len(),
            "Loaded existing table"
        );
        Ok(self.rows.len())
    }

    /// Add rows, registering any columns they carry that the set lacks.
    pub fn append_rows(&mut self, rows: Vec<Row>) {
        for row in &rows {
            let mut unseen: Vec<&str> = row
                .columns()
                .filter(|c| !self.columns.contains(c))
                .collect();
            unseen.sort_unstable();
            for column in unseen {
                self.columns.insert(column);
            }
        }
        self.rows.extend(rows);
    }

    /// Rewrite the whole table against the current column set.
    pub fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| FetchError::io("creating output dir", e))?;
        }

        let file = File::create(&self.temp_path)
            .map_err(|e| FetchError::io("creating temp table", e))?;
        let mut writer = csv::Writer::from_writer(BufWriter::new(file));

        writer.write_record(self.columns.iter())?;
        for row in &self.rows {
            writer.write_record(self.columns.iter().map(|c| row.get(c).unwrap_or_default()))?;
        }

        let buffered = writer
            .into_inner()
            .map_err(|e| FetchError::io("flushing temp table", e.into_error()))?;
        let file = buffered
            .into_inner()
            .map_err(|e| FetchError::io("flushing temp table", e.into_error()))?;
        file.sync_all()
            .map_err(|e| FetchError::io("syncing temp table", e))?;

        // Atomic rename
        fs::rename(&self.temp_path, &self.path)
            .map_err(|e| FetchError::io("renaming table", e))?;

        debug!(rows = self.rows.len(), columns = self.columns.len(), "Table persisted");
        Ok(())
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    /// Mutable access for the row builder to register new columns.
    pub fn columns_mut(&mut self) -> &mut ColumnSet {
        &mut self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn invalid(&self, message: &str) -> FetchError {
        StructuralError::InvalidTable {
            path: self.path.clone(),
            message: message.to_string(),
        }
        .into()
    }
}
