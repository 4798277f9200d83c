//! Tabular concert records.
//!
//! A thin CSV model: read rows with a header line, look fields up by column
//! name, append one column, write the table back out. Column order and cell
//! text are preserved exactly; nothing is type-converted.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Errors reading or writing record files
#[derive(Debug, thiserror::Error)]
pub enum RecordsError {
    #[error("Failed to read records from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to write records to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Column {name} has {actual} values for {expected} rows")]
    ColumnLength {
        name: String,
        expected: usize,
        actual: usize,
    },
}

/// One row, with field access by column name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    headers: Arc<[String]>,
    values: Vec<String>,
}

impl Record {
    /// Build a standalone record from `(column, value)` pairs.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            headers: pairs.iter().map(|(h, _)| h.to_string()).collect(),
            values: pairs.iter().map(|(_, v)| v.to_string()).collect(),
        }
    }

    /// Trimmed value of `field`; blank cells and unknown columns are `None`.
    ///
    /// With duplicate column names the first one wins.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.headers
            .iter()
            .position(|h| h == field)
            .and_then(|idx| self.values.get(idx))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// Keep only records whose `field` equals `equals` (trimmed, case-sensitive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter {
    pub field: String,
    pub equals: String,
}

impl RecordFilter {
    pub fn new(field: impl Into<String>, equals: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            equals: equals.into(),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        record.get(&self.field) == Some(self.equals.trim())
    }
}

/// A header row plus data rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    headers: Arc<[String]>,
    records: Vec<Record>,
}

impl Table {
    /// Load a CSV file with a header row.
    pub fn read_csv(path: &Path) -> Result<Self, RecordsError> {
        let reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|source| RecordsError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        Self::from_csv_reader(reader).map_err(|source| RecordsError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, RecordsError> {
        let reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        Ok(Self::from_csv_reader(reader)?)
    }

    fn from_csv_reader<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, csv::Error> {
        let headers: Arc<[String]> = reader.headers()?.iter().map(String::from).collect();
        let width = headers.len();

        let mut records = Vec::new();
        let mut wide = 0;
        for row in reader.records() {
            let row = row?;
            let mut values: Vec<String> = row.iter().map(String::from).collect();
            // Short rows are padded so every record lines up with the header
            values.resize(width.max(values.len()), String::new());
            if values.len() > width {
                wide += 1;
            }
            records.push(Record {
                headers: Arc::clone(&headers),
                values,
            });
        }

        if wide > 0 {
            tracing::warn!("{} rows have more cells than the {} header columns", wide, width);
        }
        tracing::debug!("Read {} records with {} columns", records.len(), width);
        Ok(Self { headers, records })
    }

    /// Write the table as CSV, replacing `path`.
    pub fn write_csv(&self, path: &Path) -> Result<(), RecordsError> {
        let file = std::fs::File::create(path)?;
        self.to_writer(file).map_err(|e| match e {
            RecordsError::Csv(source) => RecordsError::Write {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), RecordsError> {
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(writer);
        writer.write_record(self.headers.iter())?;
        for record in &self.records {
            writer.write_record(&record.values)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Set column `name` to `values` (one per record; `None` = empty cell).
    ///
    /// An existing column of that name is overwritten in place, otherwise
    /// the column is appended.
    pub fn with_column(&self, name: &str, values: &[Option<String>]) -> Result<Table, RecordsError> {
        if values.len() != self.records.len() {
            return Err(RecordsError::ColumnLength {
                name: name.to_string(),
                expected: self.records.len(),
                actual: values.len(),
            });
        }

        let existing = self.headers.iter().position(|h| h == name);
        let headers: Arc<[String]> = match existing {
            Some(_) => Arc::clone(&self.headers),
            None => self
                .headers
                .iter()
                .cloned()
                .chain(std::iter::once(name.to_string()))
                .collect(),
        };
        let column = existing.unwrap_or(self.headers.len());

        let records = self
            .records
            .iter()
            .zip(values)
            .map(|(record, value)| {
                let mut cells = record.values.clone();
                let value = value.clone().unwrap_or_default();
                if existing.is_some() {
                    if cells.len() <= column {
                        cells.resize(column + 1, String::new());
                    }
                    cells[column] = value;
                } else {
                    // Cells past the header width stay after the new column
                    if cells.len() < column {
                        cells.resize(column, String::new());
                    }
                    cells.insert(column, value);
                }
                Record {
                    headers: Arc::clone(&headers),
                    values: cells,
                }
            })
            .collect();

        Ok(Table { headers, records })
    }
}
