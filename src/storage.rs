//! Result table accumulation and output.

use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::models::Record;

/// Errors from collecting or writing the result table.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("record columns {found:?} do not match configured columns {expected:?}")]
    ColumnMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("delimiter '{0}' is not a single ASCII character")]
    InvalidDelimiter(char),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode table: {0}")]
    Csv(#[from] csv::Error),
}

/// Collects records in arrival order until the run ends.
#[derive(Debug)]
pub struct RecordSink {
    columns: Vec<String>,
    records: Vec<Record>,
}

impl RecordSink {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            records: Vec::new(),
        }
    }

    /// Append a record whose columns must match the configured order.
    pub fn append(&mut self, record: Record) -> Result<(), SinkError> {
        if !record.names().eq(self.columns.iter().map(String::as_str)) {
            return Err(SinkError::ColumnMismatch {
                expected: self.columns.clone(),
                found: record.names().map(str::to_string).collect(),
            });
        }
        self.records.push(record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Finish collecting and hand over the table.
    pub fn flush(self) -> Table {
        Table {
            columns: self.columns,
            rows: self.records.iter().map(Record::to_row).collect(),
        }
    }
}

/// Final tabular output: a header and one row per record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write the table as delimited text.
    pub fn write_to<W: Write>(&self, writer: W, delimiter: char) -> Result<(), SinkError> {
        if !delimiter.is_ascii() {
            return Err(SinkError::InvalidDelimiter(delimiter));
        }
        let mut csv = csv::WriterBuilder::new()
            .delimiter(delimiter as u8)
            .from_writer(writer);
        csv.write_record(&self.columns)?;
        for row in &self.rows {
            csv.write_record(row)?;
        }
        csv.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    /// Write the table to `path`, replacing any previous output.
    pub fn write_to_path(&self, path: &Path, delimiter: char) -> Result<(), SinkError> {
        let io_err = |source| SinkError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = std::fs::File::create(path).map_err(io_err)?;
        self.write_to(file, delimiter)?;
        info!(path = %path.display(), rows = self.rows.len(), "Wrote result table");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldValue;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn columns() -> Vec<String> {
        vec!["Title".to_string(), "Date".to_string(), "Price".to_string()]
    }

    fn record(title: &str) -> Record {
        Record::new(vec![
            ("Title".to_string(), FieldValue::Text(title.to_string())),
            (
                "Date".to_string(),
                FieldValue::Date(NaiveDate::from_ymd_opt(2024, 2, 2).unwrap()),
            ),
            ("Price".to_string(), FieldValue::Missing),
        ])
    }

    #[test]
    fn test_flush_keeps_order() {
        let mut sink = RecordSink::new(columns());
        sink.append(record("A")).unwrap();
        sink.append(record("B")).unwrap();
        assert_eq!(sink.len(), 2);

        let table = sink.flush();
        assert_eq!(table.columns(), columns().as_slice());
        assert_eq!(table.rows()[0], vec!["A", "2024-02-02", "N/A"]);
        assert_eq!(table.rows()[1][0], "B");
    }

    #[test]
    fn test_append_rejects_other_columns() {
        let mut sink = RecordSink::new(columns());
        let wrong = Record::new(vec![("Name".to_string(), FieldValue::Missing)]);
        assert!(matches!(
            sink.append(wrong),
            Err(SinkError::ColumnMismatch { .. })
        ));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_write_quotes_and_delimiter() {
        let mut sink = RecordSink::new(columns());
        sink.append(record("Rock, Paper; Scissors")).unwrap();
        let table = sink.flush();

        let mut out = Vec::new();
        table.write_to(&mut out, ';').unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "Title;Date;Price\n\"Rock, Paper; Scissors\";2024-02-02;N/A\n"
        );

        assert!(matches!(
            table.write_to(Vec::new(), '→'),
            Err(SinkError::InvalidDelimiter('→'))
        ));
    }

    #[test]
    fn test_write_to_path_creates_dirs_and_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/out/events.csv");

        let mut sink = RecordSink::new(columns());
        sink.append(record("A")).unwrap();
        sink.append(record("B")).unwrap();
        sink.flush().write_to_path(&path, ',').unwrap();

        let sink = RecordSink::new(columns());
        sink.flush().write_to_path(&path, ',').unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "Title,Date,Price\n");
    }
}
