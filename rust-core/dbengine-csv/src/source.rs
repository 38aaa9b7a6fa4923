// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CSV-backed tabular source.
//
// Every call opens the file for its own duration: `header` and
// `column_types` read at most two records, and the iterator returned by
// `rows` owns its reader, so dropping it closes the file. Nothing is kept
// open between queries.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter, Trim};
use dbengine_query::{ColumnSchema, Row, RowIter, SourceError, TabularSource, TypeTag};
use tracing::{debug, warn};

use crate::infer;

/// Reads tables from CSV files whose first record is the header.
#[derive(Debug, Clone)]
pub struct CsvSource {
    /// Directory that bare file names are resolved against.
    root: Option<PathBuf>,
    delimiter: u8,
}

impl Default for CsvSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvSource {
    /// A source resolving names against the working directory.
    pub fn new() -> Self {
        Self {
            root: None,
            delimiter: b',',
        }
    }

    /// A source resolving bare file names against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Self::new()
        }
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Path a source name refers to.
    ///
    /// Absolute names and names with a directory component are used as
    /// given; a bare file name is joined onto the root when one is set.
    pub fn resolve(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        let bare = path.is_relative()
            && path.parent().map_or(true, |parent| parent.as_os_str().is_empty());
        match &self.root {
            Some(root) if bare => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn records(&self, name: &str) -> Result<StringRecordsIntoIter<File>, SourceError> {
        let path = self.resolve(name);
        let file = File::open(&path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => SourceError::NotFound(path.clone()),
            _ => SourceError::Io(err),
        })?;
        debug!(path = %path.display(), "Opened CSV source");

        Ok(ReaderBuilder::new()
            .has_headers(false)
            .delimiter(self.delimiter)
            .trim(Trim::All)
            .flexible(true)
            .from_reader(file)
            .into_records())
    }

    /// The header record and, when present, the first data record.
    fn head(&self, name: &str) -> Result<(Vec<String>, Option<StringRecord>), SourceError> {
        let mut records = self.records(name)?;
        let header = records
            .next()
            .ok_or_else(|| SourceError::EmptySource(name.to_string()))?
            .map_err(csv_error)?;
        let sample = records.next().transpose().map_err(csv_error)?;
        Ok((trimmed(&header), sample))
    }
}

fn trimmed(record: &StringRecord) -> Vec<String> {
    record.iter().map(|value| value.trim().to_string()).collect()
}

fn csv_error(err: csv::Error) -> SourceError {
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(io) => SourceError::Io(io),
        _ => SourceError::Malformed(message),
    }
}

fn sample_types(width: usize, sample: Option<&StringRecord>) -> Vec<TypeTag> {
    match sample {
        Some(record) => (0..width)
            .map(|i| infer::infer_type(record.get(i).unwrap_or("")))
            .collect(),
        None => vec![TypeTag::Empty; width],
    }
}

impl TabularSource for CsvSource {
    fn header(&self, source: &str) -> Result<Vec<String>, SourceError> {
        Ok(self.head(source)?.0)
    }

    fn column_types(&self, source: &str) -> Result<Vec<TypeTag>, SourceError> {
        let (header, sample) = self.head(source)?;
        Ok(sample_types(header.len(), sample.as_ref()))
    }

    fn schema(&self, source: &str) -> Result<ColumnSchema, SourceError> {
        let (header, sample) = self.head(source)?;
        let types = sample_types(header.len(), sample.as_ref());
        ColumnSchema::new(header, types)
    }

    fn rows<'a>(&'a self, source: &str) -> Result<RowIter<'a>, SourceError> {
        let mut records = self.records(source)?;
        let expected = match records.next() {
            Some(header) => header.map_err(csv_error)?.len(),
            None => return Err(SourceError::EmptySource(source.to_string())),
        };

        Ok(Box::new(records.map(move |record| -> Result<Row, SourceError> {
            let record = record.map_err(csv_error)?;
            if record.len() != expected {
                let line = record.position().map_or(0, |p| p.line());
                warn!(line, expected, found = record.len(), "Row arity does not match header");
                return Err(SourceError::RowArity {
                    line,
                    expected,
                    found: record.len(),
                });
            }
            Ok(trimmed(&record))
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_bare_name_against_root() {
        let source = CsvSource::with_root("/data");
        assert_eq!(source.resolve("ipl.csv"), PathBuf::from("/data/ipl.csv"));
        assert_eq!(source.resolve("sub/ipl.csv"), PathBuf::from("sub/ipl.csv"));
        assert_eq!(source.resolve("/abs/ipl.csv"), PathBuf::from("/abs/ipl.csv"));
    }

    #[test]
    fn test_resolve_without_root() {
        assert_eq!(CsvSource::new().resolve("ipl.csv"), PathBuf::from("ipl.csv"));
    }

    #[test]
    fn test_missing_file() {
        let err = CsvSource::with_root("/definitely/not/here")
            .header("t.csv")
            .unwrap_err();
        assert!(matches!(err, SourceError::NotFound(p) if p.ends_with("t.csv")));
    }

    #[test]
    fn test_sample_types_without_data() {
        assert_eq!(sample_types(2, None), vec![TypeTag::Empty, TypeTag::Empty]);
    }
}
