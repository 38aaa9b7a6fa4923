// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tabular data source contract.
//
// The engine never reads files itself. It asks a `TabularSource` for the
// header, one type tag per column, and a forward-only row iterator. An
// in-memory implementation is provided for tests and embedding callers.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// Inferred semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    Integer,
    Float,
    DateTime,
    String,
    /// The sampled cell was empty; nothing compares against this column.
    Empty,
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeTag::Integer => "integer",
            TypeTag::Float => "float",
            TypeTag::DateTime => "datetime",
            TypeTag::String => "string",
            TypeTag::Empty => "empty",
        };
        f.write_str(name)
    }
}

/// Header names with a parallel sequence of type tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    headers: Vec<String>,
    types: Vec<TypeTag>,
}

impl ColumnSchema {
    /// Pair headers with type tags; the two must have equal length.
    pub fn new(headers: Vec<String>, types: Vec<TypeTag>) -> Result<Self, SourceError> {
        if headers.len() != types.len() {
            return Err(SourceError::SchemaMismatch {
                headers: headers.len(),
                types: types.len(),
            });
        }
        Ok(Self { headers, types })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn types(&self) -> &[TypeTag] {
        &self.types
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Column position of `field`. Names match exactly.
    pub fn position(&self, field: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == field)
    }

    /// Type tag of the column at `position`.
    pub fn type_of(&self, position: usize) -> Option<TypeTag> {
        self.types.get(position).copied()
    }
}

/// One row of raw cell values, one per header.
pub type Row = Vec<String>;

/// Forward-only row stream. Dropping it releases whatever the source holds.
pub type RowIter<'a> = Box<dyn Iterator<Item = Result<Row, SourceError>> + 'a>;

/// A provider of headers, column types and rows, addressed by source name.
pub trait TabularSource {
    /// Column names in order.
    fn header(&self, source: &str) -> Result<Vec<String>, SourceError>;

    /// One type tag per header.
    fn column_types(&self, source: &str) -> Result<Vec<TypeTag>, SourceError>;

    /// A fresh iterator over the data rows. Each call restarts from the first row.
    fn rows<'a>(&'a self, source: &str) -> Result<RowIter<'a>, SourceError>;

    /// Header and types together.
    fn schema(&self, source: &str) -> Result<ColumnSchema, SourceError> {
        ColumnSchema::new(self.header(source)?, self.column_types(source)?)
    }
}

#[derive(Debug, Clone)]
struct Table {
    schema: ColumnSchema,
    rows: Vec<Row>,
}

/// Tables held in memory, keyed by source name.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    tables: HashMap<String, Table>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table, replacing any previous one of the same name.
    ///
    /// Every row must have one value per header.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        schema: ColumnSchema,
        rows: Vec<Row>,
    ) -> Result<(), SourceError> {
        let expected = schema.len();
        if let Some((index, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != expected) {
            return Err(SourceError::RowArity {
                line: index as u64 + 2,
                expected,
                found: row.len(),
            });
        }
        self.tables.insert(name.into(), Table { schema, rows });
        Ok(())
    }

    /// Builder form of [`InMemorySource::insert`] taking plain string slices.
    pub fn with_table(
        mut self,
        name: &str,
        columns: &[(&str, TypeTag)],
        rows: &[&[&str]],
    ) -> Result<Self, SourceError> {
        let schema = ColumnSchema::new(
            columns.iter().map(|(h, _)| h.to_string()).collect(),
            columns.iter().map(|(_, t)| *t).collect(),
        )?;
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|v| v.to_string()).collect())
            .collect();
        self.insert(name, schema, rows)?;
        Ok(self)
    }

    fn table(&self, source: &str) -> Result<&Table, SourceError> {
        self.tables
            .get(source)
            .ok_or_else(|| SourceError::UnknownSource(source.to_string()))
    }
}

impl TabularSource for InMemorySource {
    fn header(&self, source: &str) -> Result<Vec<String>, SourceError> {
        Ok(self.table(source)?.schema.headers().to_vec())
    }

    fn column_types(&self, source: &str) -> Result<Vec<TypeTag>, SourceError> {
        Ok(self.table(source)?.schema.types().to_vec())
    }

    fn rows<'a>(&'a self, source: &str) -> Result<RowIter<'a>, SourceError> {
        let table = self.table(source)?;
        Ok(Box::new(table.rows.iter().cloned().map(Ok)))
    }

    fn schema(&self, source: &str) -> Result<ColumnSchema, SourceError> {
        Ok(self.table(source)?.schema.clone())
    }
}
