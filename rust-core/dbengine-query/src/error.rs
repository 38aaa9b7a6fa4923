// SPDX-License-Identifier: PMPL-1.0-or-later
//! Query engine error types.
//!
//! Errors are layered the way a query flows through the engine: a
//! [`StructuralViolation`] rejects the raw text, a [`ParseError`] rejects a
//! clause, a [`SourceError`] comes from the data source, and [`QueryError`]
//! is what a caller of the executor sees.

use std::path::PathBuf;

use thiserror::Error;

use crate::extractor::ClauseKind;
use crate::plan::QueryKind;

/// Reasons the clause validator rejects a raw query string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralViolation {
    #[error("query is too short ({length} characters, minimum {minimum})")]
    TooShort { length: usize, minimum: usize },

    #[error("query must contain both 'select' and 'from'")]
    MissingSelectOrFrom,

    #[error("'from' appears before the first 'select'")]
    FromBeforeSelect,

    #[error("nothing is selected between 'select' and 'from'")]
    EmptySelectList,

    #[error("'select' occurs {selects} times but 'from' occurs {froms} times")]
    SelectFromMismatch { selects: usize, froms: usize },

    #[error("'{clause}' occurs {count} times but 'select' only {selects} times")]
    TooManyClauses {
        clause: &'static str,
        count: usize,
        selects: usize,
    },

    #[error("'where' occurs {wheres} times but 'from' occurs {froms} times")]
    WhereFromMismatch { wheres: usize, froms: usize },

    #[error("'where' at offset {offset} precedes its 'from'")]
    WhereBeforeFrom { offset: usize },

    #[error("'where' at offset {offset} leaves no source between it and 'from'")]
    WhereAbutsFrom { offset: usize },

    #[error("'order by' at offset {offset} precedes 'group by' outside a sub-query")]
    OrderByBeforeGroupBy { offset: usize },

    #[error("'and' between 'group by' and 'order by' is not part of a 'having' clause")]
    AndOutsideHaving,
}

/// Errors raised while turning a validated query into a [`crate::QueryPlan`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("cannot parse query: {0}")]
    Structural(#[from] StructuralViolation),

    #[error("query does not name a tabular source")]
    MissingSource,

    #[error("malformed {0} clause")]
    Malformed(ClauseKind),

    #[error("unknown comparison operator: {0}")]
    UnknownOperator(String),

    #[error("{predicates} conditions cannot be joined by {operators} logical operators")]
    UnbalancedOperators { predicates: usize, operators: usize },
}

/// Failures of the tabular data source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("source not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed source data: {0}")]
    Malformed(String),

    #[error("source '{0}' has no header row")]
    EmptySource(String),

    #[error("row at line {line} has {found} values, header has {expected}")]
    RowArity {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("unknown source: {0}")]
    UnknownSource(String),

    #[error("schema has {headers} headers but {types} type tags")]
    SchemaMismatch { headers: usize, types: usize },
}

/// Errors surfaced by query execution.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("unknown column: {0}")]
    UnresolvedField(String),

    #[error("column '{0}' is neither grouped nor aggregated")]
    UngroupedField(String),

    #[error("execution of {0} queries is disabled")]
    UnsupportedKind(QueryKind),
}
