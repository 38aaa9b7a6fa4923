// SPDX-License-Identifier: PMPL-1.0-or-later
//! DbEngine Query
//!
//! A miniature SQL-like query engine over flat tabular data.
//! Validates and decomposes a query string into a typed plan, then
//! evaluates the filter row by row with per-column typed comparisons.
//!
//! ```
//! use dbengine_query::{InMemorySource, QueryEngine, TypeTag};
//!
//! let source = InMemorySource::new()
//!     .with_table(
//!         "t.csv",
//!         &[("city", TypeTag::String), ("population", TypeTag::Integer)],
//!         &[&["Pune", "3100000"], &["Delhi", "19000000"]],
//!     )
//!     .unwrap();
//!
//! let mut engine = QueryEngine::default();
//! let result = engine
//!     .execute("select city from t.csv where population>10000000", &source)
//!     .unwrap();
//! assert_eq!(result.rows, vec![vec!["Delhi".to_string()]]);
//! ```

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod extractor;
pub mod filter;
pub mod lexical;
pub mod parser;
pub mod plan;
pub mod source;
pub mod validator;

pub use config::{EngineConfig, ExecutionMode};
pub use engine::QueryEngine;
pub use error::{ParseError, QueryError, SourceError, StructuralViolation};
pub use executor::{QueryExecutor, ResultSet};
pub use extractor::{Absence, Clause, ClauseKind};
pub use filter::{BoundFilter, FilterEvaluator, SchemaCache};
pub use parser::{parse, QueryParser};
pub use plan::{
    AggregateFunction, AggregateRef, ComparisonOperator, LogicalOperator, Predicate, Projection,
    QueryKind, QueryPlan, SortKey,
};
pub use source::{ColumnSchema, InMemorySource, Row, RowIter, TabularSource, TypeTag};
pub use validator::{is_structurally_valid, validate};
