// SPDX-License-Identifier: PMPL-1.0-or-later
//! Query plan and predicate model.
//!
//! A [`QueryPlan`] is built once per query string by the parser and is
//! immutable afterwards. The smaller types here ([`Predicate`],
//! [`AggregateRef`], [`SortKey`]) are the structured forms of the clause
//! fragments the extractor hands over.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::extractor::ClauseKind;
use crate::lexical;

/// Which execution path a plan expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Simple,
    GroupBy,
    OrderBy,
    Aggregate,
}

impl QueryKind {
    /// Classify by the first non-empty clause in priority order
    /// group by, order by, aggregates.
    pub fn classify(has_group_by: bool, has_order_by: bool, has_aggregates: bool) -> Self {
        if has_group_by {
            QueryKind::GroupBy
        } else if has_order_by {
            QueryKind::OrderBy
        } else if has_aggregates {
            QueryKind::Aggregate
        } else {
            QueryKind::Simple
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKind::Simple => write!(f, "simple"),
            QueryKind::GroupBy => write!(f, "group by"),
            QueryKind::OrderBy => write!(f, "order by"),
            QueryKind::Aggregate => write!(f, "aggregate"),
        }
    }
}

/// Comparison operator of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    LtEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    GtEq,
}

impl ComparisonOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOperator::Eq => "=",
            ComparisonOperator::NotEq => "!=",
            ComparisonOperator::Lt => "<",
            ComparisonOperator::LtEq => "<=",
            ComparisonOperator::Gt => ">",
            ComparisonOperator::GtEq => ">=",
        }
    }

    /// Whether `left.cmp(right) == ordering` satisfies this operator.
    pub fn accepts(self, ordering: Ordering) -> bool {
        match self {
            ComparisonOperator::Eq => ordering == Ordering::Equal,
            ComparisonOperator::NotEq => ordering != Ordering::Equal,
            ComparisonOperator::Lt => ordering == Ordering::Less,
            ComparisonOperator::LtEq => ordering != Ordering::Greater,
            ComparisonOperator::Gt => ordering == Ordering::Greater,
            ComparisonOperator::GtEq => ordering != Ordering::Less,
        }
    }

    /// `=` and `!=` are the only operators defined for string columns.
    pub fn is_equality(self) -> bool {
        matches!(self, ComparisonOperator::Eq | ComparisonOperator::NotEq)
    }
}

impl FromStr for ComparisonOperator {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "=" => Ok(ComparisonOperator::Eq),
            "!=" => Ok(ComparisonOperator::NotEq),
            "<" => Ok(ComparisonOperator::Lt),
            "<=" => Ok(ComparisonOperator::LtEq),
            ">" => Ok(ComparisonOperator::Gt),
            ">=" => Ok(ComparisonOperator::GtEq),
            other => Err(ParseError::UnknownOperator(other.to_string())),
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A logical operator token of the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
    Not,
}

impl LogicalOperator {
    /// `and` and `or` join two predicates; `not` prefixes one.
    pub fn is_binary(self) -> bool {
        !matches!(self, LogicalOperator::Not)
    }
}

impl FromStr for LogicalOperator {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "and" => Ok(LogicalOperator::And),
            "or" => Ok(LogicalOperator::Or),
            "not" => Ok(LogicalOperator::Not),
            _ => Err(ParseError::Malformed(ClauseKind::LogicalOperators)),
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOperator::And => write!(f, "AND"),
            LogicalOperator::Or => write!(f, "OR"),
            LogicalOperator::Not => write!(f, "NOT"),
        }
    }
}

/// One `field operator literal` condition of a filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    pub operator: ComparisonOperator,
    /// Comparison value with surrounding quotes removed.
    pub literal: String,
    /// Set when the condition was written `not field op literal`.
    #[serde(default)]
    pub negated: bool,
}

impl Predicate {
    /// Build a predicate from one condition fragment of the filter.
    pub fn from_condition(condition: &str) -> Result<Self, ParseError> {
        let (negated, condition) = lexical::strip_negation(condition);
        let [field, operator, literal] = lexical::split_condition_words(condition)
            .ok_or(ParseError::Malformed(ClauseKind::Conditions))?;
        Ok(Self {
            field,
            operator: operator.parse()?,
            literal: lexical::strip_quotes(&literal).to_string(),
            negated,
        })
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "not ")?;
        }
        write!(f, "{} {} '{}'", self.field, self.operator, self.literal)
    }
}

/// Aggregate function name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    Avg,
    Min,
    Max,
    Count,
    Sum,
}

impl AggregateFunction {
    pub fn as_str(self) -> &'static str {
        match self {
            AggregateFunction::Avg => "avg",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
        }
    }
}

impl FromStr for AggregateFunction {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "avg" => Ok(AggregateFunction::Avg),
            "min" => Ok(AggregateFunction::Min),
            "max" => Ok(AggregateFunction::Max),
            "count" => Ok(AggregateFunction::Count),
            "sum" => Ok(AggregateFunction::Sum),
            _ => Err(ParseError::Malformed(ClauseKind::Aggregates)),
        }
    }
}

/// `function(field)` reference in the select list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregateRef {
    pub function: AggregateFunction,
    pub field: String,
}

impl AggregateRef {
    /// Parse `fn(field)`; any other shape is a malformed aggregate.
    pub fn parse(call: &str) -> Result<Self, ParseError> {
        let (function, field) =
            lexical::split_aggregate(call).ok_or(ParseError::Malformed(ClauseKind::Aggregates))?;
        Ok(Self {
            function: function.parse()?,
            field: field.trim().to_string(),
        })
    }

    /// Read a select-list entry as an aggregate when the whole entry is one
    /// `fn(field)` call.
    pub fn from_selected(entry: &str) -> Option<Self> {
        let entry = entry.trim();
        let call = lexical::aggregate_calls().find(entry)?;
        if call.start() != 0 || call.end() != entry.len() {
            return None;
        }
        Self::parse(entry).ok()
    }
}

impl fmt::Display for AggregateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.function.as_str(), self.field)
    }
}

/// Selected columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    /// `select *`
    All,
    Fields(Vec<String>),
}

impl Projection {
    pub fn from_fields(fields: Vec<String>) -> Self {
        if fields.len() == 1 && fields[0] == "*" {
            Projection::All
        } else {
            Projection::Fields(fields)
        }
    }
}

/// One `order by` entry: a field with an optional `asc` / `desc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    pub fn parse(entry: &str) -> Result<Self, ParseError> {
        let mut words = entry.split_whitespace();
        let field = words
            .next()
            .ok_or(ParseError::Malformed(ClauseKind::OrderBy))?
            .to_string();
        let descending = match words.next().map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => false,
            Some("desc") => true,
            Some(_) => return Err(ParseError::Malformed(ClauseKind::OrderBy)),
        };
        if words.next().is_some() {
            return Err(ParseError::Malformed(ClauseKind::OrderBy));
        }
        Ok(Self { field, descending })
    }
}

/// The parsed form of one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub raw_text: String,
    pub source_name: String,
    /// The query before its `where` / `group by` / `order by`.
    pub base_query: String,
    pub fields: Projection,
    pub restrictions: Vec<Predicate>,
    /// Parallel to the gaps between `restrictions`; `NOT` tokens ride along
    /// in their textual position.
    pub logical_operators: Vec<LogicalOperator>,
    pub aggregates: Vec<AggregateRef>,
    pub group_by_fields: Vec<String>,
    pub order_by_fields: Vec<String>,
    pub kind: QueryKind,
}

impl QueryPlan {
    /// The `and` / `or` operators, in order.
    pub fn binary_operators(&self) -> Vec<LogicalOperator> {
        self.logical_operators
            .iter()
            .copied()
            .filter(|op| op.is_binary())
            .collect()
    }

    pub fn has_filter(&self) -> bool {
        !self.restrictions.is_empty()
    }

    pub fn sort_keys(&self) -> Result<Vec<SortKey>, ParseError> {
        self.order_by_fields.iter().map(|f| SortKey::parse(f)).collect()
    }
}
