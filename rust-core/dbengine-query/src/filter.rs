// SPDX-License-Identifier: PMPL-1.0-or-later
//! Filter evaluator.
//!
//! Decides, per row, whether the plan's predicates admit it. Comparisons are
//! typed by the column's [`TypeTag`] and are total: a value that does not
//! parse under its column type makes that one comparison false. Predicate
//! results are merged with every `and` resolved before any `or`.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::error::{QueryError, SourceError};
use crate::plan::{ComparisonOperator, LogicalOperator, QueryPlan};
use crate::source::{ColumnSchema, TabularSource, TypeTag};

/// Date-only formats accepted for `DateTime` columns.
const DATE_FORMATS: [&str; 7] = [
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%d-%b-%y",
    "%d-%b-%Y",
    "%d-%B-%y",
    "%d-%B-%Y",
];

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parse a calendar date or timestamp; dates are taken at midnight.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(stamp) = DateTime::parse_from_rfc3339(text) {
        return Some(stamp.naive_utc());
    }
    if let Some(stamp) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Some(stamp);
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// A cell value read under its column type.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
enum Typed {
    Integer(i64),
    Float(f64),
    DateTime(NaiveDateTime),
}

fn typed(value: &str, tag: TypeTag) -> Option<Typed> {
    let value = value.trim();
    match tag {
        TypeTag::Integer => value.parse().ok().map(Typed::Integer),
        TypeTag::Float => value.parse().ok().map(Typed::Float),
        TypeTag::DateTime => parse_datetime(value).map(Typed::DateTime),
        TypeTag::String | TypeTag::Empty => None,
    }
}

/// Whether `value` parses under `tag`. String columns accept anything.
pub fn is_comparable(value: &str, tag: TypeTag) -> bool {
    match tag {
        TypeTag::String => true,
        TypeTag::Empty => false,
        _ => typed(value, tag).is_some(),
    }
}

/// Typed ordering of two values of a numeric or date column.
///
/// `None` when either side fails to parse, and always for string and empty
/// columns, which have no ordering here.
pub fn order_values(left: &str, right: &str, tag: TypeTag) -> Option<Ordering> {
    let left = typed(left, tag)?;
    let right = typed(right, tag)?;
    left.partial_cmp(&right)
}

/// Compare a cell against a predicate literal.
///
/// Strings support only case-insensitive `=` / `!=`. Everything else goes
/// through [`order_values`], and an unparseable side yields `false`.
pub fn compare(value: &str, literal: &str, tag: TypeTag, operator: ComparisonOperator) -> bool {
    match tag {
        TypeTag::String => {
            if !operator.is_equality() {
                return false;
            }
            let equal = value.trim().to_lowercase() == literal.trim().to_lowercase();
            (operator == ComparisonOperator::Eq) == equal
        }
        TypeTag::Empty => false,
        _ => order_values(value, literal, tag).is_some_and(|ord| operator.accepts(ord)),
    }
}

/// Ordering used when sorting rows.
///
/// Strings compare case-insensitively. Typed columns compare by value, with
/// unparseable cells after every parseable one.
pub fn sort_order(left: &str, right: &str, tag: TypeTag) -> Ordering {
    match (typed(left, tag), typed(right, tag)) {
        (Some(l), Some(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) if matches!(tag, TypeTag::String | TypeTag::Empty) => left
            .trim()
            .to_lowercase()
            .cmp(&right.trim().to_lowercase()),
        (None, None) => Ordering::Equal,
    }
}

/// [`sort_order`] with a direction. Descending reverses the value order but
/// still keeps unparseable cells last.
pub fn directed_sort_order(left: &str, right: &str, tag: TypeTag, descending: bool) -> Ordering {
    let ord = sort_order(left, right, tag);
    if descending && is_comparable(left, tag) == is_comparable(right, tag) {
        ord.reverse()
    } else {
        ord
    }
}

/// Merge predicate results with their binary operators: every `and` first,
/// left to right, then every `or`. `not` tokens are skipped since negation
/// is already folded into each result.
///
/// An empty result list admits the row.
pub fn combine(results: &[bool], operators: &[LogicalOperator]) -> bool {
    let mut values = results.to_vec();
    let mut ops: Vec<LogicalOperator> = operators.iter().copied().filter(|op| op.is_binary()).collect();

    for pass in [LogicalOperator::And, LogicalOperator::Or] {
        let mut i = 0;
        while i < ops.len() && i + 1 < values.len() {
            if ops[i] != pass {
                i += 1;
                continue;
            }
            values[i] = match pass {
                LogicalOperator::And => values[i] && values[i + 1],
                _ => values[i] || values[i + 1],
            };
            values.remove(i + 1);
            ops.remove(i);
        }
    }
    values.last().copied().unwrap_or(true)
}

#[derive(Debug, Clone)]
struct BoundPredicate {
    position: usize,
    tag: TypeTag,
    operator: ComparisonOperator,
    literal: String,
    negated: bool,
}

/// A plan's filter with every field resolved to a column position.
#[derive(Debug, Clone)]
pub struct BoundFilter {
    predicates: Vec<BoundPredicate>,
    operators: Vec<LogicalOperator>,
}

impl BoundFilter {
    /// Resolve the plan's predicate fields against `schema`.
    pub fn bind(plan: &QueryPlan, schema: &ColumnSchema) -> Result<Self, QueryError> {
        let predicates = plan
            .restrictions
            .iter()
            .map(|predicate| {
                let position = schema
                    .position(&predicate.field)
                    .ok_or_else(|| QueryError::UnresolvedField(predicate.field.clone()))?;
                Ok(BoundPredicate {
                    position,
                    tag: schema.type_of(position).unwrap_or(TypeTag::Empty),
                    operator: predicate.operator,
                    literal: predicate.literal.clone(),
                    negated: predicate.negated,
                })
            })
            .collect::<Result<Vec<_>, QueryError>>()?;
        Ok(Self {
            predicates,
            operators: plan.binary_operators(),
        })
    }

    /// Whether `row` is admitted.
    pub fn matches(&self, row: &[String]) -> bool {
        if self.predicates.is_empty() {
            return true;
        }
        let results: Vec<bool> = self
            .predicates
            .iter()
            .map(|p| {
                let hit = row
                    .get(p.position)
                    .is_some_and(|value| compare(value, &p.literal, p.tag, p.operator));
                hit != p.negated
            })
            .collect();
        combine(&results, &self.operators)
    }
}

/// Evaluate the plan's filter against one row.
pub fn evaluate(plan: &QueryPlan, row: &[String], schema: &ColumnSchema) -> Result<bool, QueryError> {
    Ok(BoundFilter::bind(plan, schema)?.matches(row))
}

/// Holds the schema of the most recently used source.
///
/// Asking for a different source replaces the entry.
#[derive(Debug, Clone, Default)]
pub struct SchemaCache {
    current: Option<(String, ColumnSchema)>,
    loads: usize,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The schema of `name`, fetched from `source` unless already cached.
    pub fn get_or_load(
        &mut self,
        name: &str,
        source: &dyn TabularSource,
    ) -> Result<&ColumnSchema, SourceError> {
        let cached = matches!(&self.current, Some((cached, _)) if cached == name);
        if !cached {
            let schema = source.schema(name)?;
            if let Some((previous, _)) = &self.current {
                debug!(previous = %previous, source = name, "Replacing cached schema");
            }
            debug!(source = name, columns = schema.len(), "Loaded column schema");
            self.current = Some((name.to_string(), schema));
            self.loads += 1;
        }
        self.current
            .as_ref()
            .map(|(_, schema)| schema)
            .ok_or_else(|| SourceError::UnknownSource(name.to_string()))
    }

    /// Name of the cached source, if any.
    pub fn source_name(&self) -> Option<&str> {
        self.current.as_ref().map(|(name, _)| name.as_str())
    }

    /// How many times a schema has been fetched.
    pub fn loads(&self) -> usize {
        self.loads
    }

    pub fn invalidate(&mut self) {
        self.current = None;
    }
}

/// Filter evaluation with a schema cache owned per session.
#[derive(Debug, Clone, Default)]
pub struct FilterEvaluator {
    cache: SchemaCache,
}

impl FilterEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema(
        &mut self,
        name: &str,
        source: &dyn TabularSource,
    ) -> Result<&ColumnSchema, SourceError> {
        self.cache.get_or_load(name, source)
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut SchemaCache {
        &mut self.cache
    }

    /// Evaluate `plan`'s filter against `row`, loading the schema on a
    /// change of source.
    pub fn evaluate(
        &mut self,
        plan: &QueryPlan,
        row: &[String],
        source: &dyn TabularSource,
    ) -> Result<bool, QueryError> {
        let schema = self.cache.get_or_load(&plan.source_name, source)?;
        evaluate(plan, row, schema)
    }
}
