// SPDX-License-Identifier: PMPL-1.0-or-later
//! Query executor.
//!
//! Drives a [`QueryPlan`] against a [`TabularSource`]: loads the schema,
//! streams rows through the filter and projects the admitted ones. Plans with
//! grouping or aggregates go through [`crate::aggregate`]; plans with an
//! `order by` are sorted before projection.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate;
use crate::config::{EngineConfig, ExecutionMode};
use crate::error::QueryError;
use crate::filter::{self, BoundFilter, FilterEvaluator};
use crate::plan::{Projection, QueryPlan};
use crate::source::{ColumnSchema, Row, TabularSource, TypeTag};

/// Projected output of a query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Rows read versus rows admitted by the filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub scanned: usize,
    pub admitted: usize,
}

/// Executes plans, keeping one schema cache across calls.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    mode: ExecutionMode,
    evaluator: FilterEvaluator,
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl QueryExecutor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            mode: config.execution_mode,
            evaluator: FilterEvaluator::new(),
        }
    }

    pub fn evaluator(&self) -> &FilterEvaluator {
        &self.evaluator
    }

    /// Run `plan` against `source`.
    pub fn execute(
        &mut self,
        plan: &QueryPlan,
        source: &dyn TabularSource,
    ) -> Result<ResultSet, QueryError> {
        if !self.mode.allows(plan.kind) {
            return Err(QueryError::UnsupportedKind(plan.kind));
        }

        let schema = self.evaluator.schema(&plan.source_name, source)?.clone();
        let filter = BoundFilter::bind(plan, &schema)?;

        let (result, stats) = if !plan.group_by_fields.is_empty() || !plan.aggregates.is_empty() {
            let (rows, stats) = admitted_rows(plan, &filter, source)?;
            (aggregate::execute_grouped(plan, &schema, rows)?, stats)
        } else if !plan.order_by_fields.is_empty() {
            execute_sorted(plan, &schema, &filter, source)?
        } else {
            execute_simple(plan, &schema, &filter, source)?
        };

        info!(
            source = %plan.source_name,
            kind = %plan.kind,
            scanned = stats.scanned,
            admitted = stats.admitted,
            returned = result.len(),
            "Executed query"
        );
        Ok(result)
    }
}

/// Column positions and output names of the plan's projection.
fn projection(plan: &QueryPlan, schema: &ColumnSchema) -> Result<(Vec<String>, Vec<usize>), QueryError> {
    match &plan.fields {
        Projection::All => Ok((schema.headers().to_vec(), (0..schema.len()).collect())),
        Projection::Fields(fields) => {
            let positions = fields
                .iter()
                .map(|field| {
                    schema
                        .position(field)
                        .ok_or_else(|| QueryError::UnresolvedField(field.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok((fields.clone(), positions))
        }
    }
}

fn project(row: &[String], positions: &[usize]) -> Vec<String> {
    positions
        .iter()
        .map(|&p| row.get(p).map(|v| v.trim().to_string()).unwrap_or_default())
        .collect()
}

/// Stream the source through the filter, handing each admitted row to `sink`.
fn scan(
    plan: &QueryPlan,
    filter: &BoundFilter,
    source: &dyn TabularSource,
    mut sink: impl FnMut(Row),
) -> Result<ScanStats, QueryError> {
    let mut stats = ScanStats::default();
    for row in source.rows(&plan.source_name)? {
        let row = row?;
        stats.scanned += 1;
        if filter.matches(&row) {
            stats.admitted += 1;
            sink(row);
        }
    }
    Ok(stats)
}

pub(crate) fn admitted_rows(
    plan: &QueryPlan,
    filter: &BoundFilter,
    source: &dyn TabularSource,
) -> Result<(Vec<Row>, ScanStats), QueryError> {
    let mut rows = Vec::new();
    let stats = scan(plan, filter, source, |row| rows.push(row))?;
    Ok((rows, stats))
}

fn execute_simple(
    plan: &QueryPlan,
    schema: &ColumnSchema,
    filter: &BoundFilter,
    source: &dyn TabularSource,
) -> Result<(ResultSet, ScanStats), QueryError> {
    let (columns, positions) = projection(plan, schema)?;
    let mut result = ResultSet::new(columns);
    let stats = scan(plan, filter, source, |row| result.rows.push(project(&row, &positions)))?;
    Ok((result, stats))
}

fn execute_sorted(
    plan: &QueryPlan,
    schema: &ColumnSchema,
    filter: &BoundFilter,
    source: &dyn TabularSource,
) -> Result<(ResultSet, ScanStats), QueryError> {
    let (columns, positions) = projection(plan, schema)?;
    let keys = plan
        .sort_keys()?
        .into_iter()
        .map(|key| {
            let position = schema
                .position(&key.field)
                .ok_or_else(|| QueryError::UnresolvedField(key.field.clone()))?;
            let tag = schema.type_of(position).unwrap_or(TypeTag::Empty);
            Ok((position, tag, key.descending))
        })
        .collect::<Result<Vec<_>, QueryError>>()?;

    let (mut rows, stats) = admitted_rows(plan, filter, source)?;
    rows.sort_by(|a, b| {
        keys.iter()
            .map(|&(position, tag, descending)| {
                let left = a.get(position).map(String::as_str).unwrap_or("");
                let right = b.get(position).map(String::as_str).unwrap_or("");
                filter::directed_sort_order(left, right, tag, descending)
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut result = ResultSet::new(columns);
    result.rows = rows.iter().map(|row| project(row, &positions)).collect();
    Ok((result, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, QueryParser};
    use crate::plan::QueryKind;
    use crate::source::InMemorySource;

    fn cities() -> InMemorySource {
        InMemorySource::new()
            .with_table(
                "t.csv",
                &[
                    ("city", TypeTag::String),
                    ("population", TypeTag::Integer),
                    ("state", TypeTag::String),
                ],
                &[
                    &["Pune", "3100000", "MH"],
                    &["Delhi", "19000000", "DL"],
                    &["Mumbai", "20000000", "MH"],
                    &["Nagpur", "unknown", "MH"],
                ],
            )
            .unwrap()
    }

    fn run(query: &str) -> Result<ResultSet, QueryError> {
        let plan = parse(query).unwrap();
        QueryExecutor::default().execute(&plan, &cities())
    }

    fn column(result: &ResultSet) -> Vec<&str> {
        result.rows.iter().map(|r| r[0].as_str()).collect()
    }

    #[test]
    fn test_simple_projection() {
        let result = run("select city from t.csv where population > 10000000").unwrap();
        assert_eq!(result.columns, vec!["city".to_string()]);
        assert_eq!(column(&result), vec!["Delhi", "Mumbai"]);
    }

    #[test]
    fn test_wildcard_keeps_all_columns() {
        let result = run("select * from t.csv where state = 'dl'").unwrap();
        assert_eq!(result.columns.len(), 3);
        assert_eq!(result.rows, vec![vec!["Delhi", "19000000", "DL"]]);
    }

    #[test]
    fn test_no_admitted_rows() {
        let result = run("select city from t.csv where population < 0").unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_unknown_projection_field() {
        let err = run("select town from t.csv").unwrap_err();
        assert!(matches!(err, QueryError::UnresolvedField(f) if f == "town"));
    }

    #[test]
    fn test_order_by_desc_with_unparseable_last() {
        let result = run("select city from t.csv order by population desc").unwrap();
        assert_eq!(column(&result), vec!["Mumbai", "Delhi", "Pune", "Nagpur"]);
    }

    #[test]
    fn test_order_by_multiple_keys() {
        let result = run("select city from t.csv order by state, city desc").unwrap();
        assert_eq!(column(&result), vec!["Delhi", "Pune", "Nagpur", "Mumbai"]);
    }

    #[test]
    fn test_simple_only_rejects_other_kinds() {
        let config = EngineConfig {
            execution_mode: ExecutionMode::SimpleOnly,
            ..EngineConfig::default()
        };
        let plan = QueryParser::new(config.clone())
            .parse("select city from t.csv order by city")
            .unwrap();
        let err = QueryExecutor::new(&config).execute(&plan, &cities()).unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedKind(QueryKind::OrderBy)));
    }

    #[test]
    fn test_missing_source() {
        let plan = parse("select * from nowhere.csv").unwrap();
        let err = QueryExecutor::default().execute(&plan, &cities()).unwrap_err();
        assert!(matches!(err, QueryError::Source(_)));
    }
}
