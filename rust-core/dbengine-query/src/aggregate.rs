// SPDX-License-Identifier: PMPL-1.0-or-later
//! Grouping and aggregate functions.

use std::collections::HashMap;

use crate::error::QueryError;
use crate::executor::ResultSet;
use crate::filter;
use crate::plan::{AggregateFunction, AggregateRef, Projection, QueryPlan};
use crate::source::{ColumnSchema, Row, TypeTag};

/// Running state of one aggregate over one group.
#[derive(Debug, Clone)]
pub struct Accumulator {
    function: AggregateFunction,
    tag: TypeTag,
    count: usize,
    numeric: usize,
    int_sum: i128,
    float_sum: f64,
    best: Option<String>,
}

impl Accumulator {
    pub fn new(function: AggregateFunction, tag: TypeTag) -> Self {
        Self {
            function,
            tag,
            count: 0,
            numeric: 0,
            int_sum: 0,
            float_sum: 0.0,
            best: None,
        }
    }

    /// Feed one cell. Empty cells are ignored by every function.
    pub fn update(&mut self, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        self.count += 1;

        match self.function {
            AggregateFunction::Count => {}
            AggregateFunction::Sum | AggregateFunction::Avg => {
                if self.tag == TypeTag::Integer {
                    if let Ok(n) = value.parse::<i64>() {
                        self.int_sum += i128::from(n);
                        self.float_sum += n as f64;
                        self.numeric += 1;
                    }
                } else if let Ok(x) = value.parse::<f64>() {
                    if x.is_finite() {
                        self.float_sum += x;
                        self.numeric += 1;
                    }
                }
            }
            AggregateFunction::Min | AggregateFunction::Max => {
                if !filter::is_comparable(value, self.tag) {
                    return;
                }
                let wanted = if self.function == AggregateFunction::Min {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Greater
                };
                let replace = self
                    .best
                    .as_deref()
                    .map_or(true, |best| filter::sort_order(value, best, self.tag) == wanted);
                if replace {
                    self.best = Some(value.to_string());
                }
            }
        }
    }

    /// Final value as text. Sums and averages of no numeric values are empty.
    pub fn finish(&self) -> String {
        match self.function {
            AggregateFunction::Count => self.count.to_string(),
            AggregateFunction::Sum if self.numeric == 0 => String::new(),
            AggregateFunction::Sum if self.tag == TypeTag::Integer => self.int_sum.to_string(),
            AggregateFunction::Sum => self.float_sum.to_string(),
            AggregateFunction::Avg if self.numeric == 0 => String::new(),
            AggregateFunction::Avg => (self.float_sum / self.numeric as f64).to_string(),
            AggregateFunction::Min | AggregateFunction::Max => self.best.clone().unwrap_or_default(),
        }
    }

    /// Type of the finished value, for ordering groups by it.
    pub fn output_type(&self) -> TypeTag {
        match self.function {
            AggregateFunction::Count => TypeTag::Integer,
            AggregateFunction::Sum if self.tag == TypeTag::Integer => TypeTag::Integer,
            AggregateFunction::Sum | AggregateFunction::Avg => TypeTag::Float,
            AggregateFunction::Min | AggregateFunction::Max => self.tag,
        }
    }
}

/// One output column of a grouped query.
#[derive(Debug, Clone)]
enum Column {
    /// Index into the group key.
    Key(usize),
    /// Aggregate over the column at `position`.
    Aggregate {
        call: AggregateRef,
        position: usize,
        tag: TypeTag,
    },
}

struct Group {
    key: Vec<String>,
    accumulators: Vec<Accumulator>,
}

/// Group `rows` (already filtered) by the plan's group-by fields and compute
/// its aggregates.
///
/// Groups appear in order of first appearance unless the plan has an
/// `order by`, whose entries must name a group field or a selected
/// aggregate. A plan with aggregates but no group fields yields exactly one
/// row, even over no input.
pub fn execute_grouped(
    plan: &QueryPlan,
    schema: &ColumnSchema,
    rows: Vec<Row>,
) -> Result<ResultSet, QueryError> {
    let key_positions = plan
        .group_by_fields
        .iter()
        .map(|field| resolve(schema, field))
        .collect::<Result<Vec<_>, _>>()?;

    let (names, columns) = output_columns(plan, schema)?;
    let template: Vec<Accumulator> = columns
        .iter()
        .filter_map(|column| match column {
            Column::Aggregate { call, tag, .. } => Some(Accumulator::new(call.function, *tag)),
            Column::Key(_) => None,
        })
        .collect();
    let inputs: Vec<usize> = columns
        .iter()
        .filter_map(|column| match column {
            Column::Aggregate { position, .. } => Some(*position),
            Column::Key(_) => None,
        })
        .collect();

    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<Vec<String>, usize> = HashMap::new();
    for row in rows {
        let key: Vec<String> = key_positions
            .iter()
            .map(|&p| row.get(p).map(|v| v.trim().to_string()).unwrap_or_default())
            .collect();
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(Group {
                key,
                accumulators: template.clone(),
            });
            groups.len() - 1
        });
        for (acc, &position) in groups[slot].accumulators.iter_mut().zip(&inputs) {
            acc.update(row.get(position).map(String::as_str).unwrap_or(""));
        }
    }
    if groups.is_empty() && key_positions.is_empty() {
        groups.push(Group {
            key: Vec::new(),
            accumulators: template.clone(),
        });
    }

    let mut output: Vec<(Vec<String>, Vec<TypeTag>)> = groups
        .iter()
        .map(|group| {
            let mut aggregates = group.accumulators.iter();
            columns
                .iter()
                .map(|column| match column {
                    Column::Key(i) => (group.key[*i].clone(), schema_tag(schema, key_positions[*i])),
                    Column::Aggregate { .. } => aggregates
                        .next()
                        .map(|acc| (acc.finish(), acc.output_type()))
                        .unwrap_or((String::new(), TypeTag::Empty)),
                })
                .unzip()
        })
        .collect();

    sort_groups(plan, &names, &mut output)?;

    let mut result = ResultSet::new(names);
    result.rows = output.into_iter().map(|(values, _)| values).collect();
    Ok(result)
}

fn resolve(schema: &ColumnSchema, field: &str) -> Result<usize, QueryError> {
    schema
        .position(field)
        .ok_or_else(|| QueryError::UnresolvedField(field.to_string()))
}

fn schema_tag(schema: &ColumnSchema, position: usize) -> TypeTag {
    schema.type_of(position).unwrap_or(TypeTag::Empty)
}

/// Every selected entry must be a group field or an aggregate call; `*`
/// selects the group fields.
fn output_columns(plan: &QueryPlan, schema: &ColumnSchema) -> Result<(Vec<String>, Vec<Column>), QueryError> {
    let entries: Vec<String> = match &plan.fields {
        Projection::All => plan.group_by_fields.clone(),
        Projection::Fields(fields) => fields.clone(),
    };

    let mut columns = Vec::with_capacity(entries.len());
    for entry in &entries {
        if let Some(i) = plan.group_by_fields.iter().position(|g| g == entry) {
            columns.push(Column::Key(i));
        } else if let Some(call) = AggregateRef::from_selected(entry) {
            let position = resolve(schema, &call.field)?;
            columns.push(Column::Aggregate {
                tag: schema_tag(schema, position),
                call,
                position,
            });
        } else {
            return Err(QueryError::UngroupedField(entry.clone()));
        }
    }
    Ok((entries, columns))
}

/// Order grouped rows by the plan's sort keys, matched against output
/// column names (aggregates by their canonical `fn(field)` form).
fn sort_groups(
    plan: &QueryPlan,
    names: &[String],
    rows: &mut [(Vec<String>, Vec<TypeTag>)],
) -> Result<(), QueryError> {
    let keys = plan
        .sort_keys()?
        .into_iter()
        .map(|key| {
            let wanted = AggregateRef::from_selected(&key.field);
            names
                .iter()
                .position(|name| {
                    name == &key.field
                        || wanted.is_some() && AggregateRef::from_selected(name) == wanted
                })
                .map(|i| (i, key.descending))
                .ok_or(QueryError::UngroupedField(key.field))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if keys.is_empty() {
        return Ok(());
    }

    rows.sort_by(|(a, tags), (b, _)| {
        keys.iter()
            .map(|&(i, descending)| filter::directed_sort_order(&a[i], &b[i], tags[i], descending))
            .find(|ord| ord.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn schema() -> ColumnSchema {
        ColumnSchema::new(
            vec!["team".into(), "runs".into(), "rate".into(), "city".into()],
            vec![TypeTag::String, TypeTag::Integer, TypeTag::Float, TypeTag::String],
        )
        .unwrap()
    }

    fn rows() -> Vec<Row> {
        [
            ["MI", "180", "8.5", "Mumbai"],
            ["CSK", "150", "7.0", "Chennai"],
            ["MI", "200", "9.25", "Pune"],
            ["RCB", "", "x", "Bangalore"],
            ["CSK", "170", "", "Chennai"],
        ]
        .iter()
        .map(|r| r.iter().map(|v| v.to_string()).collect())
        .collect()
    }

    fn grouped(query: &str) -> Result<ResultSet, QueryError> {
        execute_grouped(&parse(query).unwrap(), &schema(), rows())
    }

    #[test]
    fn test_accumulators() {
        let mut sum = Accumulator::new(AggregateFunction::Sum, TypeTag::Integer);
        let mut avg = Accumulator::new(AggregateFunction::Avg, TypeTag::Float);
        let mut count = Accumulator::new(AggregateFunction::Count, TypeTag::String);
        let mut max = Accumulator::new(AggregateFunction::Max, TypeTag::Integer);
        for v in ["3", "", "9", "x"] {
            sum.update(v);
            avg.update(v);
            count.update(v);
            max.update(v);
        }
        assert_eq!(sum.finish(), "12");
        assert_eq!(avg.finish(), "6");
        assert_eq!(count.finish(), "3");
        assert_eq!(max.finish(), "9");
    }

    #[test]
    fn test_empty_accumulators() {
        assert_eq!(Accumulator::new(AggregateFunction::Count, TypeTag::Integer).finish(), "0");
        assert_eq!(Accumulator::new(AggregateFunction::Sum, TypeTag::Integer).finish(), "");
        assert_eq!(Accumulator::new(AggregateFunction::Min, TypeTag::String).finish(), "");
    }

    #[test]
    fn test_string_min_is_case_insensitive() {
        let mut min = Accumulator::new(AggregateFunction::Min, TypeTag::String);
        for v in ["pune", "Bangalore", "chennai"] {
            min.update(v);
        }
        assert_eq!(min.finish(), "Bangalore");
    }

    #[test]
    fn test_group_by_first_appearance() {
        let result = grouped("select team, sum(runs), count(city) from t.csv group by team").unwrap();
        assert_eq!(result.columns, vec!["team", "sum(runs)", "count(city)"]);
        assert_eq!(
            result.rows,
            vec![
                vec!["MI", "380", "2"],
                vec!["CSK", "320", "2"],
                vec!["RCB", "", "1"],
            ]
        );
    }

    #[test]
    fn test_group_by_ordered_by_aggregate() {
        let result =
            grouped("select team, max(rate) from t.csv group by team order by max(rate) desc")
                .unwrap();
        let teams: Vec<&str> = result.rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(teams, vec!["MI", "CSK", "RCB"]);
        assert_eq!(result.rows[0][1], "9.25");
    }

    #[test]
    fn test_wildcard_projects_group_fields() {
        let result = grouped("select * from t.csv group by team order by team").unwrap();
        assert_eq!(result.columns, vec!["team"]);
        assert_eq!(result.rows, vec![vec!["CSK"], vec!["MI"], vec!["RCB"]]);
    }

    #[test]
    fn test_aggregate_without_groups() {
        let result = grouped("select count(team), avg(runs), min(city) from t.csv").unwrap();
        assert_eq!(result.rows, vec![vec!["5", "175", "Bangalore"]]);

        let empty = execute_grouped(&parse("select count(team) from t.csv").unwrap(), &schema(), vec![])
            .unwrap();
        assert_eq!(empty.rows, vec![vec!["0"]]);
    }

    #[test]
    fn test_ungrouped_field_rejected() {
        let err = grouped("select team, city from t.csv group by team").unwrap_err();
        assert!(matches!(err, QueryError::UngroupedField(f) if f == "city"));

        let err = grouped("select city, count(team) from t.csv").unwrap_err();
        assert!(matches!(err, QueryError::UngroupedField(f) if f == "city"));
    }

    #[test]
    fn test_order_by_must_be_grouped() {
        let err = grouped("select team from t.csv group by team order by city").unwrap_err();
        assert!(matches!(err, QueryError::UngroupedField(f) if f == "city"));
    }
}
