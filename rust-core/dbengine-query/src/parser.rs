// SPDX-License-Identifier: PMPL-1.0-or-later
//! Query parser — assembles a [`QueryPlan`] from the clause extractors.

use tracing::debug;

use crate::config::EngineConfig;
use crate::error::ParseError;
use crate::extractor::{self, ClauseKind};
use crate::plan::{AggregateRef, LogicalOperator, Predicate, Projection, QueryKind, QueryPlan};
use crate::validator;

/// Turns raw query text into a [`QueryPlan`].
///
/// There is no partial plan: an absent clause becomes an empty collection,
/// a malformed one fails the whole parse.
#[derive(Debug, Clone, Default)]
pub struct QueryParser {
    config: EngineConfig,
}

impl QueryParser {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parse `raw` into a plan.
    pub fn parse(&self, raw: &str) -> Result<QueryPlan, ParseError> {
        validator::validate(raw)?;

        let source_name = extractor::source_name(raw, &self.config)
            .require(ClauseKind::Source)?
            .ok_or(ParseError::MissingSource)?;
        let base_query = extractor::base_query(raw)
            .require(ClauseKind::Base)?
            .unwrap_or_default();
        let fields = extractor::selected_fields(raw)
            .require(ClauseKind::Fields)?
            .ok_or(ParseError::Malformed(ClauseKind::Fields))?;

        extractor::filter_part(raw).require(ClauseKind::Filter)?;
        let restrictions = extractor::conditions(raw)
            .require(ClauseKind::Conditions)?
            .unwrap_or_default()
            .iter()
            .map(|condition| Predicate::from_condition(condition))
            .collect::<Result<Vec<_>, _>>()?;
        let logical_operators = extractor::logical_operators(raw)
            .require(ClauseKind::LogicalOperators)?
            .unwrap_or_default()
            .iter()
            .map(|token| token.parse::<LogicalOperator>())
            .collect::<Result<Vec<_>, _>>()?;

        let binary = logical_operators.iter().filter(|op| op.is_binary()).count();
        if !restrictions.is_empty() && restrictions.len() != binary + 1 {
            return Err(ParseError::UnbalancedOperators {
                predicates: restrictions.len(),
                operators: binary,
            });
        }

        let group_by_fields = extractor::group_by_fields(raw)
            .require(ClauseKind::GroupBy)?
            .unwrap_or_default();
        let order_by_fields = extractor::order_by_fields(raw)
            .require(ClauseKind::OrderBy)?
            .unwrap_or_default();
        let aggregates = extractor::aggregate_functions(raw)
            .require(ClauseKind::Aggregates)?
            .unwrap_or_default()
            .iter()
            .map(|call| AggregateRef::parse(call))
            .collect::<Result<Vec<_>, _>>()?;

        let kind = QueryKind::classify(
            !group_by_fields.is_empty(),
            !order_by_fields.is_empty(),
            !aggregates.is_empty(),
        );

        let plan = QueryPlan {
            raw_text: raw.to_string(),
            source_name,
            base_query,
            fields: Projection::from_fields(fields),
            restrictions,
            logical_operators,
            aggregates,
            group_by_fields,
            order_by_fields,
            kind,
        };
        // Reject bad sort entries here rather than at execution.
        plan.sort_keys()?;

        debug!(
            kind = %plan.kind,
            source = %plan.source_name,
            predicates = plan.restrictions.len(),
            aggregates = plan.aggregates.len(),
            "Parsed query"
        );
        Ok(plan)
    }
}

/// Parse with the default configuration.
pub fn parse(raw: &str) -> Result<QueryPlan, ParseError> {
    QueryParser::default().parse(raw)
}
