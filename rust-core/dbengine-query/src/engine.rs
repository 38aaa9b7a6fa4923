// SPDX-License-Identifier: PMPL-1.0-or-later
//! Parse-and-execute front door.

use crate::config::EngineConfig;
use crate::error::{ParseError, QueryError};
use crate::executor::{QueryExecutor, ResultSet};
use crate::parser::QueryParser;
use crate::plan::QueryPlan;
use crate::source::TabularSource;

/// A parser and an executor sharing one configuration.
///
/// The executor's schema cache lives as long as the engine, so repeated
/// queries against the same source fetch its schema once.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    parser: QueryParser,
    executor: QueryExecutor,
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl QueryEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            executor: QueryExecutor::new(&config),
            parser: QueryParser::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        self.parser.config()
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    pub fn parse(&self, raw: &str) -> Result<QueryPlan, ParseError> {
        self.parser.parse(raw)
    }

    /// Parse `raw` and run it against `source`. Nothing is read from the
    /// source when parsing fails.
    pub fn execute(
        &mut self,
        raw: &str,
        source: &dyn TabularSource,
    ) -> Result<ResultSet, QueryError> {
        let plan = self.parser.parse(raw)?;
        self.executor.execute(&plan, source)
    }

    pub fn execute_plan(
        &mut self,
        plan: &QueryPlan,
        source: &dyn TabularSource,
    ) -> Result<ResultSet, QueryError> {
        self.executor.execute(plan, source)
    }
}
