// SPDX-License-Identifier: PMPL-1.0-or-later
//! Engine configuration.
//!
//! Defaults:
//! - source_extensions: ["csv"]
//! - execution_mode: extended

use serde::{Deserialize, Serialize};

use crate::plan::QueryKind;

/// Which plan kinds the executor is willing to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Only `Simple` plans execute; grouped, ordered and aggregate plans
    /// are parsed but rejected at execution time.
    SimpleOnly,
    /// All plan kinds execute.
    Extended,
}

impl ExecutionMode {
    /// Whether a plan of `kind` may be executed in this mode.
    pub fn allows(self, kind: QueryKind) -> bool {
        match self {
            ExecutionMode::SimpleOnly => kind == QueryKind::Simple,
            ExecutionMode::Extended => true,
        }
    }
}

/// Configuration shared by the parser and executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// File extensions (without the dot) that identify a source name in a
    /// query. Compared case-insensitively.
    pub source_extensions: Vec<String>,
    /// Which plan kinds may be executed.
    pub execution_mode: ExecutionMode,
}

impl EngineConfig {
    /// Whether `token` names a tabular source, i.e. has a non-empty stem and
    /// one of the configured extensions.
    pub fn is_source_name(&self, token: &str) -> bool {
        match token.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => self
                .source_extensions
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext)),
            _ => false,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            source_extensions: vec!["csv".to_string()],
            execution_mode: ExecutionMode::Extended,
        }
    }
}
