// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//!
//! Result set rendering and the on-disk JSON artifact.
//!
//! Console output comes in three shapes:
//! - **Table**: columnar output using `comfy-table`.
//! - **JSON**: the serialised result set, pretty-printed.
//! - **CSV**: header line plus one line per row, written with `csv::Writer`.
//!
//! The artifact is always JSON. A query that admits no rows writes `null`
//! so that "no result" is distinguishable from a missing file.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use comfy_table::{Cell, ContentArrangement, Table};
use dbengine_query::ResultSet;
use tracing::info;

/// Available console output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(format!(
                "Unknown format '{other}'. Valid formats: table, json, csv"
            )),
        }
    }
}

/// Render a result set for the console.
pub fn render(result: &ResultSet, format: OutputFormat) -> String {
    match format {
        OutputFormat::Table => render_table(result),
        OutputFormat::Json => render_json(result),
        OutputFormat::Csv => render_csv(result),
    }
}

fn render_table(result: &ResultSet) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(result.columns.iter().map(Cell::new));
    for row in &result.rows {
        table.add_row(row.iter().map(Cell::new));
    }

    let row_count = result.len();
    format!("{table}\n({row_count} row{})", if row_count == 1 { "" } else { "s" })
}

fn render_json(result: &ResultSet) -> String {
    serde_json::to_string_pretty(result).unwrap_or_else(|e| format!("\"{e}\""))
}

fn render_csv(result: &ResultSet) -> String {
    write_csv(result).unwrap_or_else(|e| format!("error: {e:#}"))
}

fn write_csv(result: &ResultSet) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&result.columns)?;
    for row in &result.rows {
        writer.write_record(row)?;
    }
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

/// Artifact path for a source: its file name with the extension swapped for
/// `.json`, placed in `dir`.
pub fn artifact_path(source_name: &str, dir: &Path) -> PathBuf {
    let file_name = Path::new(source_name)
        .file_name()
        .map_or_else(|| PathBuf::from(source_name), PathBuf::from);
    dir.join(file_name.with_extension("json"))
}

/// JSON text written to the artifact.
pub fn artifact_json(result: &ResultSet) -> serde_json::Result<String> {
    if result.is_empty() {
        Ok("null".to_string())
    } else {
        serde_json::to_string_pretty(result)
    }
}

/// Write the artifact for `source_name` into `dir`, returning its path.
pub fn write_artifact(result: &ResultSet, source_name: &str, dir: &Path) -> anyhow::Result<PathBuf> {
    let path = artifact_path(source_name, dir);
    let json = artifact_json(result).context("failed to serialise result set")?;
    fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), rows = result.len(), "Wrote result artifact");
    Ok(path)
}
