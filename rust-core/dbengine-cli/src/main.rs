// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//!
//! dbengine: run queries against CSV files.
//!
//! One-shot mode reads a single query (from `--query` or one line of
//! stdin), prints the result and writes `<source>.json` next to the data.
//! `--repl` opens an interactive shell with:
//! - Tab completion for keywords, aggregates and meta-commands
//! - Multiline query support (backslash continuation)
//! - Table, JSON and CSV output
//! - Query timing and plan display
//! - Persistent command history

mod completer;
mod output;

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::Parser;
use colored::Colorize;
use dbengine_csv::CsvSource;
use dbengine_query::{EngineConfig, ExecutionMode, QueryEngine, QueryPlan, ResultSet};
use rustyline::config::Configurer;
use rustyline::error::ReadlineError;
use rustyline::hint::HistoryHinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::MatchingBracketValidator;
use rustyline_derive::{Completer, Helper, Highlighter, Hinter, Validator};
use tracing_subscriber::EnvFilter;

use output::OutputFormat;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// CLI argument parsing
// ---------------------------------------------------------------------------

/// Run SQL-like queries against CSV files.
#[derive(Parser, Debug)]
#[command(name = "dbengine", version = VERSION, about = "Query CSV files with a small SQL dialect")]
struct Cli {
    /// Query text. Read from one line of stdin when omitted.
    #[arg(short, long)]
    query: Option<String>,

    /// Directory that bare source names are resolved against.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Directory for the JSON result artifact. Defaults to the root, else
    /// the current directory.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Console output format.
    #[arg(long, default_value = "table")]
    format: OutputFormat,

    /// Execute only plain filtered selects.
    #[arg(long)]
    simple_only: bool,

    /// Do not write the JSON result artifact.
    #[arg(long)]
    no_write: bool,

    /// Start the interactive shell.
    #[arg(long)]
    repl: bool,
}

impl Cli {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            execution_mode: if self.simple_only {
                ExecutionMode::SimpleOnly
            } else {
                ExecutionMode::Extended
            },
            ..EngineConfig::default()
        }
    }

    fn artifact_dir(&self) -> Option<PathBuf> {
        if self.no_write {
            return None;
        }
        self.output_dir
            .clone()
            .or_else(|| self.root.clone())
            .or_else(|| Some(PathBuf::from(".")))
    }
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Everything a query needs, shared by one-shot and interactive use.
struct Session {
    engine: QueryEngine,
    source: CsvSource,
    format: OutputFormat,
    /// Where artifacts go; `None` disables writing.
    artifact_dir: Option<PathBuf>,
    show_timing: bool,
}

impl Session {
    fn new(cli: &Cli) -> Self {
        let source = match &cli.root {
            Some(root) => CsvSource::with_root(root),
            None => CsvSource::new(),
        };
        Self {
            engine: QueryEngine::new(cli.engine_config()),
            source,
            format: cli.format,
            artifact_dir: cli.artifact_dir(),
            show_timing: false,
        }
    }

    /// Parse and execute one query, print it, and write the artifact.
    fn run(&mut self, query: &str) -> anyhow::Result<ResultSet> {
        let start = Instant::now();
        let plan = self.plan(query)?;
        let result = self
            .engine
            .execute_plan(&plan, &self.source)
            .with_context(|| format!("query against {} failed", plan.source_name))?;
        let elapsed = start.elapsed();

        println!("{}", output::render(&result, self.format));
        if self.show_timing {
            println!(
                "{}",
                format!("Time: {:.3}ms", elapsed.as_secs_f64() * 1000.0).dimmed()
            );
        }
        if let Some(dir) = &self.artifact_dir {
            output::write_artifact(&result, &plan.source_name, dir)?;
        }
        Ok(result)
    }

    fn plan(&self, query: &str) -> anyhow::Result<QueryPlan> {
        self.engine.parse(query).context("cannot parse query")
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let outcome = if cli.repl {
        run_repl(&cli)
    } else {
        run_once(&cli)
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e:#}", "Error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run_once(cli: &Cli) -> anyhow::Result<()> {
    let query = match &cli.query {
        Some(query) => query.clone(),
        None => read_query(io::stdin().lock())?,
    };
    Session::new(cli).run(&query)?;
    Ok(())
}

/// First line of `input`, with trailing semicolons dropped.
fn read_query(mut input: impl BufRead) -> anyhow::Result<String> {
    let mut line = String::new();
    input.read_line(&mut line).context("failed to read query")?;
    let query = line.trim().trim_end_matches(';').trim_end();
    if query.is_empty() {
        bail!("no query given");
    }
    Ok(query.to_string())
}

// ---------------------------------------------------------------------------
// Interactive shell
// ---------------------------------------------------------------------------

#[derive(Helper, Highlighter, Completer, Hinter, Validator)]
struct ShellHelper {
    #[rustyline(Completer)]
    completer: completer::QueryCompleter,
    #[rustyline(Hinter)]
    hinter: HistoryHinter,
    #[rustyline(Validator)]
    validator: MatchingBracketValidator,
}

fn run_repl(cli: &Cli) -> anyhow::Result<()> {
    let mut session = Session::new(cli);
    print_banner(&session, cli.root.as_deref());

    let helper = ShellHelper {
        completer: completer::QueryCompleter,
        hinter: HistoryHinter::new(),
        validator: MatchingBracketValidator::new(),
    };
    let mut editor = rustyline::Editor::<ShellHelper, DefaultHistory>::new()
        .context("failed to create readline editor")?;
    editor.set_helper(Some(helper));
    editor.set_auto_add_history(true);

    // Missing on first run.
    let history_path = history_file_path();
    let _ = editor.load_history(&history_path);

    let mut query_buf = String::new();
    loop {
        let prompt = if query_buf.is_empty() {
            format!("{} ", "dbengine>".bright_green().bold())
        } else {
            format!("{} ", "       ..".bright_green())
        };

        match editor.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();

                if trimmed.is_empty() {
                    if !query_buf.is_empty() {
                        let query = std::mem::take(&mut query_buf);
                        execute(&mut session, query.trim());
                    }
                    continue;
                }

                if let Some(head) = trimmed.strip_suffix('\\') {
                    if !query_buf.is_empty() {
                        query_buf.push(' ');
                    }
                    query_buf.push_str(head);
                    continue;
                }

                if !query_buf.is_empty() {
                    query_buf.push(' ');
                    query_buf.push_str(trimmed);
                    let query = std::mem::take(&mut query_buf);
                    execute(&mut session, query.trim());
                    continue;
                }

                if trimmed.starts_with('\\') {
                    if handle_meta_command(&mut session, trimmed) {
                        break;
                    }
                    continue;
                }

                execute(&mut session, trimmed);
            }
            Err(ReadlineError::Interrupted) => {
                if !query_buf.is_empty() {
                    query_buf.clear();
                    println!("Query cancelled.");
                } else {
                    println!("Use \\quit or Ctrl-D to exit.");
                }
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye.");
                break;
            }
            Err(err) => {
                eprintln!("Readline error: {err}");
                break;
            }
        }
    }

    let _ = editor.save_history(&history_path);
    Ok(())
}

fn execute(session: &mut Session, query: &str) {
    let query = query.trim_end_matches(';');
    if query.is_empty() {
        return;
    }
    if let Err(e) = session.run(query) {
        eprintln!("{} {e:#}", "Error:".red().bold());
    }
}

/// Returns `true` when the shell should exit.
fn handle_meta_command(session: &mut Session, line: &str) -> bool {
    let (cmd, arg) = match line.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (line, ""),
    };

    match cmd {
        "\\quit" | "\\q" => {
            println!("Goodbye.");
            return true;
        }
        "\\help" | "\\h" | "\\?" => print_help(),
        "\\timing" => {
            session.show_timing = !session.show_timing;
            println!(
                "Timing display: {}",
                if session.show_timing { "on" } else { "off" }
            );
        }
        "\\format" if arg.is_empty() => {
            println!("Current format: {}", session.format);
            println!("Usage: \\format <table|json|csv>");
        }
        "\\format" => match arg.parse::<OutputFormat>() {
            Ok(format) => {
                session.format = format;
                println!("Output format: {}", session.format);
            }
            Err(e) => eprintln!("{} {e}", "Error:".red().bold()),
        },
        "\\plan" if arg.is_empty() => println!("Usage: \\plan <query>"),
        "\\plan" => match session.plan(arg) {
            Ok(plan) => match serde_json::to_string_pretty(&plan) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("{} {e}", "Error:".red().bold()),
            },
            Err(e) => eprintln!("{} {e:#}", "Error:".red().bold()),
        },
        _ => {
            eprintln!(
                "{} Unknown command: {}. Type \\help for available commands.",
                "Error:".red().bold(),
                cmd
            );
        }
    }

    false
}

fn history_file_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".dbengine_history")
}

fn print_banner(session: &Session, root: Option<&Path>) {
    println!();
    println!("{}", "  DbEngine query shell".bright_cyan().bold());
    println!("  {} {}", "Version:".dimmed(), VERSION);
    println!(
        "  {} {}",
        "Root:   ".dimmed(),
        root.map_or_else(|| ".".to_string(), |r| r.display().to_string())
    );
    println!("  {} {}", "Format: ".dimmed(), session.format);
    println!();
    println!(
        "  Type {} for help, {} to exit.",
        "\\help".bright_yellow(),
        "\\quit".bright_yellow()
    );
    println!();
}

fn print_help() {
    let commands = [
        ("\\plan <query>", "Show the parsed plan as JSON"),
        ("\\timing", "Toggle query timing display"),
        ("\\format <fmt>", "Set output format (table|json|csv)"),
        ("\\help", "Show this help message"),
        ("\\quit / \\q", "Exit the shell"),
    ];

    println!();
    println!("{}", "  Meta-commands".bright_cyan().bold());
    println!();
    for (command, description) in commands {
        println!("  {}  {}", format!("{command:<15}").bright_yellow(), description);
    }
    println!();
    println!("{}", "  Queries".bright_cyan().bold());
    println!();
    println!("  select <fields> from <file.csv> [where ...] [group by ...] [order by ...]");
    println!("  Use \\ at end of line for multiline continuation.");
    println!("  Trailing semicolons are stripped automatically.");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_query_takes_first_line() {
        let input = "select * from t.csv;\nignored\n".as_bytes();
        assert_eq!(read_query(input).unwrap(), "select * from t.csv");
    }

    #[test]
    fn test_read_query_rejects_blank_input() {
        assert!(read_query("   \n".as_bytes()).is_err());
        assert!(read_query("".as_bytes()).is_err());
    }

    #[test]
    fn test_artifact_dir_defaults() {
        let cli = Cli::parse_from(["dbengine", "--root", "/data"]);
        assert_eq!(cli.artifact_dir(), Some(PathBuf::from("/data")));

        let cli = Cli::parse_from(["dbengine", "--root", "/data", "--output-dir", "/out"]);
        assert_eq!(cli.artifact_dir(), Some(PathBuf::from("/out")));

        let cli = Cli::parse_from(["dbengine", "--no-write"]);
        assert_eq!(cli.artifact_dir(), None);
    }

    #[test]
    fn test_simple_only_flag() {
        let cli = Cli::parse_from(["dbengine", "--simple-only", "--format", "json"]);
        assert_eq!(cli.engine_config().execution_mode, ExecutionMode::SimpleOnly);
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn test_session_runs_query_and_writes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("t.csv"),
            "city,population\nPune,3100000\nDelhi,19000000\n",
        )
        .unwrap();
        let root = dir.path().to_string_lossy().to_string();
        let cli = Cli::parse_from(["dbengine", "--root", root.as_str(), "--format", "csv"]);

        let mut session = Session::new(&cli);
        let result = session
            .run("select city from t.csv where population>10000000")
            .unwrap();
        assert_eq!(result.rows, vec![vec!["Delhi".to_string()]]);

        let written = std::fs::read_to_string(dir.path().join("t.json")).unwrap();
        assert!(written.contains("Delhi"));

        session.run("select city from t.csv where population>99999999").unwrap();
        let written = std::fs::read_to_string(dir.path().join("t.json")).unwrap();
        assert_eq!(written, "null");
    }

    #[test]
    fn test_meta_commands() {
        let cli = Cli::parse_from(["dbengine", "--no-write"]);
        let mut session = Session::new(&cli);
        assert!(!handle_meta_command(&mut session, "\\timing"));
        assert!(session.show_timing);
        assert!(!handle_meta_command(&mut session, "\\format json"));
        assert_eq!(session.format, OutputFormat::Json);
        assert!(handle_meta_command(&mut session, "\\q"));
    }
}
