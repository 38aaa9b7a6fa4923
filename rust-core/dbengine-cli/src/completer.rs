// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//!
//! Tab completion for the query shell: clause keywords, aggregate
//! functions, sort directions and meta-commands.

use rustyline::completion::{Completer, Pair};
use rustyline::Context;

const KEYWORDS: &[&str] = &[
    "select", "from", "where", "group by", "order by", "having", "and", "or", "not", "asc",
    "desc",
];

const AGGREGATES: &[&str] = &["avg(", "count(", "max(", "min(", "sum("];

const META_COMMANDS: &[&str] = &[
    "\\format", "\\help", "\\plan", "\\quit", "\\q", "\\timing",
];

/// Completes the word under the cursor. Keyword matching ignores case and
/// the replacement follows the casing of the typed prefix.
pub struct QueryCompleter;

impl Completer for QueryCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let (start, prefix) = find_word_start(line, pos);
        Ok((start, candidates(prefix)))
    }
}

fn candidates(prefix: &str) -> Vec<Pair> {
    if prefix.is_empty() {
        return Vec::new();
    }
    if prefix.starts_with('\\') {
        return META_COMMANDS
            .iter()
            .filter(|cmd| cmd.starts_with(prefix))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect();
    }

    let lower = prefix.to_lowercase();
    let upper = prefix.chars().all(|c| c.is_uppercase() || !c.is_alphabetic());
    KEYWORDS
        .iter()
        .chain(AGGREGATES)
        .filter(|word| word.starts_with(&lower))
        .map(|word| Pair {
            display: word.to_string(),
            replacement: if upper {
                word.to_uppercase()
            } else {
                word.to_string()
            },
        })
        .collect()
}

/// Start and text of the token ending at `pos`.
fn find_word_start(line: &str, pos: usize) -> (usize, &str) {
    let start = line[..pos]
        .rfind(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | ','))
        .map_or(0, |i| i + 1);
    (start, &line[start..pos])
}
