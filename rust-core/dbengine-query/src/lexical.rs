// SPDX-License-Identifier: PMPL-1.0-or-later
//! Positional string utilities.
//!
//! Keyword search, regex splitting and counting, and the structural checks
//! the validator and clause extractors are built from. Nothing here knows
//! what a clause means. Keyword matches are whole-word and case-insensitive;
//! every offset returned is a byte offset into the text that was searched.

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

/// Keywords the validator and extractors locate by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Select,
    From,
    Where,
    GroupBy,
    OrderBy,
    Having,
    And,
    Or,
    Not,
}

impl Keyword {
    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Select => "select",
            Keyword::From => "from",
            Keyword::Where => "where",
            Keyword::GroupBy => "group by",
            Keyword::OrderBy => "order by",
            Keyword::Having => "having",
            Keyword::And => "and",
            Keyword::Or => "or",
            Keyword::Not => "not",
        }
    }

    /// Whole-word, case-insensitive pattern for this keyword.
    pub fn regex(self) -> &'static Regex {
        static CELLS: [OnceLock<Regex>; 9] = [
            OnceLock::new(),
            OnceLock::new(),
            OnceLock::new(),
            OnceLock::new(),
            OnceLock::new(),
            OnceLock::new(),
            OnceLock::new(),
            OnceLock::new(),
            OnceLock::new(),
        ];
        let slot = self as usize;
        compiled(&CELLS[slot], &format!(r"(?i)\b{}\b", self.as_str()))
    }
}

fn compiled(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("built-in pattern is valid"))
}

/// `and` / `or`, the connectives a filter is split on.
pub fn connectives() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    compiled(&CELL, r"(?i)\b(?:and|or)\b")
}

/// `and` / `or` / `not`, every logical operator token.
pub fn logical_tokens() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    compiled(&CELL, r"(?i)\b(?:and|or|not)\b")
}

/// Comparison operators, two-character forms first so `>=` is never read as `>`.
pub fn comparison_operators() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    compiled(&CELL, r"!=|<=|>=|=|<|>")
}

/// `fn(field)` for the supported aggregate functions.
pub fn aggregate_calls() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    compiled(&CELL, r"(?i)(?:avg|min|max|count|sum)\([a-zA-Z0-9_]+\)")
}

/// Offsets of every occurrence of `keyword` in `text`.
pub fn keyword_positions(text: &str, keyword: Keyword) -> Vec<usize> {
    keyword.regex().find_iter(text).map(|m| m.start()).collect()
}

/// Offset of the first occurrence of `keyword`.
pub fn first_keyword(text: &str, keyword: Keyword) -> Option<usize> {
    keyword.regex().find(text).map(|m| m.start())
}

/// Offset of the last occurrence of `keyword`.
pub fn last_keyword(text: &str, keyword: Keyword) -> Option<usize> {
    last_keyword_span(text, keyword).map(|span| span.start)
}

/// Byte range of the first occurrence of `keyword`.
///
/// Case folding can match text longer than the keyword itself (`ſelect`),
/// so slicing past a keyword uses the span end.
pub fn first_keyword_span(text: &str, keyword: Keyword) -> Option<Range<usize>> {
    keyword.regex().find(text).map(|m| m.range())
}

/// Byte range of the last occurrence of `keyword`.
pub fn last_keyword_span(text: &str, keyword: Keyword) -> Option<Range<usize>> {
    keyword.regex().find_iter(text).last().map(|m| m.range())
}

pub fn count_keyword(text: &str, keyword: Keyword) -> usize {
    keyword.regex().find_iter(text).count()
}

pub fn contains_keyword(text: &str, keyword: Keyword) -> bool {
    keyword.regex().is_match(text)
}

/// A closing parenthesis means the text belongs to (or ends) a sub-query.
pub fn is_part_of_subquery(text: &str) -> bool {
    text.contains(')')
}

/// What [`split_by`] keeps from the pieces of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitMode {
    /// Only the text between delimiters, trimmed.
    RemoveDelimiters,
    /// Only the delimiters, trimmed.
    OnlyDelimiters,
}

/// Split `text` around every match of `delimiter`, keeping the matches.
///
/// `"a and b"` split on `and` yields `["a ", "and", " b"]`. A match at
/// either end produces an empty leading or trailing piece.
pub fn split_around<'a>(text: &'a str, delimiter: &Regex) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut last = 0;
    for m in delimiter.find_iter(text) {
        pieces.push(&text[last..m.start()]);
        pieces.push(m.as_str());
        last = m.end();
    }
    pieces.push(&text[last..]);
    pieces
}

/// Split `text` on `delimiter` and filter the pieces according to `mode`.
///
/// Returns `None` when a blank piece shows up, which means two delimiters
/// were adjacent or one sat at an end. The exception is a split that
/// produced a bare `not`: `and not` legitimately leaves a blank between the
/// two tokens, so blanks are dropped instead.
pub fn split_by(text: &str, delimiter: &Regex, mode: SplitMode) -> Option<Vec<String>> {
    let mut pieces = split_around(text, delimiter);
    if pieces.iter().any(|p| p.trim().is_empty()) {
        if pieces.iter().any(|p| p.trim().eq_ignore_ascii_case("not")) {
            pieces.retain(|p| !p.trim().is_empty());
        } else {
            return None;
        }
    }

    let kept = match mode {
        SplitMode::RemoveDelimiters => pieces
            .into_iter()
            .filter(|p| !delimiter.is_match(p))
            .map(|p| p.trim().to_string())
            .collect(),
        SplitMode::OnlyDelimiters => pieces
            .into_iter()
            .filter(|p| delimiter.is_match(p))
            .map(|p| p.trim().to_string())
            .collect(),
    };
    Some(kept)
}

pub fn is_comparison_operator(token: &str) -> bool {
    matches!(token, "=" | "!=" | "<" | "<=" | ">" | ">=")
}

/// Decompose one condition into `[field, operator, literal]`.
///
/// Whitespace splitting is tried first (`age >= 30`); when that does not
/// give exactly three words with an operator in the middle, the condition
/// is split on the operator itself (`age>=30`, `city = 'New York'`). Exactly
/// one operator and two non-blank operands are required.
pub fn split_condition_words(condition: &str) -> Option<[String; 3]> {
    let condition = condition.trim();
    if condition.is_empty() {
        return None;
    }

    let words: Vec<&str> = condition.split_whitespace().collect();
    if let [field, operator, literal] = words.as_slice() {
        if is_comparison_operator(operator) {
            return Some([field.to_string(), operator.to_string(), literal.to_string()]);
        }
    }

    match split_around(condition, comparison_operators()).as_slice() {
        [field, operator, literal] if !field.trim().is_empty() && !literal.trim().is_empty() => {
            Some([
                field.trim().to_string(),
                operator.to_string(),
                literal.trim().to_string(),
            ])
        }
        _ => None,
    }
}

/// Strip a leading `not` word, reporting whether one was present.
pub fn strip_negation(condition: &str) -> (bool, &str) {
    let condition = condition.trim_start();
    match condition.split_once(char::is_whitespace) {
        Some((word, rest)) if word.eq_ignore_ascii_case("not") => (true, rest.trim()),
        None if condition.eq_ignore_ascii_case("not") => (true, ""),
        _ => (false, condition.trim_end()),
    }
}

/// Split `fn(field)` into `(fn, field)`.
pub fn split_aggregate(call: &str) -> Option<(&str, &str)> {
    let (function, rest) = call.trim().split_once('(')?;
    if rest.contains('(') {
        return None;
    }
    let field = rest.trim_matches(')');
    if function.is_empty() || field.is_empty() {
        return None;
    }
    Some((function, field))
}

/// Remove surrounding single or double quotes from a literal.
pub fn strip_quotes(literal: &str) -> &str {
    literal.trim_matches(|c| c == '\'' || c == '"')
}
