// SPDX-License-Identifier: PMPL-1.0-or-later
//! Clause extractor.
//!
//! Each function pulls one clause out of a raw query and reports it as a
//! [`Clause`]: present with content, legitimately absent, or malformed. All
//! extractors run the clause validator first and report `Malformed` for a
//! query that fails it. Offsets are computed on the trimmed query.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::ParseError;
use crate::lexical::{self, Keyword, SplitMode};
use crate::validator;

/// Why a clause has no content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Absence {
    /// The query never mentions the clause.
    NotInQuery,
    /// The clause keyword occurs, but only inside a sub-query.
    OnlyInSubquery,
}

/// Outcome of extracting one clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause<T> {
    Absent(Absence),
    Malformed,
    Present(T),
}

impl<T> Clause<T> {
    pub fn is_malformed(&self) -> bool {
        matches!(self, Clause::Malformed)
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> Clause<U>) -> Clause<U> {
        match self {
            Clause::Present(value) => f(value),
            Clause::Absent(why) => Clause::Absent(why),
            Clause::Malformed => Clause::Malformed,
        }
    }

    /// Absent becomes `None`, malformed becomes a parse error naming `kind`.
    pub fn require(self, kind: ClauseKind) -> Result<Option<T>, ParseError> {
        match self {
            Clause::Present(value) => Ok(Some(value)),
            Clause::Absent(_) => Ok(None),
            Clause::Malformed => Err(ParseError::Malformed(kind)),
        }
    }
}

/// The clauses the extractor knows about, used in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClauseKind {
    Source,
    Base,
    Fields,
    Filter,
    Conditions,
    LogicalOperators,
    GroupBy,
    OrderBy,
    Aggregates,
}

impl fmt::Display for ClauseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClauseKind::Source => "source",
            ClauseKind::Base => "base query",
            ClauseKind::Fields => "select list",
            ClauseKind::Filter => "filter",
            ClauseKind::Conditions => "condition",
            ClauseKind::LogicalOperators => "logical operator",
            ClauseKind::GroupBy => "group by",
            ClauseKind::OrderBy => "order by",
            ClauseKind::Aggregates => "aggregate",
        };
        f.write_str(name)
    }
}

/// Validate and trim, or bail out with `Malformed`.
macro_rules! validated {
    ($raw:expr) => {{
        let query = $raw.trim();
        if !validator::is_structurally_valid(query) {
            return Clause::Malformed;
        }
        query
    }};
}

/// The first whitespace-separated token naming a configured source.
pub fn source_name(raw: &str, config: &EngineConfig) -> Clause<String> {
    let query = validated!(raw);
    query
        .split_whitespace()
        .find(|token| config.is_source_name(token))
        .map_or(Clause::Absent(Absence::NotInQuery), |token| {
            Clause::Present(token.to_string())
        })
}

/// The query up to its last `where`, or failing that its last `group by`,
/// or failing that its last `order by`.
pub fn base_query(raw: &str) -> Clause<String> {
    let query = validated!(raw);
    let cut = lexical::last_keyword(query, Keyword::Where)
        .or_else(|| lexical::last_keyword(query, Keyword::GroupBy))
        .or_else(|| lexical::last_keyword(query, Keyword::OrderBy));

    let Some(cut) = cut else {
        return Clause::Present(query.to_string());
    };
    let base = query[..cut].trim();
    let orphaned = [Keyword::Where, Keyword::OrderBy, Keyword::GroupBy]
        .into_iter()
        .any(|keyword| lexical::contains_keyword(base, keyword));
    if orphaned && !base.contains('(') && !base.contains(')') {
        return Clause::Malformed;
    }
    Clause::Present(base.to_string())
}

/// Comma-separated fields between the leading `select` and its `from`.
///
/// The matching `from` is the first one for which the text in between has
/// as many `select`s as `from`s, so a sub-query in the select list keeps its
/// own `from`. A part that is empty, or contains whitespace without being
/// an assignment, makes the whole list malformed.
pub fn selected_fields(raw: &str) -> Clause<Vec<String>> {
    let query = validated!(raw);
    let list_start = match lexical::first_keyword_span(query, Keyword::Select) {
        Some(select) if select.start == 0 => select.end,
        _ => return Clause::Malformed,
    };
    let matching_from = lexical::keyword_positions(query, Keyword::From)
        .into_iter()
        .filter(|&from| from >= list_start)
        .find(|&from| {
            let between = &query[list_start..from];
            lexical::count_keyword(between, Keyword::Select)
                == lexical::count_keyword(between, Keyword::From)
        });
    let Some(from) = matching_from else {
        return Clause::Malformed;
    };

    let fields: Vec<String> = query[list_start..from]
        .split(',')
        .map(|part| part.trim().to_string())
        .collect();
    let malformed = fields
        .iter()
        .any(|part| part.is_empty() || (part.contains(char::is_whitespace) && !part.contains('=')));
    if malformed {
        return Clause::Malformed;
    }
    Clause::Present(fields)
}

/// The text after the final `where`, up to any trailing `group by` or
/// `order by`.
///
/// A `where` that only belongs to a sub-query yields
/// `Absent(OnlyInSubquery)`. Filters shorter than `1=3` (or `1 = 3`) are
/// treated as truncated.
pub fn filter_part(raw: &str) -> Clause<String> {
    let query = validated!(raw);
    let Some(start) = lexical::last_keyword_span(query, Keyword::Where).map(|span| span.end) else {
        return Clause::Absent(Absence::NotInQuery);
    };
    if query[..start].chars().count() <= validator::MIN_QUERY_LENGTH {
        return Clause::Malformed;
    }

    let order = lexical::last_keyword(query, Keyword::OrderBy);
    let group = lexical::last_keyword(query, Keyword::GroupBy);
    if let (Some(order), Some(group)) = (order, group) {
        if group > order && !lexical::is_part_of_subquery(&query[order..group]) {
            return Clause::Malformed;
        }
    }

    let end = group.or(order);
    match end {
        Some(end) if end > start => {
            let text = query[start..end].trim();
            if text.is_empty() {
                return Clause::Malformed;
            }
            if lexical::is_part_of_subquery(text) {
                return Clause::Absent(Absence::OnlyInSubquery);
            }
            let text = Keyword::Where.regex().replace_all(text, "");
            filter_text(text.trim())
        }
        _ => {
            // A clause keyword ahead of the `where` must belong to a sub-query.
            let scope = end.map_or(query, |end| &query[..end]);
            let nested = lexical::count_keyword(scope, Keyword::Select) > 1;
            if end.is_some() && !nested {
                return Clause::Malformed;
            }
            let text = query[start..].trim();
            if text.is_empty() {
                return Clause::Malformed;
            }
            if nested && lexical::is_part_of_subquery(text) {
                return Clause::Absent(Absence::OnlyInSubquery);
            }
            filter_text(text)
        }
    }
}

fn filter_text(text: &str) -> Clause<String> {
    let spaced = text.contains(char::is_whitespace);
    let length = text.chars().count();
    if (spaced && length < 5) || (!spaced && length < 3) {
        return Clause::Malformed;
    }
    Clause::Present(text.to_string())
}

/// The filter split into condition fragments on `and` / `or`.
///
/// Every fragment, after an optional leading `not`, must decompose into
/// field, operator and literal.
pub fn conditions(raw: &str) -> Clause<Vec<String>> {
    filter_part(raw).and_then(|filter| {
        let Some(fragments) =
            lexical::split_by(&filter, lexical::connectives(), SplitMode::RemoveDelimiters)
        else {
            return Clause::Malformed;
        };
        let decomposable = fragments.iter().all(|fragment| {
            let (_, condition) = lexical::strip_negation(fragment);
            lexical::split_condition_words(condition).is_some()
        });
        if !decomposable {
            return Clause::Malformed;
        }
        Clause::Present(fragments)
    })
}

/// The `and` / `or` / `not` tokens of the filter, lower-cased, in order.
pub fn logical_operators(raw: &str) -> Clause<Vec<String>> {
    filter_part(raw).and_then(|filter| {
        match lexical::split_by(&filter, lexical::logical_tokens(), SplitMode::OnlyDelimiters) {
            None => Clause::Malformed,
            Some(tokens) if tokens.is_empty() => Clause::Absent(Absence::NotInQuery),
            Some(tokens) => Clause::Present(tokens.into_iter().map(|t| t.to_lowercase()).collect()),
        }
    })
}

/// Fields after the last `order by`, which may carry `asc` / `desc`.
pub fn order_by_fields(raw: &str) -> Clause<Vec<String>> {
    let query = validated!(raw);
    trailing_clause(query, Keyword::OrderBy).and_then(|tail| {
        let reaches_back = lexical::contains_keyword(tail, Keyword::Where)
            || lexical::contains_keyword(tail, Keyword::GroupBy);
        if reaches_back {
            return if lexical::is_part_of_subquery(tail) {
                Clause::Absent(Absence::OnlyInSubquery)
            } else {
                Clause::Malformed
            };
        }
        if lexical::is_part_of_subquery(tail) && !tail.contains('(') {
            return Clause::Absent(Absence::OnlyInSubquery);
        }
        field_list(tail, true)
    })
}

/// Fields after the last `group by`, stopping at a following `having` or
/// `order by`. The `having` condition itself is not extracted.
pub fn group_by_fields(raw: &str) -> Clause<Vec<String>> {
    let query = validated!(raw);
    trailing_clause(query, Keyword::GroupBy).and_then(|tail| {
        if lexical::contains_keyword(tail, Keyword::Where) {
            return if lexical::is_part_of_subquery(tail) {
                Clause::Absent(Absence::OnlyInSubquery)
            } else {
                Clause::Malformed
            };
        }
        if lexical::is_part_of_subquery(tail) && !tail.contains('(') {
            return Clause::Absent(Absence::OnlyInSubquery);
        }

        let end = [Keyword::Having, Keyword::OrderBy]
            .into_iter()
            .filter_map(|keyword| lexical::first_keyword(tail, keyword))
            .min()
            .unwrap_or(tail.len());
        let fields = &tail[..end];
        let fields = fields.trim();
        let fields = if fields.ends_with(')') {
            fields.trim_matches(')')
        } else {
            fields
        };
        field_list(fields, false)
    })
}

/// `fn(field)` references in the base query.
pub fn aggregate_functions(raw: &str) -> Clause<Vec<String>> {
    base_query(raw).and_then(|base| {
        let calls: Vec<String> = lexical::aggregate_calls()
            .find_iter(&base)
            .map(|m| m.as_str().to_string())
            .collect();
        if calls.is_empty() {
            Clause::Absent(Absence::NotInQuery)
        } else {
            Clause::Present(calls)
        }
    })
}

/// Text after the last occurrence of `keyword`; malformed when nothing
/// follows it.
fn trailing_clause(query: &str, keyword: Keyword) -> Clause<&str> {
    match lexical::last_keyword_span(query, keyword) {
        None => Clause::Absent(Absence::NotInQuery),
        Some(span) => {
            let tail = query[span.end..].trim();
            if tail.is_empty() {
                Clause::Malformed
            } else {
                Clause::Present(tail)
            }
        }
    }
}

/// Comma-separated, trimmed, none empty. Order-by entries are a field and
/// at most one direction word.
fn field_list(text: &str, sort_entries: bool) -> Clause<Vec<String>> {
    let fields: Vec<String> = text.split(',').map(|f| f.trim().to_string()).collect();
    let malformed = fields.iter().any(|field| {
        let words = field.split_whitespace().count();
        words == 0 || (sort_entries && words > 2)
    });
    if malformed {
        return Clause::Malformed;
    }
    Clause::Present(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_invalid_query_is_malformed_everywhere() {
        let raw = "select from";
        assert!(selected_fields(raw).is_malformed());
        assert!(filter_part(raw).is_malformed());
        assert!(order_by_fields(raw).is_malformed());
        assert!(base_query(raw).is_malformed());
    }

    #[test]
    fn test_source_name() {
        let config = EngineConfig::default();
        assert_eq!(
            source_name("select * from data/ipl.csv where season > 2014", &config),
            Clause::Present("data/ipl.csv".to_string())
        );
        assert_eq!(
            source_name("select * from ipl where season > 2014", &config),
            Clause::Absent(Absence::NotInQuery)
        );
    }

    #[test]
    fn test_base_query() {
        assert_eq!(
            base_query("select city from t.csv where population > 10 order by city"),
            Clause::Present("select city from t.csv".to_string())
        );
        assert_eq!(
            base_query("select city from t.csv group by city order by city"),
            Clause::Present("select city from t.csv".to_string())
        );
        assert_eq!(
            base_query("select city from t.csv"),
            Clause::Present("select city from t.csv".to_string())
        );
    }

    #[test]
    fn test_selected_fields() {
        assert_eq!(
            selected_fields("select a, b from t.csv"),
            Clause::Present(strings(&["a", "b"]))
        );
        assert_eq!(
            selected_fields("select * from t.csv"),
            Clause::Present(strings(&["*"]))
        );
    }

    #[test]
    fn test_selected_fields_malformed() {
        assert!(selected_fields("select a, from t.csv").is_malformed());
        assert!(selected_fields("select a b from t.csv").is_malformed());
        assert!(selected_fields("with x select a from t.csv").is_malformed());
    }

    #[test]
    fn test_selected_fields_with_subquery() {
        let raw = "select a, b=(select max(c) from u.csv) from t.csv";
        assert_eq!(
            selected_fields(raw),
            Clause::Present(strings(&["a", "b=(select max(c) from u.csv)"]))
        );
    }

    #[test]
    fn test_filter_part() {
        assert_eq!(
            filter_part("select * from t.csv where a = 1 and b > 2 order by a"),
            Clause::Present("a = 1 and b > 2".to_string())
        );
        assert_eq!(
            filter_part("select * from t.csv where a=1"),
            Clause::Present("a=1".to_string())
        );
    }

    #[test]
    fn test_filter_absent() {
        assert_eq!(
            filter_part("select a, b from t.csv"),
            Clause::Absent(Absence::NotInQuery)
        );
    }

    #[test]
    fn test_filter_of_outer_query() {
        assert_eq!(
            filter_part("select a from (select a from t.csv where a>1) where a<5"),
            Clause::Present("a<5".to_string())
        );
    }

    #[test]
    fn test_filter_malformed() {
        assert!(filter_part("select * from t.csv where").is_malformed());
        assert!(filter_part("select * from t.csv where a=").is_malformed());
        assert!(filter_part("select * from t.csv where a =").is_malformed());
    }

    #[test]
    fn test_conditions() {
        assert_eq!(
            conditions("select * from t.csv where a = 1 and b>2 or not c != 'x y'"),
            Clause::Present(strings(&["a = 1", "b>2", "not c != 'x y'"]))
        );
        assert!(conditions("select * from t.csv where a = 1 and and b > 2").is_malformed());
        assert!(conditions("select * from t.csv where a 1 and b > 2").is_malformed());
    }

    #[test]
    fn test_conditions_ignore_connectives_inside_words() {
        assert_eq!(
            conditions("select * from t.csv where city = Bangalore"),
            Clause::Present(strings(&["city = Bangalore"]))
        );
    }

    #[test]
    fn test_logical_operators() {
        assert_eq!(
            logical_operators("select * from t.csv where a=1 OR b=2 and not c=3"),
            Clause::Present(strings(&["or", "and", "not"]))
        );
        assert_eq!(
            logical_operators("select * from t.csv where a=1"),
            Clause::Absent(Absence::NotInQuery)
        );
    }

    #[test]
    fn test_order_by_fields() {
        assert_eq!(
            order_by_fields("select * from t.csv where a=1 order by a, b desc"),
            Clause::Present(strings(&["a", "b desc"]))
        );
        assert_eq!(
            order_by_fields("select * from t.csv"),
            Clause::Absent(Absence::NotInQuery)
        );
        assert_eq!(
            order_by_fields("select * from (select a from t.csv order by a)"),
            Clause::Absent(Absence::OnlyInSubquery)
        );
        assert!(order_by_fields("select * from t.csv order by").is_malformed());
    }

    #[test]
    fn test_group_by_fields() {
        assert_eq!(
            group_by_fields("select city, count(id) from t.csv group by city order by city"),
            Clause::Present(strings(&["city"]))
        );
        assert_eq!(
            group_by_fields("select a from t.csv"),
            Clause::Absent(Absence::NotInQuery)
        );
        assert_eq!(
            group_by_fields("select * from (select a from t.csv group by a)"),
            Clause::Absent(Absence::OnlyInSubquery)
        );
    }

    #[test]
    fn test_group_by_stops_at_having() {
        let raw = "select a, count(b) from t.csv group by a having count(b) > 1";
        assert_eq!(group_by_fields(raw), Clause::Present(strings(&["a"])));
        assert_eq!(
            group_by_fields(
                "select a, b, count(c) from t.csv group by a, b having count(c) > 1 and max(c) < 9 order by a"
            ),
            Clause::Present(strings(&["a", "b"]))
        );
        assert!(group_by_fields("select a from t.csv group by a,").is_malformed());
    }

    #[test]
    fn test_base_query_with_orphaned_keyword() {
        assert!(base_query("select a from t.csv group by a where b=1").is_malformed());
    }

    #[test]
    fn test_filter_only_in_subquery() {
        assert_eq!(
            filter_part("select a from t.csv where a in (select b from u.csv where b>1)"),
            Clause::Absent(Absence::OnlyInSubquery)
        );
    }

    #[test]
    fn test_aggregate_functions() {
        assert_eq!(
            aggregate_functions("select city, avg(age), count(id) from t.csv where age > 3"),
            Clause::Present(strings(&["avg(age)", "count(id)"]))
        );
        assert_eq!(
            aggregate_functions("select city from t.csv"),
            Clause::Absent(Absence::NotInQuery)
        );
    }

    #[test]
    fn test_require() {
        assert_eq!(Clause::Present(1).require(ClauseKind::Base), Ok(Some(1)));
        assert_eq!(
            Clause::<i32>::Absent(Absence::NotInQuery).require(ClauseKind::Base),
            Ok(None)
        );
        assert_eq!(
            Clause::<i32>::Malformed.require(ClauseKind::Filter),
            Err(ParseError::Malformed(ClauseKind::Filter))
        );
    }
}
