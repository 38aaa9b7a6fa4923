// SPDX-License-Identifier: PMPL-1.0-or-later
//! Clause validator.
//!
//! Decides whether a raw query string is structurally plausible before any
//! clause is extracted: keyword counts must balance and clause keywords must
//! appear in a legal order. Sub-queries are recognised only by their
//! `select`/`from` pairs and parentheses.

use crate::error::StructuralViolation;
use crate::lexical::{self, Keyword};

/// Length in characters of the shortest legal query, `select * from t`.
pub const MIN_QUERY_LENGTH: usize = 15;

/// Minimum distance from a `from` to its `where` (`from t where`).
pub const MIN_WHERE_GAP: usize = 7;

/// Validate `raw`, reporting the first structural violation found.
pub fn validate(raw: &str) -> Result<(), StructuralViolation> {
    let query = raw.trim();
    let length = query.chars().count();
    if length < MIN_QUERY_LENGTH {
        return Err(StructuralViolation::TooShort {
            length,
            minimum: MIN_QUERY_LENGTH,
        });
    }

    let (list_start, from) = match (
        lexical::first_keyword_span(query, Keyword::Select),
        lexical::first_keyword(query, Keyword::From),
    ) {
        (Some(select), Some(from)) => (select.end, from),
        _ => return Err(StructuralViolation::MissingSelectOrFrom),
    };
    if from < list_start {
        return Err(StructuralViolation::FromBeforeSelect);
    }
    if query[list_start..from].trim().is_empty() {
        return Err(StructuralViolation::EmptySelectList);
    }

    check_counts(query)?;
    check_where_positions(query)?;
    check_order_group_positions(query)
}

/// Boolean form of [`validate`].
pub fn is_structurally_valid(raw: &str) -> bool {
    validate(raw).is_ok()
}

fn check_counts(query: &str) -> Result<(), StructuralViolation> {
    let selects = lexical::count_keyword(query, Keyword::Select);
    let froms = lexical::count_keyword(query, Keyword::From);
    if selects != froms {
        return Err(StructuralViolation::SelectFromMismatch { selects, froms });
    }

    for keyword in [Keyword::Where, Keyword::OrderBy, Keyword::GroupBy] {
        let count = lexical::count_keyword(query, keyword);
        if count > selects {
            return Err(StructuralViolation::TooManyClauses {
                clause: keyword.as_str(),
                count,
                selects,
            });
        }
    }
    Ok(())
}

/// Every `where` pairs with the `from` of the same ordinal and must follow it
/// by at least [`MIN_WHERE_GAP`] characters.
fn check_where_positions(query: &str) -> Result<(), StructuralViolation> {
    let wheres = lexical::keyword_positions(query, Keyword::Where);
    if wheres.is_empty() {
        return Ok(());
    }

    let froms = lexical::keyword_positions(query, Keyword::From);
    if wheres.len() != froms.len() {
        return Err(StructuralViolation::WhereFromMismatch {
            wheres: wheres.len(),
            froms: froms.len(),
        });
    }

    for (&offset, &from) in wheres.iter().zip(&froms) {
        if offset < from {
            return Err(StructuralViolation::WhereBeforeFrom { offset });
        }
        if query[from..offset].chars().count() < MIN_WHERE_GAP {
            return Err(StructuralViolation::WhereAbutsFrom { offset });
        }
    }
    Ok(())
}

/// Pairs `group by` / `order by` occurrences by ordinal, up to the smaller
/// count. An `order by` ahead of its `group by` must be closed off by a `)`.
/// A `group by` ahead of its `order by` may only have an `and` between them
/// inside a `having`, and an `and` before that `having` must itself sit in a
/// sub-query.
fn check_order_group_positions(query: &str) -> Result<(), StructuralViolation> {
    let orders = lexical::keyword_positions(query, Keyword::OrderBy);
    let groups = lexical::keyword_positions(query, Keyword::GroupBy);

    for (&order, &group) in orders.iter().zip(&groups) {
        if order < group {
            if !lexical::is_part_of_subquery(&query[order..group]) {
                return Err(StructuralViolation::OrderByBeforeGroupBy { offset: order });
            }
            continue;
        }

        let between = &query[group..order];
        let Some(and) = lexical::first_keyword(between, Keyword::And) else {
            continue;
        };
        match lexical::first_keyword(between, Keyword::Having) {
            None => return Err(StructuralViolation::AndOutsideHaving),
            Some(having) if and < having && !lexical::is_part_of_subquery(&between[and..having]) => {
                return Err(StructuralViolation::AndOutsideHaving)
            }
            Some(_) => {}
        }
    }
    Ok(())
}
