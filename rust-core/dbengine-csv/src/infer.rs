// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Column type inference.
//
// A column's type is decided from a single sample cell, normally the first
// data row. Patterns are tried in a fixed order: integer, float, the date
// shapes, empty, and finally string.

use std::sync::OnceLock;

use dbengine_query::TypeTag;
use regex::Regex;

const DAY: &str = r"(?:0[1-9]|[12]\d|3[01])";
const MONTH: &str = r"(?:0[1-9]|1[012])";
const SHORT_MONTH: &str = "(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)";
const LONG_MONTH: &str =
    "(?:January|February|March|April|May|June|July|August|September|October|November|December)";

struct Patterns {
    integer: Regex,
    float: Regex,
    dates: Vec<Regex>,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let date_shapes = [
            format!(r"^{DAY}/{MONTH}/\d{{4}}$"),
            format!(r"^{MONTH}/{DAY}/\d{{4}}$"),
            format!(r"(?i)^{DAY}-{SHORT_MONTH}-\d{{2}}$"),
            format!(r"(?i)^{DAY}-{SHORT_MONTH}-\d{{4}}$"),
            format!(r"(?i)^{DAY}-{LONG_MONTH}-\d{{2}}$"),
            format!(r"(?i)^{DAY}-{LONG_MONTH}-\d{{4}}$"),
            format!(r"^\d{{4}}-{MONTH}-{DAY}$"),
            format!(r"^\d{{4}}-{MONTH}-{DAY}[ T]\d{{2}}:\d{{2}}:\d{{2}}$"),
        ];
        Patterns {
            integer: Regex::new(r"^-?[0-9]+$").expect("integer pattern is valid"),
            float: Regex::new(r"^-?[0-9]+\.[0-9]+$").expect("float pattern is valid"),
            dates: date_shapes
                .iter()
                .map(|p| Regex::new(p).expect("date pattern is valid"))
                .collect(),
        }
    })
}

/// Type tag for one sample cell.
pub fn infer_type(sample: &str) -> TypeTag {
    let sample = sample.trim();
    let patterns = patterns();

    if patterns.integer.is_match(sample) {
        // Digits that overflow i64 still compare as numbers.
        return if sample.parse::<i64>().is_ok() {
            TypeTag::Integer
        } else {
            TypeTag::Float
        };
    }
    if patterns.float.is_match(sample) {
        return TypeTag::Float;
    }
    if patterns.dates.iter().any(|p| p.is_match(sample)) {
        return TypeTag::DateTime;
    }
    if sample.is_empty() {
        return TypeTag::Empty;
    }
    TypeTag::String
}

/// One tag per sample cell.
pub fn infer_types<'a>(samples: impl IntoIterator<Item = &'a str>) -> Vec<TypeTag> {
    samples.into_iter().map(infer_type).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers() {
        assert_eq!(infer_type("42"), TypeTag::Integer);
        assert_eq!(infer_type(" -7 "), TypeTag::Integer);
        assert_eq!(infer_type("3.14"), TypeTag::Float);
        assert_eq!(infer_type("99999999999999999999"), TypeTag::Float);
        assert_eq!(infer_type("3x14"), TypeTag::String);
    }

    #[test]
    fn test_dates() {
        for sample in [
            "31/12/2018",
            "12/31/2018",
            "05-Apr-17",
            "05-apr-2017",
            "05-April-17",
            "05-April-2017",
            "2017-04-05",
            "2017-04-05 19:30:00",
        ] {
            assert_eq!(infer_type(sample), TypeTag::DateTime, "{sample}");
        }
        assert_eq!(infer_type("2017-13-05"), TypeTag::String);
    }

    #[test]
    fn test_empty_and_string() {
        assert_eq!(infer_type(""), TypeTag::Empty);
        assert_eq!(infer_type("   "), TypeTag::Empty);
        assert_eq!(infer_type("Mumbai Indians"), TypeTag::String);
    }

    #[test]
    fn test_infer_types() {
        assert_eq!(
            infer_types(["1", "Pune", ""]),
            vec![TypeTag::Integer, TypeTag::String, TypeTag::Empty]
        );
    }
}
