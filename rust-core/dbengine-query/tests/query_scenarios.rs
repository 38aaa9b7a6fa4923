// SPDX-License-Identifier: PMPL-1.0-or-later
//! End-to-end query scenarios over in-memory tables

use dbengine_query::extractor::{self, Absence, Clause};
use dbengine_query::lexical::split_condition_words;
use dbengine_query::{
    is_structurally_valid, parse, ClauseKind, EngineConfig, ExecutionMode, InMemorySource,
    ParseError, QueryEngine, QueryError, QueryKind, TypeTag,
};

fn cities() -> InMemorySource {
    InMemorySource::new()
        .with_table(
            "t.csv",
            &[("city", TypeTag::String), ("population", TypeTag::Integer)],
            &[&["Pune", "3100000"], &["Delhi", "19000000"]],
        )
        .unwrap()
}

fn matches() -> InMemorySource {
    InMemorySource::new()
        .with_table(
            "ipl.csv",
            &[
                ("id", TypeTag::Integer),
                ("season", TypeTag::Integer),
                ("city", TypeTag::String),
                ("date", TypeTag::DateTime),
                ("winner", TypeTag::String),
                ("win_by_runs", TypeTag::Integer),
            ],
            &[
                &["1", "2017", "Hyderabad", "2017-04-05", "Sunrisers Hyderabad", "35"],
                &["2", "2017", "Pune", "2017-04-06", "Rising Pune Supergiant", "0"],
                &["3", "2016", "Rajkot", "2016-04-07", "Kolkata Knight Riders", "0"],
                &["4", "2015", "Indore", "2015-04-08", "Kings XI Punjab", "0"],
                &["5", "2015", "Bangalore", "2015-04-08", "Royal Challengers Bangalore", "15"],
                &["6", "2014", "Hyderabad", "2014-04-09", "Sunrisers Hyderabad", "0"],
            ],
        )
        .unwrap()
}

fn rows(result: &dbengine_query::ResultSet) -> Vec<Vec<&str>> {
    result
        .rows
        .iter()
        .map(|row| row.iter().map(String::as_str).collect())
        .collect()
}

#[test]
fn test_population_threshold_admits_both_cities() {
    let mut engine = QueryEngine::default();
    let result = engine
        .execute("select city from t.csv where population>1000000", &cities())
        .unwrap();
    assert_eq!(rows(&result), vec![vec!["Pune"], vec!["Delhi"]]);
}

#[test]
fn test_population_threshold_admits_one_city() {
    let mut engine = QueryEngine::default();
    let result = engine
        .execute("select city from t.csv where population>10000000", &cities())
        .unwrap();
    assert_eq!(rows(&result), vec![vec!["Delhi"]]);
}

#[test]
fn test_empty_condition_is_a_parse_failure() {
    let mut engine = QueryEngine::default();
    let err = engine
        .execute("select * from t.csv where", &cities())
        .unwrap_err();
    assert!(matches!(
        err,
        QueryError::Parse(ParseError::Malformed(ClauseKind::Filter))
    ));
}

#[test]
fn test_where_count_must_match_from_count() {
    assert!(!is_structurally_valid("select * from t1 where a=1 from t2"));
}

#[test]
fn test_clause_extraction_round_trip() {
    assert_eq!(
        extractor::selected_fields("select a, b from t.csv"),
        Clause::Present(vec!["a".to_string(), "b".to_string()])
    );
    assert_eq!(
        extractor::filter_part("select a, b from t.csv"),
        Clause::Absent(Absence::NotInQuery)
    );
}

#[test]
fn test_condition_decomposition() {
    let expected = Some(["age".to_string(), ">=".to_string(), "30".to_string()]);
    assert_eq!(split_condition_words("age>=30"), expected);
    assert_eq!(split_condition_words("age >= 30"), expected);
}

#[test]
fn test_repeated_parse_is_equal() {
    let raw = "select season, winner from ipl.csv where season > 2015 and city = 'Pune' or win_by_runs >= 30";
    assert_eq!(parse(raw).unwrap(), parse(raw).unwrap());
}

#[test]
fn test_or_after_and_precedence() {
    let mut engine = QueryEngine::default();
    let result = engine
        .execute(
            "select id from ipl.csv where season = 2014 or season = 2017 and win_by_runs > 0",
            &matches(),
        )
        .unwrap();
    assert_eq!(rows(&result), vec![vec!["1"], vec!["6"]]);
}

#[test]
fn test_date_filter() {
    let mut engine = QueryEngine::default();
    let result = engine
        .execute(
            "select id, city from ipl.csv where date >= 2016-01-01 and date < 07-Apr-2017",
            &matches(),
        )
        .unwrap();
    assert_eq!(
        rows(&result),
        vec![vec!["1", "Hyderabad"], vec!["2", "Pune"], vec!["3", "Rajkot"]]
    );
}

#[test]
fn test_string_filter_is_case_insensitive_equality_only() {
    let mut engine = QueryEngine::default();
    let result = engine
        .execute("select id from ipl.csv where city = 'HYDERABAD'", &matches())
        .unwrap();
    assert_eq!(rows(&result), vec![vec!["1"], vec!["6"]]);

    let result = engine
        .execute("select id from ipl.csv where city > 'A'", &matches())
        .unwrap();
    assert!(result.is_empty());
}

#[test]
fn test_not_negates_the_following_condition() {
    let mut engine = QueryEngine::default();
    let result = engine
        .execute(
            "select id from ipl.csv where season = 2015 and not city = 'Indore'",
            &matches(),
        )
        .unwrap();
    assert_eq!(rows(&result), vec![vec!["5"]]);
}

#[test]
fn test_group_by_with_count_and_order() {
    let mut engine = QueryEngine::default();
    let result = engine
        .execute(
            "select season, count(id) from ipl.csv where win_by_runs >= 0 group by season order by season desc",
            &matches(),
        )
        .unwrap();
    assert_eq!(result.columns, vec!["season", "count(id)"]);
    assert_eq!(
        rows(&result),
        vec![
            vec!["2017", "2"],
            vec!["2016", "1"],
            vec!["2015", "2"],
            vec!["2014", "1"],
        ]
    );
}

#[test]
fn test_aggregate_over_filter() {
    let mut engine = QueryEngine::default();
    let result = engine
        .execute(
            "select sum(win_by_runs), max(date), min(city) from ipl.csv where season <= 2015",
            &matches(),
        )
        .unwrap();
    assert_eq!(rows(&result), vec![vec!["15", "2015-04-08", "Bangalore"]]);
}

#[test]
fn test_simple_only_mode_rejects_grouping() {
    let mut engine = QueryEngine::new(EngineConfig {
        execution_mode: ExecutionMode::SimpleOnly,
        ..EngineConfig::default()
    });
    let err = engine
        .execute("select season from ipl.csv group by season", &matches())
        .unwrap_err();
    assert!(matches!(err, QueryError::UnsupportedKind(QueryKind::GroupBy)));

    let ok = engine.execute("select id from ipl.csv where id < 3", &matches()).unwrap();
    assert_eq!(ok.len(), 2);
}

#[test]
fn test_unresolved_filter_field_fails_before_rows() {
    let mut engine = QueryEngine::default();
    let err = engine
        .execute("select id from ipl.csv where venue = 'Eden'", &matches())
        .unwrap_err();
    assert!(matches!(err, QueryError::UnresolvedField(f) if f == "venue"));
}

#[test]
fn test_unbalanced_operators() {
    assert!(matches!(
        parse("select * from t.csv where a = 1 and b = 2 not c = 3"),
        Err(ParseError::Malformed(_)) | Err(ParseError::UnbalancedOperators { .. })
    ));
}

#[test]
fn test_group_by_with_having_parses() {
    let plan = parse("select season, count(id) from ipl.csv group by season having count(id) > 1")
        .unwrap();
    assert_eq!(plan.kind, QueryKind::GroupBy);
    assert_eq!(plan.group_by_fields, vec!["season"]);
    assert_eq!(plan.aggregates.len(), 1);
}
