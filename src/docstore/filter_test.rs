use super::*;
use serde_json::json;
use time::Duration;

fn bag(entries: &[(&str, Value)]) -> Map<String, Value> {
    entries.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect()
}

fn name_leaf() -> DocFilter {
    DocFilter::Leaf { key: "name".into(), condition: r#"{"name":"{0}"}"#.into() }
}

fn age_leaf() -> DocFilter {
    DocFilter::Leaf { key: "age".into(), condition: r#"{"age":{0}}"#.into() }
}

// =============================================================================
// leaves
// =============================================================================

#[test]
fn leaf_with_present_param_renders_condition() {
    let filter = name_leaf();
    let condition = filter.condition(&bag(&[("name", json!("ada"))])).unwrap();
    assert_eq!(condition, json!({ "name": "ada" }));
}

#[test]
fn leaf_with_absent_param_contributes_nothing() {
    let filter = name_leaf();
    assert!(filter.condition(&bag(&[("other", json!("x"))])).is_none());
    assert!(filter.condition(&Map::new()).is_none());
}

#[test]
fn leaf_with_null_param_contributes_nothing() {
    let filter = name_leaf();
    assert!(filter.condition(&bag(&[("name", Value::Null)])).is_none());
}

#[test]
fn leaf_substitutes_numbers_without_quotes() {
    let filter = age_leaf();
    let condition = filter.condition(&bag(&[("age", json!(42))])).unwrap();
    assert_eq!(condition, json!({ "age": 42 }));
}

#[test]
fn malformed_template_is_recovered_as_no_contribution() {
    let filter = DocFilter::Leaf { key: "name".into(), condition: r#"{"name": {0"#.into() };
    assert!(filter.condition(&bag(&[("name", json!("ada"))])).is_none());
}

// =============================================================================
// composites
// =============================================================================

#[test]
fn and_with_one_absent_param_equals_the_other_alone() {
    let filter = DocFilter::And { filters: vec![name_leaf(), age_leaf()] };
    let condition = filter.condition(&bag(&[("name", json!("ada"))])).unwrap();
    assert_eq!(condition, json!({ "name": "ada" }));
}

#[test]
fn and_merges_both_contributions() {
    let filter = DocFilter::And { filters: vec![name_leaf(), age_leaf()] };
    let condition = filter
        .condition(&bag(&[("name", json!("ada")), ("age", json!(36))]))
        .unwrap();
    assert_eq!(condition, json!({ "name": "ada", "age": 36 }));
}

#[test]
fn and_merges_operator_objects_on_the_same_field() {
    let low = DocFilter::Leaf { key: "min".into(), condition: r#"{"age":{"$gte":{0}}}"#.into() };
    let high = DocFilter::Leaf { key: "max".into(), condition: r#"{"age":{"$lte":{0}}}"#.into() };
    let filter = DocFilter::And { filters: vec![low, high] };
    let condition = filter
        .condition(&bag(&[("min", json!(18)), ("max", json!(65))]))
        .unwrap();
    assert_eq!(condition, json!({ "age": { "$gte": 18, "$lte": 65 } }));
}

#[test]
fn or_collects_contributions_into_or_clause() {
    let filter = DocFilter::Or { filters: vec![name_leaf(), age_leaf()] };
    let condition = filter
        .condition(&bag(&[("name", json!("ada")), ("age", json!(36))]))
        .unwrap();
    assert_eq!(condition, json!({ "$or": [{ "name": "ada" }, { "age": 36 }] }));
}

#[test]
fn composite_with_no_contribution_is_none() {
    let filter = DocFilter::And { filters: vec![name_leaf(), age_leaf()] };
    assert!(filter.condition(&Map::new()).is_none());

    let filter = DocFilter::Or { filters: vec![name_leaf()] };
    assert!(filter.condition(&Map::new()).is_none());
}

#[test]
fn nested_composites_evaluate_recursively() {
    let inner = DocFilter::Or { filters: vec![name_leaf(), age_leaf()] };
    let outer = DocFilter::And {
        filters: vec![
            DocFilter::Leaf { key: "active".into(), condition: r#"{"active":{0}}"#.into() },
            inner,
        ],
    };
    let condition = outer
        .condition(&bag(&[("active", json!(true)), ("name", json!("ada"))]))
        .unwrap();
    assert_eq!(condition, json!({ "active": true, "$or": [{ "name": "ada" }] }));
}

// =============================================================================
// dates
// =============================================================================

#[test]
fn date_marker_round_trips_to_the_millisecond() {
    let instant = OffsetDateTime::from_unix_timestamp(1_754_000_000).unwrap()
        + Duration::milliseconds(123);
    let filter = DocFilter::Leaf {
        key: "since".into(),
        condition: r#"{"created":{"$gte":"{0}"}}"#.into(),
    };
    let params = bag(&[("since", date_param(instant).unwrap())]);
    let condition = filter.condition(&params).unwrap();

    let revived = extract_date(&condition["created"]["$gte"]).unwrap();
    assert_eq!(revived, instant);
}

#[test]
fn date_marker_in_template_literal_is_revived() {
    let filter = DocFilter::Leaf {
        key: "day".into(),
        condition: r#"{"created":"$Date${0}"}"#.into(),
    };
    let condition = filter
        .condition(&bag(&[("day", json!("2026-08-07T00:00:00Z"))]))
        .unwrap();
    let revived = extract_date(&condition["created"]).unwrap();
    assert_eq!(revived.unix_timestamp(), 1_786_060_800);
}

#[test]
fn bad_date_literal_is_recovered_as_no_contribution() {
    let filter = DocFilter::Leaf {
        key: "day".into(),
        condition: r#"{"created":"$Date${0}"}"#.into(),
    };
    assert!(filter.condition(&bag(&[("day", json!("not-a-date"))])).is_none());
}

// =============================================================================
// serde config shape
// =============================================================================

#[test]
fn filter_tree_deserializes_from_config_json() {
    let raw = json!({
        "type": "and",
        "filters": [
            { "type": "leaf", "key": "name", "condition": r#"{"name":"{0}"}"# },
            { "type": "or", "filters": [
                { "type": "leaf", "key": "age", "condition": r#"{"age":{0}}"# }
            ]}
        ]
    });
    let filter: DocFilter = serde_json::from_value(raw).unwrap();
    let condition = filter.condition(&bag(&[("name", json!("ada"))])).unwrap();
    assert_eq!(condition, json!({ "name": "ada" }));
}
