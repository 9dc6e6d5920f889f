//! Tests for subscription filters

use super::*;
use serde_json::json;

#[test]
fn test_empty_filter_matches_everything() {
    let filter = EventFilter::new();
    assert!(filter.is_empty());
    assert!(filter.matches(&json!({"command": "ls"})));
    assert!(filter.matches(&json!({})));
}

#[test]
fn test_parse_single_pair() {
    let filter = EventFilter::parse("pwd=/tmp");
    assert_eq!(filter.len(), 1);
    assert!(filter.matches(&json!({"pwd": "/tmp"})));
    assert!(!filter.matches(&json!({"pwd": "/home"})));
}

#[test]
fn test_parse_multiple_pairs() {
    let filter = EventFilter::parse("pwd=/tmp,hostname=web-01");
    assert!(filter.matches(&json!({"pwd": "/tmp", "hostname": "web-01"})));
    // Constraints are AND'd.
    assert!(!filter.matches(&json!({"pwd": "/tmp", "hostname": "web-02"})));
}

#[test]
fn test_parse_trims_whitespace() {
    let filter = EventFilter::parse(" pwd = /tmp , hostname = h ");
    assert!(filter.matches(&json!({"pwd": "/tmp", "hostname": "h"})));
}

#[test]
fn test_parse_ignores_malformed_pairs() {
    let filter = EventFilter::parse("nonsense,pwd=/tmp");
    assert_eq!(filter.len(), 1);
    assert!(filter.matches(&json!({"pwd": "/tmp"})));
}

#[test]
fn test_parse_empty_expression_matches_all() {
    let filter = EventFilter::parse("");
    assert!(filter.is_empty());
    assert!(filter.matches(&json!({"anything": 1})));
}

#[test]
fn test_value_in_filter_may_contain_equals() {
    // Only the first '=' splits.
    let filter = EventFilter::parse("command=FOO=bar ls");
    assert!(filter.matches(&json!({"command": "FOO=bar ls"})));
}

#[test]
fn test_numeric_fields_match_stringified() {
    let filter = EventFilter::parse("return_code=0");
    assert!(filter.matches(&json!({"return_code": 0})));
    assert!(!filter.matches(&json!({"return_code": 1})));
}

#[test]
fn test_missing_field_never_matches() {
    let filter = EventFilter::parse("pwd=/tmp");
    assert!(!filter.matches(&json!({"command": "ls"})));
}

#[test]
fn test_builder_matches_parse() {
    let built = EventFilter::new().with_field("pwd", "/tmp");
    assert_eq!(built, EventFilter::parse("pwd=/tmp"));
}
