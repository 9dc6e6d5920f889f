//! Tests for the protocol classifier

use super::*;

// ============================================================================
// Request routing
// ============================================================================

#[test]
fn test_all_request_verbs_route_to_gateway() {
    for verb in ["GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH"] {
        let line = format!("{verb} /_cluster/health HTTP/1.1");
        assert_eq!(classify(&line), Route::Gateway, "verb {verb}");
    }
}

#[test]
fn test_request_line_with_carriage_return() {
    assert_eq!(classify("GET / HTTP/1.1\r"), Route::Gateway);
}

#[test]
fn test_verb_without_space_is_not_a_request() {
    // A bare verb or a verb glued to its path is just an opaque record.
    assert_eq!(classify("GET"), Route::Ingest);
    assert_eq!(classify("GET/path"), Route::Ingest);
}

#[test]
fn test_lowercase_verb_is_not_a_request() {
    assert_eq!(classify("get / HTTP/1.1"), Route::Ingest);
}

// ============================================================================
// Subscribe routing
// ============================================================================

#[test]
fn test_subscribe_with_id() {
    match classify("SUBSCRIBE tui") {
        Route::Subscribe { id, filter } => {
            assert_eq!(id, "tui");
            assert!(filter.is_empty());
        }
        other => panic!("unexpected route {other:?}"),
    }
}

#[test]
fn test_subscribe_without_id_is_anonymous() {
    match classify("SUBSCRIBE") {
        Route::Subscribe { id, filter } => {
            assert_eq!(id, "anonymous");
            assert!(filter.is_empty());
        }
        other => panic!("unexpected route {other:?}"),
    }
}

#[test]
fn test_subscribe_with_filter() {
    match classify("SUBSCRIBE tui pwd=/tmp,hostname=web-01") {
        Route::Subscribe { id, filter } => {
            assert_eq!(id, "tui");
            assert_eq!(filter.len(), 2);
            assert!(filter.matches(&serde_json::json!({"pwd": "/tmp", "hostname": "web-01"})));
        }
        other => panic!("unexpected route {other:?}"),
    }
}

#[test]
fn test_subscribe_glued_prefix_is_not_a_subscription() {
    assert_eq!(classify("SUBSCRIBEX tui"), Route::Ingest);
}

// ============================================================================
// Ingestion fallback
// ============================================================================

#[test]
fn test_json_record_routes_to_ingest() {
    assert_eq!(classify(r#"{"command":"ls","return_code":0}"#), Route::Ingest);
}

#[test]
fn test_arbitrary_text_routes_to_ingest() {
    assert_eq!(classify("hello world"), Route::Ingest);
    assert_eq!(classify(""), Route::Ingest);
}

#[test]
fn test_classification_is_deterministic() {
    let lines = [
        "GET / HTTP/1.1",
        "SUBSCRIBE a pwd=/tmp",
        r#"{"command":"ls"}"#,
    ];
    for line in lines {
        assert_eq!(classify(line), classify(line));
    }
}
