//! Tests for the event record and wire codec

use super::*;
use chrono::TimeZone;

fn sample_event() -> CommandEvent {
    CommandEvent {
        command: "ls -la".into(),
        return_code: 0,
        start_timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        end_timestamp: Utc
            .timestamp_opt(1735689600, 150_000_000)
            .single()
            .unwrap(),
        pwd: "/tmp".into(),
        hostname: "workbench".into(),
        ip_address: None,
        env: BTreeMap::new(),
        config_version: None,
    }
}

// ============================================================================
// Round-trip tests
// ============================================================================

#[test]
fn test_encode_decode_identity() {
    let event = sample_event();
    let line = event.encode_line().unwrap();
    let decoded = CommandEvent::decode_line(line.as_bytes()).unwrap();
    assert_eq!(event, decoded);
}

#[test]
fn test_round_trip_all_optional_fields() {
    let mut event = sample_event();
    event.ip_address = Some("10.0.0.7".into());
    event.env.insert("HOME".into(), "/home/u".into());
    event.env.insert("NODE_ENV".into(), "production".into());
    event.config_version = Some("2".into());

    let line = event.encode_line().unwrap();
    let decoded = CommandEvent::decode_line(line.as_bytes()).unwrap();
    assert_eq!(event, decoded);
}

#[test]
fn test_encoded_line_has_no_newline() {
    let mut event = sample_event();
    event.command = "echo 'a\nb'".into();
    let line = event.encode_line().unwrap();
    assert!(!line.contains('\n'));
}

#[test]
fn test_config_version_renamed_on_wire() {
    let mut event = sample_event();
    event.config_version = Some("1".into());
    let line = event.encode_line().unwrap();
    assert!(line.contains("\"_config_version\":\"1\""));
    assert!(!line.contains("config_version\":\"1\",\"_"));
}

#[test]
fn test_empty_env_omitted_on_wire() {
    let line = sample_event().encode_line().unwrap();
    assert!(!line.contains("\"env\""));
    assert!(!line.contains("\"ip_address\""));
    assert!(!line.contains("\"_config_version\""));
}

#[test]
fn test_decode_without_config_version() {
    let line = r#"{"command":"ls","return_code":0,"start_timestamp":"2025-01-01T00:00:00.000Z","end_timestamp":"2025-01-01T00:00:00.001Z","pwd":"/tmp","hostname":"h"}"#;
    let event = CommandEvent::decode_line(line.as_bytes()).unwrap();
    assert_eq!(event.command, "ls");
    assert_eq!(event.config_version, None);
    assert!(event.env.is_empty());
}

// ============================================================================
// Timestamp serialization
// ============================================================================

#[test]
fn test_timestamps_always_carry_subseconds() {
    // Whole-second timestamp must still serialize fractional digits.
    let line = sample_event().encode_line().unwrap();
    assert!(line.contains("\"start_timestamp\":\"2025-01-01T00:00:00.000000000Z\""));
}

#[test]
fn test_round_trip_preserves_nanoseconds() {
    let mut event = sample_event();
    event.end_timestamp = Utc.timestamp_opt(1735689600, 123_456_789).single().unwrap();
    let line = event.encode_line().unwrap();
    assert_eq!(CommandEvent::decode_line(line.as_bytes()).unwrap(), event);
}

#[test]
fn test_timestamp_parses_offset_form() {
    let line = r#"{"command":"ls","return_code":0,"start_timestamp":"2025-06-01T12:00:00.5+02:00","end_timestamp":"2025-06-01T12:00:01.5+02:00","pwd":"/","hostname":"h"}"#;
    let event = CommandEvent::decode_line(line.as_bytes()).unwrap();
    assert_eq!(
        event.start_timestamp,
        Utc.timestamp_opt(1748772000, 500_000_000).single().unwrap()
    );
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_validate_accepts_sample() {
    assert!(sample_event().validate().is_ok());
}

#[test]
fn test_validate_rejects_empty_command() {
    let mut event = sample_event();
    event.command = String::new();
    assert!(matches!(event.validate(), Err(EventError::Invalid(_))));
}

#[test]
fn test_validate_rejects_empty_pwd() {
    let mut event = sample_event();
    event.pwd = String::new();
    assert!(event.validate().is_err());
}

#[test]
fn test_validate_rejects_reversed_timestamps() {
    let mut event = sample_event();
    event.end_timestamp = event.start_timestamp - chrono::Duration::seconds(1);
    assert!(event.validate().is_err());
}

#[test]
fn test_validate_accepts_equal_timestamps() {
    let mut event = sample_event();
    event.end_timestamp = event.start_timestamp;
    assert!(event.validate().is_ok());
}

#[test]
fn test_decode_rejects_garbage() {
    assert!(CommandEvent::decode_line(b"not json").is_err());
    assert!(CommandEvent::decode_line(b"{\"command\":\"ls\"}").is_err());
}
