//! Tests for event assembly

use super::*;
use recap_envfilter::PolicyFile;

fn policy() -> EnvPolicy {
    EnvPolicy::compile(PolicyFile::default()).unwrap()
}

fn payload(command: &str, pwd: &str) -> PreexecPayload {
    PreexecPayload {
        command: command.into(),
        pwd: pwd.into(),
        start_timestamp: "2025-01-01T12:00:00.250+00:00".into(),
        environment: vec![
            "HOME=/home/u".into(),
            "PS1=$ ".into(),
            "AWS_SECRET_KEY=hunter2".into(),
            "NOT_CAPTURED=x".into(),
        ],
    }
}

fn encode(payload: &serde_json::Value) -> String {
    BASE64.encode(serde_json::to_vec(payload).unwrap())
}

// ============================================================================
// Payload decoding
// ============================================================================

#[test]
fn test_decode_payload_round_trip() {
    let encoded = encode(&serde_json::json!({
        "command": "ls -la",
        "pwd": "/tmp",
        "start_timestamp": "2025-01-01T12:00:00.250Z",
        "environment": ["HOME=/home/u"],
    }));

    let payload = decode_payload(&encoded).unwrap();
    assert_eq!(payload.command, "ls -la");
    assert_eq!(payload.pwd, "/tmp");
    assert_eq!(payload.environment, vec!["HOME=/home/u"]);
}

#[test]
fn test_decode_payload_missing_environment_defaults_empty() {
    let encoded = encode(&serde_json::json!({
        "command": "ls",
        "pwd": "/tmp",
        "start_timestamp": "2025-01-01T12:00:00.250Z",
    }));
    assert!(decode_payload(&encoded).unwrap().environment.is_empty());
}

#[test]
fn test_decode_payload_rejects_garbage() {
    assert!(decode_payload("!!! not base64").is_err());
    assert!(decode_payload(&BASE64.encode(b"not json")).is_err());
}

// ============================================================================
// Timestamp parsing
// ============================================================================

#[test]
fn test_parse_rfc3339_timestamp() {
    let ts = parse_shell_timestamp("2025-01-01T12:00:00.250+00:00").unwrap();
    assert_eq!(ts.timestamp_subsec_millis(), 250);
}

#[test]
fn test_parse_shell_date_form_with_space() {
    // `date +%Y-%m-%d %H:%M:%S.%N%:z` output: space instead of `T`.
    let ts = parse_shell_timestamp("2025-01-01 12:00:00.123456789+02:00").unwrap();
    assert_eq!(
        ts,
        parse_shell_timestamp("2025-01-01T12:00:00.123456789+02:00").unwrap()
    );
}

#[test]
fn test_parse_empty_timestamp_is_error() {
    assert!(parse_shell_timestamp("").is_err());
    assert!(parse_shell_timestamp("yesterday").is_err());
}

// ============================================================================
// Event assembly
// ============================================================================

#[test]
fn test_build_event_basics() {
    let event = build_event(&payload("  ls -la  ", "/work"), 0, None, &policy()).unwrap();

    assert_eq!(event.command, "ls -la");
    assert_eq!(event.return_code, 0);
    assert_eq!(event.pwd, "/work");
    assert!(!event.hostname.is_empty());
    assert!(event.end_timestamp >= event.start_timestamp);
}

#[test]
fn test_pwd_is_the_preexec_directory() {
    // A `cd` must be attributed to where it was typed, not its target.
    let event = build_event(&payload("cd /somewhere/else", "/original"), 0, None, &policy())
        .unwrap();
    assert_eq!(event.pwd, "/original");
}

#[test]
fn test_environment_is_filtered() {
    let event = build_event(&payload("ls", "/tmp"), 0, None, &policy()).unwrap();

    assert_eq!(event.env.get("HOME").map(String::as_str), Some("/home/u"));
    assert!(!event.env.contains_key("PS1"));
    assert!(!event.env.contains_key("NOT_CAPTURED"));
    assert!(event.env.get("AWS_SECRET_KEY").unwrap().starts_with("h8_"));
}

#[test]
fn test_explicit_end_timestamp_used() {
    let event = build_event(
        &payload("ls", "/tmp"),
        0,
        Some("2025-01-01 12:00:05.000+00:00"),
        &policy(),
    )
    .unwrap();
    assert_eq!(
        event.end_timestamp - event.start_timestamp,
        chrono::Duration::milliseconds(4750)
    );
}

#[test]
fn test_config_version_stamped_from_policy() {
    let mut file = PolicyFile::default();
    file.version = Some("9".into());
    let policy = EnvPolicy::compile(file).unwrap();

    let event = build_event(&payload("ls", "/tmp"), 0, None, &policy).unwrap();
    assert_eq!(event.config_version.as_deref(), Some("9"));
}

#[test]
fn test_empty_command_is_rejected() {
    assert!(build_event(&payload("   ", "/tmp"), 0, None, &policy()).is_err());
}

#[test]
fn test_return_code_preserved() {
    let event = build_event(&payload("false", "/tmp"), 127, None, &policy()).unwrap();
    assert_eq!(event.return_code, 127);
}

#[test]
fn test_event_serializes_to_single_line() {
    let event = build_event(&payload("ls", "/tmp"), 0, None, &policy()).unwrap();
    let line = event.encode_line().unwrap();
    assert!(!line.contains('\n'));
    assert!(line.contains(r#""command":"ls""#));
}
