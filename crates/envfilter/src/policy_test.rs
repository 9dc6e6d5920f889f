//! Tests for the capture policy

use super::*;

fn default_policy() -> EnvPolicy {
    EnvPolicy::compile(PolicyFile::default()).unwrap()
}

// ============================================================================
// Disposition tests
// ============================================================================

#[test]
fn test_absolute_deny_wins() {
    let policy = default_policy();
    assert_eq!(policy.disposition("PS1"), Disposition::Drop);
    assert_eq!(policy.disposition("BASH_SOURCE"), Disposition::Drop);
    assert_eq!(policy.disposition("__INTERNAL"), Disposition::Drop);
    assert_eq!(policy.disposition("___RECAP_CMD"), Disposition::Drop);
    assert_eq!(policy.disposition("_"), Disposition::Drop);
    assert_eq!(policy.disposition("HISTFILE"), Disposition::Drop);
}

#[test]
fn test_exact_allow_kept() {
    let policy = default_policy();
    assert_eq!(policy.disposition("HOME"), Disposition::Keep);
    assert_eq!(policy.disposition("PWD"), Disposition::Keep);
    assert_eq!(policy.disposition("NODE_ENV"), Disposition::Keep);
}

#[test]
fn test_pattern_allow_kept() {
    let policy = default_policy();
    assert_eq!(policy.disposition("MYAPP_ENV"), Disposition::Keep);
    assert_eq!(policy.disposition("GIT_DIR"), Disposition::Keep);
    assert_eq!(policy.disposition("PROJECT_ROOT"), Disposition::Keep);
}

#[test]
fn test_unlisted_dropped() {
    let policy = default_policy();
    assert_eq!(policy.disposition("SOME_RANDOM_VAR"), Disposition::Drop);
    assert_eq!(policy.disposition("lowercase"), Disposition::Drop);
}

#[test]
fn test_sensitive_allowed_names_hashed() {
    let policy = default_policy();
    // Matches the allowlist `*_KEY` pattern but also the sensitive
    // `key` pattern, so the value is digested rather than dropped.
    assert_eq!(policy.disposition("AWS_SECRET_KEY"), Disposition::Hash);
    assert_eq!(policy.disposition("DATABASE_URL"), Disposition::Hash);
}

#[test]
fn test_hashing_can_be_disabled() {
    let mut file = PolicyFile::default();
    file.hash_sensitive_values = false;
    let policy = EnvPolicy::compile(file).unwrap();
    assert_eq!(policy.disposition("AWS_SECRET_KEY"), Disposition::Keep);
}

#[test]
fn test_user_deny_pattern_forces_hash() {
    let mut file = PolicyFile::default();
    file.hash_sensitive_values = false;
    file.denylist.patterns.push(r"(?i)internal".into());
    let policy = EnvPolicy::compile(file).unwrap();
    assert_eq!(policy.disposition("MYAPP_INTERNAL_ENV"), Disposition::Hash);
}

// ============================================================================
// Filtering tests
// ============================================================================

#[test]
fn test_filter_applies_dispositions() {
    let policy = default_policy();
    let env = vec![
        ("HOME".to_string(), "/home/u".to_string()),
        ("PS1".to_string(), "$ ".to_string()),
        ("AWS_SECRET_KEY".to_string(), "hunter2".to_string()),
        ("UNLISTED".to_string(), "x".to_string()),
    ];

    let captured = policy.filter(env);

    assert_eq!(captured.get("HOME").map(String::as_str), Some("/home/u"));
    assert!(!captured.contains_key("PS1"));
    assert!(!captured.contains_key("UNLISTED"));

    let digest = captured.get("AWS_SECRET_KEY").unwrap();
    assert!(digest.starts_with("h8_"));
    assert_eq!(digest.len(), 11);
    assert_ne!(digest, "hunter2");
}

#[test]
fn test_digest_is_deterministic() {
    assert_eq!(digest_value("hunter2"), digest_value("hunter2"));
    assert_ne!(digest_value("hunter2"), digest_value("hunter3"));
    assert!(digest_value("hunter2").starts_with("h8_"));
}

#[test]
fn test_filter_empty_env() {
    let policy = default_policy();
    assert!(policy.filter(Vec::new()).is_empty());
}

// ============================================================================
// File handling tests
// ============================================================================

#[test]
fn test_policy_file_round_trip() {
    let mut file = PolicyFile::default();
    file.version = Some("3".into());
    let json = serde_json::to_string(&file).unwrap();
    let parsed: PolicyFile = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.version.as_deref(), Some("3"));
    assert_eq!(parsed.allowlist.exact, file.allowlist.exact);
    assert!(parsed.hash_sensitive_values);
}

#[test]
fn test_partial_policy_file_gets_defaults() {
    let parsed: PolicyFile =
        serde_json::from_str(r#"{"allowlist":{"exact":["ONLY_THIS"]}}"#).unwrap();
    assert_eq!(parsed.allowlist.exact, vec!["ONLY_THIS".to_string()]);
    assert!(parsed.allowlist.patterns.is_empty());
    assert!(parsed.hash_sensitive_values);
}

#[test]
fn test_load_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.json");
    std::fs::write(
        &path,
        r#"{"allowlist":{"exact":["CUSTOM_VAR"]},"version":"7"}"#,
    )
    .unwrap();

    let policy = EnvPolicy::load(Some(&path)).unwrap();
    assert_eq!(policy.disposition("CUSTOM_VAR"), Disposition::Keep);
    assert_eq!(policy.disposition("HOME"), Disposition::Drop);
    assert_eq!(policy.version(), Some("7"));
}

#[test]
fn test_load_explicit_missing_path_fails() {
    let dir = tempfile::tempdir().unwrap();
    let result = EnvPolicy::load(Some(&dir.path().join("nope.json")));
    assert!(matches!(result, Err(EnvFilterError::Read { .. })));
}

#[test]
fn test_load_explicit_garbage_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.json");
    std::fs::write(&path, "{not json").unwrap();
    assert!(matches!(
        EnvPolicy::load(Some(&path)),
        Err(EnvFilterError::Parse { .. })
    ));
}

#[test]
fn test_write_default_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("policy.json");
    EnvPolicy::write_default(&path).unwrap();

    let policy = EnvPolicy::load(Some(&path)).unwrap();
    assert_eq!(policy.disposition("HOME"), Disposition::Keep);
}

#[test]
fn test_compile_rejects_bad_pattern() {
    let mut file = PolicyFile::default();
    file.allowlist.patterns.push("[unclosed".into());
    assert!(matches!(
        EnvPolicy::compile(file),
        Err(EnvFilterError::Pattern { .. })
    ));
}
