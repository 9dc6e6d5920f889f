//! Assembling one command event
//!
//! The shell's pre-exec hook stashes the command, the working directory,
//! the start time, and the raw environment *before* the command runs,
//! base64-encoded so nothing needs shell quoting. After the command
//! finishes, this module turns that payload plus the exit status into a
//! complete event. The pre-exec `pwd` is carried through untouched: a
//! command that changes directory must still be attributed to where it
//! was typed.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use recap_envfilter::EnvPolicy;
use recap_event::CommandEvent;

/// What the pre-exec hook captured, as shipped in `--preexec-data`
#[derive(Debug, Deserialize)]
pub struct PreexecPayload {
    pub command: String,
    pub pwd: String,
    pub start_timestamp: String,
    #[serde(default)]
    pub environment: Vec<String>,
}

/// Decode the base64 JSON payload
pub fn decode_payload(encoded: &str) -> Result<PreexecPayload> {
    let decoded = BASE64
        .decode(encoded.trim())
        .context("preexec data is not valid base64")?;
    serde_json::from_slice(&decoded).context("preexec data is not valid JSON")
}

/// Parse a shell-supplied timestamp
///
/// Shells emit `date`-style stamps with a space between date and time;
/// RFC 3339 wants a `T` there. Sub-second precision and the offset come
/// through as-is.
pub fn parse_shell_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if raw.is_empty() {
        bail!("empty timestamp");
    }
    let mut chars: Vec<char> = raw.chars().collect();
    if chars.len() > 10 && chars[10] == ' ' {
        chars[10] = 'T';
    }
    let normalized: String = chars.into_iter().collect();
    DateTime::parse_from_rfc3339(&normalized)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("unparsable timestamp {raw:?}"))
}

/// Build the complete event from the payload and the exit status
///
/// The environment snapshot is filtered through `policy`; the policy's
/// version, when declared, is stamped into the event.
pub fn build_event(
    payload: &PreexecPayload,
    return_code: i32,
    end_timestamp: Option<&str>,
    policy: &EnvPolicy,
) -> Result<CommandEvent> {
    let start_timestamp = parse_shell_timestamp(&payload.start_timestamp)?;
    let end_timestamp = match end_timestamp {
        Some(raw) => parse_shell_timestamp(raw)?,
        None => Utc::now(),
    };

    let raw_env = payload.environment.iter().filter_map(|entry| {
        entry
            .split_once('=')
            .map(|(key, value)| (key.to_string(), value.to_string()))
    });

    let event = CommandEvent {
        command: payload.command.trim().to_string(),
        return_code,
        start_timestamp,
        end_timestamp,
        pwd: payload.pwd.clone(),
        hostname: hostname(),
        ip_address: local_ip(),
        env: policy.filter(raw_env),
        config_version: policy.version().map(str::to_string),
    };
    event.validate()?;
    Ok(event)
}

/// Snapshot the current process environment as key/value pairs
pub fn current_environment() -> BTreeMap<String, String> {
    std::env::vars().collect()
}

/// This machine's hostname, or `unknown`
pub fn hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".into())
}

/// Best-effort non-loopback local address
///
/// Connecting a UDP socket sends nothing; it only makes the kernel pick
/// the outbound interface.
pub fn local_ip() -> Option<String> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let addr = socket.local_addr().ok()?;
    if addr.ip().is_loopback() {
        return None;
    }
    Some(addr.ip().to_string())
}

#[cfg(test)]
#[path = "gather_test.rs"]
mod tests;
