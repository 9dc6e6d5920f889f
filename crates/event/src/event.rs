//! The command event record
//!
//! # Wire format
//!
//! One JSON object per line, newline-terminated:
//!
//! ```text
//! {"command":"ls","return_code":0,"start_timestamp":"2025-01-01T00:00:00.000000Z",...}\n
//! ```
//!
//! Two shapes exist in the wild: with and without the `_config_version`
//! field. Both are legal and both round-trip through [`encode_line`] /
//! [`decode_line`] unchanged.
//!
//! [`encode_line`]: CommandEvent::encode_line
//! [`decode_line`]: CommandEvent::decode_line

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EventError, Result};

/// One shell command occurrence with its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEvent {
    /// The command line as typed (trimmed)
    pub command: String,

    /// Exit status of the command
    pub return_code: i32,

    /// When the command started (captured by the pre-exec hook)
    #[serde(with = "timestamp")]
    pub start_timestamp: DateTime<Utc>,

    /// When the command finished
    #[serde(with = "timestamp")]
    pub end_timestamp: DateTime<Utc>,

    /// Working directory *before* the command ran
    pub pwd: String,

    /// Host the command ran on
    pub hostname: String,

    /// Best-effort non-loopback IPv4 address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    /// Filtered environment snapshot (omitted when empty)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Version of the capture policy that filtered `env`
    #[serde(
        rename = "_config_version",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub config_version: Option<String>,
}

impl CommandEvent {
    /// Serialize to a single wire line (without the trailing newline)
    pub fn encode_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a wire line back into an event
    pub fn decode_line(line: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(line)?)
    }

    /// Check the producer invariants before an event may leave the host
    ///
    /// The proxy never calls this; it applies only to events we originate.
    pub fn validate(&self) -> Result<()> {
        if self.command.is_empty() {
            return Err(EventError::Invalid("empty command".into()));
        }
        if self.pwd.is_empty() {
            return Err(EventError::Invalid("empty pwd".into()));
        }
        if self.end_timestamp < self.start_timestamp {
            return Err(EventError::Invalid(
                "end_timestamp precedes start_timestamp".into(),
            ));
        }
        Ok(())
    }
}

/// RFC 3339 timestamps with forced sub-second precision
///
/// `chrono`'s default drops the fractional part when it is zero; downstream
/// time parsing expects it to always be present. Full nanosecond digits
/// keep encode→decode an identity for every event we can produce.
mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Nanos, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "event_test.rs"]
mod tests;
