//! Field-equality filter for subscriptions
//!
//! A subscriber names the fields it cares about as `k=v` pairs:
//!
//! ```text
//! SUBSCRIBE tui pwd=/tmp,return_code=0
//! ```
//!
//! Matching is exact string equality against the stringified field value,
//! so `return_code=0` matches the JSON number `0`. An empty filter
//! matches everything. A missing field never matches.

use std::collections::HashMap;

use serde_json::Value;

/// Required-equal constraints over event fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    fields: HashMap<String, String>,
}

impl EventFilter {
    /// The match-everything filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `k=v[,k=v]*` expression
    ///
    /// Pairs without a `=` are ignored; whitespace around keys and values
    /// is trimmed. An empty expression yields the match-all filter.
    pub fn parse(expr: &str) -> Self {
        let mut fields = HashMap::new();
        for pair in expr.split(',') {
            if let Some((key, value)) = pair.split_once('=') {
                fields.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        Self { fields }
    }

    /// Add one constraint
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Whether this filter matches everything
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of constraints
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check an event against every constraint
    #[inline]
    pub fn matches(&self, event: &Value) -> bool {
        if self.fields.is_empty() {
            return true;
        }

        for (key, expected) in &self.fields {
            match event.get(key) {
                Some(actual) if stringify(actual) == *expected => {}
                _ => return false,
            }
        }
        true
    }
}

/// Stringify a JSON value the way a subscriber would type it
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "filter_test.rs"]
mod tests;
