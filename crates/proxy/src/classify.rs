//! First-line protocol classifier
//!
//! Three kinds of client share the socket. The first line decides which,
//! and the decision is final — the connection belongs to the chosen
//! handler until close.

use recap_hub::EventFilter;

/// Cap on the first line of a connection
///
/// Request lines and subscribe lines are short; anything longer is a
/// protocol violation and closes the connection. Ingestion records get a
/// larger limit after classification.
pub const FIRST_LINE_LIMIT: usize = 8 * 1024;

/// Methods that mark a connection as request/response traffic
const REQUEST_VERBS: &[&str] = &["GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH"];

/// The verb that marks a subscription
const SUBSCRIBE_VERB: &str = "SUBSCRIBE";

/// Where a connection is routed
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// One request/response cycle against the search service
    Gateway,
    /// Live event subscription with an optional field filter
    Subscribe { id: String, filter: EventFilter },
    /// Newline-delimited event records; the first line is the first record
    Ingest,
}

/// Classify a connection by its first line
///
/// Pure function: the same line always yields the same route.
pub fn classify(first_line: &str) -> Route {
    let line = first_line.trim_end_matches('\r');

    if let Some((verb, _)) = line.split_once(' ') {
        if REQUEST_VERBS.contains(&verb) {
            return Route::Gateway;
        }
    }

    if let Some(rest) = line.strip_prefix(SUBSCRIBE_VERB) {
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            let mut tokens = rest.split_whitespace();
            let id = tokens
                .next()
                .filter(|id| !id.is_empty())
                .unwrap_or("anonymous")
                .to_string();
            let expr = tokens.collect::<Vec<_>>().join(" ");
            return Route::Subscribe {
                id,
                filter: EventFilter::parse(&expr),
            };
        }
    }

    Route::Ingest
}

#[cfg(test)]
#[path = "classify_test.rs"]
mod tests;
