//! Recap pub/sub hub
//!
//! Every event the proxy ingests is also fanned out, in process, to local
//! subscribers (a dashboard, a tail session). This crate owns that path:
//!
//! - [`EventFilter`] - field-equality filter a subscriber attaches
//! - [`Hub`] - id → subscriber registry with deadline-bounded delivery
//! - [`serve_subscriber`] - the connection handler that registers a
//!   subscriber and runs its keepalive protocol
//!
//! # Backpressure
//!
//! Slow subscribers are evicted, never queued: each delivery gets one
//! 100 ms write deadline and a miss removes the subscriber. A local
//! client can always reconnect and replay from the index service; the
//! proxy must not grow unbounded.
//!
//! ```text
//! ingestion ──publish──► Hub ──filter──► subscriber sinks (Unix socket)
//!                         ▲
//! SUBSCRIBE tui pwd=/tmp ─┘ (serve_subscriber)
//! ```

mod error;
pub mod filter;
pub mod handler;
pub mod hub;

pub use error::{HubError, Result};
pub use filter::EventFilter;
pub use handler::serve_subscriber;
pub use hub::{Hub, HubSnapshot, Subscriber, SUBSCRIBER_WRITE_DEADLINE};
