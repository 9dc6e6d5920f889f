//! Recap event model and wire codec
//!
//! Everything that crosses a recap socket is a *command event*: one shell
//! command occurrence with its metadata, serialized as a single line of
//! JSON terminated by `\n`. This crate owns that wire contract:
//!
//! - [`CommandEvent`] - the typed record built by the shell hook
//! - [`LineReader`] - bounded line framing over any async byte stream
//!
//! The proxy deliberately does *not* deserialize events into
//! [`CommandEvent`]; it validates that a record parses as a JSON object
//! and otherwise treats the bytes as opaque, so schema evolution on the
//! producer side never requires a proxy upgrade.

mod error;
pub mod event;
pub mod lines;

pub use error::{EventError, Result};
pub use event::CommandEvent;
pub use lines::LineReader;
