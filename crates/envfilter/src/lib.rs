//! Environment capture policy
//!
//! The shell hook snapshots the environment of every command. Shipping it
//! raw would leak credentials, so a policy decides per variable whether it
//! is dropped, kept verbatim, or kept with its value replaced by a short
//! digest:
//!
//! 1. A built-in absolute-deny list (shell internals, prompt strings,
//!    `__`-prefixed temporaries) is never captured, not even hashed.
//! 2. A variable must match the allowlist (exact name or pattern) to be
//!    considered at all.
//! 3. Allowed variables whose names look sensitive (`*KEY*`, `*TOKEN*`,
//!    `*SECRET*`, ...) are included with an `h8_`-prefixed SHA-256 digest
//!    instead of the value, so they still provide context without
//!    exposing the secret.
//!
//! Policies are JSON files; [`EnvPolicy::load`] falls back through the
//! default locations to the built-in default.

mod error;
pub mod policy;

pub use error::{EnvFilterError, Result};
pub use policy::{digest_value, Disposition, EnvPolicy, NameSet, PolicyFile};
