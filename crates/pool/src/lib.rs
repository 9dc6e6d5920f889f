//! Outbound connection pool
//!
//! The ingestion path opens expensive authenticated connections to a
//! single remote target. This crate caches them:
//!
//! - [`Dialer`] - how a connection to the target is made. [`TlsDialer`]
//!   performs the TCP connect and mutual-TLS handshake inside one
//!   deadline; [`TcpDialer`] is the plain variant used for unauthenticated
//!   targets and tests.
//! - [`ConnectionPool`] - at most `capacity` idle handles, unbounded
//!   in-flight, and never blocks a caller: it hands out an idle handle,
//!   dials a fresh one, or fails with [`PoolError::Unavailable`].
//!
//! Idle handles are liveness-probed on the way out; a failed probe costs
//! one extra dial and nothing else. The pool never retries — retry policy
//! belongs to the caller.

mod dialer;
mod error;
mod pool;

pub use dialer::{Dialer, TcpDialer, TlsDialer};
pub use error::{DialError, PoolError, Result};
pub use pool::{ConnectionPool, PoolSnapshot, DEFAULT_POOL_CAPACITY, DIAL_TIMEOUT, PROBE_DEADLINE};
