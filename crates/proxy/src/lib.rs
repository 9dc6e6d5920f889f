//! Recap proxy
//!
//! One process terminates a cheap local Unix socket and speaks the
//! expensive authenticated protocols to the remote services. Every
//! accepted connection is classified by its first line and owned by one
//! of three handlers until close:
//!
//! ```text
//!                    ┌──────────► ingest ──► pool ──► log-ingestion (mTLS)
//!                    │               │
//! socket ──classify──┤               └─────► hub ──► local subscribers
//!                    ├──────────► gateway ─────────► search service (mTLS)
//!                    └──────────► subscriber handler (recap-hub)
//! ```
//!
//! The ingestion path never lets the remote service hold local delivery
//! hostage: records are published to the hub whether or not the forward
//! succeeded.

pub mod classify;
pub mod gateway;
pub mod ingest;
pub mod server;

pub use classify::{classify, Route, FIRST_LINE_LIMIT};
pub use gateway::{Gateway, GatewayConfig, GATEWAY_TIMEOUT};
pub use ingest::{IngestMetrics, IngestSnapshot, FORWARD_WRITE_DEADLINE};
pub use server::{ProxyServer, ServerError, STATS_INTERVAL};
