//! Ingestion handler
//!
//! Consumes newline-delimited event records from one accepted connection
//! until EOF. Each record is forwarded to the log-ingestion pool and then
//! published to the hub — in that order, but unconditionally: a dead
//! downstream must never silence local subscribers.
//!
//! Nothing on this path closes the connection. Unparsable records are
//! skipped, forward failures are counted, and the client keeps feeding
//! bytes for as long as it likes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use recap_event::LineReader;
use recap_hub::Hub;
use recap_pool::{ConnectionPool, Dialer};

/// Deadline for one forward write to the log-ingestion service
pub const FORWARD_WRITE_DEADLINE: Duration = Duration::from_secs(5);

/// Counters for the ingestion path
#[derive(Debug, Default)]
pub struct IngestMetrics {
    /// Records delivered to the log-ingestion service
    events_forwarded: AtomicU64,
    /// Records dropped because no connection or the write failed
    forward_failures: AtomicU64,
}

/// Point-in-time ingestion counters
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestSnapshot {
    pub events_forwarded: u64,
    pub forward_failures: u64,
}

impl IngestMetrics {
    /// Create zeroed counters
    pub const fn new() -> Self {
        Self {
            events_forwarded: AtomicU64::new(0),
            forward_failures: AtomicU64::new(0),
        }
    }

    #[inline]
    fn record_forwarded(&self) {
        self.events_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_failure(&self) {
        self.forward_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Counters for the stats report
    pub fn snapshot(&self) -> IngestSnapshot {
        IngestSnapshot {
            events_forwarded: self.events_forwarded.load(Ordering::Relaxed),
            forward_failures: self.forward_failures.load(Ordering::Relaxed),
        }
    }
}

/// Run one ingestion connection to completion
///
/// `first_record` is the line the classifier consumed; it is the first
/// event of the stream. Cancellation ends the loop between records.
pub async fn run_ingest<D: Dialer, R: AsyncRead + Unpin>(
    pool: &ConnectionPool<D>,
    hub: &Hub,
    metrics: &IngestMetrics,
    mut lines: LineReader<R>,
    first_record: &[u8],
    cancel: &CancellationToken,
) {
    if !first_record.is_empty() {
        process_record(pool, hub, metrics, first_record).await;
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.read_line() => {
                let record = match line {
                    Ok(Some(record)) => record,
                    Ok(None) => break,
                    Err(e) => {
                        debug!(error = %e, "ingestion read failed");
                        break;
                    }
                };
                // Blank separators between records are not an error.
                if record.is_empty() {
                    continue;
                }
                process_record(pool, hub, metrics, &record).await;
            }
        }
    }
}

/// Forward one record downstream, then publish it locally
async fn process_record<D: Dialer>(
    pool: &ConnectionPool<D>,
    hub: &Hub,
    metrics: &IngestMetrics,
    record: &[u8],
) {
    match serde_json::from_slice::<serde_json::Value>(record) {
        Ok(value) if value.is_object() => {}
        _ => {
            debug!("skipping record that is not a JSON object");
            return;
        }
    }

    match pool.acquire().await {
        Ok(mut conn) => {
            let write = async {
                conn.write_all(record).await?;
                conn.write_all(b"\n").await?;
                conn.flush().await
            };
            let ok = matches!(timeout(FORWARD_WRITE_DEADLINE, write).await, Ok(Ok(())));
            pool.release(conn, ok);
            if ok {
                metrics.record_forwarded();
                trace!(len = record.len(), "forwarded record");
            } else {
                metrics.record_failure();
                debug!("forward write failed or timed out");
            }
        }
        Err(e) => {
            metrics.record_failure();
            debug!(error = %e, "no downstream connection, dropping forward");
        }
    }

    // Local subscribers get the record regardless of the forward outcome.
    hub.publish(record).await;
}

#[cfg(test)]
#[path = "ingest_test.rs"]
mod tests;
