//! The bounded connection pool

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::dialer::Dialer;
use crate::error::{PoolError, Result};

/// Deadline for the idle-handle liveness probe
pub const PROBE_DEADLINE: Duration = Duration::from_millis(100);

/// Deadline for establishing a fresh connection (connect + handshake)
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(3);

/// Default number of idle handles to cache
pub const DEFAULT_POOL_CAPACITY: usize = 3;

/// Bounded cache of established connections to one target
///
/// State transitions per handle: dialed (live, borrowed) → released ok
/// (idle) or released failed (closed). A handle is in exactly one of
/// those states. The mutex guards bookkeeping only; probing and dialing
/// happen outside it.
pub struct ConnectionPool<D: Dialer> {
    dialer: D,
    capacity: usize,
    state: Mutex<PoolState<D::Conn>>,
    connections_opened: AtomicU64,
}

struct PoolState<C> {
    idle: Vec<C>,
    live: usize,
    closed: bool,
}

/// Point-in-time pool gauges for the stats line
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolSnapshot {
    /// Connections currently live (idle + borrowed)
    pub live: usize,
    /// Connections currently cached
    pub idle: usize,
    /// Connections ever dialed
    pub opened: u64,
}

impl<D: Dialer> ConnectionPool<D> {
    /// Create a pool caching at most `capacity` idle handles
    pub fn new(dialer: D, capacity: usize) -> Self {
        Self {
            dialer,
            capacity,
            state: Mutex::new(PoolState {
                idle: Vec::with_capacity(capacity),
                live: 0,
                closed: false,
            }),
            connections_opened: AtomicU64::new(0),
        }
    }

    /// The `host:port` this pool connects to
    pub fn target(&self) -> &str {
        self.dialer.target()
    }

    /// Get a ready connection: cached if one is alive, freshly dialed
    /// otherwise
    ///
    /// Never waits on other borrowers. A cached handle that fails its
    /// probe is closed and replaced by a dial; the probe is best-effort,
    /// so a spurious failure costs exactly one extra dial.
    pub async fn acquire(&self) -> Result<D::Conn> {
        let idle = { self.state.lock().idle.pop() };
        if let Some(mut conn) = idle {
            if probe(&mut conn).await {
                return Ok(conn);
            }
            self.state.lock().live -= 1;
            drop(conn);
            tracing::debug!(target = %self.dialer.target(), "idle connection failed probe");
        }

        match self.dialer.dial().await {
            Ok(conn) => {
                self.state.lock().live += 1;
                self.connections_opened.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(target = %self.dialer.target(), "opened connection");
                Ok(conn)
            }
            Err(e) => Err(PoolError::Unavailable(e)),
        }
    }

    /// Return a borrowed connection
    ///
    /// Healthy handles go back to the cache while there is room; anything
    /// else is closed. After [`close`](Self::close) every release closes,
    /// so a late return can never resurrect the pool.
    pub fn release(&self, conn: D::Conn, ok: bool) {
        let discard = {
            let mut state = self.state.lock();
            if ok && !state.closed && state.idle.len() < self.capacity {
                state.idle.push(conn);
                None
            } else {
                state.live -= 1;
                Some(conn)
            }
        };
        drop(discard);
    }

    /// Close all idle handles and refuse future caching
    ///
    /// Borrowed handles close on their owner's release path.
    pub fn close(&self) {
        let drained = {
            let mut state = self.state.lock();
            state.closed = true;
            let drained: Vec<_> = state.idle.drain(..).collect();
            state.live -= drained.len();
            drained
        };
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "closed idle connections");
        }
        drop(drained);
    }

    /// Gauges for the stats report
    pub fn snapshot(&self) -> PoolSnapshot {
        let state = self.state.lock();
        PoolSnapshot {
            live: state.live,
            idle: state.idle.len(),
            opened: self.connections_opened.load(Ordering::Relaxed),
        }
    }
}

/// Zero-length write under [`PROBE_DEADLINE`]
///
/// Catches peers that already reset the connection; it cannot catch every
/// dead handle, which is fine — the next real write will.
async fn probe<C: AsyncWrite + Unpin>(conn: &mut C) -> bool {
    let check = async {
        conn.write(&[]).await?;
        conn.flush().await
    };
    matches!(timeout(PROBE_DEADLINE, check).await, Ok(Ok(())))
}

#[cfg(test)]
#[path = "pool_test.rs"]
mod tests;
