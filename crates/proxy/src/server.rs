//! Proxy lifecycle: listener, per-connection tasks, stats, shutdown

use std::path::{Path, PathBuf};
use std::sync::Arc;

use std::time::Duration;

use thiserror::Error;
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use recap_event::LineReader;
use recap_hub::{serve_subscriber, Hub};
use recap_pool::{ConnectionPool, Dialer};

use crate::classify::{classify, Route, FIRST_LINE_LIMIT};
use crate::gateway::Gateway;
use crate::ingest::{run_ingest, IngestMetrics};

/// How often the counter line is logged
pub const STATS_INTERVAL: Duration = Duration::from_secs(30);

/// Errors that prevent the proxy from serving
#[derive(Debug, Error)]
pub enum ServerError {
    /// A stale socket file could not be cleared
    #[error("failed to remove stale socket {path}: {source}")]
    RemoveStale {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The listener could not be bound
    #[error("failed to bind {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The proxy: one local listener fronting the two remote services
///
/// Generic over the pool's dialer so the full server can be exercised
/// against plain TCP fixtures; production uses the mutual-TLS dialer.
pub struct ProxyServer<D: Dialer> {
    socket_path: PathBuf,
    pool: Arc<ConnectionPool<D>>,
    hub: Arc<Hub>,
    gateway: Arc<Gateway>,
    metrics: Arc<IngestMetrics>,
}

impl<D: Dialer> ProxyServer<D> {
    /// Assemble a server from its prepared parts
    pub fn new(socket_path: impl Into<PathBuf>, pool: ConnectionPool<D>, gateway: Gateway) -> Self {
        Self {
            socket_path: socket_path.into(),
            pool: Arc::new(pool),
            hub: Arc::new(Hub::new()),
            gateway: Arc::new(gateway),
            metrics: Arc::new(IngestMetrics::new()),
        }
    }

    /// The hub handle (usable after `run` consumes the server)
    pub fn hub(&self) -> Arc<Hub> {
        Arc::clone(&self.hub)
    }

    /// The pool handle
    pub fn pool(&self) -> Arc<ConnectionPool<D>> {
        Arc::clone(&self.pool)
    }

    /// The ingestion counters handle
    pub fn metrics(&self) -> Arc<IngestMetrics> {
        Arc::clone(&self.metrics)
    }

    /// The socket path this server binds
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Serve until cancellation
    ///
    /// Binds the socket (owner-only mode), accepts connections onto their
    /// own tasks, and logs counters every 30 s. On cancellation the
    /// accept loop stops, subscribers are closed, handlers drain within
    /// their I/O deadlines, the pool closes, and the socket file is
    /// removed. Cancellation is a clean shutdown, not an error.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), ServerError> {
        let socket_path = self.socket_path.clone();

        match std::fs::remove_file(&socket_path) {
            Ok(()) => debug!(path = %socket_path.display(), "removed stale socket"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(ServerError::RemoveStale {
                    path: socket_path,
                    source,
                });
            }
        }

        let listener = UnixListener::bind(&socket_path).map_err(|source| ServerError::Bind {
            path: socket_path.clone(),
            source,
        })?;

        // Only the owner may connect; that is the whole local auth story.
        if let Err(e) = set_owner_only(&socket_path) {
            warn!(error = %e, "failed to set socket permissions");
        }

        info!(
            socket = %socket_path.display(),
            ingest_target = %self.pool.target(),
            search_target = %self.gateway.base_url(),
            "proxy listening"
        );

        let server = Arc::new(self);
        let stats = tokio::spawn(Arc::clone(&server).stats_loop(cancel.clone()));

        let mut handlers = JoinSet::new();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            let server = Arc::clone(&server);
                            let cancel = cancel.clone();
                            handlers.spawn(async move {
                                server.handle_connection(stream, cancel).await;
                            });
                        }
                        Err(e) => warn!(error = %e, "accept failed"),
                    }
                    // Reap whatever already finished.
                    while handlers.try_join_next().is_some() {}
                }
            }
        }

        debug!("accept loop stopped, draining handlers");
        drop(listener);
        server.hub.close_all();
        while handlers.join_next().await.is_some() {}
        let _ = stats.await;
        server.pool.close();

        if let Err(e) = std::fs::remove_file(&socket_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(error = %e, "failed to remove socket file");
            }
        }

        info!("proxy shut down");
        Ok(())
    }

    /// Classify one accepted connection and run its handler to completion
    async fn handle_connection(self: Arc<Self>, stream: UnixStream, cancel: CancellationToken) {
        let mut lines = LineReader::new(stream).with_max_line(FIRST_LINE_LIMIT);
        let first = match lines.read_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                // Oversized or unreadable first line: just close.
                debug!(error = %e, "rejecting connection");
                return;
            }
        };

        let route = match std::str::from_utf8(&first) {
            Ok(first_line) => classify(first_line),
            // Raw bytes can only be an (invalid) event record.
            Err(_) => Route::Ingest,
        };
        debug!(route = discriminant_name(&route), "connection classified");

        match route {
            Route::Gateway => {
                let first_line = String::from_utf8_lossy(&first).into_owned();
                self.gateway.handle(lines, &first_line).await;
            }
            Route::Subscribe { id, filter } => {
                let (stream, leftover) = lines.into_parts();
                if let Err(e) =
                    serve_subscriber(Arc::clone(&self.hub), stream, leftover, id, filter).await
                {
                    debug!(error = %e, "subscriber connection ended");
                }
            }
            Route::Ingest => {
                let lines = lines.with_max_line(recap_event::lines::DEFAULT_MAX_LINE);
                run_ingest(&self.pool, &self.hub, &self.metrics, lines, &first, &cancel).await;
            }
        }
    }

    /// Log one counter line every [`STATS_INTERVAL`]
    async fn stats_loop(self: Arc<Self>, cancel: CancellationToken) {
        let start = tokio::time::Instant::now() + STATS_INTERVAL;
        let mut ticker = tokio::time::interval_at(start, STATS_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {
                    let pool = self.pool.snapshot();
                    let ingest = self.metrics.snapshot();
                    let hub = self.hub.snapshot();
                    info!(
                        pool_live = pool.live,
                        pool_idle = pool.idle,
                        pool_opened = pool.opened,
                        forwarded = ingest.events_forwarded,
                        forward_failures = ingest.forward_failures,
                        subscribers = hub.subscribers,
                        events_published = hub.events_published,
                        subscribes_total = hub.subscribes_total,
                        "stats"
                    );
                }
            }
        }
    }
}

/// Mode 0600 on the socket file
fn set_owner_only(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

fn discriminant_name(route: &Route) -> &'static str {
    match route {
        Route::Gateway => "gateway",
        Route::Subscribe { .. } => "subscriber",
        Route::Ingest => "ingest",
    }
}
