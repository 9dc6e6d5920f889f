//! Event delivery
//!
//! The fast path is the local proxy socket. If that fails for any reason
//! (proxy down, stale socket, slow accept) the event goes directly to the
//! log-ingestion service instead. Every step is deadline-bounded, and
//! every failure is swallowed: a logging hiccup must never delay or
//! abort the interactive shell.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::time::timeout;
use tracing::debug;

use recap_identity::TlsIdentity;
use recap_pool::{Dialer, TcpDialer, TlsDialer};

/// Default per-step deadline
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(3);

/// Direct-connection authentication material
pub struct TlsOptions {
    pub identity: TlsIdentity,
    pub server_name: String,
}

/// Where and how one event line is delivered
pub struct Delivery {
    /// Try the proxy socket first
    pub use_socket: bool,
    /// Proxy socket path
    pub socket_path: PathBuf,
    /// Log-ingestion `host:port` for the direct path
    pub target: String,
    /// Authenticate the direct path; plain TCP when absent
    pub tls: Option<TlsOptions>,
    /// Per-step deadline (connect, write)
    pub deadline: Duration,
}

/// Deliver one event line, falling back from socket to direct
///
/// Never returns an error: failures are logged at debug and dropped.
pub async fn deliver(line: &[u8], delivery: &Delivery) {
    if delivery.use_socket {
        match send_via_socket(line, delivery).await {
            Ok(()) => return,
            Err(e) => {
                debug!(error = %e, "proxy socket delivery failed, falling back to direct");
            }
        }
    }

    if let Err(e) = send_direct(line, delivery).await {
        debug!(error = %e, target = %delivery.target, "direct delivery failed, dropping event");
    }
}

/// Write the line to the proxy's Unix socket
pub async fn send_via_socket(line: &[u8], delivery: &Delivery) -> io::Result<()> {
    let connect = timeout(delivery.deadline, UnixStream::connect(&delivery.socket_path))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "socket connect timed out"))??;

    let mut stream = connect;
    timeout(delivery.deadline, write_line(&mut stream, line))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "socket write timed out"))?
}

/// Write the line straight to the log-ingestion service
async fn send_direct(line: &[u8], delivery: &Delivery) -> anyhow::Result<()> {
    match &delivery.tls {
        Some(tls) => {
            let dialer = TlsDialer::new(&delivery.target, &tls.server_name, &tls.identity)?
                .with_connect_timeout(delivery.deadline);
            let mut conn = dialer.dial().await?;
            timeout(delivery.deadline, write_line(&mut conn, line)).await??;
        }
        None => {
            let dialer =
                TcpDialer::new(&delivery.target).with_connect_timeout(delivery.deadline);
            let mut conn = dialer.dial().await?;
            timeout(delivery.deadline, write_line(&mut conn, line)).await??;
        }
    }
    Ok(())
}

async fn write_line<W: AsyncWriteExt + Unpin>(writer: &mut W, line: &[u8]) -> io::Result<()> {
    writer.write_all(line).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

#[cfg(test)]
#[path = "send_test.rs"]
mod tests;
