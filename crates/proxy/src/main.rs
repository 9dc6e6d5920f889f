//! recap-proxy - local multiplexing proxy for shell command events
//!
//! ```bash
//! recap-proxy --socket /tmp/recap-proxy.sock \
//!     --ingest-host 127.0.0.1 --ingest-port 5170 \
//!     --search-host 127.0.0.1 --search-port 9243 \
//!     --ca-file certs/ca.crt --cert-file certs/client.crt --key-file certs/client.key
//! ```

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use recap_identity::TlsIdentity;
use recap_pool::{ConnectionPool, TlsDialer, DEFAULT_POOL_CAPACITY};
use recap_proxy::{Gateway, GatewayConfig, ProxyServer, GATEWAY_TIMEOUT};

/// Local multiplexing proxy for shell command events
#[derive(Parser, Debug)]
#[command(name = "recap-proxy")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Unix domain socket path
    #[arg(long, default_value = "/tmp/recap-proxy.sock")]
    socket: PathBuf,

    /// Log-ingestion host
    #[arg(long, default_value = "127.0.0.1")]
    ingest_host: String,

    /// Log-ingestion port
    #[arg(long, default_value_t = 5170)]
    ingest_port: u16,

    /// Search-service host
    #[arg(long, default_value = "127.0.0.1")]
    search_host: String,

    /// Search-service port
    #[arg(long, default_value_t = 9243)]
    search_port: u16,

    /// Connection pool size for the log-ingestion target
    #[arg(long, default_value_t = DEFAULT_POOL_CAPACITY)]
    pool_size: usize,

    /// CA certificate file
    #[arg(long, default_value = "certs/ca.crt")]
    ca_file: PathBuf,

    /// Client certificate file
    #[arg(long, default_value = "certs/client.crt")]
    cert_file: PathBuf,

    /// Client key file
    #[arg(long, default_value = "certs/client.key")]
    key_file: PathBuf,

    /// Search-service CA certificate file (defaults to --ca-file)
    #[arg(long)]
    search_ca_file: Option<PathBuf>,

    /// Search-service client certificate file (defaults to --cert-file)
    #[arg(long)]
    search_cert_file: Option<PathBuf>,

    /// Search-service client key file (defaults to --key-file)
    #[arg(long)]
    search_key_file: Option<PathBuf>,

    /// TLS name the log-ingestion certificate is validated against
    #[arg(long, default_value = "ingest")]
    ingest_server_name: String,

    /// TLS name the search-service certificate is validated against;
    /// also becomes the rewritten Host header
    #[arg(long, default_value = "search")]
    search_server_name: String,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug)?;

    let ingest_identity = TlsIdentity::new(&cli.ca_file, &cli.cert_file, &cli.key_file);
    let search_identity = TlsIdentity::new(
        cli.search_ca_file.as_ref().unwrap_or(&cli.ca_file),
        cli.search_cert_file.as_ref().unwrap_or(&cli.cert_file),
        cli.search_key_file.as_ref().unwrap_or(&cli.key_file),
    );

    // All certificate problems surface here, before the socket binds.
    let ingest_target = format!("{}:{}", cli.ingest_host, cli.ingest_port);
    let dialer = TlsDialer::new(&ingest_target, &cli.ingest_server_name, &ingest_identity)
        .context("log-ingestion TLS configuration")?;
    let pool = ConnectionPool::new(dialer, cli.pool_size);

    let search_addr = resolve_search_addr(&cli.search_host, cli.search_port)?;
    let client = search_identity
        .http_client(
            GATEWAY_TIMEOUT,
            Some((cli.search_server_name.as_str(), search_addr)),
        )
        .context("search-service TLS configuration")?;
    let gateway = Gateway::new(
        client,
        GatewayConfig {
            base_url: format!("https://{}:{}", cli.search_server_name, cli.search_port),
            host_override: cli.search_server_name.clone(),
        },
    );

    if cli.debug {
        info!("debug logging enabled");
    }

    let server = ProxyServer::new(cli.socket, pool, gateway);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            wait_for_shutdown().await;
            info!("shutdown signal received");
            cancel.cancel();
        }
    });

    server.run(cancel).await?;
    Ok(())
}

/// Resolve the search host once, at startup
fn resolve_search_addr(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("failed to resolve search host {host}"))?
        .next()
        .with_context(|| format!("search host {host} resolved to no addresses"))
}

/// Wait for SIGINT, SIGTERM, or SIGQUIT
async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    let quit = async {
        signal::unix::signal(signal::unix::SignalKind::quit())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = quit => {},
    }
}

/// Initialize the tracing subscriber for logging
fn init_logging(debug: bool) -> Result<()> {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .map_err(|e| anyhow::anyhow!("invalid log filter: {}", e))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();

    Ok(())
}
