//! Ways of opening a connection to the pooled target

use std::time::Duration;

use async_trait::async_trait;
use rustls::pki_types::ServerName;
use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use recap_identity::TlsIdentity;

use crate::error::DialError;
use crate::pool::DIAL_TIMEOUT;

/// Opens one ready-to-use connection to a fixed target
///
/// Authentication, socket options, and the connect deadline are all the
/// dialer's business; the pool only caches what comes out.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// The connection type this dialer produces
    type Conn: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// The `host:port` this dialer connects to (for logging)
    fn target(&self) -> &str;

    /// Open and fully establish one connection
    async fn dial(&self) -> Result<Self::Conn, DialError>;
}

/// Mutual-TLS dialer: TCP connect plus handshake under one deadline
pub struct TlsDialer {
    target: String,
    server_name: ServerName<'static>,
    connector: TlsConnector,
    connect_timeout: Duration,
}

impl TlsDialer {
    /// Build a dialer from an identity
    ///
    /// `server_name` is the name the remote certificate is validated
    /// against; deployments front the target with a proxy whose
    /// certificate does not carry the raw host address.
    pub fn new(
        target: impl Into<String>,
        server_name: &str,
        identity: &TlsIdentity,
    ) -> Result<Self, DialError> {
        let parsed = ServerName::try_from(server_name.to_string()).map_err(|_| {
            DialError::InvalidServerName {
                name: server_name.to_string(),
            }
        })?;
        let connector = identity.connector().map_err(|e| DialError::Connect {
            target: server_name.to_string(),
            source: std::io::Error::other(e),
        })?;
        Ok(Self {
            target: target.into(),
            server_name: parsed,
            connector,
            connect_timeout: DIAL_TIMEOUT,
        })
    }

    /// Override the connect deadline
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

#[async_trait]
impl Dialer for TlsDialer {
    type Conn = TlsStream<TcpStream>;

    fn target(&self) -> &str {
        &self.target
    }

    async fn dial(&self) -> Result<Self::Conn, DialError> {
        let connect = async {
            let stream = TcpStream::connect(&self.target).await?;
            configure_socket(&stream);
            self.connector
                .connect(self.server_name.clone(), stream)
                .await
        };

        match timeout(self.connect_timeout, connect).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(source)) => Err(DialError::Connect {
                target: self.target.clone(),
                source,
            }),
            Err(_) => Err(DialError::Timeout {
                target: self.target.clone(),
            }),
        }
    }
}

/// Plain TCP dialer for unauthenticated targets and tests
pub struct TcpDialer {
    target: String,
    connect_timeout: Duration,
}

impl TcpDialer {
    /// Build a dialer for `host:port`
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            connect_timeout: DIAL_TIMEOUT,
        }
    }

    /// Override the connect deadline
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    type Conn = TcpStream;

    fn target(&self) -> &str {
        &self.target
    }

    async fn dial(&self) -> Result<Self::Conn, DialError> {
        match timeout(self.connect_timeout, TcpStream::connect(&self.target)).await {
            Ok(Ok(stream)) => {
                configure_socket(&stream);
                Ok(stream)
            }
            Ok(Err(source)) => Err(DialError::Connect {
                target: self.target.clone(),
                source,
            }),
            Err(_) => Err(DialError::Timeout {
                target: self.target.clone(),
            }),
        }
    }
}

/// Apply keepalive and nodelay; failures are logged, not fatal
fn configure_socket(stream: &TcpStream) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(error = %e, "failed to set TCP_NODELAY");
    }

    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(60))
        .with_interval(Duration::from_secs(10));
    if let Err(e) = SockRef::from(stream).set_tcp_keepalive(&keepalive) {
        tracing::debug!(error = %e, "failed to set TCP keepalive");
    }
}
