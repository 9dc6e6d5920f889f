//! Loading PEM material into client configurations

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

use crate::error::{IdentityError, Result};

/// Paths to the PEM files that make up one client identity
#[derive(Debug, Clone)]
pub struct TlsIdentity {
    ca_file: PathBuf,
    cert_file: PathBuf,
    key_file: PathBuf,
}

impl TlsIdentity {
    /// Reference an identity by its file paths (nothing is read yet)
    pub fn new(
        ca_file: impl Into<PathBuf>,
        cert_file: impl Into<PathBuf>,
        key_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ca_file: ca_file.into(),
            cert_file: cert_file.into(),
            key_file: key_file.into(),
        }
    }

    /// Build a rustls client config with this identity as client auth
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut roots = RootCertStore::empty();
        let (added, _ignored) = roots.add_parsable_certificates(self.read_certs(&self.ca_file)?);
        if added == 0 {
            return Err(IdentityError::EmptyPem {
                path: self.ca_file.clone(),
            });
        }

        let chain = self.read_certs(&self.cert_file)?;
        if chain.is_empty() {
            return Err(IdentityError::EmptyPem {
                path: self.cert_file.clone(),
            });
        }
        let key = self.read_key(&self.key_file)?;

        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_client_auth_cert(chain, key)?;
        Ok(config)
    }

    /// Build a connector for raw TLS streams
    pub fn connector(&self) -> Result<TlsConnector> {
        Ok(TlsConnector::from(Arc::new(self.client_config()?)))
    }

    /// Build an authenticated HTTPS client
    ///
    /// The client trusts only this identity's CA and presents its client
    /// certificate. When `resolve` is given, the name is pinned to the
    /// address, so certificate validation runs against the configured
    /// server name rather than whatever the operator typed as the host.
    pub fn http_client(
        &self,
        timeout: Duration,
        resolve: Option<(&str, SocketAddr)>,
    ) -> Result<reqwest::Client> {
        let read = |path: &Path| {
            std::fs::read(path).map_err(|source| IdentityError::Read {
                path: path.to_path_buf(),
                source,
            })
        };
        let ca_pem = read(&self.ca_file)?;
        let mut identity_pem = read(&self.cert_file)?;
        identity_pem.push(b'\n');
        identity_pem.extend_from_slice(&read(&self.key_file)?);

        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .tls_built_in_root_certs(false)
            .add_root_certificate(reqwest::Certificate::from_pem(&ca_pem)?)
            .identity(reqwest::Identity::from_pem(&identity_pem)?)
            .timeout(timeout);

        if let Some((name, addr)) = resolve {
            builder = builder.resolve(name, addr);
        }

        Ok(builder.build()?)
    }

    fn read_certs(&self, path: &Path) -> Result<Vec<CertificateDer<'static>>> {
        let data = std::fs::read(path).map_err(|source| IdentityError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        rustls_pemfile::certs(&mut data.as_slice())
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|source| IdentityError::Pem {
                path: path.to_path_buf(),
                source,
            })
    }

    fn read_key(&self, path: &Path) -> Result<PrivateKeyDer<'static>> {
        let data = std::fs::read(path).map_err(|source| IdentityError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        rustls_pemfile::private_key(&mut data.as_slice())
            .map_err(|source| IdentityError::Pem {
                path: path.to_path_buf(),
                source,
            })?
            .ok_or_else(|| IdentityError::EmptyPem {
                path: path.to_path_buf(),
            })
    }
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
