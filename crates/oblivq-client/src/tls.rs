//! TLS contexts for both transport roles
//!
//! The listener presents a certificate/key pair; the dialer trusts exactly
//! the roots it is given for the peer. Both use the ring provider.

use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::{TlsAcceptor, TlsConnector};

use oblivq_core::TlsPaths;

use crate::error::{ClientError, Result};

/// Acceptor and connector for one session
#[derive(Clone)]
pub struct TlsContexts {
    pub acceptor: TlsAcceptor,
    pub connector: TlsConnector,
}

impl TlsContexts {
    /// Load PEM files named in the configuration
    pub fn from_paths(paths: &TlsPaths) -> Result<Self> {
        let cert = read_pem(&paths.cert_path)?;
        let key = read_pem(&paths.key_path)?;
        let root = read_pem(&paths.peer_root_path)?;
        Self::from_pem(&cert, &key, &root)
    }

    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8], peer_root_pem: &[u8]) -> Result<Self> {
        Ok(Self {
            acceptor: acceptor_from_pem(cert_pem, key_pem)?,
            connector: connector_from_pem(peer_root_pem)?,
        })
    }
}

fn provider() -> Arc<rustls::crypto::CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "Failed to read TLS material");
        ClientError::Transport(e)
    })
}

fn parse_certs(mut pem: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    let reader: &mut dyn BufRead = &mut pem;
    let certs = rustls_pemfile::certs(reader).collect::<std::io::Result<Vec<_>>>()?;
    if certs.is_empty() {
        return Err(ClientError::Tls(rustls::Error::General(
            "no certificates in PEM input".into(),
        )));
    }
    Ok(certs)
}

fn parse_key(mut pem: &[u8]) -> Result<PrivateKeyDer<'static>> {
    let reader: &mut dyn BufRead = &mut pem;
    rustls_pemfile::private_key(reader)?.ok_or_else(|| {
        ClientError::Tls(rustls::Error::General("no private key in PEM input".into()))
    })
}

/// Listener side: authenticate with `cert_pem`/`key_pem`, no client auth
pub fn acceptor_from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<TlsAcceptor> {
    let config = rustls::ServerConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(parse_certs(cert_pem)?, parse_key(key_pem)?)?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// Dialer side: verify the peer against `root_pem` only
pub fn connector_from_pem(root_pem: &[u8]) -> Result<TlsConnector> {
    let mut roots = rustls::RootCertStore::empty();
    for cert in parse_certs(root_pem)? {
        roots.add(cert)?;
    }
    let config = rustls::ClientConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pem_rejected() {
        assert!(matches!(connector_from_pem(b""), Err(ClientError::Tls(_))));
        assert!(acceptor_from_pem(b"", b"").is_err());
    }

    #[test]
    fn test_missing_files_reported() {
        let paths = TlsPaths {
            cert_path: "/nonexistent/cert.pem".into(),
            key_path: "/nonexistent/key.pem".into(),
            peer_root_path: "/nonexistent/root.pem".into(),
        };
        assert!(matches!(
            TlsContexts::from_paths(&paths),
            Err(ClientError::Transport(_))
        ));
    }
}
