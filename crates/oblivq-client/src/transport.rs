//! TLS-protected frame transport
//!
//! Dialing role: one fresh connection per logical request, never pooled.
//! Listening role: `accept_once` bounds each accept by the poll interval so
//! the caller can look at its shutdown signal between attempts, and bounds
//! the TLS handshake separately so a silent client cannot hold it.

use std::net::SocketAddr;
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::{client, server, TlsAcceptor, TlsConnector};

use oblivq_core::ClientConfig;

use crate::error::{ClientError, Result};
use crate::frame::{FrameChannel, FrameCodec};

/// Outbound channel to the peer
pub type PeerChannel = FrameChannel<client::TlsStream<TcpStream>>;

/// Inbound channel accepted by the listener
pub type InboundChannel = FrameChannel<server::TlsStream<TcpStream>>;

/// Opens short-lived TLS connections to the fixed peer
#[derive(Clone)]
pub struct Dialer {
    connector: TlsConnector,
    peer_addr: SocketAddr,
    server_name: ServerName<'static>,
    codec: FrameCodec,
}

impl Dialer {
    pub fn new(connector: TlsConnector, config: &ClientConfig) -> Result<Self> {
        let server_name = ServerName::try_from(config.peer_server_name.clone())
            .map_err(|_| ClientError::InvalidPeerName(config.peer_server_name.clone()))?;
        Ok(Self {
            connector,
            peer_addr: config.peer_addr,
            server_name,
            codec: FrameCodec::new(config.frame_width),
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Connect and complete the TLS handshake.
    ///
    /// Connection and handshake failures go straight back to the caller;
    /// there is no retry at this layer.
    pub async fn dial(&self) -> Result<PeerChannel> {
        let tcp = TcpStream::connect(self.peer_addr).await?;
        let tls = self.connector.connect(self.server_name.clone(), tcp).await?;
        tracing::debug!(peer = %self.peer_addr, "Connected to peer");
        Ok(FrameChannel::new(tls, self.codec))
    }
}

/// Wait up to `poll` for one inbound connection, then give the TLS handshake
/// up to `handshake` to complete.
///
/// Returns `TransportTimeout` when nothing arrived in time. A handshake that
/// stalls is a `Transport` error with kind `TimedOut`.
pub async fn accept_once(
    listener: &TcpListener,
    acceptor: &TlsAcceptor,
    codec: FrameCodec,
    poll: Duration,
    handshake: Duration,
) -> Result<(InboundChannel, SocketAddr)> {
    let (tcp, addr) = match tokio::time::timeout(poll, listener.accept()).await {
        Err(_) => return Err(ClientError::TransportTimeout),
        Ok(accepted) => accepted?,
    };
    let tls = match tokio::time::timeout(handshake, acceptor.accept(tcp)).await {
        Err(_) => {
            return Err(ClientError::Transport(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("TLS handshake with {} timed out", addr),
            )))
        }
        Ok(tls) => tls?,
    };
    Ok((FrameChannel::new(tls, codec), addr))
}
