//! Background accept loop with cooperative shutdown

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

use crate::error::{ClientError, Result};
use crate::frame::FrameCodec;
use crate::protocol::Receiver;
use crate::transport::accept_once;

/// Running accept loop. Dropping it without `stop` ends the loop at its next
/// await, without waiting for it.
pub struct Listener {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Listener {
    /// Bind `addr` and start accepting in a background task.
    ///
    /// Binding happens before this returns, so bind errors reach the caller
    /// and the port is ready for peers as soon as it does. Each connection,
    /// handshake included, gets at most `connection_timeout`.
    pub async fn start(
        addr: SocketAddr,
        acceptor: TlsAcceptor,
        receiver: Receiver,
        codec: FrameCodec,
        poll: Duration,
        connection_timeout: Duration,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown, shutdown_rx) = watch::channel(false);

        tracing::info!(addr = %local_addr, "Listening");

        let task = tokio::spawn(accept_loop(
            listener,
            acceptor,
            receiver,
            codec,
            Timeouts {
                poll,
                connection: connection_timeout,
            },
            shutdown_rx,
        ));

        Ok(Self {
            local_addr,
            shutdown,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signal shutdown and wait for the loop to exit.
    ///
    /// A connection in progress is dropped. Once this returns the socket is
    /// closed and nothing more is accepted.
    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|e| ClientError::Listener(e.to_string()))?;
        tracing::info!(addr = %self.local_addr, "Listener closed");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Timeouts {
    poll: Duration,
    connection: Duration,
}

async fn accept_loop(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    receiver: Receiver,
    codec: FrameCodec,
    timeouts: Timeouts,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        let accepted = tokio::select! {
            _ = shutdown.changed() => break,
            accepted = accept_once(&listener, &acceptor, codec, timeouts.poll, timeouts.connection) => accepted,
        };
        let (mut channel, addr) = match accepted {
            Ok(accepted) => accepted,
            Err(ClientError::TransportTimeout) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "Incoming connection failed");
                continue;
            }
        };

        let handled = tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!(peer = %addr, "Dropping connection on shutdown");
                break;
            }
            handled = tokio::time::timeout(timeouts.connection, receiver.handle(&mut channel)) => handled,
        };
        match handled {
            Ok(Ok(outcome)) => tracing::debug!(
                peer = %addr,
                artifacts = outcome.artifacts.len(),
                "Connection finished"
            ),
            Ok(Err(e)) => tracing::warn!(peer = %addr, error = %e, "Connection aborted"),
            Err(_) => tracing::warn!(
                peer = %addr,
                timeout_ms = timeouts.connection.as_millis() as u64,
                "Connection timed out"
            ),
        }
        tracing::info!(peer = %addr, "Disconnected");
    }
}
