//! Client error types

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Transport timeout")]
    TransportTimeout,

    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("Invalid peer name: {0}")]
    InvalidPeerName(String),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Engine error: {script} exited with {status}: {stderr}")]
    Engine {
        script: String,
        status: String,
        stderr: String,
    },

    #[error("Failed to persist {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Listener task failed: {0}")]
    Listener(String),

    #[error("Core error: {0}")]
    Core(#[from] oblivq_core::Error),
}

impl ClientError {
    /// True for caller errors raised before any network traffic
    pub fn is_index_error(&self) -> bool {
        matches!(
            self,
            ClientError::Core(
                oblivq_core::Error::IndexOutOfBounds { .. } | oblivq_core::Error::DuplicateIndex(_)
            )
        )
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
