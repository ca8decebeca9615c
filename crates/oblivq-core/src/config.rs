//! Client session configuration

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{CLIENT_PARTY, FRAME_WIDTH, MIN_FRAME_WIDTH};
use crate::{Error, FieldCodec, Result};

/// Configuration for one client session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Address the listener binds
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// Peer address every dial targets
    #[serde(default = "default_peer_addr")]
    pub peer_addr: SocketAddr,
    /// Name the peer's certificate is verified against
    #[serde(default = "default_peer_server_name")]
    pub peer_server_name: String,
    /// Frame width in bytes, fixed for the channel lifetime
    #[serde(default = "default_frame_width")]
    pub frame_width: usize,
    /// Accept timeout between shutdown checks
    #[serde(default = "default_accept_poll_ms")]
    pub accept_poll_interval_ms: u64,
    /// Sleep between reads while waiting for the peer's disconnect marker
    #[serde(default = "default_wait_poll_ms")]
    pub wait_poll_interval_ms: u64,
    /// Upper bound on one inbound connection, handshake included
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    #[serde(default)]
    pub tls: TlsPaths,
    #[serde(default)]
    pub field: FieldConfig,
    /// Directory received JSON artifacts are written to
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Certificate material for both transport roles (PEM files)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsPaths {
    /// Certificate chain presented by the listener
    pub cert_path: PathBuf,
    /// Private key for `cert_path`
    pub key_path: PathBuf,
    /// Root the dialer trusts for the peer
    pub peer_root_path: PathBuf,
}

impl Default for TlsPaths {
    fn default() -> Self {
        Self {
            cert_path: PathBuf::from("keys/client/cert.pem"),
            key_path: PathBuf::from("keys/client/key.pem"),
            peer_root_path: PathBuf::from("keys/server/cert.pem"),
        }
    }
}

/// Field encoding parameters shared with the engine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldConfig {
    /// Bit width of one key block / field element
    pub block_bits: u32,
    /// Radix key blocks are written in
    pub encoding_base: u32,
    /// Blocks per key stream (used by the bundled random generator)
    pub blocks_per_stream: usize,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            block_bits: 128,
            encoding_base: 16,
            blocks_per_stream: 8,
        }
    }
}

/// External MPC engine installation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine installation directory; the engine runs with this as cwd
    pub install_dir: PathBuf,
    /// Party binary, relative to `install_dir`
    pub binary: String,
    /// Input prefix passed as `-IF`
    pub input_path: PathBuf,
    /// Party index passed as `-p`
    pub party: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let install_dir = PathBuf::from("MP-SPDZ");
        Self {
            input_path: install_dir.join("Player-Data").join("Input"),
            install_dir,
            binary: "replicated-field-party.x".to_string(),
            party: CLIENT_PARTY,
        }
    }
}

impl EngineConfig {
    /// Full path of the party binary
    pub fn binary_path(&self) -> PathBuf {
        self.install_dir.join(&self.binary)
    }

    /// File the engine actually reads for this party: `<input_path>-P<party>-0`
    pub fn input_file(&self) -> PathBuf {
        let mut name = self.input_path.clone().into_os_string();
        name.push(format!("-P{}-0", self.party));
        PathBuf::from(name)
    }
}

fn default_listen_addr() -> SocketAddr {
    ([127, 0, 0, 1], 5500).into()
}

fn default_peer_addr() -> SocketAddr {
    ([127, 0, 0, 1], 5005).into()
}

fn default_peer_server_name() -> String {
    "localhost".to_string()
}

fn default_frame_width() -> usize {
    FRAME_WIDTH
}

fn default_accept_poll_ms() -> u64 {
    100
}

fn default_wait_poll_ms() -> u64 {
    10
}

fn default_connection_timeout_ms() -> u64 {
    30_000
}

fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

impl ClientConfig {
    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Reject values the transport or codec cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.frame_width < MIN_FRAME_WIDTH {
            return Err(Error::InvalidConfig(format!(
                "frame_width {} cannot hold the longest control token ({} bytes)",
                self.frame_width, MIN_FRAME_WIDTH
            )));
        }
        if self.accept_poll_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "accept_poll_interval_ms must be non-zero".into(),
            ));
        }
        if self.connection_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "connection_timeout_ms must be non-zero".into(),
            ));
        }
        self.codec()
            .map_err(|e| Error::InvalidConfig(format!("field: {}", e)))?;
        Ok(())
    }

    pub fn codec(&self) -> Result<FieldCodec> {
        FieldCodec::new(self.field.encoding_base, self.field.block_bits)
    }

    pub fn accept_poll_interval(&self) -> Duration {
        Duration::from_millis(self.accept_poll_interval_ms)
    }

    pub fn wait_poll_interval(&self) -> Duration {
        Duration::from_millis(self.wait_poll_interval_ms)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    pub fn with_peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = addr;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            peer_addr: default_peer_addr(),
            peer_server_name: default_peer_server_name(),
            frame_width: default_frame_width(),
            accept_poll_interval_ms: default_accept_poll_ms(),
            wait_poll_interval_ms: default_wait_poll_ms(),
            connection_timeout_ms: default_connection_timeout_ms(),
            tls: TlsPaths::default(),
            field: FieldConfig::default(),
            working_dir: default_working_dir(),
            engine: EngineConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_protocol() {
        let config = ClientConfig::default();
        assert_eq!(config.frame_width, 1024);
        assert_eq!(config.listen_addr.port(), 5500);
        assert_eq!(config.peer_addr.port(), 5005);
        assert_eq!(config.engine.party, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_engine_input_file_suffix() {
        let engine = EngineConfig {
            input_path: PathBuf::from("/opt/mpc/Player-Data/Input"),
            ..EngineConfig::default()
        };
        assert_eq!(engine.input_file(), PathBuf::from("/opt/mpc/Player-Data/Input-P1-0"));
        assert_eq!(
            EngineConfig::default().binary_path(),
            PathBuf::from("MP-SPDZ/replicated-field-party.x")
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ClientConfig::default();
        config.frame_width = 0;
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.connection_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.field.block_bits = 256;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_frame_width_must_fit_every_token() {
        let mut config = ClientConfig::default();
        config.frame_width = MIN_FRAME_WIDTH - 1;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        config.frame_width = MIN_FRAME_WIDTH;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_load_and_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");

        let config = ClientConfig::default().with_working_dir("/srv/artifacts");
        config.save(&path).unwrap();
        let loaded = ClientConfig::load(&path).unwrap();
        assert_eq!(loaded.working_dir, PathBuf::from("/srv/artifacts"));
        assert_eq!(loaded.field, config.field);

        std::fs::write(&path, r#"{"peer_addr": "10.0.0.2:6000"}"#).unwrap();
        let partial = ClientConfig::load(&path).unwrap();
        let expected: SocketAddr = "10.0.0.2:6000".parse().unwrap();
        assert_eq!(partial.peer_addr, expected);
        assert_eq!(partial.frame_width, 1024);
    }
}
