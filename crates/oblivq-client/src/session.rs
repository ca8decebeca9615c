//! Client session: sequencer operations over the store, codec and engine

use std::net::SocketAddr;
use std::path::Path;

use oblivq_core::constants::{COMPARE_AND_ENCRYPT, COMPARE_AND_REENCRYPT};
use oblivq_core::{
    ClientConfig, EngineInputRecord, FieldCodec, KeyStreamGenerator, KeyStreamPair,
    KeyStreamStore, ObliviousOperation, RandomKeyStreams,
};

use crate::engine::EngineInvoker;
use crate::error::{ClientError, Result};
use crate::frame::FrameCodec;
use crate::listener::Listener;
use crate::protocol::{self, ExecutionKind, Receiver};
use crate::tls::TlsContexts;
use crate::transport::{Dialer, PeerChannel};

/// One client session against one peer.
///
/// Operations take `&mut self`, so a session is driven by one caller at a
/// time and the key stream store needs no lock.
pub struct ClientSession {
    config: ClientConfig,
    tls: TlsContexts,
    dialer: Dialer,
    codec: FieldCodec,
    store: KeyStreamStore,
    generator: Box<dyn KeyStreamGenerator>,
    engine: EngineInvoker,
    listener: Option<Listener>,
}

impl ClientSession {
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &KeyStreamStore {
        &self.store
    }

    /// Address the listener is bound to, once started
    pub fn listener_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(|l| l.local_addr())
    }

    /// Start accepting inbound transfers in the background
    pub async fn start_listener(&mut self) -> Result<SocketAddr> {
        if let Some(listener) = &self.listener {
            return Ok(listener.local_addr());
        }
        let listener = Listener::start(
            self.config.listen_addr,
            self.tls.acceptor.clone(),
            Receiver::new(&self.config.working_dir),
            FrameCodec::new(self.config.frame_width),
            self.config.accept_poll_interval(),
            self.config.connection_timeout(),
        )
        .await?;
        let addr = listener.local_addr();
        self.listener = Some(listener);
        Ok(addr)
    }

    /// Stop the listener, if running, and wait for it to exit
    pub async fn stop_listener(&mut self) -> Result<()> {
        match self.listener.take() {
            Some(listener) => listener.stop().await,
            None => Ok(()),
        }
    }

    /// Handshake with the peer; returns once the peer disconnects us
    pub async fn init(&self) -> Result<()> {
        let mut channel = self.dialer.dial().await?;
        protocol::send_init(&mut channel, self.config.wait_poll_interval()).await?;
        channel.close().await?;
        tracing::info!(peer = %self.dialer.peer_addr(), "Session initialised");
        Ok(())
    }

    /// Compare two fresh rows and encrypt them under new key streams.
    ///
    /// Returns the store positions the new streams were given.
    pub async fn encrypt(&mut self, op: ObliviousOperation) -> Result<(usize, usize)> {
        op.check_distinct()?;
        self.round_trip(ExecutionKind::Encrypt, op).await?;

        let pair = KeyStreamPair::generate(self.generator.as_mut())?;
        let record = EngineInputRecord::encrypt(op.swap, &pair, &self.codec)?;
        self.engine.write_input(&record)?;
        self.engine.run(COMPARE_AND_ENCRYPT).await?;
        // Only rows the engine actually encrypted get a store entry
        let positions = self.store.append(pair);

        tracing::info!(
            index_a = op.index_a,
            index_b = op.index_b,
            swap = op.swap,
            stored_at = ?positions,
            "Encrypt complete"
        );
        Ok(positions)
    }

    /// Compare two stored rows and move them to fresh key streams.
    ///
    /// Returns the superseded streams, which were used as decryption
    /// material for this step and are no longer held by the store. If the
    /// engine fails the store still holds the old streams, since the rows
    /// remain encrypted under them.
    pub async fn reencrypt(&mut self, op: ObliviousOperation) -> Result<KeyStreamPair> {
        self.store.check_pair(op.index_a, op.index_b)?;
        self.round_trip(ExecutionKind::Reencrypt, op).await?;

        let fresh = KeyStreamPair::generate(self.generator.as_mut())?;
        let record = {
            let current = self.current_pair(op)?;
            EngineInputRecord::reencrypt(op.swap, &current, &fresh, &self.codec)?
        };
        self.engine.write_input(&record)?;
        self.engine.run(COMPARE_AND_REENCRYPT).await?;
        let (old_a, old_b) = self.store.swap_at(op.index_a, op.index_b, fresh)?;

        tracing::info!(
            index_a = op.index_a,
            index_b = op.index_b,
            swap = op.swap,
            "Reencrypt complete"
        );
        Ok(KeyStreamPair::new(old_a, old_b))
    }

    /// Send a JSON document to the peer without waiting for a reply
    pub async fn send_json(&self, file_name: &str, contents: &str) -> Result<()> {
        let mut channel = self.dialer.dial().await?;
        protocol::send_json(&mut channel, file_name, contents).await?;
        channel.close().await?;
        tracing::info!(file_name, bytes = contents.len(), "Sent JSON");
        Ok(())
    }

    /// Send a local JSON file under its file stem
    pub async fn send_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ClientError::Encoding(format!("no usable file name in {}", path.display())))?;
        let contents = tokio::fs::read_to_string(path).await?;
        self.send_json(name, &contents).await
    }

    /// Stop listening and drop all key material
    pub async fn shutdown(mut self) -> Result<()> {
        self.stop_listener().await?;
        self.store.clear();
        Ok(())
    }

    /// Announce the execution and wait for the peer's acknowledgement.
    /// The connection is released on every path out of here.
    async fn round_trip(&self, kind: ExecutionKind, op: ObliviousOperation) -> Result<()> {
        let mut channel: PeerChannel = self.dialer.dial().await?;
        protocol::send_execution(
            &mut channel,
            kind,
            op.index_a,
            op.index_b,
            self.config.wait_poll_interval(),
        )
        .await?;
        channel.close().await
    }

    fn current_pair(&self, op: ObliviousOperation) -> Result<KeyStreamPair> {
        let lookup = |index: usize| {
            self.store.get(index).cloned().ok_or(oblivq_core::Error::IndexOutOfBounds {
                index,
                len: self.store.len(),
            })
        };
        Ok(KeyStreamPair::new(lookup(op.index_a)?, lookup(op.index_b)?))
    }
}

/// Builder for ClientSession
pub struct SessionBuilder {
    config: ClientConfig,
    tls: Option<TlsContexts>,
    generator: Option<Box<dyn KeyStreamGenerator>>,
}

impl SessionBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            tls: None,
            generator: None,
        }
    }

    /// Use these TLS contexts instead of loading the configured PEM files
    pub fn tls(mut self, tls: TlsContexts) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Key stream source; defaults to random blocks sized by the field config
    pub fn generator(mut self, generator: impl KeyStreamGenerator + 'static) -> Self {
        self.generator = Some(Box::new(generator));
        self
    }

    pub fn build(self) -> Result<ClientSession> {
        self.config.validate()?;

        let tls = match self.tls {
            Some(tls) => tls,
            None => TlsContexts::from_paths(&self.config.tls)?,
        };
        let generator = match self.generator {
            Some(generator) => generator,
            None => Box::new(RandomKeyStreams::new(
                self.config.field.blocks_per_stream,
                self.config.field.block_bits,
            )?),
        };

        Ok(ClientSession {
            dialer: Dialer::new(tls.connector.clone(), &self.config)?,
            codec: self.config.codec()?,
            engine: EngineInvoker::new(self.config.engine.clone()),
            store: KeyStreamStore::new(),
            listener: None,
            tls,
            generator,
            config: self.config,
        })
    }
}
