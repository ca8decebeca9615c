//! Control tokens, send sequences and the receive state machine
//!
//! Outbound operations (one connection each):
//!
//! ```text
//! Init       INIT                                              -> wait DISCONNECT
//! Encrypt    ENCRYPT EXECUTION   SENDING INDICES  a  b         -> wait DISCONNECT
//! Reencrypt  REENCRYPT EXECUTION SENDING INDICES  a  b         -> wait DISCONNECT
//! SendJson   FILE NAME name FILE CONTENTS ..chunks.. END FILE DISCONNECT
//! ```
//!
//! Inbound connections start in `AwaitCommand`. Only a JSON transfer is
//! acted on; any other leading token is logged and the connection dropped.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{ClientError, Result};
use crate::frame::FrameChannel;

/// Closed control vocabulary shared with the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    Init,
    EncryptExecution,
    ReencryptExecution,
    SendingIndices,
    SendingJson,
    FileName,
    FileContents,
    Disconnect,
    EndFile,
}

impl Token {
    pub const ALL: [Token; 9] = [
        Token::Init,
        Token::EncryptExecution,
        Token::ReencryptExecution,
        Token::SendingIndices,
        Token::SendingJson,
        Token::FileName,
        Token::FileContents,
        Token::Disconnect,
        Token::EndFile,
    ];

    /// Wire literal
    pub fn as_str(&self) -> &'static str {
        match self {
            Token::Init => "<INIT>",
            Token::EncryptExecution => "<ENCRYPT EXECUTION>",
            Token::ReencryptExecution => "<REENCRYPT EXECUTION>",
            Token::SendingIndices => "<SENDING INDICES>",
            Token::SendingJson => "<SENDING JSON>",
            Token::FileName => "<FILE NAME>",
            Token::FileContents => "<FILE CONTENTS>",
            Token::Disconnect => "<DISCONNECT>",
            Token::EndFile => "<END FILE>",
        }
    }

    pub fn parse(message: &str) -> Option<Token> {
        Token::ALL.into_iter().find(|t| t.as_str() == message)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which oblivious step the peer should run on the two indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionKind {
    Encrypt,
    Reencrypt,
}

impl ExecutionKind {
    pub fn token(&self) -> Token {
        match self {
            ExecutionKind::Encrypt => Token::EncryptExecution,
            ExecutionKind::Reencrypt => Token::ReencryptExecution,
        }
    }
}

/// Session handshake: INIT, then block until the peer disconnects us
pub async fn send_init<S>(channel: &mut FrameChannel<S>, poll: Duration) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    channel.send_token(Token::Init).await?;
    channel.wait_for_disconnect(poll).await
}

/// Announce an execution on two rows and wait for the peer's acknowledgement
pub async fn send_execution<S>(
    channel: &mut FrameChannel<S>,
    kind: ExecutionKind,
    index_a: usize,
    index_b: usize,
    poll: Duration,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    channel.send_token(kind.token()).await?;
    channel.send_token(Token::SendingIndices).await?;
    channel.send(&index_a.to_string()).await?;
    channel.send(&index_b.to_string()).await?;
    channel.wait_for_disconnect(poll).await
}

/// Push one JSON artifact. Fire-and-forget: no acknowledgement is read.
pub async fn send_json<S>(channel: &mut FrameChannel<S>, file_name: &str, contents: &str) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    channel.send_token(Token::FileName).await?;
    channel.send(file_name).await?;
    channel.send_token(Token::FileContents).await?;
    channel.send_chunked(contents).await?;
    channel.send_token(Token::EndFile).await?;
    channel.send_token(Token::Disconnect).await
}

/// Receive-side position within one inbound connection.
///
/// ```text
/// AwaitCommand --SENDING JSON--> AwaitFileName --FILE NAME--> ReadingFileName
///   --<name>--> AwaitFileContents --FILE CONTENTS--> AccumulatingContents
///   --END FILE--> AwaitFileContents (name kept; FILE NAME replaces it)
/// DISCONNECT from any state --> Terminated
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveState {
    /// First frame of the connection
    AwaitCommand,
    /// Inside a JSON transfer, no name announced yet
    AwaitFileName,
    /// FILE NAME seen; the next frame is the name itself
    ReadingFileName,
    /// A name is known; waiting for its contents or a new name
    AwaitFileContents { file_name: String },
    /// Between FILE CONTENTS and END FILE
    AccumulatingContents { file_name: String, contents: String },
    Terminated,
}

/// A JSON artifact completed by END FILE
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    pub name: String,
    pub contents: String,
}

impl ReceiveState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReceiveState::Terminated)
    }

    /// Consume one frame. Returns the next state and, on END FILE, the
    /// completed artifact.
    pub fn advance(self, frame: String) -> Result<(ReceiveState, Option<ReceivedFile>)> {
        let token = Token::parse(&frame);
        if token == Some(Token::Disconnect) {
            if let ReceiveState::AccumulatingContents { file_name, .. } = &self {
                tracing::warn!(file_name = %file_name, "Disconnected mid-file, dropping partial contents");
            }
            return Ok((ReceiveState::Terminated, None));
        }

        let next = match (self, token) {
            (ReceiveState::AwaitCommand, Some(Token::SendingJson)) => ReceiveState::AwaitFileName,
            (ReceiveState::AwaitCommand, _) => ReceiveState::Terminated,
            (ReceiveState::AwaitFileName, Some(Token::FileName))
            | (ReceiveState::AwaitFileContents { .. }, Some(Token::FileName)) => ReceiveState::ReadingFileName,
            (ReceiveState::ReadingFileName, None) => {
                validate_file_name(&frame)?;
                tracing::debug!(file_name = %frame, "Receiving file name");
                ReceiveState::AwaitFileContents { file_name: frame }
            }
            (ReceiveState::AwaitFileContents { file_name }, Some(Token::FileContents)) => {
                ReceiveState::AccumulatingContents {
                    file_name,
                    contents: String::new(),
                }
            }
            (ReceiveState::AccumulatingContents { file_name, contents }, Some(Token::EndFile)) => {
                let file = ReceivedFile {
                    name: file_name.clone(),
                    contents,
                };
                return Ok((ReceiveState::AwaitFileContents { file_name }, Some(file)));
            }
            (ReceiveState::AccumulatingContents { file_name, mut contents }, _) => {
                contents.push_str(&frame);
                ReceiveState::AccumulatingContents { file_name, contents }
            }
            (ReceiveState::Terminated, _) => ReceiveState::Terminated,
            (state, _) => {
                return Err(ClientError::ProtocolViolation(format!(
                    "unexpected {:?} in state {:?}",
                    frame, state
                )))
            }
        };
        Ok((next, None))
    }
}

/// What one inbound connection produced
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReceiveOutcome {
    /// Artifacts written, in arrival order
    pub artifacts: Vec<PathBuf>,
    /// Leading token that was not acted on, if any
    pub ignored: Option<String>,
}

/// Handles inbound connections for the listener
#[derive(Debug, Clone)]
pub struct Receiver {
    artifact_dir: PathBuf,
}

impl Receiver {
    pub fn new(artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifact_dir: artifact_dir.into(),
        }
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    /// Drive one connection from `AwaitCommand` to `Terminated`
    pub async fn handle<S>(&self, channel: &mut FrameChannel<S>) -> Result<ReceiveOutcome>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut outcome = ReceiveOutcome::default();
        let mut state = ReceiveState::AwaitCommand;

        while !state.is_terminal() {
            let frame = channel.recv().await?;
            if state == ReceiveState::AwaitCommand
                && !matches!(Token::parse(&frame), Some(Token::SendingJson | Token::Disconnect))
            {
                tracing::warn!(token = %frame, "Ignoring unhandled leading token");
                outcome.ignored = Some(frame);
                break;
            }

            let (next, file) = state.advance(frame)?;
            if let Some(file) = file {
                let path = self.persist(&file.name, &file.contents).await?;
                outcome.artifacts.push(path);
            }
            state = next;
        }

        Ok(outcome)
    }

    /// Write `<name>.json` under the artifact directory, replacing any old copy
    async fn persist(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.artifact_dir.join(format!("{}.json", name));
        tokio::fs::write(&path, contents)
            .await
            .map_err(|source| ClientError::Persistence {
                path: path.clone(),
                source,
            })?;
        tracing::info!(path = %path.display(), bytes = contents.len(), "Stored received JSON");
        Ok(path)
    }
}

/// Names arrive from the peer; keep them inside the artifact directory
fn validate_file_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(&['/', '\\', '\0'][..]);
    if bad {
        return Err(ClientError::ProtocolViolation(format!(
            "unusable file name {:?}",
            name
        )));
    }
    Ok(())
}
