//! oblivq-client: Orchestration half of the oblivious query client
//!
//! Drives the peer over a fixed-width framed protocol on TLS, keeps per-row
//! key streams in step with each oblivious operation, and hands the key
//! material to the external MPC engine.
//!
//! ```text
//! ClientSession::encrypt(a, b, swap)
//!   dial peer -> ENCRYPT EXECUTION, SENDING INDICES, a, b -> wait DISCONNECT
//!   generate two key streams -> store.append
//!   encode as signed field integers -> engine input file
//!   run compare_and_encrypt
//! ```
//!
//! The peer's acknowledgement always arrives before any key material is
//! generated. In the background a `Listener` accepts JSON artifacts pushed
//! by the peer.

pub mod engine;
pub mod error;
pub mod frame;
pub mod listener;
pub mod protocol;
pub mod session;
pub mod tls;
pub mod transport;

pub use engine::EngineInvoker;
pub use error::{ClientError, Result};
pub use frame::{FrameChannel, FrameCodec};
pub use listener::Listener;
pub use protocol::{ExecutionKind, ReceiveOutcome, ReceiveState, ReceivedFile, Receiver, Token};
pub use session::{ClientSession, SessionBuilder};
pub use tls::TlsContexts;
pub use transport::Dialer;
