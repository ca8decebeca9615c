//! oblivq-core: Key material bookkeeping for the oblivious query client
//!
//! This crate holds everything the client needs locally, independent of the
//! network:
//! - Field codec: hex key blocks -> signed field integers for the engine
//! - Key stream store: row index -> key stream, mutated by encrypt/reencrypt
//! - Engine input record: the text file the MPC engine reads per operation
//! - Client configuration
//!
//! # Key stream lifecycle
//!
//! Every oblivious compare/swap step touches two rows. An *encrypt* step
//! appends two fresh key streams to the store. A *reencrypt* step replaces
//! the streams at both rows and hands the superseded pair back to the caller
//! as decryption material:
//!
//! ```text
//! encrypt(0, 1)    store: [k0, k1]
//! encrypt(2, 3)    store: [k0, k1, k2, k3]
//! reencrypt(0, 3)  store: [k4, k1, k2, k5]   -> returns (k0, k3)
//! ```
//!
//! The superseded streams cannot be recovered once the caller drops them.

mod codec;
mod config;
mod error;
mod key_stream;
mod op;
mod record;
mod store;

pub use codec::{decode_signed, FieldCodec, MAX_BLOCK_BITS};
pub use config::{ClientConfig, EngineConfig, FieldConfig, TlsPaths};
pub use error::Error;
pub use key_stream::{KeyStream, KeyStreamGenerator, KeyStreamPair, RandomKeyStreams};
pub use op::ObliviousOperation;
pub use record::EngineInputRecord;
pub use store::KeyStreamStore;

pub type Result<T> = std::result::Result<T, Error>;

/// Protocol constants shared with the peer
pub mod constants {
    /// Frame width in bytes
    pub const FRAME_WIDTH: usize = 1024;

    /// Narrowest usable frame: the longest control token, `<REENCRYPT EXECUTION>`
    pub const MIN_FRAME_WIDTH: usize = 21;

    /// Byte used to right-pad frames
    pub const PADDING_BYTE: u8 = b' ';

    /// Party index this client plays in the MPC engine
    pub const CLIENT_PARTY: u8 = 1;

    /// Engine script run after an encrypt round-trip
    pub const COMPARE_AND_ENCRYPT: &str = "compare_and_encrypt";

    /// Engine script run after a reencrypt round-trip
    pub const COMPARE_AND_REENCRYPT: &str = "compare_and_reencrypt";
}
