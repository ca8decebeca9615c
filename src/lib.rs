//! oblivq: client side of the oblivious database query protocol
//!
//! Umbrella over the workspace crates; see `oblivq-client` for the session
//! API and `oblivq-core` for key stream bookkeeping.

pub use oblivq_client;
pub use oblivq_core;
