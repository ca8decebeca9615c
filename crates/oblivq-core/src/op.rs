//! One compare/swap step of an oblivious sorting or compaction network

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObliviousOperation {
    pub index_a: usize,
    pub index_b: usize,
    /// Whether the two rows' ciphertexts are exchanged by this step
    pub swap: bool,
}

impl ObliviousOperation {
    pub fn new(index_a: usize, index_b: usize, swap: bool) -> Self {
        Self {
            index_a,
            index_b,
            swap,
        }
    }

    /// The protocol never rejects `a == b`; callers must
    pub fn check_distinct(&self) -> Result<()> {
        if self.index_a == self.index_b {
            return Err(Error::DuplicateIndex(self.index_a));
        }
        Ok(())
    }
}
