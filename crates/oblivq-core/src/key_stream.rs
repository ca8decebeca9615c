//! Key streams and the generator seam

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Ordered key blocks for one database row, each a field-sized hex string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStream(Vec<String>);

impl KeyStream {
    pub fn new(blocks: Vec<String>) -> Self {
        Self(blocks)
    }

    pub fn blocks(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for KeyStream {
    fn from(blocks: Vec<String>) -> Self {
        Self(blocks)
    }
}

/// The two streams produced for one oblivious operation, one per operand row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStreamPair {
    pub a: KeyStream,
    pub b: KeyStream,
}

impl KeyStreamPair {
    pub fn new(a: KeyStream, b: KeyStream) -> Self {
        Self { a, b }
    }

    /// Draw both streams from a generator, `a` first
    pub fn generate<G: KeyStreamGenerator + ?Sized>(generator: &mut G) -> Result<Self> {
        let a = generator.generate()?;
        let b = generator.generate()?;
        Ok(Self { a, b })
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyStream> {
        [&self.a, &self.b].into_iter()
    }
}

/// Source of fresh key streams.
///
/// Called twice per oblivious operation. Implementations own the key
/// derivation; the client only stores and encodes what they return.
pub trait KeyStreamGenerator: Send {
    fn generate(&mut self) -> Result<KeyStream>;
}

/// Generator drawing uniformly random blocks of a fixed bit width
pub struct RandomKeyStreams {
    rng: StdRng,
    blocks_per_stream: usize,
    block_bits: u32,
}

impl RandomKeyStreams {
    pub fn new(blocks_per_stream: usize, block_bits: u32) -> Result<Self> {
        Self::with_rng(StdRng::from_entropy(), blocks_per_stream, block_bits)
    }

    /// Deterministic generator for tests and reproducible runs
    pub fn seeded(seed: u64, blocks_per_stream: usize, block_bits: u32) -> Result<Self> {
        Self::with_rng(StdRng::seed_from_u64(seed), blocks_per_stream, block_bits)
    }

    fn with_rng(rng: StdRng, blocks_per_stream: usize, block_bits: u32) -> Result<Self> {
        if block_bits == 0 || block_bits > crate::MAX_BLOCK_BITS {
            return Err(Error::InvalidConfig(format!(
                "block_bits {} outside 1..={}",
                block_bits,
                crate::MAX_BLOCK_BITS
            )));
        }
        Ok(Self {
            rng,
            blocks_per_stream,
            block_bits,
        })
    }

    fn next_block(&mut self) -> String {
        let byte_len = self.block_bits.div_ceil(8) as usize;
        let mut bytes = vec![0u8; byte_len];
        self.rng.fill_bytes(&mut bytes);
        let spare_bits = byte_len as u32 * 8 - self.block_bits;
        bytes[0] &= 0xff >> spare_bits;
        hex::encode(bytes)
    }
}

impl KeyStreamGenerator for RandomKeyStreams {
    fn generate(&mut self) -> Result<KeyStream> {
        let blocks = (0..self.blocks_per_stream)
            .map(|_| self.next_block())
            .collect();
        Ok(KeyStream(blocks))
    }
}
