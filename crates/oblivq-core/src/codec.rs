//! Field codec: key blocks to the engine's signed integer format
//!
//! The engine reads field elements as signed decimal integers. Key blocks
//! arrive as unsigned strings (hex by default), so each block is read as an
//! unsigned `block_bits`-wide word and reinterpreted as two's complement.

use crate::{Error, Result};

/// Widest block the codec can represent
pub const MAX_BLOCK_BITS: u32 = 128;

/// Decode one key block into its signed field representation.
///
/// `block_str` is parsed in `base`. If the value's bit `block_bits - 1` is set
/// the result is `value - 2^block_bits`. Values that need more than
/// `block_bits` bits are rejected rather than wrapped.
pub fn decode_signed(block_str: &str, base: u32, block_bits: u32) -> Result<i128> {
    if block_bits == 0 || block_bits > MAX_BLOCK_BITS {
        return Err(Error::Encoding(format!(
            "block width {} outside 1..={}",
            block_bits, MAX_BLOCK_BITS
        )));
    }
    if !(2..=36).contains(&base) {
        return Err(Error::Encoding(format!("unsupported base {}", base)));
    }

    let digits = if base == 16 {
        block_str
            .strip_prefix("0x")
            .or_else(|| block_str.strip_prefix("0X"))
            .unwrap_or(block_str)
    } else {
        block_str
    };

    let value = u128::from_str_radix(digits, base).map_err(|e| {
        Error::Encoding(format!("cannot parse {:?} in base {}: {}", block_str, base, e))
    })?;

    if block_bits < MAX_BLOCK_BITS && value >> block_bits != 0 {
        return Err(Error::Encoding(format!(
            "{:?} does not fit in {} bits",
            block_str, block_bits
        )));
    }

    // Sign-extend from bit `block_bits - 1`
    let shift = MAX_BLOCK_BITS - block_bits;
    Ok(((value << shift) as i128) >> shift)
}

/// Codec bound to one field configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldCodec {
    base: u32,
    block_bits: u32,
}

impl FieldCodec {
    pub fn new(base: u32, block_bits: u32) -> Result<Self> {
        // Probe once so a bad configuration fails here, not mid-operation
        decode_signed("0", base, block_bits)?;
        Ok(Self { base, block_bits })
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn block_bits(&self) -> u32 {
        self.block_bits
    }

    pub fn decode(&self, block: &str) -> Result<i128> {
        decode_signed(block, self.base, self.block_bits)
    }

    /// Decode every block of a key stream, in order
    pub fn decode_stream(&self, blocks: &[String]) -> Result<Vec<i128>> {
        blocks.iter().map(|b| self.decode(b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_decodes_to_zero() {
        assert_eq!(decode_signed("00000000", 16, 32).unwrap(), 0);
        assert_eq!(decode_signed("0", 16, 128).unwrap(), 0);
    }

    #[test]
    fn test_sign_bit_is_most_negative() {
        assert_eq!(decode_signed("80000000", 16, 32).unwrap(), -(1i128 << 31));
        assert_eq!(decode_signed("80", 16, 8).unwrap(), -128);
    }

    #[test]
    fn test_all_ones_is_minus_one() {
        assert_eq!(decode_signed("ffffffff", 16, 32).unwrap(), -1);
        assert_eq!(decode_signed(&"f".repeat(32), 16, 128).unwrap(), -1);
    }

    #[test]
    fn test_positive_values_pass_through() {
        assert_eq!(decode_signed("7fffffff", 16, 32).unwrap(), i32::MAX as i128);
        assert_eq!(decode_signed("0x2a", 16, 16).unwrap(), 42);
        assert_eq!(decode_signed("101", 2, 4).unwrap(), 5);
    }

    #[test]
    fn test_full_width_128() {
        let min = format!("8{}", "0".repeat(31));
        assert_eq!(decode_signed(&min, 16, 128).unwrap(), i128::MIN);
        let max = format!("7{}", "f".repeat(31));
        assert_eq!(decode_signed(&max, 16, 128).unwrap(), i128::MAX);
    }

    #[test]
    fn test_oversized_magnitude_rejected() {
        assert!(matches!(decode_signed("100000000", 16, 32), Err(Error::Encoding(_))));
        assert!(matches!(decode_signed("100", 16, 8), Err(Error::Encoding(_))));
        // 33 hex digits overflows u128 itself
        assert!(decode_signed(&format!("1{}", "0".repeat(32)), 16, 128).is_err());
    }

    #[test]
    fn test_bad_input_rejected() {
        assert!(decode_signed("xyz", 16, 32).is_err());
        assert!(decode_signed("", 16, 32).is_err());
        assert!(decode_signed("1", 16, 0).is_err());
        assert!(decode_signed("1", 16, 129).is_err());
        assert!(decode_signed("1", 1, 8).is_err());
    }

    #[test]
    fn test_codec_decodes_stream_in_order() {
        let codec = FieldCodec::new(16, 8).unwrap();
        let blocks = vec!["01".to_string(), "ff".to_string(), "80".to_string()];
        assert_eq!(codec.decode_stream(&blocks).unwrap(), vec![1, -1, -128]);
    }

    #[test]
    fn test_codec_rejects_bad_config() {
        assert!(FieldCodec::new(16, 0).is_err());
        assert!(FieldCodec::new(40, 64).is_err());
    }
}
