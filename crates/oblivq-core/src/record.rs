//! Engine input file for one compare/swap step
//!
//! Layout, one item per line:
//! ```text
//! <swap flag 0|1>
//! <decryption key line, row a>    (reencrypt only)
//! <decryption key line, row b>    (reencrypt only)
//! <encryption key line, row a>
//! <encryption key line, row b>
//! ```
//! A key line is the row's key stream decoded block by block into signed
//! field integers, separated by single spaces.

use std::fmt::Write as _;
use std::path::Path;

use crate::{FieldCodec, KeyStreamPair, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInputRecord {
    pub swap: bool,
    pub decryption: Vec<Vec<i128>>,
    pub encryption: Vec<Vec<i128>>,
}

impl EngineInputRecord {
    /// Record for a first-time encryption: no decryption lines
    pub fn encrypt(swap: bool, encryption: &KeyStreamPair, codec: &FieldCodec) -> Result<Self> {
        Ok(Self {
            swap,
            decryption: Vec::new(),
            encryption: encode_pair(encryption, codec)?,
        })
    }

    /// Record for a reencryption: old streams decrypt, new streams encrypt
    pub fn reencrypt(
        swap: bool,
        decryption: &KeyStreamPair,
        encryption: &KeyStreamPair,
        codec: &FieldCodec,
    ) -> Result<Self> {
        Ok(Self {
            swap,
            decryption: encode_pair(decryption, codec)?,
            encryption: encode_pair(encryption, codec)?,
        })
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push(if self.swap { '1' } else { '0' });
        out.push('\n');
        for line in self.decryption.iter().chain(&self.encryption) {
            for (i, value) in line.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                let _ = write!(out, "{}", value);
            }
            out.push('\n');
        }
        out
    }

    /// Write the record, replacing any previous file at `path`
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.render())?;
        tracing::debug!(
            path = %path.display(),
            swap = self.swap,
            key_lines = self.decryption.len() + self.encryption.len(),
            "Wrote engine input"
        );
        Ok(())
    }
}

fn encode_pair(pair: &KeyStreamPair, codec: &FieldCodec) -> Result<Vec<Vec<i128>>> {
    pair.iter().map(|s| codec.decode_stream(s.blocks())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, KeyStream};

    fn pair(a: &[&str], b: &[&str]) -> KeyStreamPair {
        let to_stream = |blocks: &[&str]| KeyStream::new(blocks.iter().map(|s| s.to_string()).collect());
        KeyStreamPair::new(to_stream(a), to_stream(b))
    }

    #[test]
    fn test_encrypt_record_layout() {
        let codec = FieldCodec::new(16, 8).unwrap();
        let enc = pair(&["01", "ff", "7f"], &["80", "00", "02"]);
        let record = EngineInputRecord::encrypt(true, &enc, &codec).unwrap();

        let text = record.render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["1", "1 -1 127", "-128 0 2"]);
    }

    #[test]
    fn test_reencrypt_record_puts_decryption_first() {
        let codec = FieldCodec::new(16, 8).unwrap();
        let dec = pair(&["01"], &["02"]);
        let enc = pair(&["03"], &["04"]);
        let record = EngineInputRecord::reencrypt(false, &dec, &enc, &codec).unwrap();

        let text = record.render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn test_oversized_block_fails_record() {
        let codec = FieldCodec::new(16, 8).unwrap();
        let enc = pair(&["01"], &["100"]);
        assert!(matches!(
            EngineInputRecord::encrypt(false, &enc, &codec),
            Err(Error::Encoding(_))
        ));
    }

    #[test]
    fn test_write_to_creates_parent_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Player-Data").join("Input-P1-0");
        let codec = FieldCodec::new(16, 8).unwrap();

        let first = EngineInputRecord::encrypt(true, &pair(&["01"], &["02"]), &codec).unwrap();
        first.write_to(&path).unwrap();
        let second = EngineInputRecord::encrypt(false, &pair(&["03"], &["04"]), &codec).unwrap();
        second.write_to(&path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0\n3\n4\n");
    }
}
