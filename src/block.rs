use crate::codec::format_nonce;
use crate::digest::{count_leading_zero_bits, digest, to_hex, Hash256};
use crate::error::Result;

/// One mined link of the chain.
///
/// The difficulty is implicit in a chain file (it is the block's index) but
/// is carried here so a block can be checked on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub difficulty: u32,
    pub nonce: u64,
    pub digest: Hash256,
}

/// Bytes hashed to produce a block: previous digest text, a line break, and
/// the fixed-width nonce text.
pub fn preimage(previous: &str, nonce_text: &str) -> Vec<u8> {
    let mut data = Vec::with_capacity(previous.len() + 1 + nonce_text.len());
    data.extend_from_slice(previous.as_bytes());
    data.push(b'\n');
    data.extend_from_slice(nonce_text.as_bytes());
    data
}

impl Block {
    /// Derive the block for `nonce` on top of `previous`, whatever its difficulty.
    pub fn derive(previous: &str, difficulty: u32, nonce: u64) -> Result<Self> {
        let text = format_nonce(nonce)?;
        Ok(Self {
            difficulty,
            nonce,
            digest: digest(&preimage(previous, &text)),
        })
    }

    pub fn hex(&self) -> String {
        to_hex(&self.digest)
    }

    pub fn nonce_text(&self) -> Result<String> {
        format_nonce(self.nonce)
    }

    /// Check both defining relations against `previous`.
    pub fn verify(&self, previous: &str) -> bool {
        match Self::derive(previous, self.difficulty, self.nonce) {
            Ok(expected) => {
                expected.digest == self.digest
                    && count_leading_zero_bits(&self.digest) == self.difficulty
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preimage_layout() {
        assert_eq!(preimage("abc", "007"), b"abc\n007".to_vec());
    }

    const GENESIS_0: &str = "d68d9f06d106369b0d991d995d4483694ce0ee69623308e946ae520f42eb3d56";

    #[test]
    fn genesis_block_zero() {
        let block = Block::derive("genesis", 0, 0).unwrap();
        assert_eq!(block.hex(), GENESIS_0);
        assert!(block.verify("genesis"));
        assert_eq!(block.nonce_text().unwrap(), "0".repeat(64));
    }

    #[test]
    fn tampered_block_fails_verify() {
        let mut block = Block::derive("genesis", 0, 0).unwrap();
        block.nonce += 1;
        assert!(!block.verify("genesis"));
    }

    #[test]
    fn wrong_previous_fails_verify() {
        let block = Block::derive("genesis", 0, 0).unwrap();
        assert!(!block.verify("exodus"));
    }

    #[test]
    fn wrong_difficulty_fails_verify() {
        let mut block = Block::derive("genesis", 0, 0).unwrap();
        block.difficulty = 1;
        assert!(!block.verify("genesis"));
    }
}
