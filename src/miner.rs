use crate::block::Block;
use crate::codec::format_nonce;
use crate::digest::{count_leading_zero_bits, to_hex, Hash256, DIGEST_LEN};
use crate::error::{HcbError, Result};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};

/// Attempts between two progress log lines.
const PROGRESS_EVERY: u64 = 1 << 24;

/// How a search ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Found(Block),
    /// The stop flag was raised; `cursor` is the next nonce that would have
    /// been tried.
    Cancelled { cursor: u64 },
}

/// Brute-force search for the block of one difficulty.
///
/// The cursor is owned state: it starts at zero (or a resume value), moves
/// forward by one per attempt, and is reset when the miner advances to the
/// next difficulty.
#[derive(Debug, Clone)]
pub struct Miner {
    previous: String,
    difficulty: u32,
    cursor: u64,
}

impl Miner {
    pub fn new(previous: impl Into<String>, difficulty: u32) -> Self {
        Self {
            previous: previous.into(),
            difficulty,
            cursor: 0,
        }
    }

    /// Start the search at `cursor` instead of zero.
    pub fn resume_from(mut self, cursor: u64) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn previous(&self) -> &str {
        &self.previous
    }

    /// Try nonces from the cursor on until one yields exactly `difficulty`
    /// leading zero bits, or until `stop` is raised.
    pub fn search(&mut self, stop: &AtomicBool) -> Result<SearchOutcome> {
        if self.difficulty as usize > DIGEST_LEN * 8 {
            return Err(HcbError::Format(format!(
                "difficulty {} exceeds the digest width",
                self.difficulty
            )));
        }

        let mut prefix = Sha256::new();
        prefix.update(self.previous.as_bytes());
        prefix.update(b"\n");

        let start = self.cursor;
        loop {
            if stop.load(Ordering::Relaxed) {
                return Ok(SearchOutcome::Cancelled {
                    cursor: self.cursor,
                });
            }

            let nonce = self.cursor;
            let text = format_nonce(nonce)?;
            let mut hasher = prefix.clone();
            hasher.update(text.as_bytes());
            let hash: Hash256 = hasher.finalize().into();

            if count_leading_zero_bits(&hash) == self.difficulty {
                self.cursor = nonce.saturating_add(1);
                return Ok(SearchOutcome::Found(Block {
                    difficulty: self.difficulty,
                    nonce,
                    digest: hash,
                }));
            }

            self.cursor = nonce.checked_add(1).ok_or_else(|| {
                HcbError::Format(format!(
                    "nonce space exhausted at difficulty {}",
                    self.difficulty
                ))
            })?;

            if (self.cursor - start) % PROGRESS_EVERY == 0 {
                log::debug!(
                    "difficulty {}: {} attempts so far (cursor {})",
                    self.difficulty,
                    self.cursor - start,
                    self.cursor
                );
            }
        }
    }

    /// Move on to the block after `found`: chain from its digest, require one
    /// more zero bit, and restart the cursor.
    pub fn advance(&mut self, found: &Block) {
        self.previous = to_hex(&found.digest);
        self.difficulty = found.difficulty + 1;
        self.cursor = 0;
    }
}
