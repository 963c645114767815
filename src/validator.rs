use crate::block::preimage;
use crate::codec::{
    format_header, format_separator, is_comment, is_header, is_nonce_text, parse_checkpoint,
    Checkpoint,
};
use crate::digest::{count_leading_zero_bits, digest, to_hex};
use crate::error::{CryptoKind, HcbError, Result, StructuralKind};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// State recovered from a fully verified chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainTip {
    /// Starting message from the second structural line.
    pub message: String,
    /// Number of verified blocks.
    pub blocks: u32,
    /// Hex digest of the last block, `None` for a chain with no block yet.
    pub final_digest: Option<String>,
    /// Cursor from a trailing `#nonce:` checkpoint, zero when absent.
    pub resume_cursor: u64,
}

impl ChainTip {
    /// Difficulty of the last block.
    pub fn final_difficulty(&self) -> Option<u32> {
        self.blocks.checked_sub(1)
    }

    /// Difficulty the next block must have.
    pub fn next_difficulty(&self) -> u32 {
        self.blocks
    }

    /// Text the next block chains from.
    pub fn previous(&self) -> &str {
        self.final_digest.as_deref().unwrap_or(&self.message)
    }
}

impl std::fmt::Display for ChainTip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Message:    {}", self.message)?;
        writeln!(f, "Blocks:     {}", self.blocks)?;
        match self.final_difficulty() {
            Some(d) => writeln!(f, "Difficulty: {}", d)?,
            None => writeln!(f, "Difficulty: -")?,
        }
        writeln!(f, "Last hash:  {}", self.final_digest.as_deref().unwrap_or("-"))?;
        if self.resume_cursor > 0 {
            writeln!(f, "Resume at:  {}", self.resume_cursor)?;
        }
        Ok(())
    }
}

/// What the next structural line must be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Header,
    Message,
    Nonce(u32),
    Separator(u32),
    Digest(u32),
}

impl Expect {
    fn describe(self) -> String {
        match self {
            Expect::Header => format_header(),
            Expect::Message => "starting message".into(),
            Expect::Nonce(k) => format!("nonce of block {}", k),
            Expect::Separator(k) => format_separator(k),
            Expect::Digest(k) => format!("digest of block {}", k),
        }
    }
}

/// Streaming, line-by-line chain verifier.
///
/// Comment lines (`#...`) are skipped, except that a `#nonce:` checkpoint
/// updates the resume cursor. Every other line must follow
/// header, message, then (nonce, separator, digest) per block, with each
/// digest re-derived and its leading zero bits equal to the block index.
/// The first failure aborts validation.
pub struct ChainValidator {
    expect: Expect,
    line: usize,
    message: String,
    previous: String,
    nonce: String,
    blocks: u32,
    resume_cursor: u64,
    kept: Option<Vec<String>>,
}

impl Default for ChainValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainValidator {
    pub fn new() -> Self {
        Self {
            expect: Expect::Header,
            line: 0,
            message: String::new(),
            previous: String::new(),
            nonce: String::new(),
            blocks: 0,
            resume_cursor: 0,
            kept: None,
        }
    }

    /// A validator that also keeps every structural line, newline-terminated,
    /// for rewriting the file without its comments.
    pub fn collecting() -> Self {
        Self {
            kept: Some(Vec::new()),
            ..Self::new()
        }
    }

    /// Feed one physical line, without its trailing `\n`.
    pub fn feed(&mut self, line: &str) -> Result<()> {
        self.line += 1;

        if is_comment(line) {
            match parse_checkpoint(line) {
                Checkpoint::None => {}
                Checkpoint::Valid(cursor) => self.resume_cursor = cursor,
                Checkpoint::Malformed(text) => {
                    log::warn!(
                        "line #{}: ignoring malformed checkpoint \"{}\", resuming from 0",
                        self.line,
                        text
                    );
                    self.resume_cursor = 0;
                }
            }
            return Ok(());
        }

        match self.expect {
            Expect::Header => {
                if !is_header(line) {
                    return Err(self.structural(StructuralKind::BadHeader, line));
                }
                self.expect = Expect::Message;
            }
            Expect::Message => {
                self.message = line.to_string();
                self.previous = line.to_string();
                self.expect = Expect::Nonce(0);
            }
            Expect::Nonce(k) => {
                if !is_nonce_text(line) {
                    return Err(self.structural(StructuralKind::BadNonce, line));
                }
                self.nonce = line.to_string();
                self.expect = Expect::Separator(k);
            }
            Expect::Separator(k) => {
                if line != format_separator(k) {
                    return Err(self.structural(StructuralKind::BadSeparator, line));
                }
                self.expect = Expect::Digest(k);
            }
            Expect::Digest(k) => {
                let hash = digest(&preimage(&self.previous, &self.nonce));
                let computed = to_hex(&hash);
                if line != computed {
                    return Err(HcbError::Crypto {
                        kind: CryptoKind::DigestMismatch,
                        line: self.line,
                        expected: computed,
                        actual: line.to_string(),
                    });
                }
                let zeros = count_leading_zero_bits(&hash);
                if zeros != k {
                    return Err(HcbError::Crypto {
                        kind: CryptoKind::DifficultyMismatch,
                        line: self.line,
                        expected: format!("difficulty {}", k),
                        actual: format!("difficulty {}", zeros),
                    });
                }
                self.previous = computed;
                self.blocks = k + 1;
                // A checkpoint only describes the block still being searched.
                self.resume_cursor = 0;
                self.expect = Expect::Nonce(k + 1);
            }
        }

        if let Some(kept) = self.kept.as_mut() {
            kept.push(format!("{}\n", line));
        }
        Ok(())
    }

    /// Physical lines consumed so far, comments included.
    pub fn lines_read(&self) -> usize {
        self.line
    }

    /// Check that input stopped on a block boundary and return the tip.
    pub fn finish(self) -> Result<ChainTip> {
        self.finish_with_lines().map(|(tip, _)| tip)
    }

    /// Like [`finish`](Self::finish), also returning the kept structural lines
    /// (empty unless built with [`collecting`](Self::collecting)).
    pub fn finish_with_lines(self) -> Result<(ChainTip, Vec<String>)> {
        match self.expect {
            Expect::Nonce(_) => {}
            pending => {
                return Err(HcbError::Structural {
                    kind: StructuralKind::TruncatedChain,
                    line: self.line + 1,
                    expected: pending.describe(),
                    actual: "end of file".into(),
                })
            }
        }
        let final_digest = (self.blocks > 0).then(|| self.previous.clone());
        let tip = ChainTip {
            message: self.message,
            blocks: self.blocks,
            final_digest,
            resume_cursor: self.resume_cursor,
        };
        Ok((tip, self.kept.unwrap_or_default()))
    }

    fn structural(&self, kind: StructuralKind, actual: &str) -> HcbError {
        HcbError::Structural {
            kind,
            line: self.line,
            expected: self.expect.describe(),
            actual: actual.to_string(),
        }
    }
}

/// Feed every line of `reader` through `validator`.
pub fn run<R: BufRead>(mut reader: R, validator: &mut ChainValidator) -> Result<()> {
    let mut buf = String::new();
    loop {
        buf.clear();
        if reader.read_line(&mut buf)? == 0 {
            return Ok(());
        }
        let line = buf.strip_suffix('\n').unwrap_or(&buf);
        validator.feed(line)?;
    }
}

pub fn validate<R: BufRead>(reader: R) -> Result<ChainTip> {
    let mut validator = ChainValidator::new();
    run(reader, &mut validator)?;
    validator.finish()
}

/// Read-only verification of a chain file.
pub fn validate_file(path: &Path) -> Result<ChainTip> {
    let file = File::open(path).map_err(|source| HcbError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    validate(BufReader::new(file))
}
