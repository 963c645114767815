use crate::block::Block;
use crate::codec::{
    check_message, format_checkpoint, format_header, format_provenance, format_separator,
};
use crate::error::{HcbError, Result};
use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Appends chain lines to storage, flushing after every block.
pub struct ChainWriter<W: Write> {
    out: W,
}

impl ChainWriter<File> {
    /// Create (or truncate) a chain file for a new chain.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|source| HcbError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(file))
    }

    /// Open an existing chain file for appending.
    pub fn append_to(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|source| HcbError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::new(file))
    }
}

impl<W: Write> ChainWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Provenance comment, header line and starting message. Written once,
    /// when the chain is created.
    pub fn write_header(&mut self, message: &str) -> Result<()> {
        self.write_header_at(message, Utc::now())
    }

    /// Same as [`write_header`](Self::write_header) with an explicit timestamp.
    pub fn write_header_at(&mut self, message: &str, generated_at: DateTime<Utc>) -> Result<()> {
        check_message(message)?;
        writeln!(self.out, "{}", format_provenance(generated_at))?;
        writeln!(self.out, "{}", format_header())?;
        writeln!(self.out, "{}", message)?;
        self.out.flush()?;
        Ok(())
    }

    /// Nonce, separator and digest lines of `block`, then flush.
    pub fn append_block(&mut self, block: &Block) -> Result<()> {
        let nonce = block.nonce_text()?;
        writeln!(self.out, "{}", nonce)?;
        writeln!(self.out, "{}", format_separator(block.difficulty))?;
        writeln!(self.out, "{}", block.hex())?;
        self.out.flush()?;
        Ok(())
    }

    /// Trailing `#nonce:<cursor>` comment recording where an interrupted
    /// search stopped.
    pub fn write_checkpoint(&mut self, cursor: u64) -> Result<()> {
        writeln!(self.out, "{}", format_checkpoint(cursor))?;
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
