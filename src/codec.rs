//! Text encoding of a chain file.
//!
//! Every fixed-width field (header, nonce, separator) is [`HEX_LEN`]
//! characters wide, the same width as a hex digest, so the columns line up:
//!
//! ```text
//! HCB 1.0 --------------------------------------------------------
//! genesis
//! 0000000000000000000000000000000000000000000000000000000000000000
//! 0 --------------------------------------------------------------
//! 1f6c...
//! ```

use crate::digest::HEX_LEN;
use crate::error::{HcbError, Result};

/// Literal tag at the start of the header line.
pub const HEADER_TAG: &str = "HCB 1.0 ";

/// Prefix of the resume checkpoint comment.
pub const CHECKPOINT_PREFIX: &str = "#nonce:";

/// Width of every fixed-width field.
pub const FIELD_WIDTH: usize = HEX_LEN;

/// Right-pad `source` with `pad` up to `width` characters.
///
/// Fails if `source` is already wider than `width`.
pub fn pad_right(source: &str, width: usize, pad: char) -> Result<String> {
    let len = source.chars().count();
    if len > width {
        return Err(HcbError::Format(format!(
            "\"{}\" does not fit in {} characters",
            source, width
        )));
    }
    let mut out = String::with_capacity(width);
    out.push_str(source);
    out.extend(std::iter::repeat(pad).take(width - len));
    Ok(out)
}

/// Decimal rendering of `value`, left-padded with zeros to `width`.
pub fn format_fixed(value: u64, width: usize) -> Result<String> {
    let text = format!("{:0width$}", value, width = width);
    if text.len() > width {
        return Err(HcbError::Format(format!(
            "value {} does not fit in {} digits",
            value, width
        )));
    }
    Ok(text)
}

pub fn format_nonce(nonce: u64) -> Result<String> {
    format_fixed(nonce, FIELD_WIDTH)
}

/// Inverse of [`format_nonce`]: exactly [`FIELD_WIDTH`] ASCII digits.
///
/// Returns `None` for a wrong width, a non-digit character, or a value that
/// does not fit the nonce counter.
pub fn parse_nonce(line: &str) -> Option<u64> {
    if !is_nonce_text(line) {
        return None;
    }
    let digits = line.trim_start_matches('0');
    if digits.is_empty() {
        return Some(0);
    }
    digits.parse().ok()
}

/// Grammar check only: width and alphabet, regardless of magnitude.
pub fn is_nonce_text(line: &str) -> bool {
    line.len() == FIELD_WIDTH && line.bytes().all(|b| b.is_ascii_digit())
}

/// Separator line preceding block `index`: `"<index> "` padded with dashes.
pub fn format_separator(index: u32) -> String {
    let prefix = format!("{} ", index);
    // A u32 renders in at most 11 characters, far below the field width.
    pad_right(&prefix, FIELD_WIDTH, '-').unwrap_or(prefix)
}

/// Inverse of [`format_separator`].
pub fn parse_separator(line: &str) -> Option<u32> {
    let (index, rest) = line.split_once(' ')?;
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index: u32 = index.parse().ok()?;
    if rest.bytes().any(|b| b != b'-') || format_separator(index) != line {
        return None;
    }
    Some(index)
}

pub fn format_header() -> String {
    pad_right(HEADER_TAG, FIELD_WIDTH, '-').unwrap_or_else(|_| HEADER_TAG.to_string())
}

pub fn is_header(line: &str) -> bool {
    line == format_header()
}

pub fn is_comment(line: &str) -> bool {
    line.starts_with('#')
}

/// Resume checkpoint comment, e.g. `#nonce:1234`.
pub fn format_checkpoint(cursor: u64) -> String {
    format!("{}{}", CHECKPOINT_PREFIX, cursor)
}

/// Classification of a `#nonce:` comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Checkpoint {
    /// Not a checkpoint comment at all.
    None,
    Valid(u64),
    /// Prefix matched but the suffix is not a decimal counter.
    Malformed(String),
}

pub fn parse_checkpoint(line: &str) -> Checkpoint {
    match line.strip_prefix(CHECKPOINT_PREFIX) {
        None => Checkpoint::None,
        Some(rest) => {
            let rest = rest.trim();
            match rest.parse::<u64>() {
                Ok(cursor) if rest.bytes().all(|b| b.is_ascii_digit()) => {
                    Checkpoint::Valid(cursor)
                }
                _ => Checkpoint::Malformed(rest.to_string()),
            }
        }
    }
}

/// Leading comment identifying who produced the file.
pub fn format_provenance(generated_at: chrono::DateTime<chrono::Utc>) -> String {
    format!(
        "# File generated by hcb {} on {}",
        env!("CARGO_PKG_VERSION"),
        generated_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    )
}

/// A starting message must fit on one line and must not read back as a comment.
pub fn check_message(message: &str) -> Result<()> {
    if message.contains('\n') || message.contains('\r') {
        return Err(HcbError::InvalidMessage(
            "message must not contain a line break".into(),
        ));
    }
    if is_comment(message) {
        return Err(HcbError::InvalidMessage(
            "message must not start with '#'".into(),
        ));
    }
    Ok(())
}
