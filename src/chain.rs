use crate::codec::check_message;
use crate::error::Result;
use crate::miner::{Miner, SearchOutcome};
use crate::normalize::normalize;
use crate::validator::{validate_file, ChainTip};
use crate::writer::ChainWriter;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

/// Knobs for a mining run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MiningOptions {
    /// Stop after the block of this difficulty (None = mine forever).
    pub until: Option<u32>,
}

/// How a mining run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiningOutcome {
    /// Reached the `until` bound; the chain now holds `blocks` blocks.
    Finished { blocks: u32 },
    /// Stopped by the stop flag while searching for `difficulty`. A
    /// `#nonce:<cursor>` checkpoint was written.
    Interrupted { difficulty: u32, cursor: u64 },
}

/// Create a new chain at `path` and mine it.
pub fn start(
    path: &Path,
    message: &str,
    options: MiningOptions,
    stop: &AtomicBool,
) -> Result<MiningOutcome> {
    check_message(message)?;
    let mut writer = ChainWriter::create(path)?;
    writer.write_header(message)?;
    log::info!("started chain {} from \"{}\"", path.display(), message);
    mine(&mut writer, Miner::new(message, 0), options, stop)
}

/// Verify and normalize an existing chain, then keep mining it.
pub fn resume(path: &Path, options: MiningOptions, stop: &AtomicBool) -> Result<MiningOutcome> {
    let tip = normalize(path)?;
    log::info!(
        "continuing {} at difficulty {} from nonce {}",
        path.display(),
        tip.next_difficulty(),
        tip.resume_cursor
    );
    let miner = Miner::new(tip.previous(), tip.next_difficulty()).resume_from(tip.resume_cursor);
    let mut writer = ChainWriter::append_to(path)?;
    mine(&mut writer, miner, options, stop)
}

/// Read-only verification.
pub fn check(path: &Path) -> Result<ChainTip> {
    validate_file(path)
}

/// Mining loop: search, append, advance, until the bound or the stop flag.
///
/// On the stop path the miner's cursor is always written as a checkpoint
/// before returning.
pub fn mine<W: Write>(
    writer: &mut ChainWriter<W>,
    mut miner: Miner,
    options: MiningOptions,
    stop: &AtomicBool,
) -> Result<MiningOutcome> {
    loop {
        if let Some(until) = options.until {
            if miner.difficulty() > until {
                return Ok(MiningOutcome::Finished {
                    blocks: miner.difficulty(),
                });
            }
        }

        let started = Instant::now();
        let from = miner.cursor();
        match miner.search(stop)? {
            SearchOutcome::Found(block) => {
                writer.append_block(&block)?;
                let attempts = block.nonce - from + 1;
                let secs = started.elapsed().as_secs_f64();
                log::info!(
                    "block {} found: nonce {} after {} attempts in {:.2}s ({:.0} H/s)",
                    block.difficulty,
                    block.nonce,
                    attempts,
                    secs,
                    if secs > 0.0 { attempts as f64 / secs } else { 0.0 }
                );
                miner.advance(&block);
            }
            SearchOutcome::Cancelled { cursor } => {
                writer.write_checkpoint(cursor)?;
                log::warn!(
                    "interrupted at difficulty {}, checkpoint saved at nonce {}",
                    miner.difficulty(),
                    cursor
                );
                return Ok(MiningOutcome::Interrupted {
                    difficulty: miner.difficulty(),
                    cursor,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::format_separator;
    use crate::error::{HcbError, StructuralKind};
    use std::fs;

    const D3: &str = "1cd6579107110e79fab29305bee5c36f4a7510e7705eda4279a3ed180d72b289";
    const D3_FROM_14: &str = "155127e02bf6895d669b5f5350b48e038a749afd7a4021c177fcb048c3d453d0";

    fn bounded(until: u32) -> MiningOptions {
        MiningOptions { until: Some(until) }
    }

    #[test]
    fn genesis_first_block() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chain.txt");
        let stop = AtomicBool::new(false);

        let outcome = start(&path, "genesis", bounded(0), &stop).unwrap();
        assert_eq!(outcome, MiningOutcome::Finished { blocks: 1 });

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[3], "0".repeat(64));

        let tip = check(&path).unwrap();
        assert_eq!(tip.final_difficulty(), Some(0));
    }

    #[test]
    fn mined_chain_validates() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chain.txt");
        let stop = AtomicBool::new(false);

        start(&path, "genesis", bounded(6), &stop).unwrap();
        let tip = check(&path).unwrap();
        assert_eq!(tip.blocks, 7);
        assert_eq!(tip.final_difficulty(), Some(6));
        assert_eq!(tip.resume_cursor, 0);
    }

    #[test]
    fn continue_appends_next_difficulties() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chain.txt");
        let stop = AtomicBool::new(false);

        start(&path, "genesis", bounded(2), &stop).unwrap();
        let outcome = resume(&path, bounded(3), &stop).unwrap();
        assert_eq!(outcome, MiningOutcome::Finished { blocks: 4 });

        let tip = check(&path).unwrap();
        assert_eq!(tip.final_digest.as_deref(), Some(D3));
        // The provenance comment went away with normalization.
        assert!(!fs::read_to_string(&path).unwrap().contains('#'));
    }

    #[test]
    fn continue_past_bound_mines_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chain.txt");
        let stop = AtomicBool::new(false);

        start(&path, "genesis", bounded(2), &stop).unwrap();
        let outcome = resume(&path, bounded(1), &stop).unwrap();
        assert_eq!(outcome, MiningOutcome::Finished { blocks: 3 });
        assert_eq!(check(&path).unwrap().blocks, 3);
    }

    #[test]
    fn interrupt_then_continue_resumes_at_checkpoint() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chain.txt");
        let running = AtomicBool::new(false);
        start(&path, "genesis", bounded(2), &running).unwrap();
        let tip = check(&path).unwrap();

        // Searching difficulty 3, stopped once the cursor sits at 14.
        let stopped = AtomicBool::new(true);
        let miner = Miner::new(tip.previous(), 3).resume_from(14);
        let mut writer = ChainWriter::append_to(&path).unwrap();
        let outcome = mine(&mut writer, miner, MiningOptions::default(), &stopped).unwrap();
        assert_eq!(
            outcome,
            MiningOutcome::Interrupted {
                difficulty: 3,
                cursor: 14
            }
        );
        drop(writer);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.ends_with("#nonce:14\n"));
        assert_eq!(check(&path).unwrap().resume_cursor, 14);

        // Starting from 0 would find nonce 13; resuming from 14 finds 33.
        resume(&path, bounded(3), &running).unwrap();
        let tip = check(&path).unwrap();
        assert_eq!(tip.final_digest.as_deref(), Some(D3_FROM_14));
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[lines.len() - 3], format!("{:064}", 33));
        assert!(!content.contains("#nonce"));
    }

    #[test]
    fn corrupted_separator_fails_check() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chain.txt");
        let stop = AtomicBool::new(false);
        start(&path, "genesis", bounded(2), &stop).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let corrupted = content.replace(&format_separator(1), &format_separator(2));
        fs::write(&path, corrupted).unwrap();

        let err = check(&path).unwrap_err();
        assert!(matches!(
            err,
            HcbError::Structural {
                kind: StructuralKind::BadSeparator,
                ..
            }
        ));
        // Comment, header, message, block 0 (3 lines), nonce 1, separator 1.
        assert_eq!(err.line(), Some(8));
        assert_eq!(err.exit_code(), 6);
    }

    #[test]
    fn continue_refuses_invalid_chain() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chain.txt");
        let stop = AtomicBool::new(false);
        start(&path, "genesis", bounded(1), &stop).unwrap();

        let mut content = fs::read_to_string(&path).unwrap();
        content.push_str(&format!("{:064}\n", 0));
        fs::write(&path, &content).unwrap();

        let err = resume(&path, bounded(3), &stop).unwrap_err();
        assert!(matches!(
            err,
            HcbError::Structural {
                kind: StructuralKind::TruncatedChain,
                ..
            }
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), content);
    }

    #[test]
    fn multiline_message_is_rejected_before_writing() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chain.txt");
        let stop = AtomicBool::new(false);
        let err = start(&path, "one\ntwo", bounded(0), &stop).unwrap_err();
        assert!(matches!(err, HcbError::InvalidMessage(_)));
        assert!(!path.exists());
    }

    #[test]
    fn stop_before_first_block() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chain.txt");
        let stop = AtomicBool::new(true);
        let outcome = start(&path, "genesis", MiningOptions::default(), &stop).unwrap();
        assert_eq!(
            outcome,
            MiningOutcome::Interrupted {
                difficulty: 0,
                cursor: 0
            }
        );
        let tip = check(&path).unwrap();
        assert_eq!(tip.blocks, 0);
        assert_eq!(tip.previous(), "genesis");
    }
}
