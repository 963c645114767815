use crate::error::{HcbError, Result};
use crate::validator::{run, ChainTip, ChainValidator};
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Re-validate a chain file and rewrite it with only its structural lines.
///
/// Two phases: the whole file is verified and collected first, then the
/// collected lines replace the file through a temporary file in the same
/// directory and a rename. An invalid chain is never rewritten.
pub fn normalize(path: &Path) -> Result<ChainTip> {
    let file = File::open(path).map_err(|source| HcbError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut validator = ChainValidator::collecting();
    run(BufReader::new(file), &mut validator)?;
    let read = validator.lines_read();
    let (tip, lines) = validator.finish_with_lines()?;

    replace_contents(path, &lines)?;
    log::info!(
        "normalized {}: kept {} lines, dropped {} comment lines",
        path.display(),
        lines.len(),
        read - lines.len()
    );
    Ok(tip)
}

fn replace_contents(path: &Path, lines: &[String]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    for line in lines {
        tmp.write_all(line.as_bytes())?;
    }
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), meta.permissions())?;
    }
    tmp.persist(path).map_err(|e| HcbError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{format_header, format_nonce, format_separator};

    const D0: &str = "d68d9f06d106369b0d991d995d4483694ce0ee69623308e946ae520f42eb3d56";

    fn sample() -> String {
        format!(
            "# File generated by hcb test\n{}\ngenesis\n{}\n{}\n{}\n#nonce:3\n",
            format_header(),
            format_nonce(0).unwrap(),
            format_separator(0),
            D0
        )
    }

    #[test]
    fn strips_comments() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chain.txt");
        fs::write(&path, sample()).unwrap();

        let tip = normalize(&path).unwrap();
        assert_eq!(tip.blocks, 1);
        assert_eq!(tip.resume_cursor, 3);

        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains('#'));
        assert_eq!(content.lines().count(), 5);
        assert!(content.ends_with(&format!("{}\n", D0)));
    }

    #[test]
    fn idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chain.txt");
        fs::write(&path, sample()).unwrap();

        normalize(&path).unwrap();
        let first = fs::read(&path).unwrap();
        let tip = normalize(&path).unwrap();
        let second = fs::read(&path).unwrap();
        assert_eq!(first, second);
        // The checkpoint was consumed by the first pass.
        assert_eq!(tip.resume_cursor, 0);
    }

    #[test]
    fn invalid_chain_is_left_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chain.txt");
        let broken = sample().replace(D0, &D0.replace('d', "e"));
        fs::write(&path, &broken).unwrap();

        assert!(normalize(&path).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), broken);
        // No stray temporary files either.
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }
}
