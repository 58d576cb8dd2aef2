//! Ordering of on-disk `_part{N}` artifacts.
//!
//! Part files are named `{base}_part{N}.{ext}` with a 1-based index.
//! Lexicographic order would put `part10` before `part2`, so listing
//! parses the numeric suffix and sorts by it. Files whose name does not
//! parse sort after every numbered part, in name order.

use std::path::{Path, PathBuf};

use crate::error::Result;

/// Parse the part index out of a file name (`intro_part3.txt` → `3`).
/// Returns `None` when the name carries no parsable `_part{N}` suffix.
pub fn part_index(path: &Path) -> Option<usize> {
    let stem = path.file_stem()?.to_str()?;
    let (_, digits) = stem.rsplit_once("_part")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// List the `.txt` part files of `dir` in ascending part-index order.
/// Unparsable names sort last; ties fall back to the file name.
pub fn ordered_part_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "txt") {
            files.push(path);
        }
    }
    files.sort_by_key(|path| {
        (
            part_index(path).unwrap_or(usize::MAX),
            path.file_name().map(|n| n.to_os_string()),
        )
    });
    Ok(files)
}
