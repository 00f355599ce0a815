//! Recursive discovery of audio files by extension.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Recursively collects files under `root` whose extension is in `exts`.
///
/// Extension comparison is case-insensitive and tolerates leading dots in
/// `exts` (".mp3" and "MP3" both select `song.mp3`). The result is sorted so
/// enumeration order is deterministic.
pub fn discover_files(root: &Path, exts: &[&str]) -> Result<Vec<PathBuf>> {
    let wanted: Vec<String> = exts
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect();

    let mut found = Vec::new();
    walk(root, &wanted, &mut found).with_context(|| format!("scan {}", root.display()))?;
    found.sort();
    Ok(found)
}

fn walk(dir: &Path, wanted: &[String], found: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let path = entry.path();
        if file_type.is_dir() {
            walk(&path, wanted, found)?;
        } else if file_type.is_file() && has_wanted_ext(&path, wanted) {
            found.push(path);
        }
    }
    Ok(())
}

fn has_wanted_ext(path: &Path, wanted: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| wanted.iter().any(|w| *w == e))
}
