//! Input discovery
//!
//! Expands the files and folders a user hands us into a flat list of audio
//! files. Folders are walked recursively; only accepted extensions are kept.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::audio::is_audio_file;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("input not found: {0}")]
    NotFound(PathBuf),
}

/// Collect audio files from a mix of files and folders
///
/// Order follows the roots as given; within a folder, entries are sorted by
/// name. A file reachable from more than one root is only returned once.
/// Explicitly named files with an unrecognized extension are skipped.
pub fn collect_audio_files(roots: &[PathBuf]) -> Result<Vec<PathBuf>, ScanError> {
    let mut files = Vec::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    for root in roots {
        if !root.exists() {
            return Err(ScanError::NotFound(root.clone()));
        }

        if root.is_file() {
            if is_audio_file(root) {
                push_unique(&mut files, &mut seen, root);
            } else {
                log::warn!("Skipping non-audio file: {}", root.display());
            }
            continue;
        }

        let before = files.len();
        for entry in WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if entry.file_type().is_file() && is_audio_file(path) {
                push_unique(&mut files, &mut seen, path);
            }
        }
        log::debug!(
            "Scanned {}: {} new audio file(s)",
            root.display(),
            files.len() - before
        );
    }

    Ok(files)
}

/// Add `path` unless its canonical form was already collected
fn push_unique(files: &mut Vec<PathBuf>, seen: &mut HashSet<PathBuf>, path: &Path) {
    let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if seen.insert(key) {
        files.push(path.to_path_buf());
    }
}
