//! Input discovery for batch parsing.

use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while resolving input paths
#[derive(Debug, Error)]
pub enum FileDiscoveryError {
    #[error("input path does not exist: {0}")]
    NotFound(PathBuf),

    #[error("filename pattern must not be empty")]
    EmptyPattern,

    #[error("invalid filename pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Resolve an input path into the list of files to parse.
///
/// A file is returned as-is. For a directory, its files (and those of its
/// subdirectories when `recursive` is set) whose name fully matches
/// `match_filename` are returned in sorted order. Without a pattern every
/// file matches.
pub fn find_files(
    input: &Path,
    recursive: bool,
    match_filename: Option<&str>,
) -> Result<Vec<PathBuf>, FileDiscoveryError> {
    if !input.exists() {
        return Err(FileDiscoveryError::NotFound(input.to_path_buf()));
    }
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let pattern = match match_filename {
        Some("") => return Err(FileDiscoveryError::EmptyPattern),
        Some(p) => Some(Regex::new(&format!("^(?:{p})$"))?),
        None => None,
    };

    let mut files = Vec::new();
    walk(input, recursive, pattern.as_ref(), &mut files)?;
    files.sort();
    Ok(files)
}

fn walk(
    dir: &Path,
    recursive: bool,
    pattern: Option<&Regex>,
    out: &mut Vec<PathBuf>,
) -> Result<(), FileDiscoveryError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if recursive {
                walk(&path, recursive, pattern, out)?;
            }
            continue;
        }

        let matches = match (pattern, path.file_name().and_then(|n| n.to_str())) {
            (None, _) => true,
            (Some(re), Some(name)) => re.is_match(name),
            (Some(_), None) => false,
        };
        if matches {
            out.push(path);
        }
    }
    Ok(())
}
