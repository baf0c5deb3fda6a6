//! Locating the text files a run should read.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ReaderError;

/// Extension of the files picked up from an input folder.
pub const TEXT_EXTENSION: &str = "txt";

fn has_text_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(TEXT_EXTENSION))
}

/// Resolve which files to process.
///
/// With `file` set, that single file is returned once it is known to exist.
/// Otherwise every `.txt` file directly inside `input_dir` is returned,
/// ordered by file name. An empty folder yields [`ReaderError::EmptyBatch`].
pub fn resolve_inputs(file: Option<&Path>, input_dir: &Path) -> Result<Vec<PathBuf>, ReaderError> {
    match file {
        Some(path) => resolve_single(path).map(|p| vec![p]),
        None => resolve_folder(input_dir),
    }
}

fn resolve_single(path: &Path) -> Result<PathBuf, ReaderError> {
    if !path.is_file() {
        return Err(ReaderError::InputNotFound(path.to_path_buf()));
    }
    if !has_text_extension(path) {
        log::warn!(
            "Input file '{}' does not have a .{TEXT_EXTENSION} extension, reading it as text anyway",
            path.display()
        );
    }
    Ok(path.to_path_buf())
}

fn resolve_folder(dir: &Path) -> Result<Vec<PathBuf>, ReaderError> {
    if !dir.is_dir() {
        return Err(ReaderError::InputNotFound(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_text_extension(&path) {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(ReaderError::EmptyBatch(dir.to_path_buf()));
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    log::info!("Found {} text file(s) in {}", files.len(), dir.display());
    Ok(files)
}

/// Read a UTF-8 text file in full.
pub fn read_text(path: &Path) -> Result<String, ReaderError> {
    log::info!("Reading text from {}", path.display());
    Ok(fs::read_to_string(path)?)
}
