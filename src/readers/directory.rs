use crate::error::{ProcessingError, Result};
use std::path::{Path, PathBuf};

/// List station files directly under `dir` whose extension is one of `extensions`,
/// sorted by path so runs are reproducible.
pub fn find_source_files(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ProcessingError::DirectoryNotFound(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)));

        if matches {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
