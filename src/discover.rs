use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Lists regular files directly inside `dir` whose extension matches `ext`
/// (case-insensitive, a leading dot is ignored). The result is sorted.
pub fn files_with_extension(dir: &Path, ext: &str) -> io::Result<Vec<PathBuf>> {
    let wanted = ext.trim_start_matches('.');

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(wanted));
        if matches {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
