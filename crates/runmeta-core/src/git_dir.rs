//! Locate the nearest directory holding a `.git/config`.

use std::path::{Path, PathBuf};

/// Walk upward from `start` (inclusive) and return the first directory
/// containing `.git/config`.
///
/// The filesystem root itself and the empty path are never checked. Each
/// call re-walks the filesystem; nothing is cached.
pub fn find_git_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .filter(|dir| !dir.as_os_str().is_empty() && dir.parent().is_some())
        .find(|dir| dir.join(".git").join("config").is_file())
        .map(Path::to_path_buf)
}

/// Resolve a relative path against the process working directory.
///
/// The path is returned unchanged when the working directory is unreadable.
pub fn absolutize(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    std::path::absolute(&path).unwrap_or(path)
}
