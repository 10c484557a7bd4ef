use std::fs;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::{debug, warn};

use crate::error::HarvestError;

/// Recursively collects files under `root` whose file name matches the
/// shell-style `pattern`.
///
/// Directories or entries that cannot be read are skipped with a warning.
/// Symlinks to directories are not followed; symlinks to files are matched.
/// The result is sorted by path so repeated runs see files in the same order.
pub fn find_matching_files(root: &Path, pattern: &str) -> Result<Vec<PathBuf>, HarvestError> {
    let matcher = Pattern::new(pattern).map_err(|err| HarvestError::InvalidPattern {
        pattern: pattern.to_string(),
        message: err.to_string(),
    })?;
    let options = MatchOptions {
        case_sensitive: !cfg!(windows),
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };

    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %dir.display(), error = %err, "skipping unreadable directory");
                continue;
            }
        };
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(path = %dir.display(), error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if file_type.is_dir() {
                stack.push(path);
                continue;
            }
            if file_type.is_symlink() && path.is_dir() {
                debug!(path = %path.display(), "not following directory symlink");
                continue;
            }
            let matches = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| matcher.matches_with(name, options))
                .unwrap_or(false);
            if matches {
                debug!(path = %path.display(), "matched");
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}
