use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::error::HarvestError;

#[derive(Debug, Clone, Default, Serialize)]
pub struct RelocationReport {
    pub directory: Option<PathBuf>,
    pub moved: Vec<PathBuf>,
    pub errors: Vec<String>,
}

impl RelocationReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Renames `metadata_dir` to a sibling directory called `target` and moves
/// `files` into it.
///
/// Best effort: every failure is logged and collected in the report, and
/// the remaining steps still run. Output files that were already written
/// are never removed.
pub fn relocate_outputs(metadata_dir: &Path, target: &str, files: &[PathBuf]) -> RelocationReport {
    let mut report = RelocationReport::default();

    let destination = match target_dir(metadata_dir, target) {
        Ok(destination) => destination,
        Err(err) => {
            warn!(error = %err, "relocation skipped");
            report.errors.push(err.to_string());
            return report;
        }
    };

    if destination.exists() {
        let message = format!("destination already exists: {}", destination.display());
        warn!("{message}");
        report.errors.push(message);
    } else if let Err(err) = fs::rename(metadata_dir, &destination) {
        let message = format!(
            "rename {} -> {}: {err}",
            metadata_dir.display(),
            destination.display()
        );
        warn!("{message}");
        report.errors.push(message);
    } else {
        info!(from = %metadata_dir.display(), to = %destination.display(), "renamed metadata directory");
    }

    if !destination.is_dir() {
        let message = format!("no directory to move outputs into: {}", destination.display());
        warn!("{message}");
        report.errors.push(message);
        return report;
    }
    report.directory = Some(destination.clone());

    for file in files {
        let Some(name) = file.file_name() else {
            report.errors.push(format!("not a file path: {}", file.display()));
            continue;
        };
        let moved_to = destination.join(name);
        if moved_to.exists() {
            let message = format!("already present: {}", moved_to.display());
            warn!("{message}");
            report.errors.push(message);
            continue;
        }
        match move_file(file, &moved_to) {
            Ok(()) => {
                info!(from = %file.display(), to = %moved_to.display(), "moved output");
                report.moved.push(moved_to);
            }
            Err(err) => {
                let message = format!("move {}: {err}", file.display());
                warn!("{message}");
                report.errors.push(message);
            }
        }
    }
    report
}

fn target_dir(metadata_dir: &Path, target: &str) -> Result<PathBuf, HarvestError> {
    let trimmed = target.trim();
    let mut components = Path::new(trimmed).components();
    let is_plain_name = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !is_plain_name {
        return Err(HarvestError::InvalidTarget(target.to_string()));
    }
    let parent = metadata_dir
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok(parent.join(trimmed))
}

// Falls back to copy + remove when a rename crosses filesystems.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_must_be_a_plain_name() {
        let dir = Path::new("work/metadata");
        assert_eq!(target_dir(dir, "oocyte").unwrap(), PathBuf::from("work/oocyte"));
        assert_eq!(
            target_dir(Path::new("metadata"), "oocyte").unwrap(),
            PathBuf::from("./oocyte")
        );
        assert!(target_dir(dir, "a/b").is_err());
        assert!(target_dir(dir, "..").is_err());
        assert!(target_dir(dir, ".").is_err());
        assert!(target_dir(dir, "/abs").is_err());
        assert!(target_dir(dir, "  ").is_err());
    }
}
