//! Bulk tree migration between the local documents root and the cloud root
//!
//! Copying walks the source in pre-order: directories are re-created at the
//! destination before their contents, files are copied. Per-entry failures
//! are logged and counted, never raised, and nothing is rolled back.
//!
//! Source cleanup depends on `force`:
//! - `true`: every direct child of the source is removed, whether or not it
//!   was copied.
//! - `false`: only files that were copied are removed; directories go only
//!   if they are empty afterwards.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Counters of one [`migrate_tree`] run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Files copied to the destination
    pub copied: usize,
    /// Entries that failed to copy (directories or files)
    pub copy_failures: usize,
    /// Source entries removed afterwards
    pub deleted: usize,
    /// Source entries that could not be removed
    pub delete_failures: usize,
}

impl MigrationReport {
    /// Returns true if any entry failed to copy or delete
    pub fn has_failures(&self) -> bool {
        self.copy_failures > 0 || self.delete_failures > 0
    }
}

/// Copies everything under `source` into `destination`, then cleans up the source
pub fn migrate_tree(source: &Path, destination: &Path, force: bool) -> MigrationReport {
    let mut report = MigrationReport::default();

    if let Err(err) = fs::create_dir_all(destination) {
        warn!(destination = %destination.display(), error = %err, "Cannot create destination root");
        report.copy_failures += 1;
        return report;
    }

    let mut copied_files: Vec<PathBuf> = Vec::new();

    for entry in WalkDir::new(source).min_depth(1).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(source = %source.display(), error = %err, "Failed to enumerate source entry");
                report.copy_failures += 1;
                continue;
            }
        };

        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let target = destination.join(relative);

        let result = if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
        } else {
            fs::copy(entry.path(), &target).map(|_| ())
        };

        match result {
            Ok(()) if entry.file_type().is_dir() => {}
            Ok(()) => {
                debug!(from = %entry.path().display(), to = %target.display(), "Copied");
                report.copied += 1;
                copied_files.push(entry.path().to_path_buf());
            }
            Err(err) => {
                warn!(
                    from = %entry.path().display(),
                    to = %target.display(),
                    error = %err,
                    "Failed to copy entry"
                );
                report.copy_failures += 1;
            }
        }
    }

    let (deleted, delete_failures) = if force {
        clear_directory(source)
    } else {
        remove_migrated(source, &copied_files)
    };
    report.deleted = deleted;
    report.delete_failures = delete_failures;

    info!(
        source = %source.display(),
        destination = %destination.display(),
        copied = report.copied,
        copy_failures = report.copy_failures,
        deleted = report.deleted,
        delete_failures = report.delete_failures,
        force,
        "Tree migration finished"
    );
    report
}

/// Removes every direct child of `dir`, keeping `dir` itself
///
/// Returns `(removed, failed)`. A missing directory counts as already clear.
pub fn clear_directory(dir: &Path) -> (usize, usize) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return (0, 0),
        Err(err) => {
            warn!(dir = %dir.display(), error = %err, "Cannot list directory to clear");
            return (0, 1);
        }
    };

    let mut removed = 0;
    let mut failed = 0;
    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "Failed to read directory entry");
                failed += 1;
                continue;
            }
        };
        match remove_entry(&path) {
            Ok(()) => removed += 1,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to delete entry");
                failed += 1;
            }
        }
    }
    (removed, failed)
}

/// Copies a file or a whole directory tree, stopping at the first error
pub fn copy_tree(source: &Path, destination: &Path) -> io::Result<()> {
    if !fs::metadata(source)?.is_dir() {
        fs::copy(source, destination)?;
        return Ok(());
    }

    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn remove_entry(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn remove_migrated(source: &Path, copied_files: &[PathBuf]) -> (usize, usize) {
    let mut removed = 0;
    let mut failed = 0;

    for file in copied_files {
        match fs::remove_file(file) {
            Ok(()) => removed += 1,
            Err(err) => {
                warn!(path = %file.display(), error = %err, "Failed to delete migrated file");
                failed += 1;
            }
        }
    }

    // Children before parents; anything still holding a failed entry stays.
    for entry in WalkDir::new(source)
        .min_depth(1)
        .contents_first(true)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
    {
        if fs::remove_dir(entry.path()).is_ok() {
            removed += 1;
        }
    }

    (removed, failed)
}
