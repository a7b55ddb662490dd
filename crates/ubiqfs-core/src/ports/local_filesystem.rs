//! Local filesystem port (driven/secondary port)
//!
//! This module defines the file operations the plugin exposes to the host:
//! read, write, append, delete, mkdir, rmdir, readdir, stat, rename and copy.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because filesystem errors are adapter-specific.
//! - Paths are `SyncPath` instances, already resolved and absolute. Mapping
//!   host directory aliases to paths happens before this port.
//! - Data is raw bytes; text encodings are the host bridge's concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::newtypes::SyncPath;

// ============================================================================
// FileStat
// ============================================================================

/// Kind of filesystem entry reported by `stat`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    File,
    Directory,
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileType::File => write!(f, "file"),
            FileType::Directory => write!(f, "directory"),
        }
    }
}

/// Result of `stat` on an existing path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    pub file_type: FileType,
    /// Size in bytes
    pub size: u64,
    /// Creation time, when the filesystem records one
    pub ctime: Option<DateTime<Utc>>,
    /// Last modification time
    pub mtime: Option<DateTime<Utc>>,
    /// `file://` URI of the entry
    pub uri: String,
}

impl FileStat {
    pub fn is_directory(&self) -> bool {
        self.file_type == FileType::Directory
    }
}

// ============================================================================
// ILocalFileSystem trait
// ============================================================================

/// Port trait for local filesystem operations
///
/// ## Implementation Notes
///
/// - `write_file` with `recursive = false` fails when the parent directory
///   is missing; with `recursive = true` it creates it.
/// - `append_file` on a missing file behaves like `write_file`.
/// - `delete_file` on a missing path succeeds without doing anything.
/// - `rmdir` with `recursive = false` refuses non-empty directories.
/// - `rename` and `copy` are no-ops when source and destination are equal,
///   and replace an existing destination *file* (never a directory).
#[async_trait::async_trait]
pub trait ILocalFileSystem: Send + Sync {
    /// Reads the entire contents of a file
    async fn read_file(&self, path: &SyncPath) -> anyhow::Result<Vec<u8>>;

    /// Writes data to a file, replacing its contents
    ///
    /// # Returns
    /// The `file://` URI of the written file
    async fn write_file(
        &self,
        path: &SyncPath,
        data: &[u8],
        recursive: bool,
    ) -> anyhow::Result<String>;

    /// Appends data to a file, creating it if necessary
    async fn append_file(&self, path: &SyncPath, data: &[u8], recursive: bool)
        -> anyhow::Result<()>;

    /// Deletes a file if it exists
    async fn delete_file(&self, path: &SyncPath) -> anyhow::Result<()>;

    /// Creates a directory, with parents when `recursive`
    async fn mkdir(&self, path: &SyncPath, recursive: bool) -> anyhow::Result<()>;

    /// Removes a directory, with its contents when `recursive`
    async fn rmdir(&self, path: &SyncPath, recursive: bool) -> anyhow::Result<()>;

    /// Lists the direct children of a directory, sorted by path
    async fn readdir(&self, path: &SyncPath) -> anyhow::Result<Vec<SyncPath>>;

    /// Returns metadata of an existing file or directory
    async fn stat(&self, path: &SyncPath) -> anyhow::Result<FileStat>;

    /// Moves a file or directory
    async fn rename(&self, from: &SyncPath, to: &SyncPath) -> anyhow::Result<()>;

    /// Copies a file or directory tree
    async fn copy(&self, from: &SyncPath, to: &SyncPath) -> anyhow::Result<()>;
}
