//! Local filesystem adapter (secondary/driven adapter)
//!
//! Implements [`ILocalFileSystem`] using `tokio::fs` for async file operations.
//!
//! ## Design Decisions
//!
//! - **Atomic writes**: `write_file` writes to a sibling temp file and renames
//!   it over the target.
//! - **Missing parents**: only created when the caller asks for `recursive`;
//!   otherwise the write fails with [`SyncError::NoParentFolder`].
//! - **Directory copies**: run on a blocking thread through
//!   [`crate::migration::copy_tree`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};
use uuid::Uuid;
use ubiqfs_core::{
    domain::newtypes::SyncPath,
    ports::local_filesystem::{FileStat, FileType, ILocalFileSystem},
};

use crate::SyncError;

// ============================================================================
// LocalFileSystemAdapter struct
// ============================================================================

/// Adapter that bridges the [`ILocalFileSystem`] port to the real filesystem.
///
/// Zero-sized: every operation takes its context from the [`SyncPath`]
/// arguments. Resolving host directory aliases happens at a higher layer.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystemAdapter;

impl LocalFileSystemAdapter {
    /// Create a new `LocalFileSystemAdapter`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Returns the `file://` URI of an absolute path
pub fn file_uri(path: &Path) -> Result<String, SyncError> {
    url::Url::from_file_path(path)
        .map(String::from)
        .map_err(|()| SyncError::PathNotFound(path.to_path_buf()))
}

fn to_utc(time: std::io::Result<SystemTime>) -> Option<DateTime<Utc>> {
    let since_epoch = time.ok()?.duration_since(SystemTime::UNIX_EPOCH).ok()?;
    DateTime::from_timestamp(since_epoch.as_secs() as i64, since_epoch.subsec_nanos())
}

/// Hidden, uniquely named sibling of `target` for staged writes
fn temp_sibling(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4()))
}

async fn exists(path: &Path) -> std::io::Result<bool> {
    tokio::fs::try_exists(path).await
}

/// Fails unless the parent exists, or creates it when `recursive`
async fn ensure_parent(target: &Path, recursive: bool) -> anyhow::Result<()> {
    let Some(parent) = target.parent() else {
        return Ok(());
    };
    if exists(parent).await? {
        return Ok(());
    }
    if !recursive {
        return Err(SyncError::NoParentFolder(parent.to_path_buf()).into());
    }
    debug!(parent = %parent.display(), "creating parent directories");
    tokio::fs::create_dir_all(parent).await?;
    Ok(())
}

/// Removes `to` when it is an existing file; directories are left alone
async fn clear_destination_file(to: &Path) -> anyhow::Result<()> {
    match tokio::fs::metadata(to).await {
        Ok(meta) if !meta.is_dir() => {
            debug!(path = %to.display(), "replacing existing destination file");
            tokio::fs::remove_file(to).await?;
            Ok(())
        }
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// ILocalFileSystem implementation
// ============================================================================

#[async_trait::async_trait]
impl ILocalFileSystem for LocalFileSystemAdapter {
    #[instrument(skip(self), fields(path = %path))]
    async fn read_file(&self, path: &SyncPath) -> anyhow::Result<Vec<u8>> {
        debug!("reading file");
        let data = tokio::fs::read(path.as_path()).await?;
        debug!(bytes = data.len(), "file read complete");
        Ok(data)
    }

    // Atomic write via temp + rename
    #[instrument(skip(self, data), fields(path = %path, bytes = data.len()))]
    async fn write_file(
        &self,
        path: &SyncPath,
        data: &[u8],
        recursive: bool,
    ) -> anyhow::Result<String> {
        let target = path.as_path();
        ensure_parent(target, recursive).await?;

        // Same directory keeps the rename on one filesystem.
        let tmp_path = temp_sibling(target);

        debug!(?tmp_path, "writing to temporary file");
        let staged = async {
            tokio::fs::write(&tmp_path, data).await?;
            tokio::fs::rename(&tmp_path, target).await
        }
        .await;
        if let Err(e) = staged {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await {
                debug!(error = %cleanup, "temporary file not removed");
            }
            return Err(e.into());
        }

        debug!("write complete");
        Ok(file_uri(target)?)
    }

    #[instrument(skip(self, data), fields(path = %path, bytes = data.len()))]
    async fn append_file(
        &self,
        path: &SyncPath,
        data: &[u8],
        recursive: bool,
    ) -> anyhow::Result<()> {
        let target = path.as_path();
        if !exists(target).await? {
            debug!("file missing, appending as a fresh write");
            self.write_file(path, data, recursive).await?;
            return Ok(());
        }

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(target)
            .await?;
        file.write_all(data).await?;
        file.flush().await?;
        debug!("append complete");
        Ok(())
    }

    // Missing paths are fine; directories go recursively
    #[instrument(skip(self), fields(path = %path))]
    async fn delete_file(&self, path: &SyncPath) -> anyhow::Result<()> {
        let p = path.as_path();

        let metadata = match tokio::fs::metadata(p).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("nothing to delete");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if metadata.is_dir() {
            debug!("removing directory recursively");
            tokio::fs::remove_dir_all(p).await?;
        } else {
            debug!("removing file");
            tokio::fs::remove_file(p).await?;
        }

        debug!("delete complete");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn mkdir(&self, path: &SyncPath, recursive: bool) -> anyhow::Result<()> {
        debug!("creating directory");
        if recursive {
            tokio::fs::create_dir_all(path.as_path()).await?;
        } else {
            tokio::fs::create_dir(path.as_path()).await?;
        }
        debug!("directory created");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn rmdir(&self, path: &SyncPath, recursive: bool) -> anyhow::Result<()> {
        let p = path.as_path();
        let mut entries = tokio::fs::read_dir(p).await?;
        let has_children = entries.next_entry().await?.is_some();

        if has_children && !recursive {
            return Err(SyncError::NotEmpty(p.to_path_buf()).into());
        }

        debug!(has_children, "removing directory");
        tokio::fs::remove_dir_all(p).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn readdir(&self, path: &SyncPath) -> anyhow::Result<Vec<SyncPath>> {
        let mut entries = tokio::fs::read_dir(path.as_path()).await?;
        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            children.push(SyncPath::new(entry.path())?);
        }
        children.sort();
        debug!(count = children.len(), "directory listed");
        Ok(children)
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn stat(&self, path: &SyncPath) -> anyhow::Result<FileStat> {
        let p = path.as_path();
        let metadata = match tokio::fs::metadata(p).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SyncError::PathNotFound(p.to_path_buf()).into());
            }
            Err(e) => return Err(e.into()),
        };

        let file_type = if metadata.is_dir() {
            FileType::Directory
        } else {
            FileType::File
        };

        let stat = FileStat {
            file_type,
            size: metadata.len(),
            ctime: to_utc(metadata.created()),
            mtime: to_utc(metadata.modified()),
            uri: file_uri(p)?,
        };
        debug!(%file_type, size = stat.size, "stat retrieved");
        Ok(stat)
    }

    #[instrument(skip(self), fields(from = %from, to = %to))]
    async fn rename(&self, from: &SyncPath, to: &SyncPath) -> anyhow::Result<()> {
        if from == to {
            return Ok(());
        }
        clear_destination_file(to.as_path()).await?;
        tokio::fs::rename(from.as_path(), to.as_path()).await?;
        debug!("rename complete");
        Ok(())
    }

    #[instrument(skip(self), fields(from = %from, to = %to))]
    async fn copy(&self, from: &SyncPath, to: &SyncPath) -> anyhow::Result<()> {
        if from == to {
            return Ok(());
        }
        clear_destination_file(to.as_path()).await?;

        let source = from.as_path().to_path_buf();
        let destination = to.as_path().to_path_buf();
        tokio::task::spawn_blocking(move || crate::migration::copy_tree(&source, &destination))
            .await??;
        debug!("copy complete");
        Ok(())
    }
}

// ============================================================================
// Unit tests
// ============================================================================
