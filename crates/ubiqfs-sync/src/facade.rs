//! Host-facing filesystem facade
//!
//! [`Filesystem`] is what the host bridge talks to. It holds at most one
//! [`SyncIndexObserver`], collects the names the observer reports as freshly
//! synced, exposes the local file operations and runs bulk moves between the
//! local documents root and the cloud container.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};
use ubiqfs_core::{
    config::Config,
    domain::QueryState,
    ports::{ICloudIndex, ILocalFileSystem, IUpdatedFilesSink},
};

use crate::filesystem::LocalFileSystemAdapter;
use crate::migration::{clear_directory, migrate_tree, MigrationReport};
use crate::observer::{ChangeCallback, ObserverOptions, SyncIndexObserver};

/// Directory alias that selects the cloud container in `observe_dir`
pub const CLOUD_DIRECTORY: &str = "CLOUD";

// ============================================================================
// MoveStatus
// ============================================================================

/// Result of a bulk move as reported to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveStatus {
    /// The move ran; individual entries may still have failed
    Ok,
    /// No signed-in account or no reachable container; nothing was touched
    CloudOff,
}

impl MoveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveStatus::Ok => "OK",
            MoveStatus::CloudOff => "ICLOUDISOFF",
        }
    }
}

impl std::fmt::Display for MoveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// UpdatedFiles
// ============================================================================

/// Pending list of `"<name>|<kind>"` entries
///
/// Each record replaces the previous batch; the host drains it with
/// [`UpdatedFiles::take`].
#[derive(Debug, Default)]
pub struct UpdatedFiles {
    pending: Mutex<Vec<String>>,
}

impl UpdatedFiles {
    /// Returns the pending entries and clears the list
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl IUpdatedFilesSink for UpdatedFiles {
    fn record_updated_files(&self, names: Vec<String>) {
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = names;
    }
}

// ============================================================================
// Filesystem
// ============================================================================

/// Facade over the cloud index, the local filesystem and bulk migration
pub struct Filesystem {
    index: Arc<dyn ICloudIndex>,
    local: Arc<dyn ILocalFileSystem>,
    config: Config,
    updated_files: Arc<UpdatedFiles>,
    observer: Option<SyncIndexObserver>,
}

impl Filesystem {
    pub fn new(index: Arc<dyn ICloudIndex>, local: Arc<dyn ILocalFileSystem>, config: Config) -> Self {
        Self {
            index,
            local,
            config,
            updated_files: Arc::new(UpdatedFiles::default()),
            observer: None,
        }
    }

    /// Facade backed by the real local filesystem
    pub fn with_local_adapter(index: Arc<dyn ICloudIndex>, config: Config) -> Self {
        Self::new(index, Arc::new(LocalFileSystemAdapter::new()), config)
    }

    /// Local file operations
    pub fn local(&self) -> &dyn ILocalFileSystem {
        self.local.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// Starts observing the cloud container, or stops observing
    ///
    /// Any previously held observer is torn down first. A new observer is
    /// kept only when `directory` is [`CLOUD_DIRECTORY`] and an account is
    /// signed in. Returns without waiting for the container to resolve; an
    /// observer whose setup later fails stops counting as observing and is
    /// discarded on the next `observe_dir` or `release`.
    pub async fn observe_dir(&mut self, directory: &str, on_change: ChangeCallback) {
        self.release().await;

        if directory != CLOUD_DIRECTORY {
            info!(directory, "Not a cloud directory; observation released");
            return;
        }
        if !self.index.is_signed_in() {
            info!("Cloud account is not signed in; observation released");
            return;
        }

        let options = match ObserverOptions::from_config(&self.config.cloud) {
            Ok(options) => options,
            Err(err) => {
                warn!(error = %err, "Invalid cloud configuration; not observing");
                return;
            }
        };

        let sink: Arc<dyn IUpdatedFilesSink> = self.updated_files.clone();
        match SyncIndexObserver::new(Arc::clone(&self.index), options, on_change, sink) {
            Ok(observer) => {
                info!(query = %observer.query_id(), "Observing cloud container");
                self.observer = Some(observer);
            }
            Err(err) => warn!(error = %err, "Could not create cloud observer"),
        }
    }

    /// Tears down the held observer, if any
    pub async fn release(&mut self) {
        if let Some(observer) = self.observer.take() {
            match observer.state() {
                QueryState::Failed(reason) => {
                    debug!(query = %observer.query_id(), %reason, "Discarding failed cloud observer");
                }
                _ => info!(query = %observer.query_id(), "Releasing cloud observer"),
            }
            observer.shutdown().await;
        }
    }

    /// Returns true while the held observer is setting up or running
    pub fn is_observing(&self) -> bool {
        self.observer().is_some()
    }

    /// The held observer, unless its setup failed or it already stopped
    pub fn observer(&self) -> Option<&SyncIndexObserver> {
        self.observer
            .as_ref()
            .filter(|observer| !observer.state().is_terminal())
    }

    // ------------------------------------------------------------------
    // Updated files
    // ------------------------------------------------------------------

    /// Replaces the pending list of freshly synced entries
    pub fn record_updated_files(&self, names: Vec<String>) {
        self.updated_files.record_updated_files(names);
    }

    /// Returns and clears the pending list of freshly synced entries
    pub fn take_updated_files(&self) -> Vec<String> {
        self.updated_files.take()
    }

    // ------------------------------------------------------------------
    // Bulk moves
    // ------------------------------------------------------------------

    /// Moves the whole local documents tree into the cloud container
    ///
    /// Blocks the caller. Per-entry failures are logged and skipped; the
    /// move is not atomic and is never rolled back.
    pub fn move_all_to_cloud(&self) -> MoveStatus {
        let Some(cloud_root) = self.cloud_root() else {
            return MoveStatus::CloudOff;
        };
        let local_root = self.config.cloud.local_root();
        let report = migrate_tree(
            &local_root,
            &cloud_root,
            self.config.migration.force_delete_source,
        );
        log_report("cloud", &report);
        MoveStatus::Ok
    }

    /// Moves the whole cloud container tree into the local documents root
    ///
    /// With `force_delete_source`, the local root is cleared before copying.
    pub fn move_all_to_local(&self) -> MoveStatus {
        let Some(cloud_root) = self.cloud_root() else {
            return MoveStatus::CloudOff;
        };
        let local_root = self.config.cloud.local_root();
        let force = self.config.migration.force_delete_source;

        if force {
            let (removed, failed) = clear_directory(&local_root);
            info!(removed, failed, root = %local_root.display(), "Cleared local root");
        }
        let report = migrate_tree(&cloud_root, &local_root, force);
        log_report("local", &report);
        MoveStatus::Ok
    }

    fn cloud_root(&self) -> Option<std::path::PathBuf> {
        if !self.index.is_signed_in() {
            warn!("Cloud account is not signed in; bulk move skipped");
            return None;
        }
        let container = match self.config.cloud.container_id() {
            Ok(container) => container,
            Err(err) => {
                warn!(error = %err, "Invalid container identifier; bulk move skipped");
                return None;
            }
        };
        match self.index.resolve_container(container.as_ref()) {
            Ok(root) => Some(root),
            Err(err) => {
                warn!(error = %err, "Cloud container unavailable; bulk move skipped");
                None
            }
        }
    }
}

fn log_report(direction: &str, report: &MigrationReport) {
    if report.has_failures() {
        warn!(
            direction,
            copy_failures = report.copy_failures,
            delete_failures = report.delete_failures,
            "Bulk move finished with failures"
        );
    } else {
        info!(direction, copied = report.copied, "Bulk move finished");
    }
}

impl std::fmt::Debug for Filesystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filesystem")
            .field("observer", &self.observer)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
