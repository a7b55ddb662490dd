//! Sync reconciliation - what just finished syncing, what still needs fetching
//!
//! The [`SyncReconciler`] turns index output into actions:
//!
//! ```text
//! IndexNotification ──→ freshly_synced() ──→ ["name|kind", ...] ──→ sink + callback
//!
//! snapshot ──→ request_downloads() ──→ ICloudIndex::start_downloading (fire-and-forget)
//! ```
//!
//! Neither step keeps state between calls. An item whose download request
//! failed is simply picked up again by the next sweep, because the index
//! still reports it as not requested.

use std::sync::Arc;

use tracing::{debug, warn};
use ubiqfs_core::{
    domain::{newtypes::SyncPath, IndexedItem},
    ports::{ICloudIndex, IndexNotification},
};

/// Outcome of one download sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSweep {
    /// Items whose download request was accepted
    pub requested: Vec<SyncPath>,
    /// Items whose download request failed; retried on the next sweep
    pub failed: Vec<SyncPath>,
}

impl DownloadSweep {
    /// Returns true if the sweep found nothing to request
    pub fn is_empty(&self) -> bool {
        self.requested.is_empty() && self.failed.is_empty()
    }
}

/// Classifies index output and issues download requests
pub struct SyncReconciler {
    index: Arc<dyn ICloudIndex>,
}

impl SyncReconciler {
    pub fn new(index: Arc<dyn ICloudIndex>) -> Self {
        Self { index }
    }

    /// Collects `"<fs-name>|<change-kind>"` for every fully synced item
    ///
    /// Items are taken in payload order: group by group, item by item. The
    /// notification subject is not checked here; any query's changes count.
    pub fn freshly_synced(notification: &IndexNotification) -> Vec<String> {
        notification
            .groups
            .iter()
            .flat_map(|group| {
                group
                    .items
                    .iter()
                    .filter(|item| item.status.is_fully_synced())
                    .map(move |item| item.tagged_name(group.kind))
            })
            .collect()
    }

    /// Requests a download for every item not yet requested
    ///
    /// Failures are logged and recorded; they never stop the sweep.
    pub fn request_downloads(&self, snapshot: &[IndexedItem]) -> DownloadSweep {
        let mut sweep = DownloadSweep::default();

        for item in snapshot.iter().filter(|item| item.needs_download_request()) {
            match self.index.start_downloading(item.path().as_path()) {
                Ok(()) => {
                    debug!(name = item.display_name(), path = %item.path(), "Download requested");
                    sweep.requested.push(item.path().clone());
                }
                Err(err) => {
                    warn!(
                        name = item.display_name(),
                        path = %item.path(),
                        error = %err,
                        "Download request failed"
                    );
                    sweep.failed.push(item.path().clone());
                }
            }
        }

        sweep
    }
}
