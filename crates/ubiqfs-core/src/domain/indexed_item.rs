//! IndexedItem domain entity
//!
//! One file known to the cloud-sync index, as seen in a single snapshot.
//! Items are rebuilt from every snapshot and never mutated in place.
//!
//! ## Identity
//!
//! The platform keeps the same underlying object across a rename but reports
//! a new location, so the only stable, visible identity is the canonical
//! path. Equality and hashing use [`IndexedItem::path`] and nothing else.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::newtypes::SyncPath;

// ============================================================================
// SyncStatus
// ============================================================================

/// The four independent transfer flags the index reports for an item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Content is currently being downloaded
    pub is_downloading: bool,
    /// Content is currently being uploaded
    pub is_uploading: bool,
    /// A local copy of the current version exists
    pub is_downloaded: bool,
    /// The cloud holds the current version
    pub is_uploaded: bool,
}

impl SyncStatus {
    /// Builds a status from the flags in index order
    /// `(downloading, uploading, downloaded, uploaded)`
    #[must_use]
    pub const fn new(
        is_downloading: bool,
        is_uploading: bool,
        is_downloaded: bool,
        is_uploaded: bool,
    ) -> Self {
        Self {
            is_downloading,
            is_uploading,
            is_downloaded,
            is_uploaded,
        }
    }

    /// Status of an item that is present on both sides with no transfer running
    #[must_use]
    pub const fn synced() -> Self {
        Self::new(false, false, true, true)
    }

    /// Returns true when the item is at rest on both sides
    ///
    /// Only the exact combination `(false, false, true, true)` qualifies.
    #[must_use]
    pub const fn is_fully_synced(&self) -> bool {
        !self.is_downloading && !self.is_uploading && self.is_downloaded && self.is_uploaded
    }
}

// ============================================================================
// IndexedItem
// ============================================================================

/// A validated index entry: it always has a location and a file-system name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedItem {
    path: SyncPath,
    fs_name: String,
    display_name: String,
    status: SyncStatus,
    download_requested: bool,
}

impl IndexedItem {
    /// Creates a new item
    ///
    /// `display_name` is what the platform shows to users; it may differ
    /// from `fs_name` (hidden extensions, localized names).
    pub fn new(
        path: SyncPath,
        fs_name: impl Into<String>,
        display_name: impl Into<String>,
        status: SyncStatus,
        download_requested: bool,
    ) -> Self {
        Self {
            path,
            fs_name: fs_name.into(),
            display_name: display_name.into(),
            status,
            download_requested,
        }
    }

    /// Canonical location of the item; also its identity
    pub fn path(&self) -> &SyncPath {
        &self.path
    }

    /// Name on the file system, used for ordering
    pub fn fs_name(&self) -> &str {
        &self.fs_name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    /// Whether a download has already been requested for this item
    pub fn download_requested(&self) -> bool {
        self.download_requested
    }

    /// Returns true if a download should be requested for this item
    pub fn needs_download_request(&self) -> bool {
        !self.download_requested
    }
}

impl PartialEq for IndexedItem {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for IndexedItem {}

impl Hash for IndexedItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}
