//! Cloud index port (driven/secondary port)
//!
//! This module defines the interface to the platform's cloud-sync index:
//! account detection, container resolution, live metadata queries, the
//! notification stream those queries produce, and download requests.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific.
//! - Methods are synchronous: the platform calls behind them either return
//!   immediately or, like [`ICloudIndex::resolve_container`], are documented
//!   as blocking and must be run off the observer's task.
//! - Notification payloads are typed here, once. Adapters translate the
//!   platform's key/value payload into [`IndexNotification`] so the observer
//!   never inspects untyped data.
//! - [`Subscription`] is an RAII guard: dropping it unsubscribes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::indexed_item::{IndexedItem, SyncStatus};
use crate::domain::newtypes::{ContainerId, QueryId, SyncPath};

// ============================================================================
// Change kinds and signals
// ============================================================================

/// Which group of a change notification an item was reported in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Changed,
    Removed,
}

impl ChangeKind {
    /// Tag appended to updated file names handed to the host
    ///
    /// These are the payload keys the platform uses for each group, which is
    /// what host code already matches on.
    pub fn as_tag(&self) -> &'static str {
        match self {
            ChangeKind::Added => "kMDQueryUpdateAddedItems",
            ChangeKind::Changed => "kMDQueryUpdateChangedItems",
            ChangeKind::Removed => "kMDQueryUpdateRemovedItems",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// The two query signals an observer listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexSignal {
    /// The initial result set has been gathered
    DidFinishGathering,
    /// A (batched) live update arrived
    DidUpdate,
}

// ============================================================================
// RawIndexItem
// ============================================================================

/// Directory/package resource flags of an item's location
///
/// Either flag is `None` when the platform could not answer (querying
/// directory flags on some plain files fails).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFlags {
    pub is_directory: Option<bool>,
    pub is_package: Option<bool>,
}

impl ResourceFlags {
    /// Flags of a regular file
    pub fn file() -> Self {
        Self {
            is_directory: Some(false),
            is_package: Some(false),
        }
    }

    /// Flags of a plain directory
    pub fn directory() -> Self {
        Self {
            is_directory: Some(true),
            is_package: Some(false),
        }
    }

    /// Flags of a package (bundle) directory
    pub fn package() -> Self {
        Self {
            is_directory: Some(true),
            is_package: Some(true),
        }
    }

    /// Both flags known, directory, not a package
    pub fn is_plain_directory(&self) -> bool {
        matches!((self.is_directory, self.is_package), (Some(true), Some(false)))
    }
}

/// One entry of a query result set or change group, as read from the platform
///
/// Port-level DTO: every attribute the platform may fail to provide is
/// optional. Use [`RawIndexItem::to_indexed`] to obtain a validated
/// [`IndexedItem`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawIndexItem {
    /// Location (URL path) of the item
    pub location: Option<PathBuf>,
    /// File-system name
    pub fs_name: Option<String>,
    /// User-facing name
    pub display_name: Option<String>,
    pub status: SyncStatus,
    pub download_requested: bool,
    pub resource: ResourceFlags,
}

impl RawIndexItem {
    /// Creates a regular-file entry with a location and a name
    pub fn file(location: impl Into<PathBuf>, status: SyncStatus) -> Self {
        let location = location.into();
        let fs_name = location
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        Self {
            display_name: fs_name.clone(),
            fs_name,
            location: Some(location),
            status,
            download_requested: false,
            resource: ResourceFlags::file(),
        }
    }

    pub fn with_download_requested(mut self, requested: bool) -> Self {
        self.download_requested = requested;
        self
    }

    pub fn with_resource(mut self, resource: ResourceFlags) -> Self {
        self.resource = resource;
        self
    }

    /// `"<fs-name>|<change-kind>"`; a missing name becomes the empty string
    pub fn tagged_name(&self, kind: ChangeKind) -> String {
        format!("{}|{}", self.fs_name.as_deref().unwrap_or(""), kind.as_tag())
    }

    /// Validates this entry into an [`IndexedItem`]
    ///
    /// Returns `None` when the entry has no location, no file-system name,
    /// a location that is not an absolute path, or is a plain directory.
    /// Packages are kept.
    pub fn to_indexed(&self) -> Option<IndexedItem> {
        let location = self.location.as_ref()?;
        let fs_name = self.fs_name.as_ref()?;
        if self.resource.is_plain_directory() {
            return None;
        }
        let path = SyncPath::new(location.clone()).ok()?;
        let display_name = self.display_name.as_deref().unwrap_or(fs_name);
        Some(IndexedItem::new(
            path,
            fs_name.as_str(),
            display_name,
            self.status,
            self.download_requested,
        ))
    }
}

// ============================================================================
// IndexNotification
// ============================================================================

/// Items reported under one change kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeGroup {
    pub kind: ChangeKind,
    pub items: Vec<RawIndexItem>,
}

impl ChangeGroup {
    pub fn new(kind: ChangeKind, items: Vec<RawIndexItem>) -> Self {
        Self { kind, items }
    }
}

/// A typed query notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexNotification {
    /// The query that posted the notification
    pub subject: QueryId,
    pub signal: IndexSignal,
    /// Change groups in payload order (empty for gather-finished)
    pub groups: Vec<ChangeGroup>,
}

impl IndexNotification {
    /// A gather-finished notification (carries no change groups)
    pub fn finished_gathering(subject: QueryId) -> Self {
        Self {
            subject,
            signal: IndexSignal::DidFinishGathering,
            groups: Vec::new(),
        }
    }

    /// A live-update notification
    pub fn update(subject: QueryId, groups: Vec<ChangeGroup>) -> Self {
        Self {
            subject,
            signal: IndexSignal::DidUpdate,
            groups,
        }
    }

    /// Total number of items across all groups
    pub fn item_count(&self) -> usize {
        self.groups.iter().map(|g| g.items.len()).sum()
    }
}

// ============================================================================
// QuerySpec
// ============================================================================

/// Where a query looks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    /// Everything in the container outside `Documents`
    UbiquitousData,
    /// The container's `Documents` subtree
    UbiquitousDocuments,
}

/// Configuration applied to a query before it starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Interval over which the platform coalesces live updates
    pub batching_interval: Duration,
    /// `LIKE` pattern matched against the file-system name
    pub fs_name_pattern: String,
    pub scopes: Vec<SearchScope>,
    /// Sort results by file-system name, ascending
    pub sort_by_fs_name_ascending: bool,
}

impl QuerySpec {
    /// Every file in both ubiquitous scopes, sorted by file-system name
    pub fn all_files(batching_interval: Duration) -> Self {
        Self {
            batching_interval,
            fs_name_pattern: "*".to_string(),
            scopes: vec![SearchScope::UbiquitousData, SearchScope::UbiquitousDocuments],
            sort_by_fs_name_ascending: true,
        }
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Callback receiving query notifications
///
/// May be invoked from any platform thread; implementations must only hand
/// the notification off.
pub type NotificationHandler = Box<dyn Fn(IndexNotification) + Send + Sync>;

/// RAII handle for a notification subscription
///
/// Dropping the handle unsubscribes. The stop callback runs exactly once.
pub struct Subscription {
    cancel_fn: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Creates a new Subscription with the given unsubscribe callback
    pub fn new(cancel_fn: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel_fn: Some(Box::new(cancel_fn)),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel_fn) = self.cancel_fn.take() {
            cancel_fn();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel_fn.is_some())
            .finish()
    }
}

// ============================================================================
// Port traits
// ============================================================================

/// A live metadata query over the cloud index
///
/// ## Implementation Notes
///
/// - `stop` on a query that is not started must be harmless, but callers
///   check [`IIndexQuery::is_started`] first anyway.
/// - While updates are disabled the platform holds back live changes, so
///   [`IIndexQuery::results`] is a consistent read.
pub trait IIndexQuery: Send + Sync {
    /// Identity carried as `subject` by this query's notifications
    fn id(&self) -> QueryId;

    /// Applies the query configuration; must precede `start`
    fn configure(&self, spec: &QuerySpec) -> anyhow::Result<()>;

    fn start(&self) -> anyhow::Result<()>;

    fn stop(&self);

    fn is_started(&self) -> bool;

    /// Suspends delivery of live updates
    fn disable_updates(&self);

    /// Resumes delivery of live updates
    fn enable_updates(&self);

    /// Current result set, in the query's sort order
    fn results(&self) -> Vec<RawIndexItem>;
}

/// Port trait for the platform cloud index
///
/// One instance stands for the platform as a whole; queries are created from
/// it and all their notifications arrive through [`ICloudIndex::subscribe`].
pub trait ICloudIndex: Send + Sync {
    /// Returns true if a cloud account is signed in on this device
    fn is_signed_in(&self) -> bool;

    /// Resolves the root location of a container
    ///
    /// `None` selects the application's default container. This call may
    /// provision storage and block for a long time.
    fn resolve_container(&self, container: Option<&ContainerId>) -> anyhow::Result<PathBuf>;

    /// Creates a new, unconfigured query
    fn create_query(&self) -> Arc<dyn IIndexQuery>;

    /// Subscribes to gather-finished and update notifications of every query
    fn subscribe(&self, handler: NotificationHandler) -> Subscription;

    /// Asks the platform to materialize the item at `location` locally
    ///
    /// Returns as soon as the request is accepted; completion shows up later
    /// as a change notification.
    fn start_downloading(&self, location: &Path) -> anyhow::Result<()>;
}
