//! Cloud index observer
//!
//! A [`SyncIndexObserver`] owns one live query over the platform cloud index
//! and a tokio task that drives it. The task is the only writer of observer
//! state and handles notifications strictly one at a time.
//!
//! ## Lifecycle
//!
//! ```text
//! new() ── account? ──no──→ Err(NotSignedIn)
//!   │
//!   └─ spawn task ──→ spawn_blocking(resolve_container) ──err──→ Failed (inert)
//!                          │
//!                          ▼
//!                     subscribe + configure + start ──→ Running
//!                          │
//!                          ▼
//!          recv notification ──→ freshly synced? ──→ sink + callback
//!                          │
//!                          └──→ own query? ──→ list_items() ──→ download sweep
//!
//! shutdown()/drop ──→ cancel ──→ unsubscribe, stop query if started ──→ Stopped
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use ubiqfs_core::{
    config::CloudConfig,
    domain::{newtypes::ContainerId, DomainError, IndexedItem, QueryId, QueryState, SetupFailure},
    ports::{ICloudIndex, IIndexQuery, IUpdatedFilesSink, IndexNotification, QuerySpec, RawIndexItem},
};

use crate::reconciler::SyncReconciler;
use crate::SyncError;

/// Zero-argument callback fired when files finished syncing
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

// ============================================================================
// ObserverOptions
// ============================================================================

/// Settings for a [`SyncIndexObserver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserverOptions {
    /// Container to observe; `None` is the application's default container
    pub container: Option<ContainerId>,
    /// Interval over which the index coalesces updates
    pub batching_interval: Duration,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            container: None,
            batching_interval: Duration::from_secs(1),
        }
    }
}

impl ObserverOptions {
    /// Builds options from the `cloud` configuration section
    ///
    /// # Errors
    /// Returns `SyncError::DomainError` for an invalid container identifier
    /// or a zero batching interval
    pub fn from_config(config: &CloudConfig) -> Result<Self, SyncError> {
        Ok(Self {
            container: config.container_id()?,
            batching_interval: config.batching_interval()?,
        })
    }
}

// ============================================================================
// Snapshot reads
// ============================================================================

/// Keeps live updates disabled for as long as it is alive
struct UpdatesPaused<'a> {
    query: &'a dyn IIndexQuery,
}

impl<'a> UpdatesPaused<'a> {
    fn new(query: &'a dyn IIndexQuery) -> Self {
        query.disable_updates();
        Self { query }
    }
}

impl Drop for UpdatesPaused<'_> {
    fn drop(&mut self) {
        self.query.enable_updates();
    }
}

/// Reads the query's current result set as validated items
///
/// Live updates are suspended for the duration of the read.
pub fn list_items(query: &dyn IIndexQuery) -> Vec<IndexedItem> {
    let _paused = UpdatesPaused::new(query);
    snapshot_items(&query.results())
}

/// Filters, sorts and de-duplicates raw results
///
/// Drops entries without a location or file-system name and plain
/// directories (packages stay). Sorts by file-system name, byte-wise and
/// stable; for duplicate paths the first entry after sorting wins.
pub fn snapshot_items(raw: &[RawIndexItem]) -> Vec<IndexedItem> {
    let mut items: Vec<IndexedItem> = raw.iter().filter_map(RawIndexItem::to_indexed).collect();
    items.sort_by(|a, b| a.fs_name().cmp(b.fs_name()));

    let mut seen = HashSet::with_capacity(items.len());
    items.retain(|item| seen.insert(item.path().clone()));
    items
}

// ============================================================================
// SyncIndexObserver
// ============================================================================

/// Live observer over the cloud index
///
/// Dropping the observer cancels its task; [`SyncIndexObserver::shutdown`]
/// additionally waits for the query to be stopped.
pub struct SyncIndexObserver {
    query: Arc<dyn IIndexQuery>,
    state_rx: watch::Receiver<QueryState>,
    container_root: Arc<OnceLock<PathBuf>>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SyncIndexObserver {
    /// Creates the observer and starts bringing its query up
    ///
    /// The account check happens here, before anything is spawned. Container
    /// resolution and query start continue on the observer's task; use
    /// [`SyncIndexObserver::wait_until_settled`] to wait for the outcome.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns `SyncError::NotSignedIn` if no cloud account is signed in
    pub fn new(
        index: Arc<dyn ICloudIndex>,
        options: ObserverOptions,
        on_change: ChangeCallback,
        sink: Arc<dyn IUpdatedFilesSink>,
    ) -> Result<Self, SyncError> {
        let state = account_stage(index.is_signed_in())?;
        if let QueryState::Failed(reason) = state {
            warn!(%reason, "Cloud account is not signed in; observer will not start");
            return Err(SyncError::NotSignedIn);
        }

        let query = index.create_query();
        let (state_tx, state_rx) = watch::channel(state);
        let container_root = Arc::new(OnceLock::new());
        let shutdown = CancellationToken::new();

        info!(
            query = %query.id(),
            container = ?options.container.as_ref().map(ContainerId::as_str),
            "Starting cloud index observer"
        );

        let task = ObserverTask {
            reconciler: SyncReconciler::new(Arc::clone(&index)),
            index,
            query: Arc::clone(&query),
            options,
            on_change,
            sink,
            state,
            state_tx,
            container_root: Arc::clone(&container_root),
        };
        let handle = tokio::spawn(task.run(shutdown.clone()));

        Ok(Self {
            query,
            state_rx,
            container_root,
            shutdown,
            task: Some(handle),
        })
    }

    /// Identity of the observed query
    pub fn query_id(&self) -> QueryId {
        self.query.id()
    }

    /// Current lifecycle state
    pub fn state(&self) -> QueryState {
        *self.state_rx.borrow()
    }

    /// Root of the resolved container, once resolution succeeded
    pub fn container_root(&self) -> Option<&Path> {
        self.container_root.get().map(PathBuf::as_path)
    }

    /// Waits until the query is running or has failed for good
    pub async fn wait_until_settled(&self) -> QueryState {
        let mut rx = self.state_rx.clone();
        let settled = rx.wait_for(QueryState::is_settled).await.map(|s| *s);
        settled.unwrap_or_else(|_| *rx.borrow())
    }

    /// Current snapshot of the query's results
    pub fn list_items(&self) -> Vec<IndexedItem> {
        list_items(self.query.as_ref())
    }

    /// Tears the observer down and waits for the query to stop
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                error!(error = %err, "Observer task ended abnormally");
            }
        }
    }
}

impl Drop for SyncIndexObserver {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for SyncIndexObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncIndexObserver")
            .field("query", &self.query.id())
            .field("state", &self.state())
            .field("container_root", &self.container_root())
            .finish()
    }
}

/// Runs the account stage of the query lifecycle
///
/// Ends in `AwaitingContainerResolution` when an account is signed in and in
/// `Failed(NoAccount)` otherwise.
fn account_stage(signed_in: bool) -> Result<QueryState, DomainError> {
    let mut state = QueryState::Uninitialized;
    state.transition_to(QueryState::AwaitingAccount)?;
    if signed_in {
        state.transition_to(QueryState::AwaitingContainerResolution)?;
    } else {
        state.transition_to(QueryState::Failed(SetupFailure::NoAccount))?;
    }
    Ok(state)
}

// ============================================================================
// ObserverTask
// ============================================================================

/// State owned by the observer's task
struct ObserverTask {
    index: Arc<dyn ICloudIndex>,
    query: Arc<dyn IIndexQuery>,
    reconciler: SyncReconciler,
    options: ObserverOptions,
    on_change: ChangeCallback,
    sink: Arc<dyn IUpdatedFilesSink>,
    state: QueryState,
    state_tx: watch::Sender<QueryState>,
    container_root: Arc<OnceLock<PathBuf>>,
}

impl ObserverTask {
    async fn run(mut self, shutdown: CancellationToken) {
        let Some(root) = self.resolve_container(&shutdown).await else {
            return;
        };
        if self.container_root.set(root.clone()).is_err() {
            warn!("Container root was already set");
        }
        info!(root = %root.display(), "Cloud container resolved");

        let (tx, mut rx) = mpsc::unbounded_channel::<IndexNotification>();
        let subscription = self.index.subscribe(Box::new(move |notification: IndexNotification| {
            // A closed channel means the task is gone; nothing left to notify.
            let _ = tx.send(notification);
        }));

        if let Err(err) = self.start_query() {
            error!(error = %err, "Failed to start cloud index query");
            drop(subscription);
            self.set_state(QueryState::Failed(SetupFailure::QueryRejected));
            return;
        }
        self.set_state(QueryState::Running);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                received = rx.recv() => match received {
                    Some(notification) => self.handle_notification(notification),
                    None => {
                        warn!("Index notification stream closed");
                        break;
                    }
                },
            }
        }

        drop(subscription);
        self.teardown();
    }

    /// Stage one: resolve the container off this task
    async fn resolve_container(&mut self, shutdown: &CancellationToken) -> Option<PathBuf> {
        let index = Arc::clone(&self.index);
        let container = self.options.container.clone();
        let resolution =
            tokio::task::spawn_blocking(move || index.resolve_container(container.as_ref()));

        let joined = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!("Observer torn down before the container resolved");
                return None;
            }
            joined = resolution => joined,
        };

        let failure = match joined {
            Ok(Ok(root)) => return Some(root),
            Ok(Err(err)) => err.to_string(),
            Err(err) => format!("resolution task failed: {err}"),
        };
        error!(
            container = ?self.options.container.as_ref().map(ContainerId::as_str),
            error = %failure,
            "Failed to retrieve cloud container; observer stays inert"
        );
        self.set_state(QueryState::Failed(SetupFailure::ContainerUnavailable));
        None
    }

    /// Stage two: configure and start the query
    fn start_query(&self) -> anyhow::Result<()> {
        let spec = QuerySpec::all_files(self.options.batching_interval);
        self.query.configure(&spec)?;
        self.query.start()?;
        debug!(query = %self.query.id(), "Cloud index query started");
        Ok(())
    }

    fn handle_notification(&self, notification: IndexNotification) {
        debug!(
            subject = %notification.subject,
            signal = ?notification.signal,
            items = notification.item_count(),
            "Cloud index notification"
        );

        let updated = SyncReconciler::freshly_synced(&notification);
        if !updated.is_empty() {
            info!(count = updated.len(), "Files finished syncing");
            self.sink.record_updated_files(updated);
            (self.on_change)();
        }

        if notification.subject != self.query.id() {
            debug!(subject = %notification.subject, "Notification from another query; no download sweep");
            return;
        }

        let snapshot = list_items(self.query.as_ref());
        let sweep = self.reconciler.request_downloads(&snapshot);
        if !sweep.failed.is_empty() {
            warn!(
                requested = sweep.requested.len(),
                failed = sweep.failed.len(),
                "Download sweep finished with failures"
            );
        } else if !sweep.is_empty() {
            info!(requested = sweep.requested.len(), "Download sweep finished");
        }
    }

    fn teardown(&mut self) {
        if self.query.is_started() {
            self.query.stop();
            info!(query = %self.query.id(), "Cloud index query stopped");
        }
        if self.state.is_running() {
            self.set_state(QueryState::Stopped);
        }
    }

    fn set_state(&mut self, next: QueryState) {
        match self.state.transition_to(next) {
            Ok(()) => {
                self.state_tx.send_replace(next);
            }
            Err(err) => warn!(error = %err, "Ignoring invalid observer state change"),
        }
    }
}
