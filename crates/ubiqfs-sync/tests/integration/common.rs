//! Shared test helpers for observer and facade integration tests
//!
//! Provides an in-memory cloud index: account flag, container root, a result
//! set shared by every query it creates, and a log of download requests.
//! Notifications are posted by the test through [`FakeCloudIndex::post`].

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ubiqfs_core::domain::{newtypes::ContainerId, QueryId};
use ubiqfs_core::ports::{
    ICloudIndex, IIndexQuery, IUpdatedFilesSink, IndexNotification, NotificationHandler, QuerySpec,
    RawIndexItem, Subscription,
};

type SharedHandler = Arc<dyn Fn(IndexNotification) + Send + Sync>;

// ============================================================================
// FakeQuery
// ============================================================================

/// Query handle that records every call made on it
pub struct FakeQuery {
    pub id: QueryId,
    results: Arc<Mutex<Vec<RawIndexItem>>>,
    pub spec: Mutex<Option<QuerySpec>>,
    pub reject_start: bool,
    started: AtomicBool,
    updates_enabled: AtomicBool,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub disables: AtomicUsize,
    pub enables: AtomicUsize,
    /// `results()` calls made while live updates were enabled
    pub reads_while_live: AtomicUsize,
}

impl IIndexQuery for FakeQuery {
    fn id(&self) -> QueryId {
        self.id
    }

    fn configure(&self, spec: &QuerySpec) -> anyhow::Result<()> {
        *self.spec.lock().unwrap() = Some(spec.clone());
        Ok(())
    }

    fn start(&self) -> anyhow::Result<()> {
        if self.reject_start {
            anyhow::bail!("query refused by platform");
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.started.store(true, Ordering::SeqCst);
        self.updates_enabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        if self.started.swap(false, Ordering::SeqCst) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    fn disable_updates(&self) {
        self.disables.fetch_add(1, Ordering::SeqCst);
        self.updates_enabled.store(false, Ordering::SeqCst);
    }

    fn enable_updates(&self) {
        self.enables.fetch_add(1, Ordering::SeqCst);
        self.updates_enabled.store(true, Ordering::SeqCst);
    }

    fn results(&self) -> Vec<RawIndexItem> {
        if self.updates_enabled.load(Ordering::SeqCst) {
            self.reads_while_live.fetch_add(1, Ordering::SeqCst);
        }
        self.results.lock().unwrap().clone()
    }
}

// ============================================================================
// FakeCloudIndex
// ============================================================================

/// In-memory stand-in for the platform cloud index
pub struct FakeCloudIndex {
    pub signed_in: AtomicBool,
    container_root: Option<PathBuf>,
    resolve_delay: Duration,
    pub reject_queries: AtomicBool,
    pub results: Arc<Mutex<Vec<RawIndexItem>>>,
    pub downloads: Mutex<Vec<PathBuf>>,
    pub failing_downloads: Mutex<HashSet<PathBuf>>,
    pub resolved_containers: Mutex<Vec<Option<String>>>,
    queries: Mutex<Vec<Arc<FakeQuery>>>,
    handlers: Arc<Mutex<HashMap<u64, SharedHandler>>>,
    next_handler: AtomicU64,
}

impl FakeCloudIndex {
    /// Signed in, with the container rooted at `container_root`
    pub fn new(container_root: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self::build(true, Some(container_root.into())))
    }

    /// No signed-in account
    pub fn signed_out() -> Arc<Self> {
        Arc::new(Self::build(false, None))
    }

    /// Signed in, but the container never resolves
    pub fn without_container() -> Arc<Self> {
        Arc::new(Self::build(true, None))
    }

    /// Signed in, but resolving the container blocks for `delay`
    pub fn with_resolve_delay(container_root: impl Into<PathBuf>, delay: Duration) -> Arc<Self> {
        let mut index = Self::build(true, Some(container_root.into()));
        index.resolve_delay = delay;
        Arc::new(index)
    }

    fn build(signed_in: bool, container_root: Option<PathBuf>) -> Self {
        Self {
            signed_in: AtomicBool::new(signed_in),
            container_root,
            resolve_delay: Duration::ZERO,
            reject_queries: AtomicBool::new(false),
            results: Arc::new(Mutex::new(Vec::new())),
            downloads: Mutex::new(Vec::new()),
            failing_downloads: Mutex::new(HashSet::new()),
            resolved_containers: Mutex::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
            handlers: Arc::new(Mutex::new(HashMap::new())),
            next_handler: AtomicU64::new(0),
        }
    }

    /// Replaces the result set every query reads
    pub fn set_results(&self, items: Vec<RawIndexItem>) {
        *self.results.lock().unwrap() = items;
    }

    /// Delivers a notification to every live subscriber
    pub fn post(&self, notification: IndexNotification) {
        let handlers: Vec<SharedHandler> = self.handlers.lock().unwrap().values().cloned().collect();
        for handler in handlers {
            handler(notification.clone());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.lock().unwrap().len()
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn last_query(&self) -> Arc<FakeQuery> {
        self.queries
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no query created yet")
    }

    pub fn downloads(&self) -> Vec<PathBuf> {
        self.downloads.lock().unwrap().clone()
    }

    pub fn fail_downloads_for(&self, path: impl Into<PathBuf>) {
        self.failing_downloads.lock().unwrap().insert(path.into());
    }
}

impl ICloudIndex for FakeCloudIndex {
    fn is_signed_in(&self) -> bool {
        self.signed_in.load(Ordering::SeqCst)
    }

    fn resolve_container(&self, container: Option<&ContainerId>) -> anyhow::Result<PathBuf> {
        self.resolved_containers
            .lock()
            .unwrap()
            .push(container.map(|c| c.as_str().to_string()));
        if !self.resolve_delay.is_zero() {
            std::thread::sleep(self.resolve_delay);
        }
        self.container_root
            .clone()
            .ok_or_else(|| anyhow::anyhow!("container not provisioned"))
    }

    fn create_query(&self) -> Arc<dyn IIndexQuery> {
        let query = Arc::new(FakeQuery {
            id: QueryId::new(),
            results: Arc::clone(&self.results),
            spec: Mutex::new(None),
            reject_start: self.reject_queries.load(Ordering::SeqCst),
            started: AtomicBool::new(false),
            updates_enabled: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            disables: AtomicUsize::new(0),
            enables: AtomicUsize::new(0),
            reads_while_live: AtomicUsize::new(0),
        });
        self.queries.lock().unwrap().push(Arc::clone(&query));
        query
    }

    fn subscribe(&self, handler: NotificationHandler) -> Subscription {
        let key = self.next_handler.fetch_add(1, Ordering::SeqCst);
        self.handlers.lock().unwrap().insert(key, Arc::from(handler));

        let handlers = Arc::clone(&self.handlers);
        Subscription::new(move || {
            handlers.lock().unwrap().remove(&key);
        })
    }

    fn start_downloading(&self, location: &Path) -> anyhow::Result<()> {
        self.downloads.lock().unwrap().push(location.to_path_buf());
        if self.failing_downloads.lock().unwrap().contains(location) {
            anyhow::bail!("download refused");
        }
        Ok(())
    }
}

// ============================================================================
// Sink and callback helpers
// ============================================================================

/// Sink that keeps every batch it receives
#[derive(Default)]
pub struct RecordingSink {
    pub batches: Mutex<Vec<Vec<String>>>,
}

impl RecordingSink {
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }
}

impl IUpdatedFilesSink for RecordingSink {
    fn record_updated_files(&self, names: Vec<String>) {
        self.batches.lock().unwrap().push(names);
    }
}

/// Change callback that counts its invocations
pub fn counting_callback() -> (Arc<AtomicUsize>, Arc<dyn Fn() + Send + Sync>) {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let callback: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (count, callback)
}

/// Polls `condition` until it holds or a second passes
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Lets the observer task drain anything already queued
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
