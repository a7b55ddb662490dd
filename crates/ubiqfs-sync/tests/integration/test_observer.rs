//! Observer lifecycle, notification handling and download sweeps

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use ubiqfs_core::domain::{newtypes::ContainerId, QueryId, QueryState, SetupFailure, SyncStatus};
use ubiqfs_core::ports::{
    ChangeGroup, ChangeKind, IUpdatedFilesSink, IndexNotification, QuerySpec, RawIndexItem,
};
use ubiqfs_sync::observer::{ObserverOptions, SyncIndexObserver};
use ubiqfs_sync::SyncError;

use crate::common::{counting_callback, settle, wait_until, FakeCloudIndex, RecordingSink};

const ROOT: &str = "/cloud";

fn item(name: &str, status: SyncStatus) -> RawIndexItem {
    RawIndexItem::file(format!("{ROOT}/Documents/{name}"), status)
}

fn start(index: &Arc<FakeCloudIndex>) -> (SyncIndexObserver, Arc<RecordingSink>, Arc<std::sync::atomic::AtomicUsize>) {
    let sink = Arc::new(RecordingSink::default());
    let (count, callback) = counting_callback();
    let observer = SyncIndexObserver::new(
        index.clone(),
        ObserverOptions::default(),
        callback,
        sink.clone() as Arc<dyn IUpdatedFilesSink>,
    )
    .expect("signed in");
    (observer, sink, count)
}

// ------------------------------------------------------------------
// Setup
// ------------------------------------------------------------------

#[tokio::test]
async fn test_observer_reaches_running_with_all_files_query() {
    let index = FakeCloudIndex::new(ROOT);
    let (observer, _sink, _count) = start(&index);

    assert_eq!(observer.wait_until_settled().await, QueryState::Running);
    assert_eq!(observer.container_root(), Some(PathBuf::from(ROOT).as_path()));

    let query = index.last_query();
    assert_eq!(observer.query_id(), query.id);
    assert_eq!(
        *query.spec.lock().unwrap(),
        Some(QuerySpec::all_files(Duration::from_secs(1)))
    );
    assert_eq!(query.starts.load(Ordering::SeqCst), 1);
    assert_eq!(index.subscriber_count(), 1);
    assert_eq!(*index.resolved_containers.lock().unwrap(), vec![None]);
}

#[tokio::test]
async fn test_observer_passes_container_identifier() {
    let index = FakeCloudIndex::new(ROOT);
    let (count_sink, callback) = counting_callback();
    let options = ObserverOptions {
        container: Some(ContainerId::new("iCloud.com.example.notes").unwrap()),
        batching_interval: Duration::from_secs(2),
    };
    let observer = SyncIndexObserver::new(
        index.clone(),
        options,
        callback,
        Arc::new(RecordingSink::default()),
    )
    .unwrap();

    assert_eq!(observer.wait_until_settled().await, QueryState::Running);
    assert_eq!(
        *index.resolved_containers.lock().unwrap(),
        vec![Some("iCloud.com.example.notes".to_string())]
    );
    assert_eq!(
        index.last_query().spec.lock().unwrap().as_ref().map(|s| s.batching_interval),
        Some(Duration::from_secs(2))
    );
    assert_eq!(count_sink.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_no_account_fails_before_any_work() {
    let index = FakeCloudIndex::signed_out();
    let (_count, callback) = counting_callback();

    let result = SyncIndexObserver::new(
        index.clone(),
        ObserverOptions::default(),
        callback,
        Arc::new(RecordingSink::default()),
    );

    assert!(matches!(result, Err(SyncError::NotSignedIn)));
    assert_eq!(index.query_count(), 0);
    assert_eq!(index.subscriber_count(), 0);
    assert!(index.resolved_containers.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_container_failure_leaves_observer_inert() {
    let index = FakeCloudIndex::without_container();
    let (observer, sink, count) = start(&index);

    assert_eq!(
        observer.wait_until_settled().await,
        QueryState::Failed(SetupFailure::ContainerUnavailable)
    );
    assert!(observer.container_root().is_none());
    assert_eq!(index.subscriber_count(), 0);

    let query = index.last_query();
    assert_eq!(query.starts.load(Ordering::SeqCst), 0);

    observer.shutdown().await;
    assert_eq!(query.stops.load(Ordering::SeqCst), 0);
    assert!(sink.batches().is_empty());
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_rejected_query_fails_setup() {
    let index = FakeCloudIndex::new(ROOT);
    index.reject_queries.store(true, Ordering::SeqCst);
    let (observer, _sink, _count) = start(&index);

    assert_eq!(
        observer.wait_until_settled().await,
        QueryState::Failed(SetupFailure::QueryRejected)
    );
    assert_eq!(index.subscriber_count(), 0);
    assert_eq!(index.last_query().starts.load(Ordering::SeqCst), 0);
}

// ------------------------------------------------------------------
// Notifications
// ------------------------------------------------------------------

#[tokio::test]
async fn test_synced_item_reaches_sink_and_callback_once() {
    let index = FakeCloudIndex::new(ROOT);
    index.set_results(vec![
        item("A.txt", SyncStatus::synced()).with_download_requested(true),
    ]);
    let (observer, sink, count) = start(&index);
    observer.wait_until_settled().await;

    index.post(IndexNotification::update(
        observer.query_id(),
        vec![ChangeGroup::new(
            ChangeKind::Changed,
            vec![item("A.txt", SyncStatus::new(false, false, true, true))],
        )],
    ));

    assert!(wait_until(|| count.load(Ordering::SeqCst) == 1).await);
    settle().await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(
        sink.batches(),
        vec![vec!["A.txt|kMDQueryUpdateChangedItems".to_string()]]
    );
    assert!(index.downloads().is_empty());
}

#[tokio::test]
async fn test_mid_download_item_is_requested_not_reported() {
    let index = FakeCloudIndex::new(ROOT);
    let downloading = SyncStatus::new(true, false, false, false);
    index.set_results(vec![item("B.txt", downloading)]);
    let (observer, sink, count) = start(&index);
    observer.wait_until_settled().await;

    index.post(IndexNotification::update(
        observer.query_id(),
        vec![ChangeGroup::new(ChangeKind::Added, vec![item("B.txt", downloading)])],
    ));

    assert!(wait_until(|| !index.downloads().is_empty()).await);
    assert_eq!(index.downloads(), vec![PathBuf::from("/cloud/Documents/B.txt")]);
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert!(sink.batches().is_empty());
}

#[tokio::test]
async fn test_finished_gathering_sweeps_and_survives_download_failure() {
    let index = FakeCloudIndex::new(ROOT);
    index.set_results(vec![
        item("a.txt", SyncStatus::default()),
        item("b.txt", SyncStatus::default()),
        item("c.txt", SyncStatus::default()).with_download_requested(true),
    ]);
    index.fail_downloads_for("/cloud/Documents/a.txt");
    let (observer, _sink, count) = start(&index);
    observer.wait_until_settled().await;

    index.post(IndexNotification::finished_gathering(observer.query_id()));

    assert!(wait_until(|| index.downloads().len() == 2).await);
    assert_eq!(
        index.downloads(),
        vec![
            PathBuf::from("/cloud/Documents/a.txt"),
            PathBuf::from("/cloud/Documents/b.txt"),
        ]
    );
    assert_eq!(count.load(Ordering::SeqCst), 0);

    // Still requested again on the next sweep.
    index.post(IndexNotification::finished_gathering(observer.query_id()));
    assert!(wait_until(|| index.downloads().len() == 4).await);
    assert_eq!(observer.state(), QueryState::Running);
}

#[tokio::test]
async fn test_foreign_subject_reports_but_does_not_sweep() {
    let index = FakeCloudIndex::new(ROOT);
    index.set_results(vec![item("pending.txt", SyncStatus::default())]);
    let (observer, sink, count) = start(&index);
    observer.wait_until_settled().await;

    index.post(IndexNotification::update(
        QueryId::new(),
        vec![ChangeGroup::new(
            ChangeKind::Added,
            vec![item("A.txt", SyncStatus::synced())],
        )],
    ));

    assert!(wait_until(|| count.load(Ordering::SeqCst) == 1).await);
    settle().await;
    assert_eq!(sink.batches(), vec![vec!["A.txt|kMDQueryUpdateAddedItems".to_string()]]);
    assert!(index.downloads().is_empty());
    assert_eq!(index.last_query().disables.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_sweep_reads_results_with_updates_paused() {
    let index = FakeCloudIndex::new(ROOT);
    index.set_results(vec![item("x.txt", SyncStatus::default())]);
    let (observer, _sink, _count) = start(&index);
    observer.wait_until_settled().await;

    index.post(IndexNotification::finished_gathering(observer.query_id()));
    assert!(wait_until(|| index.downloads().len() == 1).await);

    let query = index.last_query();
    assert_eq!(query.disables.load(Ordering::SeqCst), 1);
    assert_eq!(query.enables.load(Ordering::SeqCst), 1);
    assert_eq!(query.reads_while_live.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_list_items_snapshot() {
    let index = FakeCloudIndex::new(ROOT);
    let mut nameless = item("ghost.txt", SyncStatus::default());
    nameless.fs_name = None;
    index.set_results(vec![
        item("b.txt", SyncStatus::default()),
        nameless,
        item("a.txt", SyncStatus::synced()),
    ]);
    let (observer, _sink, _count) = start(&index);
    observer.wait_until_settled().await;

    let names: Vec<String> = observer
        .list_items()
        .iter()
        .map(|i| i.fs_name().to_string())
        .collect();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
}

// ------------------------------------------------------------------
// Teardown
// ------------------------------------------------------------------

#[tokio::test]
async fn test_shutdown_stops_query_and_unsubscribes() {
    let index = FakeCloudIndex::new(ROOT);
    let (observer, sink, count) = start(&index);
    let id = observer.query_id();
    observer.wait_until_settled().await;

    observer.shutdown().await;

    let query = index.last_query();
    assert_eq!(query.stops.load(Ordering::SeqCst), 1);
    assert_eq!(index.subscriber_count(), 0);

    index.post(IndexNotification::update(
        id,
        vec![ChangeGroup::new(
            ChangeKind::Added,
            vec![item("late.txt", SyncStatus::synced())],
        )],
    ));
    settle().await;
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert!(sink.batches().is_empty());
}

#[tokio::test]
async fn test_drop_cancels_observer() {
    let index = FakeCloudIndex::new(ROOT);
    let (observer, _sink, _count) = start(&index);
    observer.wait_until_settled().await;

    drop(observer);

    assert!(wait_until(|| index.subscriber_count() == 0).await);
    assert!(wait_until(|| index.last_query().stops.load(Ordering::SeqCst) == 1).await);
}
