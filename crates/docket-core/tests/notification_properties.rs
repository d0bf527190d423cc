use docket_core::{
    CoreConfig, FetchError, FileStore, ItemStatus, ListFetcher, LiveSnapshot, MemoryStore,
    NotificationCategory, Notifier, Role, SourceQuery, Trigger,
};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

const REQUESTS: NotificationCategory = NotificationCategory::NewRequests;
const CHATS: NotificationCategory = NotificationCategory::UnreadChats;

/// Backend stand-in: one listing per category, `None` means the request fails.
#[derive(Default)]
struct ScriptedBackend {
    listings: Mutex<HashMap<NotificationCategory, Option<Vec<String>>>>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    fn list(&self, category: NotificationCategory, ids: &[&str]) {
        self.listings
            .lock()
            .insert(category, Some(ids.iter().map(|s| s.to_string()).collect()));
    }

    fn fail(&self, category: NotificationCategory) {
        self.listings.lock().insert(category, None);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ListFetcher for ScriptedBackend {
    fn fetch<'a>(
        &'a self,
        query: &'a SourceQuery,
        _token: &'a str,
    ) -> BoxFuture<'a, Result<LiveSnapshot, FetchError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let listing = self.listings.lock().get(&query.category).cloned().flatten();
        Box::pin(async move {
            tokio::task::yield_now().await;
            listing
                .map(LiveSnapshot::from_ids)
                .ok_or(FetchError::Unsuccessful)
        })
    }
}

fn staff_config() -> CoreConfig {
    let mut config = CoreConfig::default().with_token("session-token");
    config.role = Role::new("staff");
    config.poll_interval = Duration::from_secs(3600);
    config.debounce = Duration::from_millis(500);
    config
}

fn memory_notifier() -> (Notifier, Arc<ScriptedBackend>) {
    let backend = Arc::new(ScriptedBackend::default());
    let notifier = Notifier::new(staff_config(), backend.clone(), Arc::new(MemoryStore::new()));
    (notifier, backend)
}

fn status_of(notifier: &Notifier, id: &str) -> Option<ItemStatus> {
    notifier.ledger().load().get(REQUESTS, id).map(|i| i.status)
}

#[tokio::test]
async fn idempotent_repoll() {
    let (notifier, backend) = memory_notifier();
    backend.list(REQUESTS, &["1", "2"]);
    backend.list(CHATS, &[]);

    notifier.poll_now().await;
    let ledger = notifier.ledger().load();
    let counts = notifier.counts();

    let report = notifier.poll_now().await;

    assert_eq!(report.new_items, 0);
    assert_eq!(notifier.ledger().load(), ledger);
    assert_eq!(notifier.counts(), counts);
}

#[tokio::test]
async fn new_item_detection() {
    let (notifier, backend) = memory_notifier();
    backend.list(CHATS, &[]);
    backend.list(REQUESTS, &["1", "2"]);
    notifier.poll_now().await;

    backend.list(REQUESTS, &["1", "2", "3"]);
    let report = notifier.poll_now().await;

    assert_eq!(report.new_items, 1);
    assert_eq!(notifier.ledger().load().partition(REQUESTS).len(), 3);
    assert_eq!(notifier.counts().get(REQUESTS), 3);
}

#[tokio::test]
async fn read_suppression() {
    let (notifier, backend) = memory_notifier();
    backend.list(CHATS, &[]);
    backend.list(REQUESTS, &["1", "2", "3"]);
    notifier.poll_now().await;
    assert_eq!(notifier.counts().get(REQUESTS), 3);

    notifier.clear_notification(REQUESTS);
    assert_eq!(notifier.counts().get(REQUESTS), 0);

    notifier.poll_now().await;
    assert_eq!(notifier.counts().get(REQUESTS), 0);
    assert_eq!(status_of(&notifier, "3"), Some(ItemStatus::Read));
}

#[tokio::test]
async fn clear_twice_is_noop() {
    let (notifier, backend) = memory_notifier();
    backend.list(CHATS, &[]);
    backend.list(REQUESTS, &["1"]);
    notifier.poll_now().await;

    notifier.clear_notification(REQUESTS);
    let after_first = notifier.ledger().load();
    notifier.clear_notification(REQUESTS);

    assert_eq!(notifier.ledger().load(), after_first);
    assert_eq!(notifier.counts().get(REQUESTS), 0);
}

#[tokio::test]
async fn disappearance_handling() {
    let (notifier, backend) = memory_notifier();
    backend.list(CHATS, &[]);
    backend.list(REQUESTS, &["1", "2", "3"]);
    notifier.poll_now().await;

    backend.list(REQUESTS, &["1", "3"]);
    notifier.poll_now().await;

    assert_eq!(notifier.counts().get(REQUESTS), 2);
    assert_eq!(status_of(&notifier, "2"), Some(ItemStatus::Unread));
}

#[tokio::test]
async fn reappearance_after_read() {
    let (notifier, backend) = memory_notifier();
    backend.list(CHATS, &[]);
    backend.list(REQUESTS, &["1", "2"]);
    notifier.poll_now().await;
    notifier.clear_notification(REQUESTS);

    backend.list(REQUESTS, &["1"]);
    notifier.poll_now().await;
    backend.list(REQUESTS, &["1", "2"]);
    let report = notifier.poll_now().await;

    assert_eq!(report.new_items, 0);
    assert_eq!(notifier.counts().get(REQUESTS), 0);
    assert_eq!(notifier.ledger().load().partition(REQUESTS).len(), 2);
}

#[tokio::test]
async fn partial_failure_isolation() {
    let (notifier, backend) = memory_notifier();
    backend.list(CHATS, &["c1"]);
    backend.list(REQUESTS, &["r1", "r2"]);
    notifier.poll_now().await;

    backend.fail(REQUESTS);
    backend.list(CHATS, &["c1", "c2", "c3"]);
    let report = notifier.poll_now().await;

    assert_eq!(report.failed, vec![REQUESTS]);
    assert_eq!(notifier.counts().get(CHATS), 3);
    assert_eq!(notifier.counts().get(REQUESTS), 2);
}

#[tokio::test]
async fn overlapping_cycles_do_not_duplicate() {
    let (notifier, backend) = memory_notifier();
    backend.list(CHATS, &["c1"]);
    backend.list(REQUESTS, &["1", "2", "3"]);

    tokio::join!(notifier.poll_now(), notifier.poll_now(), notifier.poll_now());

    let ledger = notifier.ledger().load();
    assert_eq!(ledger.partition(REQUESTS).len(), 3);
    assert_eq!(ledger.partition(CHATS).len(), 1);
    assert_eq!(notifier.counts().get(REQUESTS), 3);
}

#[tokio::test(start_paused = true)]
async fn debounce_coalescing() {
    let (mut notifier, backend) = memory_notifier();
    backend.list(CHATS, &[]);
    backend.list(REQUESTS, &[]);
    notifier.start();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let after_mount = backend.calls();

    let handle = notifier.scheduler_handle().unwrap();
    for trigger in [
        Trigger::Manual,
        Trigger::Local,
        Trigger::CrossProcess,
        Trigger::Local,
        Trigger::Manual,
    ] {
        handle.trigger(trigger);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    tokio::time::sleep(Duration::from_secs(3)).await;

    // One cycle polls both staff categories.
    assert_eq!(backend.calls() - after_mount, 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_pending_refresh() {
    let (mut notifier, backend) = memory_notifier();
    backend.list(CHATS, &[]);
    backend.list(REQUESTS, &[]);
    notifier.start();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let after_mount = backend.calls();

    notifier.refresh_notifications();
    tokio::time::sleep(Duration::from_millis(100)).await;
    notifier.shutdown();
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(backend.calls(), after_mount);
}

#[tokio::test]
async fn profiles_share_read_state() {
    let dir = tempdir().unwrap();
    let backend = Arc::new(ScriptedBackend::default());
    backend.list(CHATS, &[]);
    backend.list(REQUESTS, &["1", "2"]);

    let tab_a = Notifier::new(staff_config(), backend.clone(), Arc::new(FileStore::new(dir.path())));
    let tab_b = Notifier::new(staff_config(), backend.clone(), Arc::new(FileStore::new(dir.path())));

    tab_a.poll_now().await;
    tab_b.poll_now().await;
    assert_eq!(tab_b.counts().get(REQUESTS), 2);

    tab_a.clear_notification(REQUESTS);
    tab_b.poll_now().await;

    assert_eq!(tab_b.counts().get(REQUESTS), 0);
}
