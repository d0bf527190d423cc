//! Public surface consumed by badge components.
//!
//! A cycle queries every category the role maps, merges each response into the
//! ledger as soon as it arrives, then publishes one fresh [`NotificationCounts`]
//! for the whole cycle. A failed category keeps its previous count.

use crate::config::CoreConfig;
use crate::engine::{self, LiveSnapshot};
use crate::models::{NotificationCategory, NotificationCounts};
use crate::scheduler::{FireReason, Scheduler, SchedulerConfig, SchedulerHandle, Trigger};
use crate::signals::{LocalSignal, ProfileSignal, SignalPort};
use crate::sources::{FetchError, HttpFetcher, ListFetcher, SourceQuery};
use crate::store::{DocumentStore, FileStore, LedgerStore};
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Summary of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub polled: usize,
    pub failed: Vec<NotificationCategory>,
    pub new_items: usize,
    /// False when the session ended before the cycle finished.
    pub published: bool,
}

struct Inner {
    config: CoreConfig,
    ledger: LedgerStore,
    fetcher: Arc<dyn ListFetcher>,
    counts_tx: watch::Sender<NotificationCounts>,
    /// Serializes "zero then mark read" against "reload ledger then publish".
    publish_lock: Mutex<()>,
    alive: AtomicBool,
}

pub struct Notifier {
    inner: Arc<Inner>,
    local: LocalSignal,
    profile: Option<ProfileSignal>,
    scheduler: Option<Scheduler>,
    cancel_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Notifier {
    pub fn new(
        config: CoreConfig,
        fetcher: Arc<dyn ListFetcher>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        let (counts_tx, _) = watch::channel(NotificationCounts::zero());
        let (cancel_tx, _) = watch::channel(false);

        Self {
            inner: Arc::new(Inner {
                config,
                ledger: LedgerStore::new(documents),
                fetcher,
                counts_tx,
                publish_lock: Mutex::new(()),
                alive: AtomicBool::new(true),
            }),
            local: LocalSignal::new(),
            profile: None,
            scheduler: None,
            cancel_tx,
            tasks: Vec::new(),
        }
    }

    /// HTTP fetcher, file-backed ledger and cross-process signal, all rooted
    /// at the configured profile directory.
    pub fn from_config(config: CoreConfig) -> Result<Self, FetchError> {
        let fetcher = HttpFetcher::new(config.base_url.clone(), config.request_timeout)?;
        let documents = FileStore::new(&config.profile_dir);
        let profile = ProfileSignal::new(&config.profile_dir);
        Ok(Self::new(config, Arc::new(fetcher), Arc::new(documents)).with_profile_signal(profile))
    }

    pub fn with_profile_signal(mut self, signal: ProfileSignal) -> Self {
        self.profile = Some(signal);
        self
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    pub fn ledger(&self) -> &LedgerStore {
        &self.inner.ledger
    }

    /// Starts the scheduler and signal listeners and kicks off an initial cycle.
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        if self.scheduler.is_some() {
            return;
        }

        let inner = self.inner.clone();
        let scheduler = Scheduler::spawn(
            SchedulerConfig {
                debounce: self.inner.config.debounce,
                period: Some(self.inner.config.poll_interval),
            },
            move |reason| spawn_cycle(&inner, reason),
        );

        let handle = scheduler.handle();
        self.tasks.push(forward_signal(
            self.local.subscribe(),
            handle.clone(),
            Trigger::Local,
            self.cancel_tx.subscribe(),
        ));
        if let Some(profile) = &self.profile {
            self.tasks.push(profile.spawn_watcher(self.cancel_tx.subscribe()));
            self.tasks.push(forward_signal(
                profile.subscribe(),
                handle,
                Trigger::CrossProcess,
                self.cancel_tx.subscribe(),
            ));
        }
        self.scheduler = Some(scheduler);

        spawn_cycle(&self.inner, FireReason::Timer);
    }

    /// Counts from the last completed cycle.
    pub fn counts(&self) -> NotificationCounts {
        self.inner.counts_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<NotificationCounts> {
        self.inner.counts_tx.subscribe()
    }

    /// Zeroes the visible count at once, then persists the read state.
    pub fn clear_notification(&self, category: NotificationCategory) {
        let inner = &self.inner;
        let _guard = inner.publish_lock.lock();

        inner.counts_tx.send_if_modified(|counts| {
            let was = counts.get(category);
            *counts = counts.with(category, 0);
            was != 0
        });

        match inner.ledger.mark_read(category) {
            Ok(0) => {}
            Ok(flipped) => {
                tracing::debug!("notifier: marked {} {} item(s) read", flipped, category);
                self.announce_to_profile();
            }
            // The badge stays optimistically cleared; the next cycle restores
            // the true count if the write never landed.
            Err(e) => tracing::warn!("notifier: failed to persist read state for {}: {}", category, e),
        }
    }

    /// Requests a debounced refresh. Before `start` this is a no-op.
    pub fn refresh_notifications(&self) {
        match &self.scheduler {
            Some(scheduler) => scheduler.trigger(Trigger::Manual),
            None => tracing::debug!("notifier: refresh requested before start"),
        }
    }

    /// Tells this process and every other process on the profile that counts
    /// are likely to have changed (e.g. after the user submitted a record).
    pub fn announce_change(&self) {
        if let Err(e) = self.local.publish() {
            tracing::warn!("notifier: local signal failed: {}", e);
        }
        self.announce_to_profile();
    }

    fn announce_to_profile(&self) {
        if let Some(profile) = &self.profile {
            if let Err(e) = profile.publish() {
                tracing::warn!("notifier: cross-process signal failed: {}", e);
            }
        }
    }

    /// Runs one cycle immediately, bypassing the scheduler.
    pub async fn poll_now(&self) -> CycleReport {
        run_cycle(self.inner.clone()).await
    }

    pub fn scheduler_handle(&self) -> Option<SchedulerHandle> {
        self.scheduler.as_ref().map(Scheduler::handle)
    }

    /// Ends the session: pending cycles are cancelled and results of cycles
    /// still in flight are discarded.
    pub fn shutdown(&mut self) {
        self.inner.alive.store(false, Ordering::SeqCst);
        let _ = self.cancel_tx.send(true);
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.shutdown();
        }
        self.tasks.clear();
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn forward_signal(
    mut signal_rx: broadcast::Receiver<()>,
    scheduler: SchedulerHandle,
    trigger: Trigger,
    mut cancel_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = cancel_rx.changed() => {
                    if changed.is_err() || *cancel_rx.borrow() {
                        break;
                    }
                }
                received = signal_rx.recv() => {
                    match received {
                        // Lagging still means "something changed".
                        Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => scheduler.trigger(trigger),
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
    })
}

fn spawn_cycle(inner: &Arc<Inner>, reason: FireReason) {
    if !inner.alive.load(Ordering::SeqCst) {
        return;
    }
    tracing::debug!("notifier: cycle fired ({:?})", reason);
    tokio::spawn(run_cycle(inner.clone()));
}

async fn run_cycle(inner: Arc<Inner>) -> CycleReport {
    let config = &inner.config;
    let Some(token) = config.auth_token() else {
        tracing::debug!("notifier: no auth token, polling disabled");
        return CycleReport::default();
    };

    let queries = config.sources.queries(&config.role, Some(token));
    let results = join_all(queries.iter().map(|query| poll_category(&inner, query, token))).await;

    let mut report = CycleReport {
        polled: queries.len(),
        ..CycleReport::default()
    };
    let mut snapshots = Vec::new();
    for (category, result) in results {
        match result {
            Some((snapshot, new_items)) => {
                report.new_items += new_items;
                snapshots.push((category, snapshot));
            }
            None => report.failed.push(category),
        }
    }

    if !inner.alive.load(Ordering::SeqCst) {
        tracing::debug!("notifier: session ended mid-cycle, discarding results");
        return report;
    }
    publish(&inner, &snapshots);
    report.published = true;

    tracing::info!(
        polled = report.polled,
        failed = report.failed.len(),
        new_items = report.new_items,
        "notifier: cycle complete"
    );
    report
}

/// Fetch and merge one category. `None` leaves its count untouched.
async fn poll_category(
    inner: &Inner,
    query: &SourceQuery,
    token: &str,
) -> (NotificationCategory, Option<(LiveSnapshot, usize)>) {
    let category = query.category;

    let snapshot = match inner.fetcher.fetch(query, token).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!("notifier: {} poll failed, keeping previous count: {}", category, e);
            return (category, None);
        }
    };

    if !inner.alive.load(Ordering::SeqCst) {
        tracing::debug!("notifier: session ended, dropping {} response", category);
        return (category, None);
    }

    // Merge right after the response, against the latest persisted ledger.
    let config = &inner.config;
    match inner.ledger.merge(
        category,
        &snapshot,
        config.role.as_str(),
        now_secs(),
        config.retention.as_ref(),
    ) {
        Ok(outcome) => {
            tracing::debug!(
                "notifier: {} live={} new={} evicted={} unread={}",
                category,
                snapshot.len(),
                outcome.new_ids.len(),
                outcome.evicted,
                outcome.count
            );
            (category, Some((snapshot, outcome.new_ids.len())))
        }
        Err(e) => {
            tracing::warn!("notifier: {} ledger merge failed: {}", category, e);
            (category, None)
        }
    }
}

/// Derives the next counts from the latest ledger and this cycle's snapshots
/// and publishes them in one step. Categories the role doesn't poll are 0.
fn publish(inner: &Inner, snapshots: &[(NotificationCategory, LiveSnapshot)]) {
    let _guard = inner.publish_lock.lock();
    let ledger = inner.ledger.load();
    let config = &inner.config;

    inner.counts_tx.send_if_modified(|counts| {
        let mut next = counts.clone();
        for category in NotificationCategory::ALL {
            if !config.sources.polls(&config.role, category) {
                next = next.with(category, 0);
            }
        }
        for (category, snapshot) in snapshots {
            next = next.with(*category, engine::live_count(ledger.partition(*category), snapshot));
        }

        let modified = next != *counts;
        *counts = next;
        modified
    });
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
