use super::document::{DocumentStore, StoreError};
use super::ledger::Ledger;
use crate::config::RetentionPolicy;
use crate::constants::LEDGER_KEY;
use crate::engine::{self, LiveSnapshot, MergeOutcome};
use crate::models::NotificationCategory;
use std::sync::Arc;

/// Durable ledger backed by a [`DocumentStore`].
///
/// Every mutation re-reads the latest persisted document, applies the change
/// and writes it back while holding the store's lock on the ledger key, with
/// no await point in between. The lock lives in the store, not here, so two
/// `LedgerStore`s over the same profile (in one process or in two) never
/// overwrite each other's appends or undo each other's reads.
pub struct LedgerStore {
    store: Arc<dyn DocumentStore>,
    key: String,
}

impl LedgerStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_key(store, LEDGER_KEY)
    }

    pub fn with_key(store: Arc<dyn DocumentStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Never fails: missing, unreadable or corrupt data yields an empty ledger.
    pub fn load(&self) -> Ledger {
        match self.store.get(&self.key) {
            Ok(Some(document)) => Ledger::from_document(&document),
            Ok(None) => Ledger::new(),
            Err(e) => {
                tracing::warn!("ledger: load failed, using empty ledger: {}", e);
                Ledger::new()
            }
        }
    }

    /// Full overwrite of the persisted document.
    pub fn save(&self, ledger: &Ledger) -> Result<(), StoreError> {
        let _guard = self.store.lock(&self.key)?;
        self.write(ledger)
    }

    /// Flips every unread item of `category` to read. Calling it again is a no-op.
    pub fn mark_read(&self, category: NotificationCategory) -> Result<usize, StoreError> {
        self.transact(|ledger| {
            let flipped = engine::mark_partition_read(ledger.partition_mut(category));
            (flipped, flipped > 0)
        })
    }

    /// Reconciles one category's live listing with the persisted partition.
    pub fn merge(
        &self,
        category: NotificationCategory,
        snapshot: &LiveSnapshot,
        role: &str,
        now: u64,
        retention: Option<&RetentionPolicy>,
    ) -> Result<MergeOutcome, StoreError> {
        self.transact(|ledger| {
            let outcome =
                engine::merge_partition(ledger.partition_mut(category), snapshot, role, now, retention);
            let changed = outcome.changed;
            (outcome, changed)
        })
    }

    /// Live count for `category` against the latest persisted ledger.
    pub fn live_count(&self, category: NotificationCategory, snapshot: &LiveSnapshot) -> usize {
        engine::live_count(self.load().partition(category), snapshot)
    }

    fn transact<R>(&self, f: impl FnOnce(&mut Ledger) -> (R, bool)) -> Result<R, StoreError> {
        let _guard = self.store.lock(&self.key)?;

        // A read error (as opposed to a missing or corrupt document) must not
        // be papered over here, or the write below would clobber real history.
        let mut ledger = match self.store.get(&self.key)? {
            Some(document) => Ledger::from_document(&document),
            None => Ledger::new(),
        };

        let (result, changed) = f(&mut ledger);
        if changed {
            self.write(&ledger)?;
        }
        Ok(result)
    }

    fn write(&self, ledger: &Ledger) -> Result<(), StoreError> {
        let document = ledger.to_document()?;
        self.store.set(&self.key, &document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemStatus;
    use crate::store::{FileStore, MemoryStore};
    use tempfile::tempdir;

    const CAT: NotificationCategory = NotificationCategory::NewRequests;

    fn memory_ledger() -> (Arc<MemoryStore>, LedgerStore) {
        let docs = Arc::new(MemoryStore::new());
        let store = LedgerStore::new(docs.clone());
        (docs, store)
    }

    #[test]
    fn test_load_empty_when_nothing_persisted() {
        let (_, store) = memory_ledger();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_load_corrupt_is_empty_and_next_merge_repairs() {
        let (docs, store) = memory_ledger();
        docs.set(LEDGER_KEY, "\u{0}\u{1}garbage").unwrap();
        assert!(store.load().is_empty());

        store
            .merge(CAT, &LiveSnapshot::from_ids(["1"]), "admin", 1, None)
            .unwrap();
        assert_eq!(store.load().partition(CAT).len(), 1);
    }

    #[test]
    fn test_merge_reads_latest_persisted_value() {
        let (docs, store) = memory_ledger();
        let other_tab = LedgerStore::new(docs.clone());

        store
            .merge(CAT, &LiveSnapshot::from_ids(["1"]), "admin", 1, None)
            .unwrap();
        other_tab
            .merge(CAT, &LiveSnapshot::from_ids(["2"]), "admin", 2, None)
            .unwrap();

        let ledger = store.load();
        let ids: Vec<_> = ledger.partition(CAT).iter().map(|i| i.id.clone()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_mark_read_persists_and_is_idempotent() {
        let (_, store) = memory_ledger();
        store
            .merge(CAT, &LiveSnapshot::from_ids(["1", "2"]), "admin", 1, None)
            .unwrap();

        assert_eq!(store.mark_read(CAT).unwrap(), 2);
        assert_eq!(store.mark_read(CAT).unwrap(), 0);
        assert!(store
            .load()
            .partition(CAT)
            .iter()
            .all(|i| i.status == ItemStatus::Read));
    }

    #[test]
    fn test_mark_read_leaves_other_categories_alone() {
        let (_, store) = memory_ledger();
        let snapshot = LiveSnapshot::from_ids(["1"]);
        store.merge(CAT, &snapshot, "admin", 1, None).unwrap();
        store
            .merge(NotificationCategory::NewMedia, &snapshot, "admin", 1, None)
            .unwrap();

        store.mark_read(CAT).unwrap();

        assert_eq!(store.live_count(CAT, &snapshot), 0);
        assert_eq!(store.live_count(NotificationCategory::NewMedia, &snapshot), 1);
    }

    #[test]
    fn test_file_backed_ledger_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = LedgerStore::new(Arc::new(FileStore::new(dir.path())));
            store
                .merge(CAT, &LiveSnapshot::from_ids(["7", "8"]), "records-officer", 42, None)
                .unwrap();
        }

        let reopened = LedgerStore::new(Arc::new(FileStore::new(dir.path())));
        let ledger = reopened.load();
        let item = ledger.get(CAT, "8").unwrap();
        assert_eq!(item.observed_by_role, "records-officer");
        assert_eq!(item.first_seen_at, 42);
        assert_eq!(item.status, ItemStatus::Unread);
    }

    #[test]
    fn test_non_utf8_ledger_file_is_repaired_by_merge() {
        let dir = tempdir().unwrap();
        let files = FileStore::new(dir.path());
        std::fs::write(files.path_for(LEDGER_KEY), [0xff, 0xfe]).unwrap();
        let store = LedgerStore::new(Arc::new(files));
        assert!(store.load().is_empty());

        store
            .merge(CAT, &LiveSnapshot::from_ids(["1"]), "admin", 1, None)
            .unwrap();
        assert_eq!(store.mark_read(CAT).unwrap(), 1);
        assert_eq!(store.load().get(CAT, "1").unwrap().status, ItemStatus::Read);
    }

    fn merge_from_two_stores(first: LedgerStore, second: LedgerStore) -> LedgerStore {
        let first = Arc::new(first);
        let handles: Vec<_> = [(first.clone(), "a"), (Arc::new(second), "b")]
            .into_iter()
            .map(|(store, prefix)| {
                std::thread::spawn(move || {
                    for n in 0..20 {
                        let id = format!("{}{}", prefix, n);
                        store
                            .merge(CAT, &LiveSnapshot::from_ids([id]), "admin", n, None)
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        match Arc::try_unwrap(first) {
            Ok(store) => store,
            Err(_) => panic!("store still shared"),
        }
    }

    #[test]
    fn test_two_stores_on_one_memory_profile_lose_nothing() {
        let (docs, first) = memory_ledger();
        let second = LedgerStore::new(docs);

        let store = merge_from_two_stores(first, second);
        assert_eq!(store.load().partition(CAT).len(), 40);
    }

    #[test]
    fn test_two_stores_on_one_file_profile_lose_nothing() {
        let dir = tempdir().unwrap();
        let first = LedgerStore::new(Arc::new(FileStore::new(dir.path())));
        let second = LedgerStore::new(Arc::new(FileStore::new(dir.path())));

        let store = merge_from_two_stores(first, second);
        assert_eq!(store.load().partition(CAT).len(), 40);
    }

    #[test]
    fn test_read_state_from_other_store_is_not_undone() {
        let dir = tempdir().unwrap();
        let tab_a = LedgerStore::new(Arc::new(FileStore::new(dir.path())));
        let tab_b = LedgerStore::new(Arc::new(FileStore::new(dir.path())));
        let snapshot = LiveSnapshot::from_ids(["1", "2"]);

        tab_a.merge(CAT, &snapshot, "admin", 1, None).unwrap();
        tab_b.mark_read(CAT).unwrap();
        tab_a
            .merge(CAT, &LiveSnapshot::from_ids(["1", "2", "3"]), "admin", 2, None)
            .unwrap();

        let ledger = tab_b.load();
        assert_eq!(ledger.get(CAT, "1").unwrap().status, ItemStatus::Read);
        assert_eq!(ledger.get(CAT, "2").unwrap().status, ItemStatus::Read);
        assert_eq!(ledger.get(CAT, "3").unwrap().status, ItemStatus::Unread);
    }

    #[test]
    fn test_concurrent_merges_lose_nothing() {
        let (docs, _) = memory_ledger();
        let store = Arc::new(LedgerStore::new(docs));

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let id = n.to_string();
                    store
                        .merge(CAT, &LiveSnapshot::from_ids([id]), "admin", n, None)
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.load().partition(CAT).len(), 8);
    }
}
