//! Diff & merge of one category's live listing against its ledger partition.
//!
//! The backend offers no "since" cursor, so newness is inferred by diffing the
//! ids it reports now against every id the ledger has ever recorded.

use crate::config::RetentionPolicy;
use crate::models::NotificationItem;
use std::collections::HashSet;

/// Ids the backend reports for one category on one poll. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveSnapshot {
    ordered: Vec<String>,
    set: HashSet<String>,
}

impl LiveSnapshot {
    /// Keeps the backend's order and drops repeated ids.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut snapshot = Self::default();
        for id in ids {
            let id = id.into();
            if snapshot.set.insert(id.clone()) {
                snapshot.ordered.push(id);
            }
        }
        snapshot
    }

    pub fn contains(&self, id: &str) -> bool {
        self.set.contains(id)
    }

    pub fn ids(&self) -> &[String] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Ids appended as unread by this merge, in backend order.
    pub new_ids: Vec<String>,
    /// Read items dropped by the retention policy.
    pub evicted: usize,
    /// Live unread count after the merge.
    pub count: usize,
    /// Whether the partition differs from what was read.
    pub changed: bool,
}

/// Unread items that the backend still reports.
///
/// Unread items that left the listing stay in the ledger as history but no
/// longer count.
pub fn live_count(partition: &[NotificationItem], snapshot: &LiveSnapshot) -> usize {
    partition
        .iter()
        .filter(|item| item.is_unread() && snapshot.contains(&item.id))
        .count()
}

/// Appends unseen ids as unread and recomputes the live count.
///
/// Ids that reappear after leaving the listing are matched to their existing
/// entry and keep its status, so a read item never re-notifies. Without a
/// retention policy the partition is append-only and re-merging the same
/// snapshot leaves it untouched.
pub fn merge_partition(
    partition: &mut Vec<NotificationItem>,
    snapshot: &LiveSnapshot,
    role: &str,
    now: u64,
    retention: Option<&RetentionPolicy>,
) -> MergeOutcome {
    let known: HashSet<&str> = partition.iter().map(|i| i.id.as_str()).collect();
    let new_ids: Vec<String> = snapshot
        .ids()
        .iter()
        .filter(|id| !known.contains(id.as_str()))
        .cloned()
        .collect();

    let mut changed = !new_ids.is_empty();
    let mut evicted = 0;

    if let Some(policy) = retention {
        for item in partition.iter_mut() {
            if snapshot.contains(&item.id) && item.last_seen_at != Some(now) {
                item.last_seen_at = Some(now);
                changed = true;
            }
        }

        let max_age = policy.max_age_secs();
        let before = partition.len();
        partition.retain(|item| {
            item.is_unread()
                || snapshot.contains(&item.id)
                || now.saturating_sub(item.last_touched()) <= max_age
        });
        evicted = before - partition.len();
        changed |= evicted > 0;
    }

    partition.extend(
        new_ids
            .iter()
            .map(|id| NotificationItem::unread(id.clone(), role, now)),
    );

    MergeOutcome {
        count: live_count(partition, snapshot),
        new_ids,
        evicted,
        changed,
    }
}

/// Flips every unread item to read. Returns how many changed.
pub fn mark_partition_read(partition: &mut [NotificationItem]) -> usize {
    partition
        .iter_mut()
        .map(NotificationItem::mark_read)
        .filter(|flipped| *flipped)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemStatus;

    const DAY: u64 = 24 * 60 * 60;

    fn ids(partition: &[NotificationItem]) -> Vec<&str> {
        partition.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_new_ids_appended_in_backend_order() {
        let mut partition = vec![
            NotificationItem::unread("1", "admin", 10),
            NotificationItem::unread("2", "admin", 10),
        ];
        let snapshot = LiveSnapshot::from_ids(["3", "1", "2", "4"]);

        let outcome = merge_partition(&mut partition, &snapshot, "admin", 20, None);

        assert_eq!(outcome.new_ids, vec!["3", "4"]);
        assert_eq!(outcome.count, 4);
        assert!(outcome.changed);
        assert_eq!(ids(&partition), vec!["1", "2", "3", "4"]);
        assert_eq!(partition[2].first_seen_at, 20);
        assert_eq!(partition[2].observed_by_role, "admin");
    }

    #[test]
    fn test_remerge_same_snapshot_is_noop() {
        let mut partition = Vec::new();
        let snapshot = LiveSnapshot::from_ids(["a", "b"]);
        merge_partition(&mut partition, &snapshot, "staff", 1, None);
        let before = partition.clone();

        let outcome = merge_partition(&mut partition, &snapshot, "staff", 2, None);

        assert!(!outcome.changed);
        assert!(outcome.new_ids.is_empty());
        assert_eq!(outcome.count, 2);
        assert_eq!(partition, before);
    }

    #[test]
    fn test_vanished_unread_items_stop_counting_but_stay() {
        let mut partition = Vec::new();
        merge_partition(&mut partition, &LiveSnapshot::from_ids(["1", "2", "3"]), "admin", 1, None);

        let outcome =
            merge_partition(&mut partition, &LiveSnapshot::from_ids(["1", "3"]), "admin", 2, None);

        assert_eq!(outcome.count, 2);
        assert_eq!(ids(&partition), vec!["1", "2", "3"]);
        assert_eq!(partition[1].status, ItemStatus::Unread);
    }

    #[test]
    fn test_reappearing_read_item_stays_read() {
        let mut partition = Vec::new();
        merge_partition(&mut partition, &LiveSnapshot::from_ids(["1", "2"]), "admin", 1, None);
        mark_partition_read(&mut partition);
        merge_partition(&mut partition, &LiveSnapshot::from_ids(["1"]), "admin", 2, None);

        let outcome =
            merge_partition(&mut partition, &LiveSnapshot::from_ids(["1", "2"]), "admin", 3, None);

        assert_eq!(outcome.count, 0);
        assert!(outcome.new_ids.is_empty());
        assert_eq!(partition.len(), 2);
    }

    #[test]
    fn test_mark_read_idempotent() {
        let mut partition = vec![
            NotificationItem::unread("1", "admin", 0),
            NotificationItem::unread("2", "admin", 0),
        ];
        assert_eq!(mark_partition_read(&mut partition), 2);
        assert_eq!(mark_partition_read(&mut partition), 0);
    }

    #[test]
    fn test_retention_evicts_only_old_read_absent_items() {
        let policy = RetentionPolicy { max_age_days: 30 };
        let mut partition = vec![
            NotificationItem::unread("old-read", "admin", 0),
            NotificationItem::unread("old-unread", "admin", 0),
            NotificationItem::unread("old-read-live", "admin", 0),
            NotificationItem::unread("fresh-read", "admin", 50 * DAY),
        ];
        partition[0].mark_read();
        partition[2].mark_read();
        partition[3].mark_read();

        let now = 60 * DAY;
        let outcome = merge_partition(
            &mut partition,
            &LiveSnapshot::from_ids(["old-read-live"]),
            "admin",
            now,
            Some(&policy),
        );

        assert_eq!(outcome.evicted, 1);
        assert_eq!(ids(&partition), vec!["old-unread", "old-read-live", "fresh-read"]);
        assert_eq!(partition[1].last_seen_at, Some(now));
    }

    #[test]
    fn test_snapshot_dedups_preserving_order() {
        let snapshot = LiveSnapshot::from_ids(["b", "a", "b", "c"]);
        assert_eq!(snapshot.ids(), ["b", "a", "c"]);
        assert_eq!(snapshot.len(), 3);
    }
}
