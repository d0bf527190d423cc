//! The read/unread history of every item ever observed, per category.
//!
//! Persisted as a single flat JSON object with one array per category:
//!
//! ```json
//! {
//!   "new-requests": [
//!     { "id": "41", "status": "unread", "observedByRole": "admin", "firstSeenAt": 1700000000 }
//!   ]
//! }
//! ```
//!
//! Parsing is lenient: a corrupt document yields an empty ledger, unknown keys
//! are ignored, malformed entries are skipped and duplicate ids keep the first
//! occurrence.

use crate::models::{NotificationCategory, NotificationItem};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    partitions: BTreeMap<NotificationCategory, Vec<NotificationItem>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Items in discovery order. Empty for a category never polled.
    pub fn partition(&self, category: NotificationCategory) -> &[NotificationItem] {
        self.partitions
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn partition_mut(&mut self, category: NotificationCategory) -> &mut Vec<NotificationItem> {
        self.partitions.entry(category).or_default()
    }

    pub fn get(&self, category: NotificationCategory, id: &str) -> Option<&NotificationItem> {
        self.partition(category).iter().find(|i| i.id == id)
    }

    pub fn unread_count(&self, category: NotificationCategory) -> usize {
        self.partition(category).iter().filter(|i| i.is_unread()).count()
    }

    pub fn len(&self) -> usize {
        self.partitions.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_document(&self) -> Result<String, serde_json::Error> {
        let mut full: BTreeMap<&'static str, &[NotificationItem]> = BTreeMap::new();
        for category in NotificationCategory::ALL {
            full.insert(category.as_str(), self.partition(category));
        }
        serde_json::to_string_pretty(&full)
    }

    pub fn from_document(document: &str) -> Self {
        let raw: serde_json::Map<String, serde_json::Value> = match serde_json::from_str(document) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(_) => {
                tracing::warn!("ledger: document is not an object, starting empty");
                return Self::new();
            }
            Err(e) => {
                tracing::warn!("ledger: corrupt document ({}), starting empty", e);
                return Self::new();
            }
        };

        let mut ledger = Self::new();
        for (key, value) in raw {
            let Ok(category) = key.parse::<NotificationCategory>() else {
                tracing::debug!("ledger: ignoring unknown partition '{}'", key);
                continue;
            };
            let serde_json::Value::Array(entries) = value else {
                tracing::warn!("ledger: partition '{}' is not an array, resetting it", key);
                continue;
            };

            let mut seen = HashSet::new();
            let partition = ledger.partition_mut(category);
            for entry in entries {
                match serde_json::from_value::<NotificationItem>(entry) {
                    Ok(item) if seen.insert(item.id.clone()) => partition.push(item),
                    Ok(item) => {
                        tracing::debug!("ledger: dropping duplicate id {} in {}", item.id, key)
                    }
                    Err(e) => tracing::debug!("ledger: skipping malformed entry in {}: {}", key, e),
                }
            }
        }
        ledger
    }
}
