use super::NotificationCategory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Badge counts, one entry per category.
///
/// Never mutated incrementally by a poll: each cycle derives a fresh value from
/// the ledger and the live snapshots and publishes it in one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationCounts(BTreeMap<NotificationCategory, usize>);

impl NotificationCounts {
    pub fn zero() -> Self {
        Self(
            NotificationCategory::ALL
                .iter()
                .map(|c| (*c, 0))
                .collect(),
        )
    }

    pub fn get(&self, category: NotificationCategory) -> usize {
        self.0.get(&category).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NotificationCategory, usize)> + '_ {
        self.0.iter().map(|(c, n)| (*c, *n))
    }

    /// Copy of `self` with `category` replaced.
    pub fn with(&self, category: NotificationCategory, count: usize) -> Self {
        let mut next = self.clone();
        next.0.insert(category, count);
        next
    }
}

impl Default for NotificationCounts {
    fn default() -> Self {
        Self::zero()
    }
}
