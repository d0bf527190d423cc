use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Unread,
    Read,
}

/// One record observed in a category's listing.
///
/// `id` is the backend identifier of the underlying record and is unique within
/// its category. `status` only ever moves from `Unread` to `Read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationItem {
    pub id: String,
    pub status: ItemStatus,
    #[serde(default)]
    pub observed_by_role: String,
    #[serde(default)]
    pub first_seen_at: u64,
    /// Last poll that reported this id. Only consulted by the retention policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<u64>,
}

impl NotificationItem {
    pub fn unread(id: impl Into<String>, role: &str, now: u64) -> Self {
        Self {
            id: id.into(),
            status: ItemStatus::Unread,
            observed_by_role: role.to_string(),
            first_seen_at: now,
            last_seen_at: Some(now),
        }
    }

    pub fn is_unread(&self) -> bool {
        self.status == ItemStatus::Unread
    }

    /// Returns true if the status changed.
    pub fn mark_read(&mut self) -> bool {
        if self.is_unread() {
            self.status = ItemStatus::Read;
            true
        } else {
            false
        }
    }

    pub fn last_touched(&self) -> u64 {
        self.last_seen_at.unwrap_or(self.first_seen_at)
    }
}
