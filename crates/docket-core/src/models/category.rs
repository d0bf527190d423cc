use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An independent notification channel. Each category has its own ledger
/// partition and its own source query per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationCategory {
    PendingAccounts,
    UnreadChats,
    NewRequests,
    NewObjections,
    ActivityLogs,
    NewMedia,
}

impl NotificationCategory {
    pub const ALL: [NotificationCategory; 6] = [
        NotificationCategory::PendingAccounts,
        NotificationCategory::UnreadChats,
        NotificationCategory::NewRequests,
        NotificationCategory::NewObjections,
        NotificationCategory::ActivityLogs,
        NotificationCategory::NewMedia,
    ];

    /// Key used in the persisted ledger document and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::PendingAccounts => "pending-accounts",
            NotificationCategory::UnreadChats => "unread-chats",
            NotificationCategory::NewRequests => "new-requests",
            NotificationCategory::NewObjections => "new-objections",
            NotificationCategory::ActivityLogs => "activity-logs",
            NotificationCategory::NewMedia => "new-media",
        }
    }
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown notification category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for NotificationCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}
