//! Role-scoped source table.
//!
//! Which categories a role polls, and with which filter, is plain data. Adding
//! a role or changing a filter means editing the table (or the config file
//! that overrides it), never the merge engine.

pub mod http;

pub use http::{FetchError, HttpFetcher, ListFetcher};

use crate::models::NotificationCategory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Role names are case-insensitive and stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct Role(String);

impl Role {
    pub fn new(name: &str) -> Self {
        Self(name.trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Role {
    fn from(name: String) -> Self {
        Self::new(&name)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Filter applied to a listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Predicate {
    All,
    Unassigned,
    AssignedToMe,
    /// Assigned to the caller, or unassigned and forwarded to their office.
    AssignedToMeOrForwarded,
    OwnedByMe,
    Unread,
    Status(String),
}

impl Predicate {
    fn params(&self) -> Vec<(String, String)> {
        let pair = |k: &str, v: &str| (k.to_string(), v.to_string());
        match self {
            Predicate::All => Vec::new(),
            Predicate::Unassigned => vec![pair("assigned_to", "none")],
            Predicate::AssignedToMe => vec![pair("assigned_to", "me")],
            Predicate::AssignedToMeOrForwarded => {
                vec![pair("assigned_to", "me"), pair("include", "forwarded_unassigned")]
            }
            Predicate::OwnedByMe => vec![pair("owner", "me")],
            Predicate::Unread => vec![pair("unread", "true")],
            Predicate::Status(status) => vec![pair("status", status)],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRule {
    pub category: NotificationCategory,
    pub path: String,
    #[serde(default)]
    pub filters: Vec<Predicate>,
}

impl SourceRule {
    pub fn new(category: NotificationCategory, path: &str, filters: Vec<Predicate>) -> Self {
        Self {
            category,
            path: path.to_string(),
            filters,
        }
    }

    pub fn query(&self) -> SourceQuery {
        SourceQuery {
            category: self.category,
            path: self.path.clone(),
            params: self.filters.iter().flat_map(Predicate::params).collect(),
        }
    }
}

/// One request to issue in a poll cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceQuery {
    pub category: NotificationCategory,
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl SourceQuery {
    pub fn url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.path.trim_start_matches('/'))
    }
}

/// Role → ordered source rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceTable {
    roles: BTreeMap<Role, Vec<SourceRule>>,
}

impl SourceTable {
    pub fn empty() -> Self {
        Self {
            roles: BTreeMap::new(),
        }
    }

    pub fn with_role(mut self, role: &str, rules: Vec<SourceRule>) -> Self {
        self.roles.insert(Role::new(role), rules);
        self
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.keys()
    }

    pub fn rules(&self, role: &Role) -> &[SourceRule] {
        self.roles.get(role).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn polls(&self, role: &Role, category: NotificationCategory) -> bool {
        self.rules(role).iter().any(|r| r.category == category)
    }

    /// Queries for one cycle. Nothing is polled without a non-blank token or
    /// for a role the table doesn't know.
    pub fn queries(&self, role: &Role, token: Option<&str>) -> Vec<SourceQuery> {
        if token.map_or(true, |t| t.trim().is_empty()) {
            return Vec::new();
        }

        let mut seen = Vec::new();
        self.rules(role)
            .iter()
            .filter(|rule| {
                // First rule per category wins; a category maps to one listing.
                if seen.contains(&rule.category) {
                    tracing::warn!("sources: duplicate rule for {} in role {}", rule.category, role);
                    false
                } else {
                    seen.push(rule.category);
                    true
                }
            })
            .map(SourceRule::query)
            .collect()
    }
}

impl Default for SourceTable {
    fn default() -> Self {
        use NotificationCategory::*;
        use Predicate::*;

        Self::empty()
            .with_role(
                "admin",
                vec![
                    SourceRule::new(PendingAccounts, "/api/accounts", vec![Status("pending".into())]),
                    SourceRule::new(UnreadChats, "/api/chats", vec![Unread]),
                    SourceRule::new(NewRequests, "/api/requests", vec![Unassigned, Status("new".into())]),
                    SourceRule::new(NewObjections, "/api/objections", vec![Unassigned]),
                    SourceRule::new(ActivityLogs, "/api/activity-logs", vec![All]),
                    SourceRule::new(NewMedia, "/api/media", vec![All]),
                ],
            )
            .with_role(
                "records-officer",
                vec![
                    SourceRule::new(UnreadChats, "/api/chats", vec![Unread]),
                    SourceRule::new(NewRequests, "/api/requests", vec![AssignedToMeOrForwarded]),
                    SourceRule::new(NewObjections, "/api/objections", vec![AssignedToMe]),
                    SourceRule::new(NewMedia, "/api/media", vec![AssignedToMe]),
                ],
            )
            .with_role(
                "staff",
                vec![
                    SourceRule::new(UnreadChats, "/api/chats", vec![Unread]),
                    SourceRule::new(NewRequests, "/api/requests", vec![AssignedToMe]),
                ],
            )
            .with_role(
                "requester",
                vec![
                    SourceRule::new(UnreadChats, "/api/chats", vec![Unread]),
                    SourceRule::new(NewMedia, "/api/media", vec![OwnedByMe]),
                ],
            )
    }
}
