use crate::constants::{
    DEFAULT_DEBOUNCE_MS, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_PROFILE_DIR,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::sources::{Role, SourceTable};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Opt-in eviction of old, read, no-longer-listed ledger entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicy {
    pub max_age_days: u64,
}

impl RetentionPolicy {
    pub fn max_age_secs(&self) -> u64 {
        self.max_age_days.saturating_mul(24 * 60 * 60)
    }
}

#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Durable state for one installation. Processes sharing it share a ledger.
    pub profile_dir: PathBuf,
    pub base_url: String,
    pub role: Role,
    /// No token, no polling.
    pub token: Option<String>,
    pub poll_interval: Duration,
    /// Quiescence window for trailing-edge debounce.
    pub debounce: Duration,
    pub request_timeout: Duration,
    pub retention: Option<RetentionPolicy>,
    pub sources: SourceTable,
}

impl CoreConfig {
    pub fn new<P: AsRef<Path>>(profile_dir: P, base_url: impl Into<String>, role: Role) -> Self {
        Self {
            profile_dir: profile_dir.as_ref().to_path_buf(),
            base_url: base_url.into(),
            role,
            token: None,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            retention: None,
            sources: SourceTable::default(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// A usable token: present and not blank.
    pub fn auth_token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PROFILE_DIR, "http://localhost:8000", Role::new("staff"))
    }
}
