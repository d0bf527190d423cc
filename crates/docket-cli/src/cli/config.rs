use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use docket_core::constants::DEFAULT_PROFILE_DIR;
use docket_core::{CoreConfig, RetentionPolicy, Role, SourceTable};
use serde::{Deserialize, Serialize};

/// CLI configuration that can be loaded from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    /// Base URL of the records backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Session token. Prefer `DOCKET_TOKEN` over storing it in the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    /// Enables ledger eviction of read items unseen for this many days
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_days: Option<u64>,

    /// Replaces the built-in role → source table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<SourceTable>,
}

impl CliConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Fill unset fields from the environment.
    pub fn with_env(mut self) -> Self {
        if let Ok(token) = std::env::var("DOCKET_TOKEN") {
            self.token = Some(token);
        }
        if let Ok(dir) = std::env::var("DOCKET_PROFILE_DIR") {
            self.profile_dir = Some(PathBuf::from(dir));
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("DOCKET_BASE_URL").ok();
        }
        self
    }

    pub fn into_core_config(self) -> CoreConfig {
        let defaults = CoreConfig::default();
        let profile_dir = self.profile_dir.unwrap_or_else(default_profile_dir);
        let base_url = self.base_url.unwrap_or(defaults.base_url);
        let role = self.role.as_deref().map(Role::new).unwrap_or(defaults.role);

        let mut config = CoreConfig::new(profile_dir, base_url, role);
        config.token = self.token;
        if let Some(secs) = self.poll_interval_secs {
            config.poll_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(ms) = self.debounce_ms {
            config.debounce = Duration::from_millis(ms);
        }
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout = Duration::from_secs(secs.max(1));
        }
        config.retention = self
            .retention_days
            .map(|max_age_days| RetentionPolicy { max_age_days });
        if let Some(sources) = self.sources {
            config.sources = sources;
        }
        config
    }
}

pub fn default_profile_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("docket"))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PROFILE_DIR))
}
