//! Application-wide constants
//!
//! Storage keys, signal names and timing defaults shared by the core and the CLI.

/// Profile directory used when none is configured
pub const DEFAULT_PROFILE_DIR: &str = "docket_profile";

/// Document key of the persisted ledger inside the profile
pub const LEDGER_KEY: &str = "notification_ledger";

/// File written by any process that wants every process on the profile to refresh
pub const SIGNAL_FILE: &str = "docket.signal";

// Scheduler defaults
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// How often the cross-process signal file is checked
pub const SIGNAL_WATCH_INTERVAL_MS: u64 = 250;

// Transport
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
