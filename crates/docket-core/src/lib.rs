//! Client-side notification aggregation.
//!
//! Polls role-scoped listing endpoints, infers which records are new by diffing
//! id sets against a durable per-category ledger, and exposes de-duplicated
//! unread counts for badges. Processes sharing a profile directory share the
//! ledger and nudge each other to refresh.

pub mod config;
pub mod constants;
pub mod engine;
pub mod models;
pub mod notifier;
pub mod scheduler;
pub mod signals;
pub mod sources;
pub mod store;

pub use config::{CoreConfig, RetentionPolicy};
pub use engine::{LiveSnapshot, MergeOutcome};
pub use models::{ItemStatus, NotificationCategory, NotificationCounts, NotificationItem};
pub use notifier::{CycleReport, Notifier};
pub use scheduler::{FireReason, Scheduler, SchedulerConfig, SchedulerHandle, Trigger};
pub use signals::{LocalSignal, ProfileSignal, SignalError, SignalPort};
pub use sources::{FetchError, HttpFetcher, ListFetcher, Predicate, Role, SourceQuery, SourceRule, SourceTable};
pub use store::{DocumentLock, DocumentStore, FileStore, Ledger, LedgerStore, MemoryStore, StoreError};
