//! "Something changed, refresh soon" signals.
//!
//! [`LocalSignal`] reaches listeners in the same process. [`ProfileSignal`]
//! reaches every other process sharing the profile directory by rewriting a
//! small signal file with a fresh nonce; a watcher notices the change. A
//! process never hears its own profile signal, the same way a browser tab
//! does not receive storage events for its own writes.

use crate::constants::{SIGNAL_FILE, SIGNAL_WATCH_INTERVAL_MS};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

const SIGNAL_CAPACITY: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("Failed to write signal file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Publish/subscribe port for change announcements.
pub trait SignalPort: Send + Sync {
    fn publish(&self) -> Result<(), SignalError>;

    fn subscribe(&self) -> broadcast::Receiver<()>;
}

#[derive(Clone)]
pub struct LocalSignal {
    tx: broadcast::Sender<()>,
}

impl LocalSignal {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self { tx }
    }
}

impl Default for LocalSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalPort for LocalSignal {
    fn publish(&self) -> Result<(), SignalError> {
        // No receivers is fine: nobody is listening yet.
        let _ = self.tx.send(());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }
}

pub struct ProfileSignal {
    path: PathBuf,
    tx: broadcast::Sender<()>,
    /// Nonce of the last write made by this process.
    own_nonce: Arc<Mutex<Option<String>>>,
    interval: Duration,
}

impl ProfileSignal {
    pub fn new<P: AsRef<Path>>(profile_dir: P) -> Self {
        let (tx, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            path: profile_dir.as_ref().join(SIGNAL_FILE),
            tx,
            own_nonce: Arc::new(Mutex::new(None)),
            interval: Duration::from_millis(SIGNAL_WATCH_INTERVAL_MS),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Starts watching the signal file until `cancel_rx` flips to `true`.
    pub fn spawn_watcher(&self, mut cancel_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        let path = self.path.clone();
        let tx = self.tx.clone();
        let own_nonce = self.own_nonce.clone();
        let interval = self.interval;

        tokio::spawn(async move {
            let mut last_seen = read_nonce(&path);

            loop {
                tokio::select! {
                    changed = cancel_rx.changed() => {
                        if changed.is_err() || *cancel_rx.borrow() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(interval) => {
                        let current = read_nonce(&path);
                        if current == last_seen {
                            continue;
                        }
                        let is_own = current.is_some() && *own_nonce.lock() == current;
                        last_seen = current;
                        if !is_own {
                            tracing::debug!("signal: change announced by another process");
                            let _ = tx.send(());
                        }
                    }
                }
            }
        })
    }
}

fn read_nonce(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl SignalPort for ProfileSignal {
    fn publish(&self) -> Result<(), SignalError> {
        let nonce = uuid::Uuid::new_v4().to_string();
        let write_err = |source: std::io::Error| SignalError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(write_err)?;
        }
        *self.own_nonce.lock() = Some(nonce.clone());
        std::fs::write(&self.path, &nonce).map_err(write_err)
    }

    fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }
}
