//! Trailing-edge debounced scheduler.
//!
//! Every trigger source (background timer, in-process signal, cross-process
//! signal, manual refresh) feeds the same channel. A burst of triggers closer
//! together than the quiescence window collapses into one cycle fired one
//! window after the last trigger. The periodic timer is not debounced, but a
//! tick that lands while a debounced cycle is pending is absorbed by it.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// In-process "something changed" signal.
    Local,
    /// Another process on the same profile announced a change.
    CrossProcess,
    /// Explicit refresh request from the UI.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireReason {
    Debounced,
    Timer,
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub debounce: Duration,
    /// `None` disables the background timer.
    pub period: Option<Duration>,
}

/// Cloneable trigger endpoint. Triggers sent after shutdown are dropped.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<Trigger>,
}

impl SchedulerHandle {
    pub fn trigger(&self, trigger: Trigger) {
        if self.tx.send(trigger).is_err() {
            tracing::debug!("scheduler: trigger {:?} after shutdown ignored", trigger);
        }
    }
}

pub struct Scheduler {
    handle: SchedulerHandle,
    cancel_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawns the scheduling loop on the current tokio runtime. `fire` must not
    /// block; it is expected to hand the cycle off to its own task.
    pub fn spawn<F>(config: SchedulerConfig, fire: F) -> Self
    where
        F: Fn(FireReason) + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(run_loop(config, rx, cancel_rx, fire));

        Self {
            handle: SchedulerHandle { tx },
            cancel_tx,
            task: Some(task),
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    pub fn trigger(&self, trigger: Trigger) {
        self.handle.trigger(trigger);
    }

    /// Cancels any pending debounced cycle. Cycles already fired are not affected.
    pub fn shutdown(&mut self) {
        let _ = self.cancel_tx.send(true);
        self.task.take();
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_loop<F>(
    config: SchedulerConfig,
    mut rx: mpsc::UnboundedReceiver<Trigger>,
    mut cancel_rx: watch::Receiver<bool>,
    fire: F,
) where
    F: Fn(FireReason),
{
    let mut ticker = config.period.map(|period| {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            biased;

            changed = cancel_rx.changed() => {
                if changed.is_err() || *cancel_rx.borrow() {
                    if deadline.is_some() {
                        tracing::debug!("scheduler: shutdown cancelled a pending cycle");
                    }
                    break;
                }
            }
            trigger = rx.recv() => {
                let Some(trigger) = trigger else { break };
                tracing::trace!("scheduler: {:?} trigger, restarting quiescence window", trigger);
                deadline = Some(Instant::now() + config.debounce);
            }
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                fire(FireReason::Debounced);
            }
            _ = next_tick(&mut ticker) => {
                if deadline.is_some() {
                    tracing::trace!("scheduler: timer tick absorbed by pending cycle");
                } else {
                    fire(FireReason::Timer);
                }
            }
        }
    }
}

fn next_tick(ticker: &mut Option<Interval>) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
    match ticker {
        Some(ticker) => Box::pin(async move {
            ticker.tick().await;
        }),
        None => Box::pin(std::future::pending()),
    }
}
