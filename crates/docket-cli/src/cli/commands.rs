use std::sync::Arc;

use anyhow::{Context, Result};
use docket_core::{
    CoreConfig, CycleReport, FileStore, LedgerStore, NotificationCategory, NotificationCounts,
    Notifier, ProfileSignal, Role, SignalPort,
};
use serde_json::json;

use super::print_json;

fn counts_json(counts: &NotificationCounts) -> serde_json::Value {
    json!({
        "counts": counts,
        "total": counts.total(),
    })
}

fn report_json(report: &CycleReport) -> serde_json::Value {
    json!({
        "polled": report.polled,
        "failed": report.failed,
        "newItems": report.new_items,
    })
}

fn ledger_store(config: &CoreConfig) -> LedgerStore {
    LedgerStore::new(Arc::new(FileStore::new(&config.profile_dir)))
}

/// Poll on schedule and on signals, printing counts whenever they change.
pub async fn run_watch(config: CoreConfig, pretty: bool) -> Result<()> {
    if config.auth_token().is_none() {
        anyhow::bail!("No auth token configured (set DOCKET_TOKEN or \"token\" in the config file)");
    }

    let mut notifier = Notifier::from_config(config).context("Failed to build HTTP client")?;
    let mut counts_rx = notifier.subscribe();
    notifier.start();
    tracing::info!(
        "watching as role '{}' (profile {})",
        notifier.config().role,
        notifier.config().profile_dir.display()
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = counts_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let counts = counts_rx.borrow_and_update().clone();
                print_json(&counts_json(&counts), pretty);
            }
        }
    }

    notifier.shutdown();
    Ok(())
}

/// Run a single cycle.
pub async fn run_poll(config: CoreConfig, pretty: bool) -> Result<()> {
    if config.auth_token().is_none() {
        anyhow::bail!("No auth token configured (set DOCKET_TOKEN or \"token\" in the config file)");
    }

    let notifier = Notifier::from_config(config).context("Failed to build HTTP client")?;
    let report = notifier.poll_now().await;

    let mut output = counts_json(&notifier.counts());
    output["cycle"] = report_json(&report);
    print_json(&output, pretty);
    Ok(())
}

/// Mark a category read in the profile ledger and nudge other processes.
pub fn run_clear(config: &CoreConfig, category: NotificationCategory, pretty: bool) -> Result<()> {
    let marked = ledger_store(config)
        .mark_read(category)
        .with_context(|| format!("Failed to persist read state for {}", category))?;

    if let Err(e) = ProfileSignal::new(&config.profile_dir).publish() {
        tracing::warn!("cleared {} but could not signal other processes: {}", category, e);
    }

    print_json(&json!({ "category": category, "marked": marked }), pretty);
    Ok(())
}

/// Announce a change to every process watching this profile.
pub fn run_signal(config: &CoreConfig, pretty: bool) -> Result<()> {
    let signal = ProfileSignal::new(&config.profile_dir);
    signal.publish().context("Failed to publish refresh signal")?;
    print_json(&json!({ "signalled": signal.path().display().to_string() }), pretty);
    Ok(())
}

pub fn run_ledger(config: &CoreConfig, pretty: bool) -> Result<()> {
    let ledger = ledger_store(config).load();

    let mut partitions = serde_json::Map::new();
    for category in NotificationCategory::ALL {
        partitions.insert(
            category.to_string(),
            json!({
                "items": ledger.partition(category).len(),
                "unread": ledger.unread_count(category),
            }),
        );
    }

    print_json(
        &json!({
            "profile": config.profile_dir.display().to_string(),
            "partitions": partitions,
        }),
        pretty,
    );
    Ok(())
}

pub fn run_sources(config: &CoreConfig, role: Option<&str>, pretty: bool) -> Result<()> {
    let role = role.map(Role::new).unwrap_or_else(|| config.role.clone());
    let rules = config.sources.rules(&role);
    if rules.is_empty() {
        let known: Vec<_> = config.sources.roles().map(Role::to_string).collect();
        anyhow::bail!("Role '{}' polls nothing (known roles: {})", role, known.join(", "));
    }

    let queries: Vec<_> = rules
        .iter()
        .map(|rule| {
            let query = rule.query();
            json!({
                "category": query.category,
                "url": query.url(&config.base_url),
                "params": query.params,
            })
        })
        .collect();

    print_json(&json!({ "role": role, "queries": queries }), pretty);
    Ok(())
}
