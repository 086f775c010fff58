//! Proactive cache refresh.
//!
//! Keeps the summary cache warm so live requests never pay cold-fetch
//! latency: a periodic task replays every known `(account, window)`
//! combination through the regular cache path. Targets come from static
//! configuration plus whatever combinations already exist in the store, so
//! once a combination has been requested it keeps getting refreshed.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::interval;
use tracing::{debug, error, info};

use crate::{
    cache::MetricsStore,
    cache_keys::{sanitize_account, sanitize_window, DEFAULT_WINDOW},
    configuration::{AppState, State},
    error::Error,
    metrics::{FetchContext, Metrics},
    model::PrewarmTarget,
    provider::{FetchCycle, Transport},
};

/// Combine configured and store-discovered targets, sanitized and
/// deduplicated in first-seen order. An empty or fully invalid configured
/// list falls back to the single default target (all accounts, 12 months).
pub fn plan_targets(
    configured: &[PrewarmTarget],
    discovered: &[PrewarmTarget],
) -> Vec<PrewarmTarget> {
    let mut targets: Vec<PrewarmTarget> = configured
        .iter()
        .map(|t| PrewarmTarget {
            account: sanitize_account(t.account.as_deref()),
            window: sanitize_window(&t.window).to_owned(),
        })
        .collect();

    if targets.is_empty() {
        targets.push(PrewarmTarget {
            account: None,
            window: DEFAULT_WINDOW.to_owned(),
        });
    }

    targets.extend(discovered.iter().cloned());

    let mut seen = HashSet::new();
    targets
        .into_iter()
        .filter(|t| {
            seen.insert(format!(
                "{}|{}",
                t.account.as_deref().unwrap_or("all"),
                t.window
            ))
        })
        .collect()
}

/// Refresh every planned target once. Already-fresh entries are cheap
/// no-ops (no forced refresh); failures are logged per target and never
/// abort the remaining ones. Returns `(succeeded, failed)`.
pub async fn prewarm_run<S: MetricsStore, T: Transport>(
    metrics: &Metrics<S, T>,
    configured: &[PrewarmTarget],
) -> (usize, usize) {
    let discovered = metrics.warmed_targets().await;
    let targets = plan_targets(configured, &discovered);

    debug!("prewarming {} targets", targets.len());

    let mut succeeded = 0;
    let mut failed = 0;

    for target in &targets {
        // Fresh budget per target: one slow combination must not starve
        // the rest of the run.
        let mut cycle = FetchCycle::new();
        let result = metrics
            .get_summary(
                target.account.as_deref(),
                &target.window,
                false,
                FetchContext::Prewarm,
                &mut cycle,
            )
            .await;

        match result {
            Ok(_) => succeeded += 1,
            Err(e) => {
                failed += 1;
                error!(
                    "prewarm failed for account={} window={}: {}",
                    target.account.as_deref().unwrap_or("all"),
                    target.window,
                    e
                );
            },
        }
    }

    (succeeded, failed)
}

/// Background prewarm loop, driven by the configured interval (hourly by
/// default). The first tick fires immediately, which doubles as the
/// startup cache population.
pub async fn prewarm_task(app_state: AppState<State>) -> Result<(), Error> {
    let interval_secs = app_state.config.prewarm_interval_secs;
    info!("starting prewarm task (interval={}s)", interval_secs);

    let mut tick = interval(Duration::from_secs(interval_secs));

    loop {
        tick.tick().await;

        let (succeeded, failed) = prewarm_run(
            &app_state.metrics,
            &app_state.config.prewarm_targets,
        )
        .await;
        info!(
            "prewarm cycle complete: {} refreshed, {} failed",
            succeeded, failed
        );
    }
}
