use std::time::Duration;
use tracing::debug;

use crate::{
    aggregate::aggregate,
    cache::MetricsStore,
    cache_keys::{
        build_metrics_cache_key, parse_metrics_cache_key, sanitize_account,
        sanitize_window, METRICS_PREFIX, WINDOWS,
    },
    error::Error,
    model::{MetricsSummary, PrewarmTarget},
    provider::{FetchCycle, LeadsApi, Transport},
};

/// TTL applied when the setting is absent or below the floor.
pub const DEFAULT_CACHE_MINUTES: u64 = 60;

/// Settings below this many minutes are treated as unset.
pub const MIN_CACHE_MINUTES: u64 = 5;

const MIN_CACHE_TTL_SECS: u64 = 300;

/// Execution context of a summary request. Interactive contexts (editor
/// previews) must never pay for a live upstream fetch; the prewarm task
/// explicitly bypasses that guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchContext {
    Live,
    Interactive,
    Prewarm,
}

/// Resolve the configured cache length to a storage TTL.
pub fn resolve_cache_ttl(minutes: Option<u64>) -> Duration {
    let minutes = match minutes {
        Some(m) if m >= MIN_CACHE_MINUTES => m,
        _ => DEFAULT_CACHE_MINUTES,
    };
    Duration::from_secs((minutes * 60).max(MIN_CACHE_TTL_SECS))
}

/// Cached metric summaries over the fetch-aggregate pipeline.
#[derive(Debug)]
pub struct Metrics<S, T> {
    store: S,
    api: LeadsApi<T>,
    cache_minutes: Option<u64>,
}

impl<S: MetricsStore, T: Transport> Metrics<S, T> {
    pub fn new(
        store: S,
        api: LeadsApi<T>,
        cache_minutes: Option<u64>,
    ) -> Self {
        Metrics {
            store,
            api,
            cache_minutes,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        resolve_cache_ttl(self.cache_minutes)
    }

    pub fn is_configured(&self) -> bool {
        self.api.is_configured()
    }

    #[cfg(test)]
    pub fn api(&self) -> &LeadsApi<T> {
        &self.api
    }

    /// Return the summary for a `(account, window)` pair, fetching and
    /// aggregating on a cache miss. Selectors are sanitized here; the fetch
    /// always sees the sanitized values. Fetch errors propagate untouched
    /// and are never written to the store.
    pub async fn get_summary(
        &self,
        account: Option<&str>,
        window: &str,
        force_refresh: bool,
        ctx: FetchContext,
        cycle: &mut FetchCycle,
    ) -> Result<MetricsSummary, Error> {
        let account = sanitize_account(account);
        let window = sanitize_window(window);
        let key = build_metrics_cache_key(account.as_deref(), window);

        if !force_refresh {
            if let Some(cached) = self.store.get(&key).await {
                debug!("cache hit for {}", key);
                return Ok(cached);
            }
        }

        // Interactive contexts never wait on the upstream API.
        if ctx == FetchContext::Interactive {
            return Err(Error::Skipped);
        }

        let leads =
            self.api.fetch_leads(account.as_deref(), window, cycle).await?;
        let summary = aggregate(&leads);

        self.store.set(&key, summary.clone(), self.cache_ttl()).await;
        debug!(
            "cached {} leads as {} (ttl {:?})",
            summary.total_leads,
            key,
            self.cache_ttl()
        );

        Ok(summary)
    }

    /// Drop the cached summaries for one account scope across every window.
    pub async fn clear_cache(&self, account: Option<&str>) {
        let account = sanitize_account(account);
        for window in WINDOWS {
            let key = build_metrics_cache_key(account.as_deref(), window);
            self.store.delete(&key).await;
        }
    }

    /// Drop every key in the metrics namespace. Enumerates the store rather
    /// than iterating known selector combinations, so stale combinations no
    /// longer in active use are removed too.
    pub async fn clear_all(&self) {
        self.store.delete_prefix(METRICS_PREFIX).await;
    }

    /// Decode the `(account, window)` pairs currently present in the store.
    pub async fn warmed_targets(&self) -> Vec<PrewarmTarget> {
        self.store
            .keys_with_prefix(METRICS_PREFIX)
            .await
            .iter()
            .filter_map(|key| parse_metrics_cache_key(key))
            .map(|(account, window)| PrewarmTarget { account, window })
            .collect()
    }

    pub async fn test_connection(
        &self,
        cycle: &mut FetchCycle,
    ) -> Result<(), Error> {
        self.api.test_connection(cycle).await
    }
}
