use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::model::MetricsSummary;

/// Storage contract for cached metric summaries.
///
/// The prefix operations are part of the contract on purpose: "clear all"
/// must find every stored combination, including ones no longer derivable
/// from active configuration, so a plain get/set/delete store is not enough.
#[allow(async_fn_in_trait)]
pub trait MetricsStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<MetricsSummary>;
    async fn set(&self, key: &str, value: MetricsSummary, ttl: Duration);
    async fn delete(&self, key: &str);
    async fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;
    async fn delete_prefix(&self, prefix: &str);
}

struct StoredEntry {
    data: MetricsSummary,
    expires_at: Instant,
}

/// In-memory store with per-entry expiration.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<MetricsSummary> {
        let entries = self.entries.read().await;
        if let Some(entry) = entries.get(key) {
            if Instant::now() < entry.expires_at {
                return Some(entry.data.clone());
            }
        }
        None
    }

    async fn set(&self, key: &str, value: MetricsSummary, ttl: Duration) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            StoredEntry {
                data: value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    async fn delete(&self, key: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(key);
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let entries = self.entries.read().await;
        let now = Instant::now();
        entries
            .iter()
            .filter(|(key, entry)| {
                key.starts_with(prefix) && entry.expires_at > now
            })
            .map(|(key, _)| key.to_owned())
            .collect()
    }

    async fn delete_prefix(&self, prefix: &str) {
        let mut entries = self.entries.write().await;
        entries.retain(|key, _| !key.starts_with(prefix));
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish()
    }
}
