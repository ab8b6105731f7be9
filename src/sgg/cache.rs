use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde_json::Value;

use super::ProxyError;

#[derive(Debug, Clone)]
struct Entry {
    fetched: Instant,
    data: Value,
}

/// Bounded TTL cache of upstream responses with a per-key fetch gate.
///
/// When full, expired entries are purged first and then the entry fetched
/// longest ago is evicted.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<String, Entry>>,
    inflight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            entries: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<Value> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|e| now.duration_since(e.fetched) < self.ttl)
            .map(|e| e.data.clone())
    }

    pub fn insert(&self, key: String, data: Value) {
        self.insert_at(key, data, Instant::now())
    }

    fn insert_at(&self, key: String, data: Value, now: Instant) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            let ttl = self.ttl;
            entries.retain(|_, e| now.duration_since(e.fetched) < ttl);

            if entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.fetched)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(key, Entry { fetched: now, data });
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the fresh entry for `key` or runs `fetch` to fill it. Only one
    /// caller per key runs `fetch` at a time; the others wait and then read
    /// what it stored. Errors are returned to the fetching caller and never
    /// cached.
    pub async fn get_or_fetch<F, Fut>(&self, key: String, fetch: F) -> Result<Value, ProxyError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, ProxyError>>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }

        let gate = self.gate(&key);
        let guard = gate.lock().await;

        let result = match self.get(&key) {
            Some(hit) => Ok(hit),
            None => {
                let fetched = fetch().await;
                if let Ok(data) = &fetched {
                    self.insert(key.clone(), data.clone());
                }
                fetched
            }
        };

        drop(guard);
        self.release(&key, &gate);
        result
    }

    fn gate(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        inflight.entry(key.to_string()).or_default().clone()
    }

    /// Drops the gate once no other caller holds a handle to it. Handles are
    /// only cloned under the `inflight` lock, so the count is stable here.
    fn release(&self, key: &str, gate: &Arc<tokio::sync::Mutex<()>>) {
        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = inflight
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, gate) && Arc::strong_count(gate) <= 2);
        if idle {
            inflight.remove(key);
        }
    }

    #[cfg(test)]
    fn inflight_len(&self) -> usize {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
