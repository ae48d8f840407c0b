use std::future::Future;
use std::time::{Duration, Instant};

/// Single-slot memoization keyed by `K`: a value stays valid for `ttl` and only
/// for the key it was computed with.
///
/// Used by the portal client so that sensors refreshed within one polling
/// window share one meter table download for the same day.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entry: Option<Entry<K, V>>,
}

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    expires_at: Instant,
}

impl<K: PartialEq, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: None }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: &K, now: Instant) -> Option<&V> {
        match &self.entry {
            Some(entry) if entry.key == *key && now <= entry.expires_at => Some(&entry.value),
            _ => None,
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    pub fn insert_at(&mut self, key: K, value: V, now: Instant) {
        self.entry = Some(Entry {
            key,
            value,
            expires_at: now + self.ttl,
        });
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    /// Return the value cached for `key`, or run `compute` and cache its result.
    /// Errors are not cached.
    pub async fn get_or_try_insert_with<F, Fut, E>(&mut self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value.clone());
        }
        let value = compute().await?;
        self.insert(key, value.clone());
        Ok(value)
    }
}
