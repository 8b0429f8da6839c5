use crate::domain::ports::{CacheBackend, CacheBackendRef};
use crate::error::Result;
use crate::sync::KeyedMutex;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// In-process cache with per-key expiry.
#[derive(Default, Clone)]
pub struct InMemoryCache {
    entries: Arc<RwLock<HashMap<String, (Vec<u8>, Instant)>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, key: &str) -> bool {
        matches!(self.get(key).await, Ok(Some(_)))
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, expires_at)| *expires_at > Instant::now());
        entries.insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Wraps a backend so that every failure degrades to a miss or a no-op.
///
/// A miss is always safe: readers fall through to the store of record.
///
/// Every `delete` bumps a per-key generation. A read-through fill records the
/// generation before reading the store and is dropped by
/// [`set_if_unchanged`](Self::set_if_unchanged) if an invalidation happened in
/// between, so a snapshot older than a committed change is never written back.
/// Deletes and fills of one key are serialized.
#[derive(Clone)]
pub struct FailOpenCache {
    backend: Option<CacheBackendRef>,
    generations: Arc<Mutex<HashMap<String, u64>>>,
    writers: Arc<KeyedMutex<String>>,
}

impl FailOpenCache {
    pub fn new(backend: CacheBackendRef) -> Self {
        Self::with_backend(Some(backend))
    }

    /// A cache that is never hit.
    pub fn disabled() -> Self {
        Self::with_backend(None)
    }

    fn with_backend(backend: Option<CacheBackendRef>) -> Self {
        Self {
            backend,
            generations: Arc::default(),
            writers: Arc::default(),
        }
    }

    /// Current invalidation generation of `key`.
    pub fn generation(&self, key: &str) -> u64 {
        let generations = self.generations.lock().unwrap_or_else(PoisonError::into_inner);
        generations.get(key).copied().unwrap_or(0)
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let backend = self.backend.as_ref()?;
        match backend.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache get failed, treating as miss");
                None
            }
        }
    }

    /// Stores `value` unless `key` was invalidated since `generation` was read.
    /// Returns whether the value was handed to the backend.
    pub async fn set_if_unchanged(&self, key: &str, value: Vec<u8>, ttl: Duration, generation: u64) -> bool {
        let Some(backend) = &self.backend else {
            return false;
        };
        let _writer = self.writers.lock(&key.to_string()).await;
        if self.generation(key) != generation {
            tracing::debug!(key, "cache fill skipped, entry invalidated meanwhile");
            return false;
        }
        if let Err(e) = backend.set(key, value, ttl).await {
            tracing::warn!(key, error = %e, "cache set failed");
        }
        true
    }

    pub async fn delete(&self, key: &str) {
        let _writer = self.writers.lock(&key.to_string()).await;
        {
            let mut generations = self.generations.lock().unwrap_or_else(PoisonError::into_inner);
            *generations.entry(key.to_string()).or_default() += 1;
        }
        let Some(backend) = &self.backend else {
            return;
        };
        if let Err(e) = backend.delete(key).await {
            tracing::warn!(key, error = %e, "cache delete failed");
        }
    }
}
