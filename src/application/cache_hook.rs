use crate::domain::entity::EntityId;
use crate::infrastructure::cache::FailOpenCache;

/// Cache key of an entity snapshot.
pub fn entity_key(id: EntityId) -> String {
    format!("entity:{id}")
}

/// Invalidates cached entity snapshots after a committed balance change.
///
/// Invalidation is fail-open; a stale entry left behind by a failed delete
/// expires with its TTL.
#[derive(Clone)]
pub struct CacheCoherence {
    cache: FailOpenCache,
}

impl CacheCoherence {
    pub fn new(cache: FailOpenCache) -> Self {
        Self { cache }
    }

    pub async fn invalidate(&self, ids: &[EntityId]) {
        for id in ids {
            self.cache.delete(&entity_key(*id)).await;
        }
        tracing::debug!(entities = ids.len(), "cache entries invalidated");
    }
}
