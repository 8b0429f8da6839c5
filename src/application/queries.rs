use crate::application::cache_hook::entity_key;
use crate::domain::entity::{EntityId, EntityKind, LedgerEntity};
use crate::domain::money::Balance;
use crate::domain::ports::EntityStoreRef;
use crate::error::{LedgerError, Result};
use crate::infrastructure::cache::FailOpenCache;
use std::time::Duration;

/// Read-through access to entities plus out-of-band seeding.
#[derive(Clone)]
pub struct LedgerQueries {
    entities: EntityStoreRef,
    cache: FailOpenCache,
    ttl: Duration,
}

impl LedgerQueries {
    pub fn new(entities: EntityStoreRef, cache: FailOpenCache, ttl: Duration) -> Self {
        Self {
            entities,
            cache,
            ttl,
        }
    }

    /// Cache first; a miss or an undecodable entry falls through to the store.
    ///
    /// The fill is skipped when the key was invalidated while the store was
    /// being read, so a pre-commit snapshot never outlives the commit.
    pub async fn entity(&self, id: EntityId) -> Result<Option<LedgerEntity>> {
        let key = entity_key(id);
        let generation = self.cache.generation(&key);
        if let Some(bytes) = self.cache.get(&key).await {
            match serde_json::from_slice(&bytes) {
                Ok(entity) => return Ok(Some(entity)),
                Err(e) => tracing::warn!(key = %key, error = %e, "discarding undecodable cache entry"),
            }
        }

        let Some(entity) = self.entities.get(id).await? else {
            return Ok(None);
        };
        match serde_json::to_vec(&entity) {
            Ok(bytes) => {
                self.cache
                    .set_if_unchanged(&key, bytes, self.ttl, generation)
                    .await;
            }
            Err(e) => tracing::warn!(key = %key, error = %e, "entity not cached"),
        }
        Ok(Some(entity))
    }

    pub async fn balance(&self, id: EntityId) -> Result<Balance> {
        self.entity(id)
            .await?
            .map(|e| e.balance)
            .ok_or(LedgerError::NotFound(id))
    }

    /// Sum of the balances of the account's active cards.
    pub async fn account_total_balance(&self, account: EntityId) -> Result<Balance> {
        let cards = self.entities.by_owner(account).await?;
        Ok(cards
            .iter()
            .filter(|c| c.kind == EntityKind::Card && c.active)
            .fold(Balance::ZERO, |total, c| total + c.balance))
    }

    /// Creates or replaces entities, invalidating their cached snapshots.
    pub async fn seed(&self, entities: Vec<LedgerEntity>) -> Result<usize> {
        let mut count = 0;
        for entity in entities {
            let key = entity_key(entity.id);
            self.entities.upsert(entity).await?;
            self.cache.delete(&key).await;
            count += 1;
        }
        tracing::info!(count, "entities seeded");
        Ok(count)
    }
}
