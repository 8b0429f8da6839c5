use crate::domain::entity::EntityId;
use crate::sync::KeyedMutex;
use tokio::sync::OwnedMutexGuard;

/// Exclusive access to one or more entities, released on drop.
pub struct EntityToken {
    _guards: Vec<OwnedMutexGuard<()>>,
}

/// Serializes in-process operations that touch the same entity before they
/// reach the store.
///
/// Sits above the store's row locks and never replaces them: other processes
/// only see the store. Tokens are created on first use and kept forever, so
/// memory grows with the number of distinct entities seen.
#[derive(Debug, Default)]
pub struct ConcurrencyCoordinator {
    tokens: KeyedMutex<EntityId>,
}

impl ConcurrencyCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until `id` is free. Never fails.
    pub async fn acquire(&self, id: EntityId) -> EntityToken {
        self.acquire_all(&[id]).await
    }

    /// Acquires every id in canonical (ascending) order, independent of the
    /// order given, so two operations over the same pair cannot wait on each
    /// other in a cycle. Duplicate ids are locked once.
    pub async fn acquire_all(&self, ids: &[EntityId]) -> EntityToken {
        let mut ordered = ids.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for id in &ordered {
            guards.push(self.tokens.lock(id).await);
        }
        tracing::trace!(entities = ordered.len(), "coordinator tokens acquired");
        EntityToken { _guards: guards }
    }

    /// Number of entities a token was ever created for.
    pub fn tracked(&self) -> usize {
        self.tokens.len()
    }
}

/// Returns the pair in canonical lock order.
pub fn canonical_pair(a: EntityId, b: EntityId) -> (EntityId, EntityId) {
    if a <= b { (a, b) } else { (b, a) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_opposite_orders_do_not_deadlock() {
        let coordinator = Arc::new(ConcurrencyCoordinator::new());
        let (a, b) = (EntityId::new(), EntityId::new());

        let mut handles = Vec::new();
        for i in 0..50 {
            let coordinator = coordinator.clone();
            let ids = if i % 2 == 0 { [a, b] } else { [b, a] };
            handles.push(tokio::spawn(async move {
                let _token = coordinator.acquire_all(&ids).await;
                tokio::task::yield_now().await;
            }));
        }

        tokio::time::timeout(Duration::from_secs(5), async {
            for handle in handles {
                handle.await.unwrap();
            }
        })
        .await
        .expect("opposite-order acquisitions deadlocked");
        assert_eq!(coordinator.tracked(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_ids_locked_once() {
        let coordinator = ConcurrencyCoordinator::new();
        let id = EntityId::new();
        let _token = coordinator.acquire_all(&[id, id]).await;
    }

    #[tokio::test]
    async fn test_token_released_on_drop() {
        let coordinator = ConcurrencyCoordinator::new();
        let id = EntityId::new();
        drop(coordinator.acquire(id).await);
        tokio::time::timeout(Duration::from_millis(100), coordinator.acquire(id))
            .await
            .expect("token was not released");
    }

    #[test]
    fn test_canonical_pair() {
        let (a, b) = (EntityId::new(), EntityId::new());
        assert_eq!(canonical_pair(a, b), canonical_pair(b, a));
    }
}
