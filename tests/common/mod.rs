#![allow(dead_code)]

use ledgerflow::application::engine::{LedgerEngine, Stores};
use ledgerflow::config::EngineConfig;
use ledgerflow::domain::entity::{EntityId, LedgerEntity};
use ledgerflow::domain::money::Balance;
use ledgerflow::domain::operation::OperationRecord;
use ledgerflow::domain::ports::{AttemptLogStore, OperationStore};
use ledgerflow::infrastructure::cache::{FailOpenCache, InMemoryCache};
use ledgerflow::infrastructure::in_memory::{
    InMemoryAttemptLogStore, InMemoryEntityStore, InMemoryOperationStore,
};
use rust_decimal::Decimal;
use std::sync::Arc;

/// An engine wired to in-memory stores, with handles kept for fault
/// injection and assertions.
pub struct Harness {
    pub engine: LedgerEngine,
    pub entities: InMemoryEntityStore,
    pub operations: InMemoryOperationStore,
    pub attempts: InMemoryAttemptLogStore,
    pub cache: InMemoryCache,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let entities = InMemoryEntityStore::new();
        let operations = InMemoryOperationStore::new();
        let attempts = InMemoryAttemptLogStore::new();
        let cache = InMemoryCache::new();
        let stores = Stores {
            entities: Arc::new(entities.clone()),
            operations: Arc::new(operations.clone()),
            attempts: Arc::new(attempts.clone()),
        };
        let engine = LedgerEngine::new(stores, FailOpenCache::new(Arc::new(cache.clone())), config);
        Self {
            engine,
            entities,
            operations,
            attempts,
            cache,
        }
    }

    pub async fn seed(&self, entity: LedgerEntity) -> EntityId {
        let id = entity.id;
        self.engine.queries().seed(vec![entity]).await.unwrap();
        id
    }

    pub async fn account(&self, balance: Decimal) -> EntityId {
        self.seed(LedgerEntity::account("account", Balance::new(balance)))
            .await
    }

    pub async fn merchant(&self, balance: Decimal) -> EntityId {
        self.seed(LedgerEntity::merchant("merchant", Balance::new(balance)))
            .await
    }

    pub async fn card(&self, balance: Decimal) -> EntityId {
        let owner = self.account(Decimal::ZERO).await;
        self.seed(LedgerEntity::card("card", owner, Balance::new(balance)))
            .await
    }

    pub async fn balance(&self, id: EntityId) -> Decimal {
        self.engine.queries().balance(id).await.unwrap().value()
    }

    pub async fn records(&self) -> Vec<OperationRecord> {
        self.operations.all().await.unwrap()
    }

    pub async fn attempt_count(&self) -> usize {
        self.attempts.all().await.unwrap().len()
    }
}
