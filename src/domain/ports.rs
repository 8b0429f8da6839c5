use super::attempt::AttemptLogEntry;
use super::entity::{EntityId, LedgerEntity};
use super::operation::{OperationId, OperationRecord};
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

/// Store of record for ledger entities.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Plain read, no lock taken.
    async fn get(&self, id: EntityId) -> Result<Option<LedgerEntity>>;
    /// Creates or replaces an entity outside of any transaction (seeding).
    async fn upsert(&self, entity: LedgerEntity) -> Result<()>;
    async fn by_owner(&self, owner: EntityId) -> Result<Vec<LedgerEntity>>;
    /// Opens a transaction. Dropping it without `commit` rolls it back.
    async fn begin(&self) -> Result<Box<dyn EntityTransaction>>;
}

/// A transaction-scoped handle on the entity store.
#[async_trait]
pub trait EntityTransaction: Send {
    /// Locks the row until the transaction ends and returns its current state.
    ///
    /// Fails with `NotFound` when the entity does not exist.
    async fn read_for_update(&mut self, id: EntityId) -> Result<LedgerEntity>;
    /// Relative balance update applied under the row lock.
    async fn apply_balance_delta(&mut self, id: EntityId, delta: Decimal) -> Result<()>;
    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait OperationStore: Send + Sync {
    async fn create(&self, record: &OperationRecord) -> Result<()>;
    async fn update(&self, record: &OperationRecord) -> Result<()>;
    async fn get(&self, id: OperationId) -> Result<Option<OperationRecord>>;
    async fn all(&self) -> Result<Vec<OperationRecord>>;
}

#[async_trait]
pub trait AttemptLogStore: Send + Sync {
    async fn append(&self, entry: &AttemptLogEntry) -> Result<()>;
    async fn append_batch(&self, entries: &[AttemptLogEntry]) -> Result<()>;
    async fn for_operation(&self, id: OperationId) -> Result<Vec<AttemptLogEntry>>;
    async fn all(&self) -> Result<Vec<AttemptLogEntry>>;
}

/// Raw cache backend. Errors are absorbed by
/// [`crate::infrastructure::cache::FailOpenCache`] before reaching the engine.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

pub type EntityStoreRef = Arc<dyn EntityStore>;
pub type OperationStoreRef = Arc<dyn OperationStore>;
pub type AttemptLogStoreRef = Arc<dyn AttemptLogStore>;
pub type CacheBackendRef = Arc<dyn CacheBackend>;
