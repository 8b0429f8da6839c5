use crate::domain::attempt::AttemptLogEntry;
use crate::domain::entity::{EntityId, LedgerEntity};
use crate::domain::operation::{OperationId, OperationRecord};
use crate::domain::ports::{AttemptLogStore, EntityStore, EntityTransaction, OperationStore};
use crate::error::{LedgerError, Result};
use crate::sync::KeyedMutex;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{OwnedMutexGuard, RwLock};

fn unavailable(what: &str) -> LedgerError {
    LedgerError::StoreUnavailable(format!("{what} store is unavailable"))
}

#[derive(Default)]
struct EntityTable {
    rows: RwLock<HashMap<EntityId, LedgerEntity>>,
    row_locks: KeyedMutex<EntityId>,
    unavailable: AtomicBool,
    fail_commits: AtomicBool,
}

impl EntityTable {
    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable("entity"));
        }
        Ok(())
    }
}

/// A thread-safe in-memory entity store with pessimistic row locks.
///
/// `read_for_update` holds a per-row lock until the owning transaction commits,
/// rolls back or is dropped. Balance changes are staged on the transaction and
/// only become visible on commit.
#[derive(Default, Clone)]
pub struct InMemoryEntityStore {
    inner: Arc<EntityTable>,
}

impl InMemoryEntityStore {
    /// Creates a new, empty in-memory entity store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with `StoreUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes commits fail after all reads and writes succeeded.
    pub fn fail_commits(&self, fail: bool) {
        self.inner.fail_commits.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn get(&self, id: EntityId) -> Result<Option<LedgerEntity>> {
        self.inner.check_available()?;
        Ok(self.inner.rows.read().await.get(&id).cloned())
    }

    async fn upsert(&self, entity: LedgerEntity) -> Result<()> {
        self.inner.check_available()?;
        let _row = self.inner.row_locks.lock(&entity.id).await;
        self.inner.rows.write().await.insert(entity.id, entity);
        Ok(())
    }

    async fn by_owner(&self, owner: EntityId) -> Result<Vec<LedgerEntity>> {
        self.inner.check_available()?;
        let rows = self.inner.rows.read().await;
        Ok(rows
            .values()
            .filter(|e| e.owner == Some(owner))
            .cloned()
            .collect())
    }

    async fn begin(&self) -> Result<Box<dyn EntityTransaction>> {
        self.inner.check_available()?;
        Ok(Box::new(InMemoryTransaction {
            table: self.inner.clone(),
            locked: BTreeMap::new(),
        }))
    }
}

struct LockedRow {
    _guard: OwnedMutexGuard<()>,
    row: LedgerEntity,
    dirty: bool,
}

struct InMemoryTransaction {
    table: Arc<EntityTable>,
    locked: BTreeMap<EntityId, LockedRow>,
}

impl InMemoryTransaction {
    async fn lock_row(&mut self, id: EntityId) -> Result<&mut LockedRow> {
        if !self.locked.contains_key(&id) {
            self.table.check_available()?;
            if !self.table.rows.read().await.contains_key(&id) {
                return Err(LedgerError::NotFound(id));
            }
            let guard = self.table.row_locks.lock(&id).await;
            // Re-read: a previous holder may have committed while we waited.
            let row = self
                .table
                .rows
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or(LedgerError::NotFound(id))?;
            self.locked.insert(
                id,
                LockedRow {
                    _guard: guard,
                    row,
                    dirty: false,
                },
            );
        }
        self.locked.get_mut(&id).ok_or(LedgerError::NotFound(id))
    }
}

#[async_trait]
impl EntityTransaction for InMemoryTransaction {
    async fn read_for_update(&mut self, id: EntityId) -> Result<LedgerEntity> {
        Ok(self.lock_row(id).await?.row.clone())
    }

    async fn apply_balance_delta(&mut self, id: EntityId, delta: Decimal) -> Result<()> {
        let locked = self.lock_row(id).await?;
        locked.row.balance = locked
            .row
            .balance
            .apply(delta)
            .ok_or(LedgerError::NegativeBalance(id))?;
        locked.row.updated_at = Utc::now();
        locked.dirty = true;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.table.check_available()?;
        if self.table.fail_commits.load(Ordering::SeqCst) {
            return Err(LedgerError::StoreUnavailable("commit failed".to_string()));
        }
        let mut rows = self.table.rows.write().await;
        for (id, locked) in &self.locked {
            if locked.dirty {
                rows.insert(*id, locked.row.clone());
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        // Staged rows and row locks are released with `self`.
        Ok(())
    }
}

/// A thread-safe in-memory store for operation records.
#[derive(Default, Clone)]
pub struct InMemoryOperationStore {
    records: Arc<RwLock<HashMap<OperationId, OperationRecord>>>,
    fail_creates: Arc<AtomicBool>,
    fail_updates: Arc<AtomicBool>,
}

impl InMemoryOperationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl OperationStore for InMemoryOperationStore {
    async fn create(&self, record: &OperationRecord) -> Result<()> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(unavailable("operation"));
        }
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(LedgerError::InternalError(Box::new(std::io::Error::other(
                format!("operation {} already exists", record.id),
            ))));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn update(&self, record: &OperationRecord) -> Result<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(unavailable("operation"));
        }
        self.records.write().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn get(&self, id: OperationId) -> Result<Option<OperationRecord>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn all(&self) -> Result<Vec<OperationRecord>> {
        let mut all: Vec<_> = self.records.read().await.values().cloned().collect();
        all.sort_by_key(|r| r.created_at);
        Ok(all)
    }
}

/// A thread-safe in-memory attempt log.
///
/// Remembers the size of every batch written so batching behaviour can be
/// asserted on.
#[derive(Default, Clone)]
pub struct InMemoryAttemptLogStore {
    entries: Arc<RwLock<Vec<AttemptLogEntry>>>,
    batch_sizes: Arc<RwLock<Vec<usize>>>,
    unavailable: Arc<AtomicBool>,
    fail_batches: Arc<AtomicBool>,
}

impl InMemoryAttemptLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fails batch writes only; single appends keep working.
    pub fn fail_batches(&self, fail: bool) {
        self.fail_batches.store(fail, Ordering::SeqCst);
    }

    pub async fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.read().await.clone()
    }
}

#[async_trait]
impl AttemptLogStore for InMemoryAttemptLogStore {
    async fn append(&self, entry: &AttemptLogEntry) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable("attempt log"));
        }
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn append_batch(&self, entries: &[AttemptLogEntry]) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) || self.fail_batches.load(Ordering::SeqCst) {
            return Err(unavailable("attempt log"));
        }
        if entries.is_empty() {
            return Ok(());
        }
        self.entries.write().await.extend_from_slice(entries);
        self.batch_sizes.write().await.push(entries.len());
        Ok(())
    }

    async fn for_operation(&self, id: OperationId) -> Result<Vec<AttemptLogEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| e.operation_id == id)
            .cloned()
            .collect())
    }

    async fn all(&self) -> Result<Vec<AttemptLogEntry>> {
        Ok(self.entries.read().await.clone())
    }
}
