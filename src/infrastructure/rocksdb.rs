use crate::domain::attempt::AttemptLogEntry;
use crate::domain::entity::{EntityId, LedgerEntity};
use crate::domain::operation::{OperationId, OperationRecord};
use crate::domain::ports::{AttemptLogStore, EntityStore, EntityTransaction, OperationStore};
use crate::error::{LedgerError, Result};
use crate::sync::KeyedMutex;
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

/// Column Family for ledger entities.
pub const CF_ENTITIES: &str = "entities";
/// Column Family for operation records.
pub const CF_OPERATIONS: &str = "operations";
/// Column Family for attempt log entries, keyed by operation id then entry id.
pub const CF_ATTEMPTS: &str = "attempts";

/// A persistent store implementation using RocksDB.
///
/// Implements all three stores on separate Column Families. RocksDB has no
/// row locks of its own here, so entity transactions take per-row locks from an
/// in-process lock table and publish their staged rows in a single
/// `WriteBatch` on commit.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    row_locks: Arc<KeyedMutex<EntityId>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_ENTITIES, CF_OPERATIONS, CF_ATTEMPTS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self {
            db: Arc::new(db),
            row_locks: Arc::new(KeyedMutex::new()),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        cf(&self.db, name)
    }

    fn read<T: DeserializeOwned>(&self, name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&self, name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(name)?;
        self.db.put_cf(cf, key, serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, name: &str, prefix: &[u8]) -> Result<Vec<T>> {
        let cf = self.cf(name)?;
        let mut items = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            items.push(serde_json::from_slice(&value)?);
        }
        Ok(items)
    }
}

fn cf<'a>(db: &'a DB, name: &str) -> Result<&'a ColumnFamily> {
    db.cf_handle(name).ok_or_else(|| {
        LedgerError::InternalError(Box::new(std::io::Error::other(format!(
            "{name} column family not found"
        ))))
    })
}

fn attempt_key(entry: &AttemptLogEntry) -> Vec<u8> {
    let mut key = entry.operation_id.as_bytes().to_vec();
    key.extend_from_slice(entry.id.as_bytes());
    key
}

#[async_trait]
impl EntityStore for RocksDBStore {
    async fn get(&self, id: EntityId) -> Result<Option<LedgerEntity>> {
        self.read(CF_ENTITIES, id.as_bytes())
    }

    async fn upsert(&self, entity: LedgerEntity) -> Result<()> {
        let _row = self.row_locks.lock(&entity.id).await;
        self.write(CF_ENTITIES, entity.id.as_bytes(), &entity)
    }

    async fn by_owner(&self, owner: EntityId) -> Result<Vec<LedgerEntity>> {
        let all: Vec<LedgerEntity> = self.scan(CF_ENTITIES, &[])?;
        Ok(all.into_iter().filter(|e| e.owner == Some(owner)).collect())
    }

    async fn begin(&self) -> Result<Box<dyn EntityTransaction>> {
        Ok(Box::new(RocksDBTransaction {
            store: self.clone(),
            locked: BTreeMap::new(),
        }))
    }
}

struct StagedRow {
    _guard: OwnedMutexGuard<()>,
    row: LedgerEntity,
    dirty: bool,
}

struct RocksDBTransaction {
    store: RocksDBStore,
    locked: BTreeMap<EntityId, StagedRow>,
}

impl RocksDBTransaction {
    async fn lock_row(&mut self, id: EntityId) -> Result<&mut StagedRow> {
        if !self.locked.contains_key(&id) {
            if self.store.read::<LedgerEntity>(CF_ENTITIES, id.as_bytes())?.is_none() {
                return Err(LedgerError::NotFound(id));
            }
            let guard = self.store.row_locks.lock(&id).await;
            let row = self
                .store
                .read(CF_ENTITIES, id.as_bytes())?
                .ok_or(LedgerError::NotFound(id))?;
            self.locked.insert(
                id,
                StagedRow {
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
impl EntityTransaction for RocksDBTransaction {
    async fn read_for_update(&mut self, id: EntityId) -> Result<LedgerEntity> {
        Ok(self.lock_row(id).await?.row.clone())
    }

    async fn apply_balance_delta(&mut self, id: EntityId, delta: Decimal) -> Result<()> {
        let staged = self.lock_row(id).await?;
        staged.row.balance = staged
            .row
            .balance
            .apply(delta)
            .ok_or(LedgerError::NegativeBalance(id))?;
        staged.row.updated_at = Utc::now();
        staged.dirty = true;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let cf = cf(&self.store.db, CF_ENTITIES)?;
        let mut batch = WriteBatch::default();
        for (id, staged) in self.locked.iter().filter(|(_, s)| s.dirty) {
            batch.put_cf(cf, id.as_bytes(), serde_json::to_vec(&staged.row)?);
        }
        self.store.db.write(batch)?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl OperationStore for RocksDBStore {
    async fn create(&self, record: &OperationRecord) -> Result<()> {
        self.write(CF_OPERATIONS, record.id.as_bytes(), record)
    }

    async fn update(&self, record: &OperationRecord) -> Result<()> {
        self.write(CF_OPERATIONS, record.id.as_bytes(), record)
    }

    async fn get(&self, id: OperationId) -> Result<Option<OperationRecord>> {
        self.read(CF_OPERATIONS, id.as_bytes())
    }

    async fn all(&self) -> Result<Vec<OperationRecord>> {
        let mut all: Vec<OperationRecord> = self.scan(CF_OPERATIONS, &[])?;
        all.sort_by_key(|r| r.created_at);
        Ok(all)
    }
}

#[async_trait]
impl AttemptLogStore for RocksDBStore {
    async fn append(&self, entry: &AttemptLogEntry) -> Result<()> {
        self.write(CF_ATTEMPTS, &attempt_key(entry), entry)
    }

    async fn append_batch(&self, entries: &[AttemptLogEntry]) -> Result<()> {
        let cf = self.cf(CF_ATTEMPTS)?;
        let mut batch = WriteBatch::default();
        for entry in entries {
            batch.put_cf(cf, attempt_key(entry), serde_json::to_vec(entry)?);
        }
        self.db.write(batch)?;
        Ok(())
    }

    async fn for_operation(&self, id: OperationId) -> Result<Vec<AttemptLogEntry>> {
        let mut entries: Vec<AttemptLogEntry> = self.scan(CF_ATTEMPTS, id.as_bytes())?;
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }

    async fn all(&self) -> Result<Vec<AttemptLogEntry>> {
        let mut entries: Vec<AttemptLogEntry> = self.scan(CF_ATTEMPTS, &[])?;
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }
}
