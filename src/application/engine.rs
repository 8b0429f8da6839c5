use crate::application::audit::AuditLogWriter;
use crate::application::cache_hook::CacheCoherence;
use crate::application::coordinator::ConcurrencyCoordinator;
use crate::application::payment::{CardPaymentRequest, MerchantPaymentRequest};
use crate::application::queries::LedgerQueries;
use crate::application::transfer::TransferRequest;
use crate::config::EngineConfig;
use crate::domain::attempt::AttemptLogEntry;
use crate::domain::card::CardValidator;
use crate::domain::entity::{EntityId, LedgerEntity};
use crate::domain::operation::OperationRecord;
use crate::domain::ports::{
    AttemptLogStoreRef, EntityStoreRef, EntityTransaction, OperationStoreRef,
};
use crate::domain::rejection::{Rejection, Role};
use crate::error::{LedgerError, Result};
use crate::infrastructure::cache::FailOpenCache;
use std::future::Future;
use std::time::Duration;

pub(crate) type Tx = Box<dyn EntityTransaction>;

/// The stores the engine writes to.
#[derive(Clone)]
pub struct Stores {
    pub entities: EntityStoreRef,
    pub operations: OperationStoreRef,
    pub attempts: AttemptLogStoreRef,
}

/// Any operation the engine accepts.
#[derive(Debug, Clone)]
pub enum OperationRequest {
    Transfer(TransferRequest),
    MerchantPayment(MerchantPaymentRequest),
    CardPayment(CardPaymentRequest),
}

/// The ledger transaction engine.
///
/// Every call returns an [`OperationRecord`] with a terminal status; business
/// rejections are reported through that record. `Err` is reserved for the case
/// where the record itself could not be persisted.
///
/// Owns the attempt log worker: call [`shutdown`](Self::shutdown) before the
/// process exits so buffered entries are flushed.
pub struct LedgerEngine {
    pub(crate) entities: EntityStoreRef,
    pub(crate) operations: OperationStoreRef,
    pub(crate) coordinator: ConcurrencyCoordinator,
    pub(crate) audit: AuditLogWriter,
    pub(crate) cache: CacheCoherence,
    pub(crate) validator: CardValidator,
    pub(crate) config: EngineConfig,
    queries: LedgerQueries,
}

impl LedgerEngine {
    /// Creates the engine and spawns its attempt log worker.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(stores: Stores, cache: FailOpenCache, config: EngineConfig) -> Self {
        let audit = AuditLogWriter::start(stores.attempts, &config.audit);
        let queries = LedgerQueries::new(stores.entities.clone(), cache.clone(), config.cache_ttl);
        Self {
            entities: stores.entities,
            operations: stores.operations,
            coordinator: ConcurrencyCoordinator::new(),
            audit,
            cache: CacheCoherence::new(cache),
            validator: CardValidator::new(),
            config,
            queries,
        }
    }

    /// Cached read access and seeding.
    pub fn queries(&self) -> &LedgerQueries {
        &self.queries
    }

    pub fn coordinator(&self) -> &ConcurrencyCoordinator {
        &self.coordinator
    }

    pub async fn execute(&self, request: OperationRequest) -> Result<OperationRecord> {
        match request {
            OperationRequest::Transfer(r) => self.transfer(r).await,
            OperationRequest::MerchantPayment(r) => self.merchant_payment(r).await,
            OperationRequest::CardPayment(r) => self.card_payment(r).await,
        }
    }

    /// Drains and flushes the attempt log.
    pub async fn shutdown(&self) {
        self.audit.shutdown().await;
        tracing::info!("ledger engine stopped");
    }

    /// Runs `work` under the operation deadline.
    ///
    /// On expiry `work` is dropped, which rolls back its open transaction and
    /// releases its coordinator tokens.
    pub(crate) async fn with_deadline<F>(&self, timeout: Option<Duration>, work: F) -> std::result::Result<(), Rejection>
    where
        F: Future<Output = std::result::Result<(), Rejection>>,
    {
        let limit = timeout.unwrap_or(self.config.operation_timeout);
        tokio::time::timeout(limit, work)
            .await
            .unwrap_or(Err(Rejection::TimedOut))
    }

    /// Persists a record that is already terminal and enqueues its attempt.
    pub(crate) async fn finish(&self, record: OperationRecord) -> Result<OperationRecord> {
        self.operations.create(&record).await?;
        self.audit.record(AttemptLogEntry::observe(&record)).await;
        log_outcome(&record);
        Ok(record)
    }
}

pub(crate) fn log_outcome(record: &OperationRecord) {
    match &record.error_message {
        None => tracing::info!(operation = %record.id, status = %record.status, amount = %record.amount, "operation settled"),
        Some(reason) => tracing::info!(operation = %record.id, status = %record.status, reason = %reason, "operation rejected"),
    }
}

/// Commits on success, rolls back on rejection.
pub(crate) async fn settle(tx: Tx, outcome: std::result::Result<(), Rejection>) -> std::result::Result<(), Rejection> {
    match outcome {
        Ok(()) => tx.commit().await.map_err(Rejection::from),
        Err(rejection) => {
            if let Err(e) = tx.rollback().await {
                tracing::warn!(error = %e, "rollback failed");
            }
            Err(rejection)
        }
    }
}

/// Locks and reads a row, turning absence into `None`.
pub(crate) async fn lock_row(tx: &mut Tx, id: EntityId) -> std::result::Result<Option<LedgerEntity>, Rejection> {
    match tx.read_for_update(id).await {
        Ok(entity) => Ok(Some(entity)),
        Err(LedgerError::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn require_active(row: Option<LedgerEntity>, role: Role) -> std::result::Result<LedgerEntity, Rejection> {
    let row = row.ok_or(Rejection::NotFound { role })?;
    if !row.active {
        return Err(Rejection::Inactive {
            role,
            kind: row.kind,
        });
    }
    Ok(row)
}
