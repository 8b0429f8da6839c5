use crate::domain::entity::EntityId;
use crate::domain::operation::OperationStatus;
use thiserror::Error;

/// Infrastructure-level failures raised by stores and adapters.
///
/// Business rejections (bad amount, inactive entity, ...) are not errors; they
/// are modelled by [`crate::domain::rejection::Rejection`] and end up as a
/// `Failed` operation record.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("entity {0} not found")]
    NotFound(EntityId),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("balance of entity {0} would become negative")]
    NegativeBalance(EntityId),
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: OperationStatus,
        to: OperationStatus,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
