use crate::domain::operation::{OperationId, OperationRecord, OperationStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One append-only entry of the attempt log.
///
/// Several entries may exist for the same operation; consumers treat the log
/// as an event stream rather than a mirror of the operation table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptLogEntry {
    pub id: Uuid,
    pub operation_id: OperationId,
    pub status: OperationStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AttemptLogEntry {
    pub fn new(operation_id: OperationId, status: OperationStatus, error_message: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation_id,
            status,
            error_message,
            created_at: Utc::now(),
        }
    }

    /// Snapshot of a record as observed right now.
    pub fn observe(record: &OperationRecord) -> Self {
        Self::new(record.id, record.status, record.error_message.clone())
    }
}
