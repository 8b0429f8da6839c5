use crate::domain::entity::EntityId;
use crate::domain::rejection::Rejection;
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(pub Uuid);

impl OperationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    /// Terminal success of a transfer.
    Completed,
    /// Terminal success of a payment.
    Accepted,
    Failed,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationStatus::Pending)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Completed => "completed",
            OperationStatus::Accepted => "accepted",
            OperationStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Participants of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationKind {
    Transfer {
        source: EntityId,
        destination: EntityId,
    },
    /// Credits a merchant account from external card material.
    MerchantPayment {
        merchant: EntityId,
        /// Masked, only the last four digits are kept.
        card_number: String,
        card_expiry: String,
    },
    /// Debits a stored card in favour of a merchant.
    CardPayment { card: EntityId, merchant: EntityId },
}

impl OperationKind {
    /// Entities whose balance the operation changes when it succeeds.
    pub fn mutated_entities(&self) -> Vec<EntityId> {
        match self {
            OperationKind::Transfer {
                source,
                destination,
            } => vec![*source, *destination],
            OperationKind::MerchantPayment { merchant, .. } => vec![*merchant],
            OperationKind::CardPayment { card, .. } => vec![*card],
        }
    }

    pub fn success_status(&self) -> OperationStatus {
        match self {
            OperationKind::Transfer { .. } => OperationStatus::Completed,
            OperationKind::MerchantPayment { .. } | OperationKind::CardPayment { .. } => {
                OperationStatus::Accepted
            }
        }
    }
}

/// The durable audit row written for every payment or transfer attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub id: OperationId,
    pub kind: OperationKind,
    /// The amount as requested; may be non-positive on an `invalid amount` failure.
    pub amount: Decimal,
    pub status: OperationStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a caller gets back from every operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Receipt {
    pub operation_id: OperationId,
    pub status: OperationStatus,
    pub message: Option<String>,
}

impl OperationRecord {
    pub fn pending(kind: OperationKind, amount: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: OperationId::new(),
            kind,
            amount,
            status: OperationStatus::Pending,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builds a record that is terminal from the start.
    pub fn settled(kind: OperationKind, amount: Decimal, outcome: &std::result::Result<(), Rejection>) -> Self {
        let mut record = Self::pending(kind, amount);
        record.status = match outcome {
            Ok(()) => record.kind.success_status(),
            Err(_) => OperationStatus::Failed,
        };
        record.error_message = outcome.as_ref().err().map(ToString::to_string);
        record
    }

    /// Moves a pending record to its terminal state.
    pub fn transition(&mut self, to: OperationStatus, message: Option<String>) -> Result<()> {
        if self.status.is_terminal() || !to.is_terminal() {
            return Err(LedgerError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.error_message = message;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn receipt(&self) -> Receipt {
        Receipt {
            operation_id: self.id,
            status: self.status,
            message: self.error_message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn transfer() -> OperationKind {
        OperationKind::Transfer {
            source: EntityId::new(),
            destination: EntityId::new(),
        }
    }

    #[test]
    fn test_terminal_records_are_immutable() {
        let mut record = OperationRecord::pending(transfer(), dec!(10));
        record
            .transition(OperationStatus::Completed, None)
            .unwrap();
        assert!(matches!(
            record.transition(OperationStatus::Failed, Some("late".into())),
            Err(LedgerError::InvalidTransition { .. })
        ));
        assert_eq!(record.status, OperationStatus::Completed);
    }

    #[test]
    fn test_cannot_transition_back_to_pending() {
        let mut record = OperationRecord::pending(transfer(), dec!(10));
        assert!(record.transition(OperationStatus::Pending, None).is_err());
    }

    #[test]
    fn test_settled_failure_carries_message() {
        let record = OperationRecord::settled(transfer(), dec!(-1), &Err(Rejection::InvalidAmount));
        assert_eq!(record.status, OperationStatus::Failed);
        assert_eq!(record.receipt().message.as_deref(), Some("invalid amount"));
    }

    #[test]
    fn test_success_status_per_kind() {
        let payment = OperationKind::CardPayment {
            card: EntityId::new(),
            merchant: EntityId::new(),
        };
        assert_eq!(payment.success_status(), OperationStatus::Accepted);
        assert_eq!(transfer().success_status(), OperationStatus::Completed);
    }
}
