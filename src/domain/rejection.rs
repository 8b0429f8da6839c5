use crate::domain::entity::EntityKind;
use crate::error::LedgerError;
use std::fmt;
use thiserror::Error;

/// Which participant of an operation a rejection refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Source,
    Destination,
    Merchant,
    Card,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Source => f.write_str("source"),
            Role::Destination => f.write_str("destination"),
            Role::Merchant => f.write_str("merchant"),
            Role::Card => f.write_str("card"),
        }
    }
}

// "card card" reads badly when the role already names the kind.
fn participant(role: &Role, kind: &EntityKind) -> String {
    match (role, kind) {
        (Role::Card, EntityKind::Card) => "card".to_string(),
        _ => format!("{role} {kind}"),
    }
}

/// Why an operation ended in `Failed`.
///
/// Every rejection is turned into a persisted record with a human-readable
/// message; none of them crosses the engine boundary as an `Err`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("invalid amount")]
    InvalidAmount,
    #[error("self-transfer is not allowed")]
    SelfTransfer,
    #[error("invalid card")]
    InvalidCard,
    #[error("{role} not found")]
    NotFound { role: Role },
    #[error("{} is not active", participant(.role, .kind))]
    Inactive { role: Role, kind: EntityKind },
    #[error("account is not a merchant")]
    NotMerchant,
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("operation timed out")]
    TimedOut,
    #[error("{0}")]
    Internal(String),
}

/// Failure taxonomy used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Rejected before any lock or transaction.
    Validation,
    /// Participant absent, detected under lock.
    NotFound,
    /// Participant in the wrong state, detected under lock.
    State,
    /// Infrastructure failure or deadline expiry.
    Store,
}

/// Transport-neutral status code pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportCode {
    pub status: u16,
    pub code: &'static str,
}

impl Rejection {
    pub fn category(&self) -> Category {
        match self {
            Rejection::InvalidAmount | Rejection::SelfTransfer | Rejection::InvalidCard => {
                Category::Validation
            }
            Rejection::NotFound { .. } => Category::NotFound,
            Rejection::Inactive { .. } | Rejection::NotMerchant | Rejection::InsufficientBalance => {
                Category::State
            }
            Rejection::TimedOut | Rejection::Internal(_) => Category::Store,
        }
    }

    pub fn transport_code(&self) -> TransportCode {
        let (status, code) = match self {
            Rejection::InvalidAmount => (400, "INVALID_AMOUNT"),
            Rejection::SelfTransfer => (400, "SELF_TRANSFER"),
            Rejection::InvalidCard => (400, "INVALID_CARD"),
            Rejection::NotFound { .. } => (404, "ENTITY_NOT_FOUND"),
            Rejection::Inactive { .. } => (400, "ENTITY_INACTIVE"),
            Rejection::NotMerchant => (400, "NOT_MERCHANT"),
            Rejection::InsufficientBalance => (400, "INSUFFICIENT_BALANCE"),
            Rejection::TimedOut => (504, "TIMEOUT"),
            Rejection::Internal(_) => (500, "INTERNAL_ERROR"),
        };
        TransportCode { status, code }
    }
}

impl From<LedgerError> for Rejection {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NegativeBalance(_) => Rejection::InsufficientBalance,
            other => Rejection::Internal(other.to_string()),
        }
    }
}
