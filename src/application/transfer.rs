use crate::application::coordinator::canonical_pair;
use crate::application::engine::{LedgerEngine, Tx, lock_row, require_active, settle};
use crate::domain::entity::EntityId;
use crate::domain::money::Amount;
use crate::domain::operation::{OperationKind, OperationRecord};
use crate::domain::rejection::{Rejection, Role};
use crate::error::Result;
use rust_decimal::Decimal;
use std::time::Duration;

/// Moves `amount` from `source` to `destination`.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub source: EntityId,
    pub destination: EntityId,
    pub amount: Decimal,
    /// Overrides the engine's default deadline.
    pub timeout: Option<Duration>,
}

impl TransferRequest {
    pub fn new(source: EntityId, destination: EntityId, amount: Decimal) -> Self {
        Self {
            source,
            destination,
            amount,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl LedgerEngine {
    /// Transfers between two entities atomically.
    ///
    /// The record is written once, after the balance transaction has either
    /// committed (`Completed`) or rolled back (`Failed`).
    pub async fn transfer(&self, request: TransferRequest) -> Result<OperationRecord> {
        let TransferRequest {
            source,
            destination,
            amount,
            timeout,
        } = request;

        let outcome = match Amount::new(amount) {
            Err(rejection) => Err(rejection),
            Ok(_) if source == destination => Err(Rejection::SelfTransfer),
            Ok(amount) => {
                self.with_deadline(timeout, self.move_funds(source, destination, amount))
                    .await
            }
        };

        if outcome.is_ok() {
            self.cache.invalidate(&[source, destination]).await;
        }

        let kind = OperationKind::Transfer {
            source,
            destination,
        };
        self.finish(OperationRecord::settled(kind, amount, &outcome))
            .await
    }

    async fn move_funds(
        &self,
        source: EntityId,
        destination: EntityId,
        amount: Amount,
    ) -> std::result::Result<(), Rejection> {
        let _token = self.coordinator.acquire_all(&[source, destination]).await;
        let mut tx = self.entities.begin().await?;
        let outcome = transfer_steps(&mut tx, source, destination, amount).await;
        settle(tx, outcome).await
    }
}

async fn transfer_steps(
    tx: &mut Tx,
    source: EntityId,
    destination: EntityId,
    amount: Amount,
) -> std::result::Result<(), Rejection> {
    // Row locks follow the same canonical order as the coordinator tokens.
    let (first, second) = canonical_pair(source, destination);
    let first_row = lock_row(tx, first).await?;
    let second_row = lock_row(tx, second).await?;
    let (source_row, destination_row) = if first == source {
        (first_row, second_row)
    } else {
        (second_row, first_row)
    };

    let source_row = require_active(source_row, Role::Source)?;
    if !source_row.balance.covers(amount) {
        return Err(Rejection::InsufficientBalance);
    }
    require_active(destination_row, Role::Destination)?;

    tx.apply_balance_delta(source, -amount.value()).await?;
    tx.apply_balance_delta(destination, amount.value()).await?;
    Ok(())
}
