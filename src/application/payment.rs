use crate::application::coordinator::canonical_pair;
use crate::application::engine::{LedgerEngine, Tx, log_outcome, lock_row, require_active, settle};
use crate::domain::attempt::AttemptLogEntry;
use crate::domain::card::CardDetails;
use crate::domain::entity::EntityId;
use crate::domain::money::Amount;
use crate::domain::operation::{OperationKind, OperationRecord, OperationStatus};
use crate::domain::rejection::{Rejection, Role};
use crate::error::Result;
use rust_decimal::Decimal;
use std::time::Duration;

/// Credits a merchant account from external card material.
#[derive(Debug, Clone)]
pub struct MerchantPaymentRequest {
    pub merchant: EntityId,
    pub amount: Decimal,
    pub card: CardDetails,
    pub timeout: Option<Duration>,
}

/// Debits a stored card in favour of a merchant.
#[derive(Debug, Clone)]
pub struct CardPaymentRequest {
    pub card: EntityId,
    pub merchant: EntityId,
    pub amount: Decimal,
    pub timeout: Option<Duration>,
}

impl MerchantPaymentRequest {
    pub fn new(merchant: EntityId, amount: Decimal, card: CardDetails) -> Self {
        Self {
            merchant,
            amount,
            card,
            timeout: None,
        }
    }
}

impl CardPaymentRequest {
    pub fn new(card: EntityId, merchant: EntityId, amount: Decimal) -> Self {
        Self {
            card,
            merchant,
            amount,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum PaymentPlan {
    Credit { merchant: EntityId },
    Debit { card: EntityId, merchant: EntityId },
}

impl PaymentPlan {
    /// The entity whose coordinator token is held, also the one mutated.
    fn payer(&self) -> EntityId {
        match self {
            PaymentPlan::Credit { merchant } => *merchant,
            PaymentPlan::Debit { card, .. } => *card,
        }
    }
}

impl LedgerEngine {
    pub async fn merchant_payment(&self, request: MerchantPaymentRequest) -> Result<OperationRecord> {
        let kind = OperationKind::MerchantPayment {
            merchant: request.merchant,
            card_number: self.validator.mask(&request.card.number),
            card_expiry: request.card.expiry.clone(),
        };
        let checked = Amount::new(request.amount)
            .and_then(|amount| self.validator.validate(&request.card).map(|()| amount));
        let amount = match checked {
            Ok(amount) => amount,
            Err(rejection) => {
                let record = OperationRecord::settled(kind, request.amount, &Err(rejection));
                return self.finish(record).await;
            }
        };

        let plan = PaymentPlan::Credit {
            merchant: request.merchant,
        };
        self.pay(kind, request.amount, amount, plan, request.timeout)
            .await
    }

    pub async fn card_payment(&self, request: CardPaymentRequest) -> Result<OperationRecord> {
        let kind = OperationKind::CardPayment {
            card: request.card,
            merchant: request.merchant,
        };
        let amount = match Amount::new(request.amount) {
            Ok(amount) => amount,
            Err(rejection) => {
                let record = OperationRecord::settled(kind, request.amount, &Err(rejection));
                return self.finish(record).await;
            }
        };

        let plan = PaymentPlan::Debit {
            card: request.card,
            merchant: request.merchant,
        };
        self.pay(kind, request.amount, amount, plan, request.timeout)
            .await
    }

    /// Records the payment as pending, applies it, then moves the record to
    /// its terminal status.
    async fn pay(
        &self,
        kind: OperationKind,
        requested: Decimal,
        amount: Amount,
        plan: PaymentPlan,
        timeout: Option<Duration>,
    ) -> Result<OperationRecord> {
        let mut record = OperationRecord::pending(kind, requested);
        self.operations.create(&record).await?;

        let outcome = self
            .with_deadline(timeout, self.apply_payment(plan, amount))
            .await;

        let persisted = match outcome {
            Ok(()) => {
                record.transition(OperationStatus::Accepted, None)?;
                self.cache.invalidate(&[plan.payer()]).await;
                // The balance change is committed and authoritative; a lost
                // status update must not be compensated.
                if let Err(e) = self.operations.update(&record).await {
                    tracing::warn!(operation = %record.id, error = %e, "payment accepted but status update failed");
                }
                Ok(())
            }
            Err(rejection) => {
                record.transition(OperationStatus::Failed, Some(rejection.to_string()))?;
                self.operations.update(&record).await
            }
        };

        self.audit.record(AttemptLogEntry::observe(&record)).await;
        log_outcome(&record);
        persisted?;
        Ok(record)
    }

    async fn apply_payment(&self, plan: PaymentPlan, amount: Amount) -> std::result::Result<(), Rejection> {
        let _token = self.coordinator.acquire(plan.payer()).await;
        let mut tx = self.entities.begin().await?;
        let outcome = payment_steps(&mut tx, plan, amount).await;
        settle(tx, outcome).await
    }
}

async fn payment_steps(tx: &mut Tx, plan: PaymentPlan, amount: Amount) -> std::result::Result<(), Rejection> {
    match plan {
        PaymentPlan::Credit { merchant } => {
            let merchant_row = require_active(lock_row(tx, merchant).await?, Role::Merchant)?;
            if !merchant_row.is_merchant() {
                return Err(Rejection::NotMerchant);
            }
            tx.apply_balance_delta(merchant, amount.value()).await?;
        }
        PaymentPlan::Debit { card, merchant } => {
            let (first, second) = canonical_pair(card, merchant);
            let first_row = lock_row(tx, first).await?;
            let second_row = lock_row(tx, second).await?;
            let (card_row, merchant_row) = if first == card {
                (first_row, second_row)
            } else {
                (second_row, first_row)
            };

            require_active(merchant_row, Role::Merchant)?;
            let card_row = require_active(card_row, Role::Card)?;
            if !card_row.balance.covers(amount) {
                return Err(Rejection::InsufficientBalance);
            }
            tx.apply_balance_delta(card, -amount.value()).await?;
        }
    }
    Ok(())
}
