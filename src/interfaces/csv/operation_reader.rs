use crate::application::engine::OperationRequest;
use crate::application::payment::{CardPaymentRequest, MerchantPaymentRequest};
use crate::application::transfer::TransferRequest;
use crate::domain::card::CardDetails;
use crate::domain::entity::EntityId;
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum OperationType {
    Transfer,
    MerchantPayment,
    CardPayment,
}

/// One CSV line.
///
/// `source` is the debited entity (transfer source or paying card) and
/// `destination` the credited or receiving one (transfer destination or
/// merchant). Card columns are only read for merchant payments.
#[derive(Debug, Deserialize)]
struct OperationRow {
    r#type: OperationType,
    source: Option<EntityId>,
    destination: EntityId,
    amount: Decimal,
    #[serde(default)]
    card_number: Option<String>,
    #[serde(default)]
    card_expiry: Option<String>,
    #[serde(default)]
    card_cvv: Option<String>,
}

fn missing(column: &str, kind: OperationType) -> LedgerError {
    LedgerError::InvalidInput(format!("{column} is required for {kind:?}"))
}

impl TryFrom<OperationRow> for OperationRequest {
    type Error = LedgerError;

    fn try_from(row: OperationRow) -> Result<Self> {
        let kind = row.r#type;
        Ok(match kind {
            OperationType::Transfer => {
                let source = row.source.ok_or_else(|| missing("source", kind))?;
                OperationRequest::Transfer(TransferRequest::new(source, row.destination, row.amount))
            }
            OperationType::CardPayment => {
                let card = row.source.ok_or_else(|| missing("source", kind))?;
                OperationRequest::CardPayment(CardPaymentRequest::new(card, row.destination, row.amount))
            }
            OperationType::MerchantPayment => {
                // Malformed card material is the engine's to reject; only absence is an input error.
                let card = CardDetails {
                    number: row.card_number.ok_or_else(|| missing("card_number", kind))?,
                    expiry: row.card_expiry.ok_or_else(|| missing("card_expiry", kind))?,
                    cvv: row.card_cvv.ok_or_else(|| missing("card_cvv", kind))?,
                };
                OperationRequest::MerchantPayment(MerchantPaymentRequest::new(
                    row.destination,
                    row.amount,
                    card,
                ))
            }
        })
    }
}

/// Reads operation requests from a CSV source.
///
/// Lines are parsed lazily so large files are streamed; a malformed line
/// yields an `Err` item without stopping the iteration.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn operations(self) -> impl Iterator<Item = Result<OperationRequest>> {
        self.reader
            .into_deserialize::<OperationRow>()
            .map(|row| row.map_err(LedgerError::from).and_then(OperationRequest::try_from))
    }
}
