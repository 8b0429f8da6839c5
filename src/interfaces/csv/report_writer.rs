use crate::domain::entity::{EntityId, EntityKind, LedgerEntity};
use crate::domain::operation::{OperationId, OperationKind, OperationRecord, OperationStatus};
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct ReceiptRow<'a> {
    operation: OperationId,
    r#type: &'static str,
    amount: Decimal,
    status: OperationStatus,
    message: Option<&'a str>,
}

#[derive(Serialize)]
struct BalanceRow<'a> {
    entity: EntityId,
    kind: EntityKind,
    name: &'a str,
    balance: Decimal,
    active: bool,
}

fn type_label(kind: &OperationKind) -> &'static str {
    match kind {
        OperationKind::Transfer { .. } => "transfer",
        OperationKind::MerchantPayment { .. } => "merchant_payment",
        OperationKind::CardPayment { .. } => "card_payment",
    }
}

/// Writes one receipt line per operation record:
/// `operation,type,amount,status,message`.
pub struct ReceiptWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReceiptWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write(&mut self, record: &OperationRecord) -> Result<()> {
        self.writer.serialize(ReceiptRow {
            operation: record.id,
            r#type: type_label(&record.kind),
            amount: record.amount.normalize(),
            status: record.status,
            message: record.error_message.as_deref(),
        })?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes `entity,kind,name,balance,active` lines.
pub struct BalanceWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BalanceWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_entities<'a>(&mut self, entities: impl IntoIterator<Item = &'a LedgerEntity>) -> Result<()> {
        for entity in entities {
            self.writer.serialize(BalanceRow {
                entity: entity.id,
                kind: entity.kind,
                name: &entity.name,
                balance: entity.balance.value().normalize(),
                active: entity.active,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Balance;
    use crate::domain::rejection::Rejection;
    use rust_decimal_macros::dec;

    #[test]
    fn test_receipt_lines() {
        let record = OperationRecord::settled(
            OperationKind::Transfer {
                source: EntityId::new(),
                destination: EntityId::new(),
            },
            dec!(50.00),
            &Err(Rejection::InsufficientBalance),
        );
        let mut out = Vec::new();
        {
            let mut writer = ReceiptWriter::new(&mut out);
            writer.write(&record).unwrap();
            writer.flush().unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("operation,type,amount,status,message\n"));
        assert!(text.contains(",transfer,50,failed,insufficient balance"));
    }

    #[test]
    fn test_balance_lines() {
        let entity = LedgerEntity::account("Shop", Balance::new(dec!(60.00)));
        let mut out = Vec::new();
        BalanceWriter::new(&mut out)
            .write_entities([&entity])
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(&format!("{},account,Shop,60,true", entity.id)));
    }
}
