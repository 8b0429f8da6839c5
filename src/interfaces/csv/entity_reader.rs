use crate::domain::entity::{EntityId, EntityKind, LedgerEntity};
use crate::domain::money::Balance;
use crate::error::{LedgerError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct EntityRow {
    id: EntityId,
    kind: EntityKind,
    name: String,
    balance: Decimal,
    active: bool,
    owner: Option<EntityId>,
    #[serde(default)]
    merchant: Option<bool>,
}

impl TryFrom<EntityRow> for LedgerEntity {
    type Error = LedgerError;

    fn try_from(row: EntityRow) -> Result<Self> {
        let balance = Balance::new(row.balance);
        if balance.is_negative() {
            return Err(LedgerError::InvalidInput(format!(
                "entity {} has a negative balance",
                row.id
            )));
        }
        if row.kind == EntityKind::Card && row.owner.is_none() {
            return Err(LedgerError::InvalidInput(format!(
                "card {} has no owning account",
                row.id
            )));
        }
        let now = Utc::now();
        Ok(LedgerEntity {
            id: row.id,
            kind: row.kind,
            name: row.name,
            balance,
            active: row.active,
            owner: row.owner,
            merchant: row.merchant.unwrap_or(false),
            created_at: now,
            updated_at: now,
        })
    }
}

/// Reads seed entities from CSV with columns
/// `id, kind, name, balance, active, owner, merchant`.
pub struct EntityReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> EntityReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn entities(self) -> impl Iterator<Item = Result<LedgerEntity>> {
        self.reader
            .into_deserialize::<EntityRow>()
            .map(|row| row.map_err(LedgerError::from).and_then(LedgerEntity::try_from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const ACCOUNT: &str = "6f1c1a52-0000-4000-8000-000000000001";
    const CARD: &str = "6f1c1a52-0000-4000-8000-000000000002";

    #[test]
    fn test_reads_accounts_and_cards() {
        let data = format!(
            "id, kind, name, balance, active, owner, merchant\n\
             {ACCOUNT}, account, Shop, 0.00, true, , true\n\
             {CARD}, card, Visa, 100.50, true, {ACCOUNT},"
        );
        let entities: Vec<_> = EntityReader::new(data.as_bytes())
            .entities()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(entities.len(), 2);
        assert!(entities[0].is_merchant());
        assert_eq!(entities[1].kind, EntityKind::Card);
        assert_eq!(entities[1].balance, Balance::new(dec!(100.50)));
        assert_eq!(entities[1].owner, Some(ACCOUNT.parse().unwrap()));
    }

    #[test]
    fn test_rejects_negative_balance_and_orphan_card() {
        let data = format!(
            "id, kind, name, balance, active, owner, merchant\n\
             {ACCOUNT}, account, Shop, -1, true, , false\n\
             {CARD}, card, Visa, 1, true, ,"
        );
        let results: Vec<_> = EntityReader::new(data.as_bytes()).entities().collect();
        assert!(matches!(results[0], Err(LedgerError::InvalidInput(_))));
        assert!(matches!(results[1], Err(LedgerError::InvalidInput(_))));
    }
}
