use crate::domain::money::Balance;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of a ledger entity.
///
/// The total order on `EntityId` is the canonical lock order: any operation
/// touching several entities acquires their locks in ascending id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Key bytes used by the persistent stores.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Account,
    Card,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Account => f.write_str("account"),
            EntityKind::Card => f.write_str("card"),
        }
    }
}

/// An account or card holding a monetary balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    pub balance: Balance,
    pub active: bool,
    /// Owning account of a card.
    pub owner: Option<EntityId>,
    /// Only meaningful for accounts.
    pub merchant: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntity {
    pub fn account(name: impl Into<String>, balance: Balance) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            kind: EntityKind::Account,
            name: name.into(),
            balance,
            active: true,
            owner: None,
            merchant: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn merchant(name: impl Into<String>, balance: Balance) -> Self {
        Self {
            merchant: true,
            ..Self::account(name, balance)
        }
    }

    pub fn card(name: impl Into<String>, owner: EntityId, balance: Balance) -> Self {
        Self {
            kind: EntityKind::Card,
            owner: Some(owner),
            ..Self::account(name, balance)
        }
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = id;
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn is_merchant(&self) -> bool {
        self.kind == EntityKind::Account && self.merchant
    }
}
