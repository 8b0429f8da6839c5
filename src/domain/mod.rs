//! Domain layer: ledger value types, operation records and the ports the
//! engine needs from its collaborators.

pub mod attempt;
pub mod card;
pub mod entity;
pub mod money;
pub mod operation;
pub mod ports;
pub mod rejection;
