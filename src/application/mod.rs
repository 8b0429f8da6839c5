//! Application layer containing the ledger transaction engine.
//!
//! [`engine::LedgerEngine`] is the entry point. Transfers and payments are
//! serialized per entity by the [`coordinator::ConcurrencyCoordinator`], run in
//! a single store transaction, persist one operation record each, and report
//! every attempt to the asynchronous [`audit::AuditLogWriter`].

pub mod audit;
pub mod cache_hook;
pub mod coordinator;
pub mod engine;
pub mod payment;
pub mod queries;
pub mod transfer;
