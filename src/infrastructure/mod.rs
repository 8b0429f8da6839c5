//! Store and cache adapters.

pub mod cache;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
