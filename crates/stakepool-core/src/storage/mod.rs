//! # Storage Module
//!
//! Disk-backed persistence of a pool, its accounts and the bundled ledger.

mod redb_store;

pub use redb_store::{RedbStore, StoredPool};
