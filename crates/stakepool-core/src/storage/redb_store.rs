//! # redb-backed Pool Storage
//!
//! Persists a pool with the redb embedded database:
//! - ACID transactions (one write transaction per committed operation)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! ## Layout
//!
//! | Table | Key | Value |
//! |-------|-----|-------|
//! | `metadata` | name | `u64` (format version) |
//! | `pool` | `"state"` | postcard `PoolState` |
//! | `accounts` | account id | principal (`u128`) |
//! | `ledger` | `"ledger"` | postcard `MemoryLedger` |
//! | `settings` | `"clock_override"` | elapsed ms (`i64`) |

use crate::ledger::MemoryLedger;
use crate::primitives::FORMAT_VERSION;
use crate::{AccountId, PoolError, PoolSnapshot, PoolState};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use std::collections::BTreeMap;
use std::path::Path;

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// Table for pool aggregates: fixed key -> serialized PoolState
const POOL: TableDefinition<&str, &[u8]> = TableDefinition::new("pool");

/// Table for per-account principal
const ACCOUNTS: TableDefinition<&str, u128> = TableDefinition::new("accounts");

/// Table for the bundled asset ledger: fixed key -> serialized MemoryLedger
const LEDGER: TableDefinition<&str, &[u8]> = TableDefinition::new("ledger");

/// Table for administrative settings
const SETTINGS: TableDefinition<&str, i64> = TableDefinition::new("settings");

const STATE_KEY: &str = "state";
const LEDGER_KEY: &str = "ledger";
const VERSION_KEY: &str = "format_version";
const CLOCK_OVERRIDE_KEY: &str = "clock_override";

fn io_err(e: impl std::fmt::Display) -> PoolError {
    PoolError::IoError(e.to_string())
}

/// Everything a persistent session needs to resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPool {
    pub snapshot: PoolSnapshot,
    pub ledger: MemoryLedger,
    /// Administrative elapsed-time override, if one was set.
    pub clock_override: Option<i64>,
}

/// A disk-backed pool store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a pool database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PoolError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            {
                let mut meta = write_txn.open_table(METADATA).map_err(io_err)?;
                let stored_version = meta.get(VERSION_KEY).map_err(io_err)?.map(|v| v.value());
                match stored_version {
                    Some(v) if v != u64::from(FORMAT_VERSION) => {
                        return Err(PoolError::SerializationError(format!(
                            "Unsupported database version: {} (expected {})",
                            v, FORMAT_VERSION
                        )));
                    }
                    Some(_) => {}
                    None => {
                        meta.insert(VERSION_KEY, u64::from(FORMAT_VERSION))
                            .map_err(io_err)?;
                    }
                }
            }
            let _ = write_txn.open_table(POOL).map_err(io_err)?;
            let _ = write_txn.open_table(ACCOUNTS).map_err(io_err)?;
            let _ = write_txn.open_table(LEDGER).map_err(io_err)?;
            let _ = write_txn.open_table(SETTINGS).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        Ok(Self { db })
    }

    /// Whether a pool has been written to this database.
    pub fn is_initialized(&self) -> Result<bool, PoolError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(POOL).map_err(io_err)?;
        Ok(table.get(STATE_KEY).map_err(io_err)?.is_some())
    }

    /// Load the stored pool, or `None` for a fresh database.
    pub fn load(&self) -> Result<Option<StoredPool>, PoolError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;

        let state: PoolState = {
            let table = read_txn.open_table(POOL).map_err(io_err)?;
            let Some(bytes) = table.get(STATE_KEY).map_err(io_err)? else {
                return Ok(None);
            };
            postcard::from_bytes(bytes.value())
                .map_err(|e| PoolError::SerializationError(e.to_string()))?
        };

        let accounts = {
            let table = read_txn.open_table(ACCOUNTS).map_err(io_err)?;
            let mut accounts = BTreeMap::new();
            for entry in table.iter().map_err(io_err)? {
                let (key, value) = entry.map_err(io_err)?;
                accounts.insert(AccountId::new(key.value())?, value.value());
            }
            accounts
        };

        let ledger = {
            let table = read_txn.open_table(LEDGER).map_err(io_err)?;
            match table.get(LEDGER_KEY).map_err(io_err)? {
                Some(bytes) => postcard::from_bytes(bytes.value())
                    .map_err(|e| PoolError::SerializationError(e.to_string()))?,
                None => MemoryLedger::new(),
            }
        };

        let clock_override = {
            let table = read_txn.open_table(SETTINGS).map_err(io_err)?;
            table
                .get(CLOCK_OVERRIDE_KEY)
                .map_err(io_err)?
                .map(|v| v.value())
        };

        let snapshot = PoolSnapshot { state, accounts };
        snapshot.validate()?;

        Ok(Some(StoredPool {
            snapshot,
            ledger,
            clock_override,
        }))
    }

    /// Write the pool, every account and the ledger in one transaction.
    ///
    /// Accounts are never deleted (a zero principal is a valid terminal
    /// state), so upserting every entry leaves no stale rows behind.
    pub fn commit(&self, snapshot: &PoolSnapshot, ledger: &MemoryLedger) -> Result<(), PoolError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        Self::write_pool(&write_txn, snapshot, ledger)?;
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }

    /// Replace the whole pool (used by import): accounts absent from the
    /// snapshot are removed in the same transaction.
    pub fn replace(&self, snapshot: &PoolSnapshot, ledger: &MemoryLedger) -> Result<(), PoolError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        write_txn.delete_table(ACCOUNTS).map_err(io_err)?;
        Self::write_pool(&write_txn, snapshot, ledger)?;
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }

    fn write_pool(
        write_txn: &WriteTransaction,
        snapshot: &PoolSnapshot,
        ledger: &MemoryLedger,
    ) -> Result<(), PoolError> {
        let state_bytes = postcard::to_allocvec(&snapshot.state)
            .map_err(|e| PoolError::SerializationError(e.to_string()))?;
        let ledger_bytes = postcard::to_allocvec(ledger)
            .map_err(|e| PoolError::SerializationError(e.to_string()))?;

        let mut pool = write_txn.open_table(POOL).map_err(io_err)?;
        pool.insert(STATE_KEY, state_bytes.as_slice())
            .map_err(io_err)?;

        let mut accounts = write_txn.open_table(ACCOUNTS).map_err(io_err)?;
        for (account, principal) in &snapshot.accounts {
            accounts
                .insert(account.as_str(), *principal)
                .map_err(io_err)?;
        }

        let mut ledger_table = write_txn.open_table(LEDGER).map_err(io_err)?;
        ledger_table
            .insert(LEDGER_KEY, ledger_bytes.as_slice())
            .map_err(io_err)?;
        Ok(())
    }

    /// Store or clear the administrative clock override.
    pub fn set_clock_override(&self, elapsed: Option<i64>) -> Result<(), PoolError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = write_txn.open_table(SETTINGS).map_err(io_err)?;
            match elapsed {
                Some(t) => {
                    table.insert(CLOCK_OVERRIDE_KEY, t).map_err(io_err)?;
                }
                None => {
                    table.remove(CLOCK_OVERRIDE_KEY).map_err(io_err)?;
                }
            }
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }

    /// Compact the database (optional optimization).
    pub fn compact(&mut self) -> Result<(), PoolError> {
        self.db.compact().map_err(io_err)?;
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
