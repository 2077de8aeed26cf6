//! # Session Module
//!
//! A Session pairs a [`StakingPool`] running on the bundled [`MemoryLedger`]
//! with a storage backend.
//!
//! ## Storage Backends
//!
//! - `InMemory`: state lives only in the process
//! - `Persistent`: every successful operation is committed to a `RedbStore`
//!   in a single transaction
//!
//! If the commit fails the in-memory pool and ledger are rolled back to the
//! checkpoint taken before the operation, so memory and disk never diverge.

use crate::ledger::MemoryLedger;
use crate::pool::StakingPool;
use crate::ports::{ClockSource, FixedAdmin, ManualClock, SystemClock};
use crate::storage::RedbStore;
use crate::{
    AccountId, Amount, PoolError, PoolParams, PoolSnapshot, RewardReceipt, StakeReceipt,
    WithdrawReceipt,
};
use std::path::Path;

/// The pool type a session drives.
pub type LedgerPool = StakingPool<MemoryLedger, ClockSource, FixedAdmin>;

/// Storage backend for a Session.
#[derive(Debug, Default)]
pub enum StorageBackend {
    /// Process memory only.
    #[default]
    InMemory,
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

// NOTE: Session does NOT implement Clone.
// RedbStore (database handle) cannot be safely cloned.

/// A pool plus the backend that persists it.
#[derive(Debug)]
pub struct Session {
    pool: LedgerPool,
    backend: StorageBackend,
    /// Live clock used whenever no administrative override is installed.
    system_clock: SystemClock,
}

impl Session {
    /// Create an in-memory session.
    pub fn in_memory(
        params: PoolParams,
        ledger: MemoryLedger,
        system_clock: SystemClock,
        admin: FixedAdmin,
    ) -> Result<Self, PoolError> {
        let pool = StakingPool::new(params, ledger, ClockSource::System(system_clock), admin)?;
        Ok(Self {
            pool,
            backend: StorageBackend::InMemory,
            system_clock,
        })
    }

    /// Create a new pool in a redb database.
    ///
    /// Fails if the database already holds a pool.
    pub fn create_redb(
        path: impl AsRef<Path>,
        params: PoolParams,
        ledger: MemoryLedger,
        system_clock: SystemClock,
        admin: FixedAdmin,
    ) -> Result<Self, PoolError> {
        let store = RedbStore::open(path)?;
        if store.is_initialized()? {
            return Err(PoolError::InvalidConfig(
                "database already holds a pool".to_string(),
            ));
        }
        let pool = StakingPool::new(params, ledger, ClockSource::System(system_clock), admin)?;
        store.commit(&pool.snapshot(), pool.port())?;
        Ok(Self {
            pool,
            backend: StorageBackend::Persistent(store),
            system_clock,
        })
    }

    /// Resume a pool from a redb database.
    ///
    /// A stored clock override takes precedence over the system clock.
    pub fn open_redb(
        path: impl AsRef<Path>,
        system_clock: SystemClock,
        admin: FixedAdmin,
    ) -> Result<Self, PoolError> {
        let store = RedbStore::open(path)?;
        let stored = store.load()?.ok_or(PoolError::Uninitialized)?;
        let clock = match stored.clock_override {
            Some(t) => ClockSource::Manual(ManualClock::new(t)),
            None => ClockSource::System(system_clock),
        };
        let pool = StakingPool::from_snapshot(stored.snapshot, stored.ledger, clock, admin)?;
        Ok(Self {
            pool,
            backend: StorageBackend::Persistent(store),
            system_clock,
        })
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    /// Read access to the pool.
    #[must_use]
    pub fn pool(&self) -> &LedgerPool {
        &self.pool
    }

    /// Read access to the bundled ledger.
    #[must_use]
    pub fn ledger(&self) -> &MemoryLedger {
        self.pool.port()
    }

    #[must_use]
    pub fn snapshot(&self) -> PoolSnapshot {
        self.pool.snapshot()
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    pub fn stake(&mut self, account: &AccountId, amount: Amount) -> Result<StakeReceipt, PoolError> {
        self.apply(|pool| pool.stake(account, amount))
    }

    pub fn withdraw(
        &mut self,
        account: &AccountId,
        amount: Amount,
    ) -> Result<WithdrawReceipt, PoolError> {
        self.apply(|pool| pool.withdraw(account, amount))
    }

    pub fn configure_reward(
        &mut self,
        caller: &AccountId,
        total_reward: Amount,
        early_portion: Amount,
    ) -> Result<RewardReceipt, PoolError> {
        self.apply(|pool| pool.configure_reward(caller, total_reward, early_portion))
    }

    /// Set the allowance `owner` grants the pool on the bundled ledger.
    pub fn approve(&mut self, owner: &AccountId, amount: Amount) -> Result<(), PoolError> {
        self.apply(|pool| {
            pool.port_mut().approve(owner, amount);
            Ok(())
        })
    }

    /// Credit `amount` to `account` on the bundled ledger.
    pub fn mint(&mut self, account: &AccountId, amount: Amount) -> Result<(), PoolError> {
        self.apply(|pool| {
            pool.port_mut()
                .mint(account, amount)
                .map_err(|e| PoolError::TransferFailed(e.to_string()))
        })
    }

    /// Install (`Some`) or remove (`None`) an administrative elapsed-time override.
    pub fn set_clock_override(&mut self, elapsed: Option<i64>) -> Result<(), PoolError> {
        if let StorageBackend::Persistent(store) = &self.backend {
            store.set_clock_override(elapsed)?;
        }
        let clock = match elapsed {
            Some(t) => ClockSource::Manual(ManualClock::new(t)),
            None => ClockSource::System(self.system_clock),
        };
        self.pool.set_clock(clock);
        Ok(())
    }

    /// Replace the pool with an imported snapshot. Ledger balances are kept.
    pub fn import(&mut self, snapshot: PoolSnapshot) -> Result<(), PoolError> {
        let checkpoint = self.pool.snapshot();
        self.pool.restore(snapshot)?;
        if let StorageBackend::Persistent(store) = &self.backend
            && let Err(e) = store.replace(&self.pool.snapshot(), self.pool.port())
        {
            self.pool.restore(checkpoint)?;
            return Err(e);
        }
        Ok(())
    }

    /// Run an operation and persist its effect, rolling back memory if the
    /// commit fails.
    fn apply<T>(
        &mut self,
        op: impl FnOnce(&mut LedgerPool) -> Result<T, PoolError>,
    ) -> Result<T, PoolError> {
        let StorageBackend::Persistent(store) = &self.backend else {
            return op(&mut self.pool);
        };

        let checkpoint = (self.pool.snapshot(), self.pool.port().clone());
        let output = op(&mut self.pool)?;
        if let Err(e) = store.commit(&self.pool.snapshot(), self.pool.port()) {
            let (snapshot, ledger) = checkpoint;
            self.pool.restore(snapshot)?;
            *self.pool.port_mut() = ledger;
            return Err(e);
        }
        Ok(output)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::Phase;
    use crate::ports::AssetTransferPort;
    use tempfile::tempdir;

    fn account(id: &str) -> AccountId {
        AccountId::new(id).expect("account id")
    }

    fn seeded_ledger() -> MemoryLedger {
        let mut ledger = MemoryLedger::new();
        ledger.mint(&account("owner"), 5_000).expect("mint");
        ledger.mint(&account("ac1"), 1_000).expect("mint");
        ledger
    }

    fn far_future() -> SystemClock {
        SystemClock::new(i64::MAX)
    }

    #[test]
    fn in_memory_session_runs_operations() {
        let mut session = Session::in_memory(
            PoolParams::new("mem", 1000, 60_000),
            seeded_ledger(),
            far_future(),
            FixedAdmin::new(account("owner")),
        )
        .expect("session");
        let ac1 = account("ac1");

        session.approve(&ac1, 500).expect("approve");
        session.stake(&ac1, 500).expect("stake");

        assert!(!session.is_persistent());
        assert_eq!(session.pool().principal_of(&ac1), 500);
        assert_eq!(session.ledger().balance_of(&ac1), 500);
    }

    #[test]
    fn persistent_session_survives_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("pool.redb");
        let owner = account("owner");
        let ac1 = account("ac1");

        {
            let mut session = Session::create_redb(
                &db_path,
                PoolParams::new("disk", 1000, 60_000),
                seeded_ledger(),
                far_future(),
                FixedAdmin::new(owner.clone()),
            )
            .expect("create");
            session.approve(&owner, 1000).expect("approve");
            session.configure_reward(&owner, 1000, 500).expect("reward");
            session.approve(&ac1, 400).expect("approve");
            session.stake(&ac1, 400).expect("stake");
            session.set_clock_override(Some(30_000)).expect("clock");
        }

        let session =
            Session::open_redb(&db_path, far_future(), FixedAdmin::new(owner)).expect("reopen");
        assert!(session.is_persistent());
        assert_eq!(session.pool().principal_of(&ac1), 400);
        assert_eq!(session.pool().reward_balance(), 1000);
        assert_eq!(session.ledger().pool_balance(), 1400);
        assert!(matches!(session.pool().phase(), Phase::Open { elapsed: 30_000, .. }));
    }

    #[test]
    fn create_refuses_existing_pool() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("pool.redb");
        let params = PoolParams::new("disk", 1000, 60_000);

        Session::create_redb(
            &db_path,
            params.clone(),
            MemoryLedger::new(),
            far_future(),
            FixedAdmin::new(account("owner")),
        )
        .expect("create");

        let again = Session::create_redb(
            &db_path,
            params,
            MemoryLedger::new(),
            far_future(),
            FixedAdmin::new(account("owner")),
        );
        assert!(matches!(again, Err(PoolError::InvalidConfig(_))));
    }

    #[test]
    fn open_uninitialized_database_fails() {
        let temp = tempdir().expect("temp dir");
        let result = Session::open_redb(
            temp.path().join("empty.redb"),
            far_future(),
            FixedAdmin::new(account("owner")),
        );
        assert!(matches!(result, Err(PoolError::Uninitialized)));
    }

    #[test]
    fn removing_override_restores_system_clock() {
        let mut session = Session::in_memory(
            PoolParams::new("mem", 1000, 60_000),
            MemoryLedger::new(),
            far_future(),
            FixedAdmin::new(account("owner")),
        )
        .expect("session");

        session.set_clock_override(Some(10)).expect("set");
        assert_eq!(session.pool().elapsed(), 10);
        assert!(session.pool().clock().is_manual());

        session.set_clock_override(None).expect("clear");
        assert!(session.pool().elapsed() < 0);
    }
}
