//! Shared handle for callers that reach one pool from several threads.
//!
//! Operations take the write lock, so two withdrawals can never interleave
//! between reading the aggregates and writing them back.

use crate::pool::StakingPool;
use crate::ports::{AdminAuthority, AssetTransferPort, Clock};
use crate::{
    AccountId, Amount, Phase, PoolError, PoolSnapshot, RewardReceipt, StakeReceipt,
    WithdrawReceipt,
};
use std::sync::{Arc, RwLock};

/// A cloneable, thread-safe pool handle.
#[derive(Debug)]
pub struct SharedPool<P, C, A> {
    inner: Arc<RwLock<StakingPool<P, C, A>>>,
}

impl<P, C, A> Clone for SharedPool<P, C, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, C, A> SharedPool<P, C, A>
where
    P: AssetTransferPort,
    C: Clock,
    A: AdminAuthority,
{
    #[must_use]
    pub fn new(pool: StakingPool<P, C, A>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(pool)),
        }
    }

    pub fn stake(&self, account: &AccountId, amount: Amount) -> Result<StakeReceipt, PoolError> {
        self.write(|pool| pool.stake(account, amount))
    }

    pub fn withdraw(
        &self,
        account: &AccountId,
        amount: Amount,
    ) -> Result<WithdrawReceipt, PoolError> {
        self.write(|pool| pool.withdraw(account, amount))
    }

    pub fn configure_reward(
        &self,
        caller: &AccountId,
        total_reward: Amount,
        early_portion: Amount,
    ) -> Result<RewardReceipt, PoolError> {
        self.write(|pool| pool.configure_reward(caller, total_reward, early_portion))
    }

    pub fn phase(&self) -> Result<Phase, PoolError> {
        self.read(|pool| Ok(pool.phase()))
    }

    pub fn principal_of(&self, account: &AccountId) -> Result<Amount, PoolError> {
        self.read(|pool| Ok(pool.principal_of(account)))
    }

    /// Consistent copy of aggregates and principals.
    pub fn snapshot(&self) -> Result<PoolSnapshot, PoolError> {
        self.read(|pool| Ok(pool.snapshot()))
    }

    /// Run `f` with shared access to the pool.
    pub fn read<T>(
        &self,
        f: impl FnOnce(&StakingPool<P, C, A>) -> Result<T, PoolError>,
    ) -> Result<T, PoolError> {
        let guard = self.inner.read().map_err(|_| PoolError::LockPoisoned)?;
        f(&guard)
    }

    /// Run `f` with exclusive access to the pool.
    pub fn write<T>(
        &self,
        f: impl FnOnce(&mut StakingPool<P, C, A>) -> Result<T, PoolError>,
    ) -> Result<T, PoolError> {
        let mut guard = self.inner.write().map_err(|_| PoolError::LockPoisoned)?;
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use crate::ports::{FixedAdmin, ManualClock};
    use crate::PoolParams;
    use std::thread;

    fn account(id: &str) -> AccountId {
        AccountId::new(id).expect("account id")
    }

    #[test]
    fn concurrent_stakes_respect_capacity() {
        let mut ledger = MemoryLedger::new();
        let stakers: Vec<AccountId> = (0..8).map(|i| account(&format!("s{i}"))).collect();
        for s in &stakers {
            ledger.mint(s, 100).expect("mint");
            ledger.approve(s, 100);
        }
        let clock = ManualClock::new(-1);
        let pool = StakingPool::new(
            PoolParams::new("shared", 500, 60_000),
            ledger,
            clock,
            FixedAdmin::new(account("owner")),
        )
        .expect("pool");
        let shared = SharedPool::new(pool);

        let handles: Vec<_> = stakers
            .iter()
            .cloned()
            .map(|s| {
                let handle = shared.clone();
                thread::spawn(move || handle.stake(&s, 100))
            })
            .collect();
        let admitted: u128 = handles
            .into_iter()
            .filter_map(|h| h.join().expect("join").ok())
            .map(|r| r.admitted)
            .sum();

        let snapshot = shared.snapshot().expect("snapshot");
        assert_eq!(admitted, 500);
        assert_eq!(snapshot.state.total_staked, 500);
        assert_eq!(snapshot.accounts.values().sum::<u128>(), 500);
    }

    #[test]
    fn read_sees_committed_writes() {
        let alice = account("alice");
        let mut ledger = MemoryLedger::new();
        ledger.mint(&alice, 50).expect("mint");
        ledger.approve(&alice, 50);
        let pool = StakingPool::new(
            PoolParams::new("shared", 100, 60_000),
            ledger,
            ManualClock::new(-5),
            FixedAdmin::new(account("owner")),
        )
        .expect("pool");
        let shared = SharedPool::new(pool);

        shared.stake(&alice, 50).expect("stake");

        assert_eq!(shared.principal_of(&alice).expect("read"), 50);
        assert!(matches!(
            shared.phase().expect("phase"),
            Phase::PreMaturity { until: 5 }
        ));
    }
}
