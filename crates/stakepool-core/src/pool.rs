//! # Staking Pool Engine
//!
//! Holds the pool aggregates and per-account principal, and implements the
//! three mutating operations:
//!
//! - `stake`: capacity-clamped admission
//! - `configure_reward`: additive reward funding, administrator only
//! - `withdraw`: settlement with the early (linear) or closed (proportional)
//!   formula, depending on the phase observed at call time
//!
//! ## Atomicity
//!
//! Every operation validates and computes its full effect first, then issues
//! the single transfer, and only mutates state once the transfer succeeded.
//! A failed call leaves the pool exactly as it was.
//!
//! ## Freeze
//!
//! There is no timer. The close of the window is detected lazily by the next
//! withdrawal: the live `reward_balance`/`staked_balance` become the frozen
//! snapshot and are never written again.

use crate::phase::Phase;
use crate::ports::{AdminAuthority, AssetTransferPort, Clock};
use crate::reward;
use crate::{
    AccountId, Amount, PoolError, PoolParams, PoolSnapshot, PoolState, RewardReceipt,
    StakeReceipt, WithdrawReceipt,
};
use std::collections::BTreeMap;

/// A single staking pool bound to its transfer port, clock and authority.
#[derive(Debug)]
pub struct StakingPool<P, C, A> {
    state: PoolState,
    accounts: BTreeMap<AccountId, Amount>,
    port: P,
    clock: C,
    authority: A,
}

impl<P, C, A> StakingPool<P, C, A>
where
    P: AssetTransferPort,
    C: Clock,
    A: AdminAuthority,
{
    /// Create an empty pool.
    pub fn new(params: PoolParams, port: P, clock: C, authority: A) -> Result<Self, PoolError> {
        params.validate()?;
        Ok(Self {
            state: PoolState::new(params),
            accounts: BTreeMap::new(),
            port,
            clock,
            authority,
        })
    }

    /// Rebuild a pool from a snapshot, checking its invariants first.
    pub fn from_snapshot(
        snapshot: PoolSnapshot,
        port: P,
        clock: C,
        authority: A,
    ) -> Result<Self, PoolError> {
        snapshot.validate()?;
        Ok(Self {
            state: snapshot.state,
            accounts: snapshot.accounts,
            port,
            clock,
            authority,
        })
    }

    // =========================================================================
    // ADMISSION
    // =========================================================================

    /// Stake up to `requested` units from `account`.
    ///
    /// Admits `min(requested, capacity - total_staked)`; only the admitted
    /// amount is drawn. Partial admission is not an error.
    ///
    /// Staking is always closed once the window has elapsed, whatever
    /// `close_staking_at_maturity` says: the closed-phase divisor must not move.
    pub fn stake(
        &mut self,
        account: &AccountId,
        requested: Amount,
    ) -> Result<StakeReceipt, PoolError> {
        if requested == 0 {
            return Err(PoolError::ZeroAmount);
        }
        let phase = self.phase();
        if phase.is_closed()
            || (self.state.params.close_staking_at_maturity && phase.accepts_withdrawals())
        {
            return Err(PoolError::StakingClosed);
        }

        let admitted = requested.min(self.state.remaining_capacity());
        if admitted == 0 {
            return Err(PoolError::CapacityExhausted);
        }

        let principal_after = self
            .principal_of(account)
            .checked_add(admitted)
            .ok_or(PoolError::ArithmeticOverflow)?;
        let staked_balance_after = self
            .state
            .staked_balance
            .checked_add(admitted)
            .ok_or(PoolError::ArithmeticOverflow)?;

        self.port
            .authorize_draw(account, requested)
            .map_err(|e| PoolError::TransferFailed(e.to_string()))?;
        self.port
            .transfer_into(account, admitted)
            .map_err(|e| PoolError::TransferFailed(e.to_string()))?;

        // total_staked + admitted <= capacity, cannot overflow
        self.state.total_staked += admitted;
        self.state.staked_balance = staked_balance_after;
        self.accounts.insert(account.clone(), principal_after);

        Ok(StakeReceipt {
            account: account.clone(),
            requested,
            admitted,
            principal_after,
        })
    }

    // =========================================================================
    // REWARD CONFIGURATION
    // =========================================================================

    /// Fund the pool with `total_reward`, of which `early_portion` is earned
    /// linearly over the early-withdrawal window. Additive across calls.
    pub fn configure_reward(
        &mut self,
        caller: &AccountId,
        total_reward: Amount,
        early_portion: Amount,
    ) -> Result<RewardReceipt, PoolError> {
        if !self.authority.is_administrator(caller) {
            return Err(PoolError::Unauthorized(caller.clone()));
        }
        if total_reward == 0 {
            return Err(PoolError::ZeroAmount);
        }
        if early_portion > total_reward {
            return Err(PoolError::InvalidRewardSplit {
                total: total_reward,
                early: early_portion,
            });
        }
        if self.phase().is_closed() {
            return Err(PoolError::PoolClosed);
        }

        let total_after = self
            .state
            .total_reward
            .checked_add(total_reward)
            .ok_or(PoolError::ArithmeticOverflow)?;
        let early_after = self
            .state
            .early_withdraw_reward
            .checked_add(early_portion)
            .ok_or(PoolError::ArithmeticOverflow)?;
        let balance_after = self
            .state
            .reward_balance
            .checked_add(total_reward)
            .ok_or(PoolError::ArithmeticOverflow)?;

        self.port
            .transfer_into(caller, total_reward)
            .map_err(|e| PoolError::TransferFailed(e.to_string()))?;

        self.state.total_reward = total_after;
        self.state.early_withdraw_reward = early_after;
        self.state.reward_balance = balance_after;

        Ok(RewardReceipt {
            total_reward,
            early_portion,
            reward_balance_after: balance_after,
        })
    }

    // =========================================================================
    // SETTLEMENT
    // =========================================================================

    /// Withdraw `amount` of principal plus its reward.
    pub fn withdraw(
        &mut self,
        account: &AccountId,
        amount: Amount,
    ) -> Result<WithdrawReceipt, PoolError> {
        let phase = self.phase();
        if !phase.accepts_withdrawals() {
            return Err(PoolError::WithdrawalNotOpen);
        }

        let staked = self.principal_of(account);
        if amount == 0 || amount > staked {
            return Err(PoolError::InsufficientStake {
                requested: amount,
                staked,
            });
        }

        let settlement = self.settle(phase, amount)?;
        let payout = amount
            .checked_add(settlement.reward)
            .ok_or(PoolError::ArithmeticOverflow)?;

        self.port
            .transfer_out_of(account, payout)
            .map_err(|e| PoolError::TransferFailed(e.to_string()))?;

        let principal_after = staked - amount;
        self.accounts.insert(account.clone(), principal_after);
        match settlement.balances_after {
            Some((staked_balance, reward_balance)) => {
                self.state.staked_balance = staked_balance;
                self.state.reward_balance = reward_balance;
            }
            None => self.state.frozen = true,
        }

        Ok(WithdrawReceipt {
            account: account.clone(),
            amount,
            reward: settlement.reward,
            payout,
            phase: if self.state.frozen {
                Phase::Closed { frozen: true }
            } else {
                phase
            },
            principal_after,
        })
    }

    /// Reward a withdrawal of `amount` would receive right now. Mutates nothing.
    pub fn quote_withdraw(&self, amount: Amount) -> Result<Amount, PoolError> {
        let phase = self.phase();
        if !phase.accepts_withdrawals() {
            return Err(PoolError::WithdrawalNotOpen);
        }
        Ok(self.settle(phase, amount)?.reward)
    }

    /// Compute the reward and, for the early window, the aggregates after
    /// the withdrawal. `balances_after` is `None` in the closed phase, where
    /// the aggregates are frozen.
    fn settle(&self, phase: Phase, amount: Amount) -> Result<Settlement, PoolError> {
        match phase {
            Phase::Open { elapsed, .. } => {
                // late stakes can push the sum of early rewards past the reserve
                let reward = reward::early_reward(
                    amount,
                    self.state.early_withdraw_reward,
                    elapsed,
                    self.state.total_staked,
                    self.state.params.window_duration,
                )?
                .min(self.state.reward_balance);
                let staked_balance = self
                    .state
                    .staked_balance
                    .checked_sub(amount)
                    .ok_or(PoolError::ArithmeticOverflow)?;
                let reward_balance = self.state.reward_balance - reward;
                Ok(Settlement {
                    reward,
                    balances_after: Some((staked_balance, reward_balance)),
                })
            }
            Phase::Closed { .. } => Ok(Settlement {
                reward: reward::closed_reward(
                    amount,
                    self.state.reward_balance,
                    self.state.staked_balance,
                )?,
                balances_after: None,
            }),
            Phase::PreMaturity { .. } => Err(PoolError::WithdrawalNotOpen),
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Elapsed time since maturity according to the clock.
    pub fn elapsed(&self) -> i64 {
        self.clock.elapsed_since_maturity()
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        Phase::at(
            self.elapsed(),
            self.state.params.window_duration,
            self.state.frozen,
        )
    }

    /// Current early reward per million units of principal.
    ///
    /// Zero before maturity; the closed-phase rate once the window is over.
    pub fn rate_per_million(&self) -> Result<Amount, PoolError> {
        match self.phase() {
            Phase::PreMaturity { .. } => Ok(0),
            Phase::Open { elapsed, .. } => reward::early_rate_per_million(
                self.state.early_withdraw_reward,
                elapsed,
                self.state.total_staked,
                self.state.params.window_duration,
            ),
            Phase::Closed { .. } => reward::closed_rate_per_million(
                self.state.reward_balance,
                self.state.staked_balance,
            ),
        }
    }

    /// Principal currently staked by `account` (zero if it never staked).
    pub fn principal_of(&self, account: &AccountId) -> Amount {
        self.accounts.get(account).copied().unwrap_or(0)
    }

    /// All accounts that ever staked, in account order.
    pub fn accounts(&self) -> impl Iterator<Item = (&AccountId, Amount)> {
        self.accounts.iter().map(|(k, v)| (k, *v))
    }

    pub fn params(&self) -> &PoolParams {
        &self.state.params
    }

    pub fn state(&self) -> &PoolState {
        &self.state
    }

    pub fn capacity(&self) -> Amount {
        self.state.params.capacity
    }

    pub fn total_staked(&self) -> Amount {
        self.state.total_staked
    }

    pub fn total_reward(&self) -> Amount {
        self.state.total_reward
    }

    pub fn early_withdraw_reward(&self) -> Amount {
        self.state.early_withdraw_reward
    }

    pub fn reward_balance(&self) -> Amount {
        self.state.reward_balance
    }

    pub fn staked_balance(&self) -> Amount {
        self.state.staked_balance
    }

    pub fn is_frozen(&self) -> bool {
        self.state.frozen
    }

    /// Consistent copy of the aggregates and every account.
    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            state: self.state.clone(),
            accounts: self.accounts.clone(),
        }
    }

    /// Replace state with a previously taken snapshot.
    pub fn restore(&mut self, snapshot: PoolSnapshot) -> Result<(), PoolError> {
        snapshot.validate()?;
        self.state = snapshot.state;
        self.accounts = snapshot.accounts;
        Ok(())
    }

    // =========================================================================
    // CAPABILITIES
    // =========================================================================

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Swap the clock (e.g. install or remove an administrative override).
    pub fn set_clock(&mut self, clock: C) {
        self.clock = clock;
    }

    pub fn authority(&self) -> &A {
        &self.authority
    }
}

/// Computed effect of a withdrawal before it is applied.
struct Settlement {
    reward: Amount,
    /// `(staked_balance, reward_balance)` after an early withdrawal.
    balances_after: Option<(Amount, Amount)>,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use crate::ports::{FixedAdmin, ManualClock};

    type TestPool = StakingPool<MemoryLedger, ManualClock, FixedAdmin>;

    fn account(id: &str) -> AccountId {
        AccountId::new(id).expect("account id")
    }

    fn funded_pool(capacity: Amount) -> (TestPool, ManualClock) {
        let owner = account("owner");
        let mut ledger = MemoryLedger::new();
        ledger.mint(&owner, 10_000).expect("mint");
        ledger.approve(&owner, 10_000);
        for id in ["ac1", "ac2"] {
            let acc = account(id);
            ledger.mint(&acc, 2_000).expect("mint");
            ledger.approve(&acc, 2_000);
        }
        let clock = ManualClock::new(-1);
        let pool = StakingPool::new(
            PoolParams::new("test", capacity, 60_000),
            ledger,
            clock.clone(),
            FixedAdmin::new(owner),
        )
        .expect("pool");
        (pool, clock)
    }

    #[test]
    fn stake_clamps_to_remaining_capacity() {
        let (mut pool, _) = funded_pool(1000);
        let ac1 = account("ac1");
        let ac2 = account("ac2");

        pool.stake(&ac1, 300).expect("stake");
        let receipt = pool.stake(&ac2, 1000).expect("stake");

        assert_eq!(receipt.admitted, 700);
        assert_eq!(receipt.unadmitted(), 300);
        assert_eq!(pool.total_staked(), 1000);
        assert_eq!(pool.port().balance_of(&ac2), 1300);
    }

    #[test]
    fn stake_fails_when_capacity_exhausted() {
        let (mut pool, _) = funded_pool(100);
        let ac1 = account("ac1");
        pool.stake(&ac1, 100).expect("stake");
        let before = pool.snapshot();

        assert!(matches!(
            pool.stake(&ac1, 1),
            Err(PoolError::CapacityExhausted)
        ));
        assert_eq!(pool.snapshot(), before);
    }

    #[test]
    fn stake_zero_is_rejected() {
        let (mut pool, _) = funded_pool(100);
        assert!(matches!(
            pool.stake(&account("ac1"), 0),
            Err(PoolError::ZeroAmount)
        ));
    }

    #[test]
    fn stake_after_maturity_is_rejected() {
        let (mut pool, clock) = funded_pool(100);
        clock.set(0);
        assert!(matches!(
            pool.stake(&account("ac1"), 10),
            Err(PoolError::StakingClosed)
        ));
    }

    #[test]
    fn stake_without_allowance_leaves_state_untouched() {
        let (mut pool, _) = funded_pool(1000);
        let stranger = account("stranger");
        let before = pool.snapshot();

        assert!(matches!(
            pool.stake(&stranger, 10),
            Err(PoolError::TransferFailed(_))
        ));
        assert_eq!(pool.snapshot(), before);
    }

    #[test]
    fn configure_reward_requires_admin() {
        let (mut pool, _) = funded_pool(1000);
        assert!(matches!(
            pool.configure_reward(&account("ac1"), 100, 10),
            Err(PoolError::Unauthorized(_))
        ));
        assert_eq!(pool.total_reward(), 0);
    }

    #[test]
    fn configure_reward_rejects_bad_split() {
        let (mut pool, _) = funded_pool(1000);
        assert!(matches!(
            pool.configure_reward(&account("owner"), 100, 101),
            Err(PoolError::InvalidRewardSplit {
                total: 100,
                early: 101
            })
        ));
        assert_eq!(pool.reward_balance(), 0);
        assert_eq!(pool.port().pool_balance(), 0);
    }

    #[test]
    fn configure_reward_rejected_once_window_elapsed() {
        let (mut pool, clock) = funded_pool(1000);
        clock.set(60_000);
        assert!(matches!(
            pool.configure_reward(&account("owner"), 100, 10),
            Err(PoolError::PoolClosed)
        ));
    }

    #[test]
    fn withdraw_before_maturity_is_rejected() {
        let (mut pool, _) = funded_pool(1000);
        let ac1 = account("ac1");
        pool.stake(&ac1, 100).expect("stake");

        assert!(matches!(
            pool.withdraw(&ac1, 50),
            Err(PoolError::WithdrawalNotOpen)
        ));
        assert_eq!(pool.principal_of(&ac1), 100);
    }

    #[test]
    fn withdraw_more_than_principal_is_rejected() {
        let (mut pool, clock) = funded_pool(1000);
        let ac1 = account("ac1");
        pool.stake(&ac1, 100).expect("stake");
        clock.set(10);

        assert!(matches!(
            pool.withdraw(&ac1, 101),
            Err(PoolError::InsufficientStake {
                requested: 101,
                staked: 100
            })
        ));
        assert!(matches!(
            pool.withdraw(&ac1, 0),
            Err(PoolError::InsufficientStake { .. })
        ));
    }

    #[test]
    fn first_closed_withdrawal_freezes() {
        let (mut pool, clock) = funded_pool(1000);
        let owner = account("owner");
        let ac1 = account("ac1");
        pool.configure_reward(&owner, 1000, 500).expect("reward");
        pool.stake(&ac1, 1000).expect("stake");

        clock.set(60_000);
        assert_eq!(pool.phase(), Phase::Closed { frozen: false });

        let receipt = pool.withdraw(&ac1, 400).expect("withdraw");
        assert_eq!(receipt.reward, 400);
        assert_eq!(receipt.phase, Phase::Closed { frozen: true });
        assert!(pool.is_frozen());
        assert_eq!(pool.reward_balance(), 1000);
        assert_eq!(pool.staked_balance(), 1000);
    }

    #[test]
    fn quote_matches_withdrawal() {
        let (mut pool, clock) = funded_pool(1000);
        let owner = account("owner");
        let ac1 = account("ac1");
        pool.configure_reward(&owner, 1000, 500).expect("reward");
        pool.stake(&ac1, 1000).expect("stake");
        clock.set(30_000);

        let quote = pool.quote_withdraw(400).expect("quote");
        let receipt = pool.withdraw(&ac1, 400).expect("withdraw");
        assert_eq!(quote, receipt.reward);
        assert_eq!(pool.rate_per_million().expect("rate"), 250_000);
    }

    #[test]
    fn failed_payout_leaves_state_untouched() {
        let (mut pool, clock) = funded_pool(1000);
        let ac1 = account("ac1");
        pool.stake(&ac1, 100).expect("stake");
        clock.set(60_000);

        // Drain the pool's holdings behind the engine's back.
        let drain = account("drain");
        pool.port_mut().transfer_out_of(&drain, 100).expect("drain");
        let before = pool.snapshot();

        assert!(matches!(
            pool.withdraw(&ac1, 100),
            Err(PoolError::TransferFailed(_))
        ));
        assert_eq!(pool.snapshot(), before);
        assert!(!pool.is_frozen());
    }
}
