//! # Core Type Definitions
//!
//! This module contains all core types for the stakepool ledger:
//! - Account identifiers and amounts (`AccountId`, `Amount`)
//! - Pool configuration and aggregate accounting (`PoolParams`, `PoolState`)
//! - Portable state (`PoolSnapshot`)
//! - Operation receipts (`StakeReceipt`, `WithdrawReceipt`, `RewardReceipt`)
//! - Error types (`PoolError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` where they key a `BTreeMap`
//! - Use checked arithmetic; overflow is an error, never a wrap

use crate::phase::Phase;
use crate::primitives::MAX_ACCOUNT_ID_LENGTH;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// =============================================================================
// AMOUNTS & ACCOUNTS
// =============================================================================

/// A quantity of the pooled asset, in its smallest indivisible unit.
pub type Amount = u128;

/// Identifier of a participant (depositor or administrator).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create an account identifier, rejecting empty or oversized ids.
    pub fn new(id: impl Into<String>) -> Result<Self, PoolError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(PoolError::InvalidAccount("empty account id".to_string()));
        }
        if trimmed.len() > MAX_ACCOUNT_ID_LENGTH {
            return Err(PoolError::InvalidAccount(format!(
                "account id longer than {} bytes",
                MAX_ACCOUNT_ID_LENGTH
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the account id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// POOL PARAMETERS
// =============================================================================

/// Construction-time parameters of a pool. Immutable for the pool's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolParams {
    /// Human readable pool name.
    pub name: String,
    /// Maximum cumulative principal ever admitted.
    pub capacity: Amount,
    /// Length of the early-withdrawal window, in clock units (milliseconds).
    pub window_duration: u64,
    /// Reject stakes once the maturity boundary has passed.
    pub close_staking_at_maturity: bool,
}

impl PoolParams {
    /// Create parameters with staking closed at maturity.
    #[must_use]
    pub fn new(name: impl Into<String>, capacity: Amount, window_duration: u64) -> Self {
        Self {
            name: name.into(),
            capacity,
            window_duration,
            close_staking_at_maturity: true,
        }
    }

    /// Toggle whether stakes are rejected after maturity.
    #[must_use]
    pub fn with_staking_closed_at_maturity(mut self, closed: bool) -> Self {
        self.close_staking_at_maturity = closed;
        self
    }

    /// Validate the parameters.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.capacity == 0 {
            return Err(PoolError::InvalidConfig(
                "capacity must be positive".to_string(),
            ));
        }
        if self.window_duration == 0 {
            return Err(PoolError::InvalidConfig(
                "window duration must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// POOL STATE
// =============================================================================

/// Aggregate accounting of a pool.
///
/// `reward_balance` and `staked_balance` stop changing once `frozen` is set;
/// from then on they are the snapshot every closed-phase settlement divides by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    pub params: PoolParams,
    /// Cumulative principal ever admitted. Never decreases.
    pub total_staked: Amount,
    /// Cumulative reward configured.
    pub total_reward: Amount,
    /// Cumulative share of the reward earned linearly over the window.
    pub early_withdraw_reward: Amount,
    /// Reward not yet paid out (frozen after close).
    pub reward_balance: Amount,
    /// Principal currently outstanding (frozen after close).
    pub staked_balance: Amount,
    pub frozen: bool,
}

impl PoolState {
    /// Fresh state for the given parameters.
    #[must_use]
    pub fn new(params: PoolParams) -> Self {
        Self {
            params,
            total_staked: 0,
            total_reward: 0,
            early_withdraw_reward: 0,
            reward_balance: 0,
            staked_balance: 0,
            frozen: false,
        }
    }

    /// Capacity not yet admitted.
    #[must_use]
    pub fn remaining_capacity(&self) -> Amount {
        self.params.capacity.saturating_sub(self.total_staked)
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// A complete, self-consistent copy of a pool: aggregates plus every account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub state: PoolState,
    pub accounts: BTreeMap<AccountId, Amount>,
}

impl PoolSnapshot {
    /// Check the accounting invariants.
    ///
    /// Before the freeze the principals sum to `staked_balance`; afterwards
    /// `staked_balance` is a fixed snapshot and only bounds the sum.
    pub fn validate(&self) -> Result<(), PoolError> {
        let state = &self.state;
        state.params.validate()?;

        if state.total_staked > state.params.capacity {
            return Err(PoolError::CorruptState(format!(
                "total staked {} exceeds capacity {}",
                state.total_staked, state.params.capacity
            )));
        }
        if state.staked_balance > state.total_staked {
            return Err(PoolError::CorruptState(format!(
                "staked balance {} exceeds total staked {}",
                state.staked_balance, state.total_staked
            )));
        }
        if state.early_withdraw_reward > state.total_reward {
            return Err(PoolError::CorruptState(
                "early withdraw reward exceeds total reward".to_string(),
            ));
        }
        if state.reward_balance > state.total_reward {
            return Err(PoolError::CorruptState(
                "reward balance exceeds total reward".to_string(),
            ));
        }

        let principal_sum = self
            .accounts
            .values()
            .try_fold(0u128, |acc, p| acc.checked_add(*p))
            .ok_or(PoolError::ArithmeticOverflow)?;

        let consistent = if state.frozen {
            principal_sum <= state.staked_balance
        } else {
            principal_sum == state.staked_balance
        };
        if !consistent {
            return Err(PoolError::CorruptState(format!(
                "account principals sum to {} against staked balance {}",
                principal_sum, state.staked_balance
            )));
        }
        Ok(())
    }
}

// =============================================================================
// RECEIPTS
// =============================================================================

/// Outcome of a stake. `requested - admitted` was never drawn from the depositor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeReceipt {
    pub account: AccountId,
    pub requested: Amount,
    pub admitted: Amount,
    pub principal_after: Amount,
}

impl StakeReceipt {
    /// Portion of the request left in the depositor's balance.
    #[must_use]
    pub fn unadmitted(&self) -> Amount {
        self.requested - self.admitted
    }
}

/// Outcome of a withdrawal; `payout = amount + reward` went out in one transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawReceipt {
    pub account: AccountId,
    pub amount: Amount,
    pub reward: Amount,
    pub payout: Amount,
    pub phase: Phase,
    pub principal_after: Amount,
}

/// Outcome of a reward configuration call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardReceipt {
    pub total_reward: Amount,
    pub early_portion: Amount,
    pub reward_balance_after: Amount,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the stakepool system.
///
/// - Every error is local to the failing call
/// - Validation happens before any mutation, so a failed call leaves no trace
/// - The CORE should never panic; all errors must be recoverable
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool has no headroom left for new principal.
    #[error("Staking capacity exhausted")]
    CapacityExhausted,

    /// The early portion of a reward exceeds the reward itself.
    #[error("Invalid reward split: early portion {early} exceeds total {total}")]
    InvalidRewardSplit { total: Amount, early: Amount },

    /// The withdrawal amount is zero or larger than the account's principal.
    #[error("Insufficient stake: requested {requested}, staked {staked}")]
    InsufficientStake { requested: Amount, staked: Amount },

    /// Withdrawal attempted before the maturity boundary.
    #[error("Withdrawal not open yet")]
    WithdrawalNotOpen,

    /// Reward configuration attempted after the early-withdrawal window closed.
    #[error("Pool is closed")]
    PoolClosed,

    /// The asset transfer port declined a movement.
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    /// A stake or reward of zero units.
    #[error("Amount must be positive")]
    ZeroAmount,

    /// Stake attempted after the maturity boundary.
    #[error("Staking period is over")]
    StakingClosed,

    /// The caller failed the administrator check.
    #[error("Caller {0} is not an administrator")]
    Unauthorized(AccountId),

    /// An account id is malformed.
    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    /// A result does not fit the amount type.
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    /// Pool parameters or application configuration are invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Loaded state violates an accounting invariant.
    #[error("Corrupt pool state: {0}")]
    CorruptState(String),

    /// The database holds no pool yet.
    #[error("Pool not initialized")]
    Uninitialized,

    /// A shared lock was poisoned by a panicking holder.
    #[error("Pool lock poisoned")]
    LockPoisoned,

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
