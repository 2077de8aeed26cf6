//! # Reward Arithmetic
//!
//! Integer reward formulas. Every product is formed in a 512-bit intermediate
//! and divided once, so the result is exactly the floor of the single
//! expression; nothing is approximated and no intermediate can overflow.
//!
//! - Early window: `floor(amount × early_reward × t / (total_staked × window))`
//! - Closed: `floor(frozen_reward × amount / frozen_staked)`

use crate::primitives::{RATE_SCALE, YEAR_MS};
use crate::{Amount, PoolError};
use primitive_types::U512;

/// Narrow a 512-bit quotient back into an amount.
fn narrow(value: U512) -> Result<Amount, PoolError> {
    if value > U512::from(u128::MAX) {
        return Err(PoolError::ArithmeticOverflow);
    }
    Ok(value.low_u128())
}

/// Reward for withdrawing `amount` at `elapsed` inside the early window.
///
/// Pro-rated by the withdrawer's share of everything ever staked and by the
/// elapsed fraction of the window. Zero when nothing was staked.
pub fn early_reward(
    amount: Amount,
    early_withdraw_reward: Amount,
    elapsed: u64,
    total_staked: Amount,
    window_duration: u64,
) -> Result<Amount, PoolError> {
    if total_staked == 0 || window_duration == 0 {
        return Ok(0);
    }
    let numerator = U512::from(amount) * U512::from(early_withdraw_reward) * U512::from(elapsed);
    let denominator = U512::from(total_staked) * U512::from(window_duration);
    narrow(numerator / denominator)
}

/// Reward for withdrawing `amount` after close, against the frozen snapshot.
pub fn closed_reward(
    amount: Amount,
    frozen_reward_balance: Amount,
    frozen_staked_balance: Amount,
) -> Result<Amount, PoolError> {
    if frozen_staked_balance == 0 {
        return Ok(0);
    }
    let numerator = U512::from(frozen_reward_balance) * U512::from(amount);
    narrow(numerator / U512::from(frozen_staked_balance))
}

/// Early reward per million units of principal at `elapsed`.
pub fn early_rate_per_million(
    early_withdraw_reward: Amount,
    elapsed: u64,
    total_staked: Amount,
    window_duration: u64,
) -> Result<Amount, PoolError> {
    early_reward(
        RATE_SCALE,
        early_withdraw_reward,
        elapsed,
        total_staked,
        window_duration,
    )
}

/// Closed-phase reward per million units of principal.
pub fn closed_rate_per_million(
    frozen_reward_balance: Amount,
    frozen_staked_balance: Amount,
) -> Result<Amount, PoolError> {
    closed_reward(RATE_SCALE, frozen_reward_balance, frozen_staked_balance)
}

/// Scale a rate earned over `period` clock units to one year.
pub fn annualized(rate: Amount, period: u64) -> Result<Amount, PoolError> {
    if period == 0 {
        return Ok(0);
    }
    narrow(U512::from(rate) * U512::from(YEAR_MS) / U512::from(period))
}

// =============================================================================
// TESTS
// =============================================================================
