//! # Scenario Tests
//!
//! End-to-end runs of a pool through admission, reward funding, the early
//! window and proportional settlement, with exact integer expectations.

use stakepool_core::{
    AccountId, Amount, AssetTransferPort, FixedAdmin, ManualClock, MemoryLedger, Phase, PoolError,
    PoolParams, StakingPool,
};

type TestPool = StakingPool<MemoryLedger, ManualClock, FixedAdmin>;

const WINDOW: u64 = 60_000;

fn account(id: &str) -> AccountId {
    AccountId::new(id).expect("account id")
}

/// A pool of capacity 1000, before maturity, with `owner` and the given
/// stakers funded and approved for 2000 units each.
fn pool_with(stakers: &[&str]) -> (TestPool, ManualClock) {
    build(PoolParams::new("scenario", 1000, WINDOW), stakers)
}

/// Like [`pool_with`], but staking stays open after maturity.
fn late_staking_pool_with(stakers: &[&str]) -> (TestPool, ManualClock) {
    build(
        PoolParams::new("late", 1000, WINDOW).with_staking_closed_at_maturity(false),
        stakers,
    )
}

fn build(params: PoolParams, stakers: &[&str]) -> (TestPool, ManualClock) {
    let owner = account("owner");
    let mut ledger = MemoryLedger::new();
    ledger.mint(&owner, 10_000).expect("mint");
    ledger.approve(&owner, 10_000);
    for id in stakers {
        let acc = account(id);
        ledger.mint(&acc, 2_000).expect("mint");
        ledger.approve(&acc, 2_000);
    }
    let clock = ManualClock::new(-1_000);
    let pool = StakingPool::new(
        params,
        ledger,
        clock.clone(),
        FixedAdmin::new(owner),
    )
    .expect("pool");
    (pool, clock)
}

/// ac1 and ac2 stake 400 and 600, the owner funds (1000, 500).
fn full_pool() -> (TestPool, ManualClock) {
    let (mut pool, clock) = pool_with(&["ac1", "ac2"]);
    pool.stake(&account("ac1"), 400).expect("stake");
    pool.stake(&account("ac2"), 600).expect("stake");
    pool.configure_reward(&account("owner"), 1000, 500).expect("reward");
    (pool, clock)
}

// =============================================================================
// ADMISSION
// =============================================================================

#[test]
fn oversubscribed_stake_is_clamped_and_not_drawn() {
    let (mut pool, _) = pool_with(&["ac1", "ac2"]);
    let ac1 = account("ac1");
    let ac2 = account("ac2");

    pool.stake(&ac1, 100).expect("stake");
    pool.stake(&ac1, 100).expect("stake");
    let receipt = pool.stake(&ac2, 1000).expect("stake");

    assert_eq!(receipt.admitted, 800);
    assert_eq!(pool.principal_of(&ac1), 200);
    assert_eq!(pool.principal_of(&ac2), 800);
    assert_eq!(pool.total_staked(), 1000);
    assert_eq!(pool.staked_balance(), 1000);
    assert_eq!(pool.port().balance_of(&ac2), 1200);
    assert_eq!(pool.port().pool_balance(), 1000);
}

#[test]
fn stake_without_allowance_leaves_no_trace() {
    let (mut pool, _) = pool_with(&[]);
    let stranger = account("stranger");
    pool.port_mut().mint(&stranger, 500).expect("mint");
    let before = pool.snapshot();

    let result = pool.stake(&stranger, 100);

    assert!(matches!(result, Err(PoolError::TransferFailed(_))));
    assert_eq!(pool.snapshot(), before);
    assert_eq!(pool.port().balance_of(&stranger), 500);
}

#[test]
fn staking_closes_at_maturity_unless_configured_open() {
    let (mut pool, clock) = pool_with(&["ac1"]);
    clock.set(0);
    assert!(matches!(
        pool.stake(&account("ac1"), 10),
        Err(PoolError::StakingClosed)
    ));

    let ac1 = account("ac1");
    let mut ledger = MemoryLedger::new();
    ledger.mint(&ac1, 100).expect("mint");
    ledger.approve(&ac1, 100);
    let mut open = StakingPool::new(
        PoolParams::new("open", 1000, WINDOW).with_staking_closed_at_maturity(false),
        ledger,
        ManualClock::new(10),
        FixedAdmin::new(account("owner")),
    )
    .expect("pool");
    assert_eq!(open.stake(&ac1, 100).expect("stake").admitted, 100);
}

// =============================================================================
// REWARD CONFIGURATION
// =============================================================================

#[test]
fn reward_configuration_is_additive() {
    let (mut pool, _) = pool_with(&[]);
    let owner = account("owner");

    pool.configure_reward(&owner, 100, 10).expect("first");
    pool.configure_reward(&owner, 50, 40).expect("second");

    assert_eq!(pool.total_reward(), 150);
    assert_eq!(pool.early_withdraw_reward(), 50);
    assert_eq!(pool.reward_balance(), 150);
    assert_eq!(pool.port().pool_balance(), 150);
}

#[test]
fn reward_configuration_rejections_change_nothing() {
    let (mut pool, clock) = pool_with(&["ac1"]);
    let owner = account("owner");
    let before = pool.snapshot();

    assert!(matches!(
        pool.configure_reward(&owner, 10, 11),
        Err(PoolError::InvalidRewardSplit { total: 10, early: 11 })
    ));
    assert!(matches!(
        pool.configure_reward(&account("ac1"), 10, 5),
        Err(PoolError::Unauthorized(_))
    ));
    clock.set(WINDOW as i64);
    assert!(matches!(
        pool.configure_reward(&owner, 10, 5),
        Err(PoolError::PoolClosed)
    ));
    assert_eq!(pool.snapshot(), before);
    assert_eq!(pool.port().balance_of(&owner), 10_000);
}

#[test]
fn reward_can_be_topped_up_during_the_window() {
    let (mut pool, clock) = full_pool();
    clock.set(1);
    pool.configure_reward(&account("owner"), 200, 0).expect("top up");
    assert_eq!(pool.reward_balance(), 1200);
}

// =============================================================================
// EARLY WINDOW
// =============================================================================

#[test]
fn withdrawal_before_maturity_is_rejected() {
    let (mut pool, _) = full_pool();
    let before = pool.snapshot();

    assert!(matches!(
        pool.withdraw(&account("ac1"), 100),
        Err(PoolError::WithdrawalNotOpen)
    ));
    assert_eq!(pool.snapshot(), before);
}

#[test]
fn withdrawal_at_maturity_earns_nothing() {
    let (mut pool, clock) = full_pool();
    clock.set(0);

    let receipt = pool.withdraw(&account("ac1"), 400).expect("withdraw");

    assert_eq!(receipt.reward, 0);
    assert_eq!(receipt.payout, 400);
    assert_eq!(pool.staked_balance(), 600);
    assert_eq!(pool.reward_balance(), 1000);
}

#[test]
fn early_reward_is_linear_in_elapsed_time() {
    let (mut pool, clock) = full_pool();
    let ac1 = account("ac1");
    clock.set(30_000);

    let receipt = pool.withdraw(&ac1, 400).expect("withdraw");

    assert_eq!(receipt.reward, 100);
    assert!(matches!(receipt.phase, Phase::Open { elapsed: 30_000, .. }));
    assert_eq!(pool.staked_balance(), 600);
    assert_eq!(pool.reward_balance(), 900);
    assert_eq!(pool.principal_of(&ac1), 0);
    assert_eq!(pool.port().balance_of(&ac1), 2_000 - 400 + 500);
    // the denominator is everything ever staked, not the live balance
    assert_eq!(pool.total_staked(), 1000);
}

#[test]
fn early_reward_floors_at_window_edge() {
    let (mut pool, clock) = full_pool();
    clock.set(59_990);

    let receipt = pool.withdraw(&account("ac1"), 400).expect("withdraw");

    assert_eq!(receipt.reward, 199);
    assert_eq!(pool.reward_balance(), 801);
    assert!(!pool.is_frozen());
}

#[test]
fn over_withdrawal_is_rejected() {
    let (mut pool, clock) = full_pool();
    clock.set(10);
    let before = pool.snapshot();

    assert!(matches!(
        pool.withdraw(&account("ac1"), 401),
        Err(PoolError::InsufficientStake { requested: 401, staked: 400 })
    ));
    assert!(matches!(
        pool.withdraw(&account("nobody"), 1),
        Err(PoolError::InsufficientStake { staked: 0, .. })
    ));
    assert_eq!(pool.snapshot(), before);
}

// =============================================================================
// CLOSED PHASE
// =============================================================================

#[test]
fn closed_settlement_uses_frozen_balances() {
    let (mut pool, clock) = pool_with(&["ac1", "ac2", "ac3"]);
    let (ac1, ac2, ac3) = (account("ac1"), account("ac2"), account("ac3"));
    pool.stake(&ac1, 400).expect("stake");
    pool.stake(&ac2, 400).expect("stake");
    pool.stake(&ac3, 200).expect("stake");
    pool.configure_reward(&account("owner"), 1000, 500).expect("reward");

    clock.set(59_990);
    assert_eq!(pool.withdraw(&ac1, 400).expect("early").reward, 199);

    clock.set(WINDOW as i64);
    assert!(matches!(pool.phase(), Phase::Closed { frozen: false }));
    let first = pool.withdraw(&ac2, 400).expect("closed");
    assert_eq!(first.reward, 534);
    assert!(matches!(first.phase, Phase::Closed { frozen: true }));
    assert!(pool.is_frozen());
    assert_eq!(pool.reward_balance(), 801);
    assert_eq!(pool.staked_balance(), 600);

    clock.advance(1_000_000);
    let second = pool.withdraw(&ac3, 200).expect("closed");
    assert_eq!(second.reward, 267);
    assert_eq!(pool.reward_balance(), 801);
    assert_eq!(pool.staked_balance(), 600);

    // everything that went in came back out
    assert_eq!(pool.port().pool_balance(), 0);
}

#[test]
fn closing_without_early_activity_pays_pro_rata() {
    let (mut pool, clock) = full_pool();
    clock.set(WINDOW as i64);

    let receipt = pool.withdraw(&account("ac1"), 400).expect("withdraw");

    assert_eq!(receipt.reward, 400);
    assert_eq!(pool.reward_balance(), 1000);
    assert_eq!(pool.staked_balance(), 1000);
}

#[test]
fn freeze_survives_clock_moving_backwards() {
    let (mut pool, clock) = full_pool();
    clock.set(WINDOW as i64 + 5);
    pool.withdraw(&account("ac1"), 100).expect("freeze");

    clock.set(10);
    assert!(matches!(pool.phase(), Phase::Closed { frozen: true }));
    let receipt = pool.withdraw(&account("ac2"), 300).expect("withdraw");
    assert_eq!(receipt.reward, 300);
    assert!(matches!(
        pool.configure_reward(&account("owner"), 10, 0),
        Err(PoolError::PoolClosed)
    ));
}

#[test]
fn partial_withdrawals_accumulate_principal_changes() {
    let (mut pool, clock) = full_pool();
    let ac2 = account("ac2");
    clock.set(WINDOW as i64);

    let mut paid: Amount = 0;
    for _ in 0..3 {
        paid += pool.withdraw(&ac2, 200).expect("withdraw").reward;
    }

    assert_eq!(paid, 600);
    assert_eq!(pool.principal_of(&ac2), 0);
    assert!(matches!(
        pool.withdraw(&ac2, 1),
        Err(PoolError::InsufficientStake { .. })
    ));
}

// =============================================================================
// QUOTES
// =============================================================================

#[test]
fn quote_matches_the_following_withdrawal() {
    let (mut pool, clock) = full_pool();
    let ac2 = account("ac2");
    clock.set(45_000);
    let before = pool.snapshot();

    let quoted = pool.quote_withdraw(600).expect("quote");
    assert_eq!(pool.snapshot(), before);

    let receipt = pool.withdraw(&ac2, 600).expect("withdraw");
    assert_eq!(quoted, receipt.reward);
    assert_eq!(quoted, 225);
}

#[test]
fn quote_before_maturity_is_rejected() {
    let (pool, _) = full_pool();
    assert!(matches!(
        pool.quote_withdraw(1),
        Err(PoolError::WithdrawalNotOpen)
    ));
}

// =============================================================================
// LATE STAKING
// =============================================================================

#[test]
fn late_staking_stops_when_the_window_closes() {
    let (mut pool, clock) = late_staking_pool_with(&["ac1", "ac2"]);
    let (ac1, ac2) = (account("ac1"), account("ac2"));
    pool.stake(&ac1, 400).expect("stake");
    pool.configure_reward(&account("owner"), 1000, 500).expect("reward");

    clock.set(WINDOW as i64);
    assert!(matches!(pool.stake(&ac2, 400), Err(PoolError::StakingClosed)));

    assert_eq!(pool.withdraw(&ac1, 100).expect("freeze").reward, 250);
    let frozen = (pool.staked_balance(), pool.reward_balance());
    assert_eq!(frozen, (400, 1000));

    let before = pool.snapshot();
    assert!(matches!(pool.stake(&ac2, 400), Err(PoolError::StakingClosed)));
    assert_eq!(pool.snapshot(), before);
    assert_eq!(pool.port().balance_of(&ac2), 2_000);

    assert_eq!(pool.withdraw(&ac1, 300).expect("closed").reward, 750);
    assert_eq!((pool.staked_balance(), pool.reward_balance()), frozen);
}

#[test]
fn late_stake_inside_the_window_is_admitted() {
    let (mut pool, clock) = late_staking_pool_with(&["ac1"]);
    clock.set(30_000);

    let receipt = pool.stake(&account("ac1"), 300).expect("stake");

    assert_eq!(receipt.admitted, 300);
    assert_eq!(pool.total_staked(), 300);
}

#[test]
fn early_reward_is_capped_by_the_remaining_reserve() {
    let (mut pool, clock) = late_staking_pool_with(&["ac1", "ac2"]);
    let (ac1, ac2) = (account("ac1"), account("ac2"));
    pool.stake(&ac1, 100).expect("stake");
    pool.configure_reward(&account("owner"), 500, 500).expect("reward");

    clock.set(59_999);
    assert_eq!(pool.withdraw(&ac1, 100).expect("early").reward, 499);
    assert_eq!(pool.reward_balance(), 1);

    // the late stake raises the denominator but the formula alone would pay 449
    pool.stake(&ac2, 900).expect("late stake");
    assert_eq!(pool.quote_withdraw(900).expect("quote"), 1);
    let receipt = pool.withdraw(&ac2, 900).expect("early");

    assert_eq!(receipt.reward, 1);
    assert_eq!(receipt.payout, 901);
    assert_eq!(pool.reward_balance(), 0);
    assert_eq!(pool.staked_balance(), 0);
    assert_eq!(pool.port().pool_balance(), 0);
    assert_eq!(pool.port().balance_of(&ac2), 2_001);
}
