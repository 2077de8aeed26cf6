//! # stakepool-core
//!
//! The deterministic reward-accrual engine for stakepool - THE LEDGER.
//!
//! A pool accepts stake up to a fixed capacity before a maturity instant,
//! pays a linearly growing share of an early-withdrawal reward during a
//! fixed window after maturity, and splits everything left over pro rata
//! once the window closes.
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Holds the only copy of pool state; everything else is injected
//! - Never moves value itself: transfers go through [`AssetTransferPort`]
//! - Never reads wall time directly: time comes from a [`Clock`]
//! - Has NO async, NO network dependencies, NO floats (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod formats;
pub mod ledger;
pub mod phase;
pub mod pool;
pub mod ports;
pub mod primitives;
pub mod reward;
pub mod session;
pub mod shared;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    AccountId, Amount, PoolError, PoolParams, PoolSnapshot, PoolState, RewardReceipt,
    StakeReceipt, WithdrawReceipt,
};

// =============================================================================
// RE-EXPORTS: Pool Engine
// =============================================================================

pub use ledger::MemoryLedger;
pub use phase::Phase;
pub use pool::StakingPool;
pub use ports::{
    AdminAuthority, AssetTransferPort, Clock, ClockSource, FixedAdmin, ManualClock, SystemClock,
    TransferError,
};
pub use session::{LedgerPool, Session, StorageBackend};
pub use shared::SharedPool;
pub use storage::{RedbStore, StoredPool};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{SnapshotHeader, snapshot_from_bytes, snapshot_to_bytes};
