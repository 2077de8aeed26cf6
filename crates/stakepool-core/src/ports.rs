//! # Consumed Capabilities
//!
//! The engine never moves value, reads a clock or decides who is an
//! administrator by itself. It is handed three capabilities:
//!
//! - [`AssetTransferPort`]: moves units into and out of the pool
//! - [`Clock`]: elapsed time since the maturity boundary
//! - [`AdminAuthority`]: the administrator predicate
//!
//! Reference implementations live here ([`ManualClock`], [`SystemClock`],
//! [`ClockSource`], [`FixedAdmin`]) and in [`crate::ledger`].

use crate::{AccountId, Amount};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

// =============================================================================
// ASSET TRANSFER PORT
// =============================================================================

/// Why an asset movement was declined.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("insufficient balance: {account} holds {available}, needs {required}")]
    InsufficientBalance {
        account: String,
        available: Amount,
        required: Amount,
    },

    #[error("insufficient allowance: {account} approved {approved}, needs {required}")]
    InsufficientAllowance {
        account: String,
        approved: Amount,
        required: Amount,
    },

    #[error("balance overflow")]
    Overflow,

    /// Any other refusal by an external ledger.
    #[error("{0}")]
    Rejected(String),
}

/// Moves value between participant accounts and the pool.
///
/// A call either moves the full amount or nothing.
pub trait AssetTransferPort {
    /// Check that `from` has pre-authorized the pool to draw `requested`.
    ///
    /// Called before a stake with the full requested amount, even when only
    /// part of it will be drawn.
    fn authorize_draw(&self, _from: &AccountId, _requested: Amount) -> Result<(), TransferError> {
        Ok(())
    }

    /// Move `amount` from `from` into the pool.
    fn transfer_into(&mut self, from: &AccountId, amount: Amount) -> Result<(), TransferError>;

    /// Move `amount` out of the pool to `to`.
    fn transfer_out_of(&mut self, to: &AccountId, amount: Amount) -> Result<(), TransferError>;

    /// Balance held by `account` outside the pool.
    fn balance_of(&self, account: &AccountId) -> Amount;
}

// =============================================================================
// ADMINISTRATIVE AUTHORIZATION
// =============================================================================

/// Decides whether a caller may configure rewards.
pub trait AdminAuthority {
    fn is_administrator(&self, caller: &AccountId) -> bool;
}

/// A single, fixed administrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedAdmin {
    admin: AccountId,
}

impl FixedAdmin {
    #[must_use]
    pub fn new(admin: AccountId) -> Self {
        Self { admin }
    }

    #[must_use]
    pub fn admin(&self) -> &AccountId {
        &self.admin
    }
}

impl AdminAuthority for FixedAdmin {
    fn is_administrator(&self, caller: &AccountId) -> bool {
        *caller == self.admin
    }
}

// =============================================================================
// CLOCK
// =============================================================================

/// Source of elapsed time since maturity, in milliseconds.
///
/// Negative before maturity.
pub trait Clock {
    fn elapsed_since_maturity(&self) -> i64;
}

/// An explicitly settable clock.
///
/// Clones share the same underlying value, so a test can keep a handle and
/// move time while the engine owns another clone.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    elapsed: Arc<AtomicI64>,
}

impl ManualClock {
    #[must_use]
    pub fn new(elapsed: i64) -> Self {
        Self {
            elapsed: Arc::new(AtomicI64::new(elapsed)),
        }
    }

    /// Set the elapsed time since maturity.
    pub fn set(&self, elapsed: i64) {
        self.elapsed.store(elapsed, Ordering::SeqCst);
    }

    /// Move the clock forward (or backward, with a negative delta).
    pub fn advance(&self, delta: i64) {
        self.elapsed.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn elapsed_since_maturity(&self) -> i64 {
        self.elapsed.load(Ordering::SeqCst)
    }
}

/// Wall-clock time relative to a maturity instant given in Unix milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemClock {
    maturity_ms: i64,
}

impl SystemClock {
    #[must_use]
    pub fn new(maturity_ms: i64) -> Self {
        Self { maturity_ms }
    }

    #[must_use]
    pub fn maturity_ms(&self) -> i64 {
        self.maturity_ms
    }

    fn now_ms() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

impl Clock for SystemClock {
    fn elapsed_since_maturity(&self) -> i64 {
        Self::now_ms().saturating_sub(self.maturity_ms)
    }
}

/// Either a live clock or an administrative override.
#[derive(Debug, Clone)]
pub enum ClockSource {
    Manual(ManualClock),
    System(SystemClock),
}

impl ClockSource {
    /// True when the elapsed time is an explicit override.
    #[must_use]
    pub fn is_manual(&self) -> bool {
        matches!(self, ClockSource::Manual(_))
    }
}

impl Clock for ClockSource {
    fn elapsed_since_maturity(&self) -> i64 {
        match self {
            ClockSource::Manual(clock) => clock.elapsed_since_maturity(),
            ClockSource::System(clock) => clock.elapsed_since_maturity(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
