//! # Phase Model
//!
//! The pool moves through three phases, decided purely by the elapsed time
//! `t` since maturity and the freeze flag:
//!
//! | Phase | Condition | Withdrawal formula |
//! |-------|-----------|--------------------|
//! | PreMaturity | `t < 0` | rejected |
//! | Open | `0 <= t < window` | linear early reward |
//! | Closed | `t >= window` or frozen | proportional against the frozen snapshot |
//!
//! Closed is terminal. Once the pool is frozen it reports Closed even if an
//! administrative clock is moved backwards.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Current phase of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Before maturity; `until` is the time left until withdrawals open.
    PreMaturity { until: u64 },
    /// Inside the early-withdrawal window.
    Open { elapsed: u64, remaining: u64 },
    /// The window has elapsed. `frozen` is false until the first withdrawal
    /// observes the close and captures the snapshot.
    Closed { frozen: bool },
}

impl Phase {
    /// Evaluate the phase at `elapsed` time since maturity.
    #[must_use]
    pub fn at(elapsed: i64, window_duration: u64, frozen: bool) -> Self {
        if frozen {
            return Phase::Closed { frozen: true };
        }
        if elapsed < 0 {
            return Phase::PreMaturity {
                until: elapsed.unsigned_abs(),
            };
        }
        let elapsed = elapsed as u64;
        if elapsed >= window_duration {
            Phase::Closed { frozen: false }
        } else {
            Phase::Open {
                elapsed,
                remaining: window_duration - elapsed,
            }
        }
    }

    /// Withdrawals are accepted in this phase.
    #[must_use]
    pub fn accepts_withdrawals(&self) -> bool {
        !matches!(self, Phase::PreMaturity { .. })
    }

    /// The window has elapsed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Phase::Closed { .. })
    }

    /// Short lowercase name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Phase::PreMaturity { .. } => "pre-maturity",
            Phase::Open { .. } => "open",
            Phase::Closed { .. } => "closed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::PreMaturity { until } => write!(f, "pre-maturity ({} ms to maturity)", until),
            Phase::Open { elapsed, remaining } => {
                write!(f, "open ({} ms elapsed, {} ms remaining)", elapsed, remaining)
            }
            Phase::Closed { frozen: true } => write!(f, "closed (frozen)"),
            Phase::Closed { frozen: false } => write!(f, "closed (awaiting freeze)"),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
