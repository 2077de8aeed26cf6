//! # Ledger Primitives
//!
//! Hardcoded constants for the stakepool CORE.
//!
//! These are compiled into the binary and are immutable at runtime.

/// Magic bytes for the stakepool snapshot format header.
///
/// - File Header = Magic Bytes ("STKP") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"STKP";

/// Current serialization format version.
///
/// Increment this when making breaking changes to the snapshot format.
pub const FORMAT_VERSION: u8 = 1;

/// Default early-withdrawal window: one minute of clock time (milliseconds).
pub const DEFAULT_WINDOW_DURATION_MS: u64 = 60_000;

/// One year of clock time in milliseconds, used to annualise rates.
pub const YEAR_MS: u64 = 365 * 24 * 3600 * 1000;

/// Fixed-point scale of rate quotes: rates are expressed per million units.
pub const RATE_SCALE: u128 = 1_000_000;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for account identifiers.
pub const MAX_ACCOUNT_ID_LENGTH: usize = 128;

/// Maximum number of accounts accepted in a single snapshot import.
pub const MAX_SNAPSHOT_ACCOUNTS: usize = 1_000_000;
