//! # Authentication Module
//!
//! Administrator key check for `configure-reward`.
//!
//! ## Configuration
//!
//! The secret is read from an environment variable, `STAKEPOOL_ADMIN_KEY`
//! unless `pool.admin_key_env` names another one. If the variable is unset
//! or empty, no key is required and only the administrator account id is
//! checked by the engine.

use stakepool_core::{AccountId, PoolError};
use subtle::ConstantTimeEq;

/// Default environment variable holding the administrator secret.
pub const ADMIN_KEY_ENV: &str = "STAKEPOOL_ADMIN_KEY";

// =============================================================================
// ADMIN KEY
// =============================================================================

/// Read the administrator secret from `var`.
///
/// Returns `None` if the variable is unset or empty (disabling the check).
pub fn admin_key_from_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|k| !k.is_empty())
}

/// Compare two keys in constant time.
///
/// Both keys are padded to the same length so `ct_eq` always runs over the
/// same number of bytes and the comparison does not leak the key length.
pub fn keys_match(provided: &str, expected: &str) -> bool {
    let provided_bytes = provided.as_bytes();
    let expected_bytes = expected.as_bytes();

    let max_len = provided_bytes.len().max(expected_bytes.len());
    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided_bytes.len()].copy_from_slice(provided_bytes);
    padded_expected[..expected_bytes.len()].copy_from_slice(expected_bytes);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided_bytes.len() == expected_bytes.len()
}

/// Check the key presented by `caller` against the configured secret.
pub fn authorize_admin(
    caller: &AccountId,
    expected: Option<&str>,
    provided: Option<&str>,
) -> Result<(), PoolError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    match provided {
        Some(key) if keys_match(key, expected) => Ok(()),
        Some(_) => {
            tracing::warn!(
                event = "auth_failure",
                reason = "invalid_admin_key",
                caller = %caller,
                "Authentication failed: invalid administrator key"
            );
            Err(PoolError::Unauthorized(caller.clone()))
        }
        None => {
            tracing::warn!(
                event = "auth_failure",
                reason = "missing_admin_key",
                caller = %caller,
                "Missing administrator key"
            );
            Err(PoolError::Unauthorized(caller.clone()))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
