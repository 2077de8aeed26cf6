//! # Snapshot Format
//!
//! Format: Header (5 bytes) + postcard-serialized `PoolSnapshot`.
//! - 4 bytes: Magic ("STKP")
//! - 1 byte: Version
//!
//! ## Validation
//!
//! Size limits and the header are checked before the payload is decoded, and
//! a decoded snapshot must pass `PoolSnapshot::validate` before it is handed
//! back, so an imported file can never break the accounting invariants.

use crate::primitives::{self, MAX_SNAPSHOT_ACCOUNTS};
use crate::{PoolError, PoolSnapshot};

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum accepted snapshot size (256 MB).
pub const MAX_SNAPSHOT_SIZE: usize = 256 * 1024 * 1024;

const HEADER_SIZE: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The header that precedes every snapshot payload.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl SnapshotHeader {
    /// Create a new header with current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), PoolError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(PoolError::SerializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(PoolError::SerializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PoolError> {
        if bytes.len() < HEADER_SIZE {
            return Err(PoolError::SerializationError(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a snapshot to bytes (header + payload).
pub fn snapshot_to_bytes(snapshot: &PoolSnapshot) -> Result<Vec<u8>, PoolError> {
    let payload = postcard::to_stdvec(snapshot)
        .map_err(|e| PoolError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_SIZE + payload.len());
    result.extend_from_slice(&SnapshotHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize and validate a snapshot.
pub fn snapshot_from_bytes(bytes: &[u8]) -> Result<PoolSnapshot, PoolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(PoolError::SerializationError(
            "Data too short: minimum 5 bytes required".to_string(),
        ));
    }
    if bytes.len() > MAX_SNAPSHOT_SIZE {
        return Err(PoolError::SerializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_SNAPSHOT_SIZE
        )));
    }

    SnapshotHeader::from_bytes(bytes)?.validate()?;

    let snapshot: PoolSnapshot = postcard::from_bytes(&bytes[HEADER_SIZE..]).map_err(|e| {
        PoolError::SerializationError(format!("Failed to deserialize snapshot: {}", e))
    })?;

    if snapshot.accounts.len() > MAX_SNAPSHOT_ACCOUNTS {
        return Err(PoolError::SerializationError(format!(
            "Snapshot holds {} accounts, maximum is {}",
            snapshot.accounts.len(),
            MAX_SNAPSHOT_ACCOUNTS
        )));
    }
    snapshot.validate()?;
    Ok(snapshot)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccountId, PoolParams, PoolState};
    use std::collections::BTreeMap;

    fn sample() -> PoolSnapshot {
        let mut state = PoolState::new(PoolParams::new("sample", 1000, 60_000));
        state.total_staked = 1000;
        state.staked_balance = 600;
        state.total_reward = 1000;
        state.early_withdraw_reward = 500;
        state.reward_balance = 801;
        let mut accounts = BTreeMap::new();
        accounts.insert(AccountId::new("ac1").expect("id"), 200);
        accounts.insert(AccountId::new("ac2").expect("id"), 400);
        PoolSnapshot { state, accounts }
    }

    #[test]
    fn bytes_roundtrip_bit_exact() {
        let bytes1 = snapshot_to_bytes(&sample()).expect("serialize");
        let restored = snapshot_from_bytes(&bytes1).expect("deserialize");
        let bytes2 = snapshot_to_bytes(&restored).expect("reserialize");

        assert_eq!(restored, sample());
        assert_eq!(bytes1, bytes2);
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = snapshot_to_bytes(&sample()).expect("serialize");
        bytes[0..4].copy_from_slice(b"XXXX");
        assert!(snapshot_from_bytes(&bytes).is_err());
    }

    #[test]
    fn future_version_rejected() {
        let mut bytes = snapshot_to_bytes(&sample()).expect("serialize");
        bytes[4] = primitives::FORMAT_VERSION + 1;
        assert!(snapshot_from_bytes(&bytes).is_err());
    }

    #[test]
    fn inconsistent_snapshot_rejected() {
        let mut broken = sample();
        broken.state.staked_balance = 2000;
        let bytes = snapshot_to_bytes(&broken).expect("serialize");

        assert!(matches!(
            snapshot_from_bytes(&bytes),
            Err(PoolError::CorruptState(_))
        ));
    }
}
