//! # Configuration
//!
//! Operator configuration read from a TOML file (`stakepool.toml` by default).
//!
//! ```toml
//! [pool]
//! name = "genesis"
//! capacity = 1000
//! window_duration = 60000
//! maturity_ms = 1767225600000
//! close_staking_at_maturity = true
//! admin = "owner"
//! admin_key_env = "STAKEPOOL_ADMIN_KEY"
//!
//! [[ledger.seed]]
//! account = "owner"
//! amount = 10000
//! ```
//!
//! Every field has a default, so a missing file is a valid configuration.
//! Pool parameters only matter at `init`; afterwards the database is
//! authoritative.

use serde::{Deserialize, Serialize};
use stakepool_core::primitives::DEFAULT_WINDOW_DURATION_MS;
use stakepool_core::{AccountId, Amount, MemoryLedger, PoolError, PoolParams, SystemClock};
use std::path::Path;

use crate::auth::ADMIN_KEY_ENV;

/// Maximum accepted configuration file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// SECTIONS
// =============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub pool: PoolSection,
    #[serde(default)]
    pub ledger: LedgerSection,
}

/// `[pool]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSection {
    pub name: String,
    pub capacity: Amount,
    /// Early-withdrawal window in milliseconds.
    pub window_duration: u64,
    /// Maturity boundary as Unix milliseconds. Unset means the wall clock
    /// never reaches maturity and only `set-clock` moves the pool.
    pub maturity_ms: Option<i64>,
    pub close_staking_at_maturity: bool,
    pub admin: String,
    /// Environment variable holding the administrator secret.
    pub admin_key_env: Option<String>,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            name: "stakepool".to_string(),
            capacity: 1000,
            window_duration: DEFAULT_WINDOW_DURATION_MS,
            maturity_ms: None,
            close_staking_at_maturity: true,
            admin: "admin".to_string(),
            admin_key_env: None,
        }
    }
}

/// `[ledger]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerSection {
    pub seed: Vec<SeedBalance>,
}

/// One `[[ledger.seed]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedBalance {
    pub account: String,
    pub amount: Amount,
}

// =============================================================================
// LOADING
// =============================================================================

impl AppConfig {
    /// Parse a configuration from TOML text and validate it.
    pub fn from_toml_str(text: &str) -> Result<Self, PoolError> {
        let config: Self = toml::from_str(text)
            .map_err(|e| PoolError::InvalidConfig(format!("Parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file, falling back to defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self, PoolError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let metadata = std::fs::metadata(path)
            .map_err(|e| PoolError::IoError(format!("Cannot read config metadata: {}", e)))?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(PoolError::InvalidConfig(format!(
                "Config size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let text = std::fs::read_to_string(path)
            .map_err(|e| PoolError::IoError(format!("Read config: {}", e)))?;
        Self::from_toml_str(&text)
    }

    /// Check every value the CLI will hand to the engine.
    pub fn validate(&self) -> Result<(), PoolError> {
        self.pool_params().validate()?;
        self.admin()?;
        if let Some(var) = &self.pool.admin_key_env
            && var.trim().is_empty()
        {
            return Err(PoolError::InvalidConfig(
                "admin_key_env must not be empty".to_string(),
            ));
        }
        self.seed_ledger()?;
        Ok(())
    }

    // =========================================================================
    // DERIVED VALUES
    // =========================================================================

    #[must_use]
    pub fn pool_params(&self) -> PoolParams {
        PoolParams::new(
            self.pool.name.clone(),
            self.pool.capacity,
            self.pool.window_duration,
        )
        .with_staking_closed_at_maturity(self.pool.close_staking_at_maturity)
    }

    pub fn admin(&self) -> Result<AccountId, PoolError> {
        AccountId::new(self.pool.admin.as_str())
    }

    #[must_use]
    pub fn system_clock(&self) -> SystemClock {
        SystemClock::new(self.pool.maturity_ms.unwrap_or(i64::MAX))
    }

    /// Name of the environment variable holding the administrator secret.
    #[must_use]
    pub fn admin_key_env(&self) -> &str {
        self.pool.admin_key_env.as_deref().unwrap_or(ADMIN_KEY_ENV)
    }

    /// The bundled ledger with every seed balance minted.
    pub fn seed_ledger(&self) -> Result<MemoryLedger, PoolError> {
        let mut ledger = MemoryLedger::new();
        for seed in &self.ledger.seed {
            let account = AccountId::new(seed.account.as_str())?;
            ledger
                .mint(&account, seed.amount)
                .map_err(|e| PoolError::InvalidConfig(format!("Seed {}: {}", account, e)))?;
        }
        Ok(ledger)
    }
}

// =============================================================================
// TESTS
// =============================================================================
