//! # Stakepool CLI Module
//!
//! This module implements the CLI interface for stakepool.
//!
//! ## Available Commands
//!
//! - `init` - Create a pool database from the configuration
//! - `status` - Show pool aggregates
//! - `phase` - Show the current phase
//! - `stake` - Stake principal from an account
//! - `withdraw` - Withdraw principal plus reward
//! - `configure-reward` - Fund the reward reserve (administrator only)
//! - `approve` - Set the allowance an account grants the pool
//! - `balance` - Show an account's ledger balance, allowance and principal
//! - `set-clock` - Install or clear an elapsed-time override
//! - `quote` - Reward a withdrawal would receive right now
//! - `export` - Write a pool snapshot file
//! - `import` - Replace the pool with a snapshot file

mod commands;

use clap::{Parser, Subcommand};
use stakepool_core::{Amount, PoolError};
use std::path::PathBuf;

use crate::AppConfig;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Stakepool - capacity-bounded staking with early-withdrawal rewards
///
/// Stake before maturity, earn a linearly growing share of the early reward
/// during the withdrawal window, and split what is left pro rata after it.
#[derive(Parser, Debug)]
#[command(name = "stakepool")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the pool database
    #[arg(short = 'D', long, global = true, default_value = "stakepool.redb")]
    pub database: PathBuf,

    /// Path to the TOML configuration
    #[arg(short = 'C', long, global = true, default_value = "stakepool.toml")]
    pub config: PathBuf,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new pool database from the configuration
    Init {
        /// Overwrite an existing database
        #[arg(short, long)]
        force: bool,
    },

    /// Show pool aggregates
    Status,

    /// Show the current phase
    Phase,

    /// Stake principal from an account
    Stake {
        /// Depositing account
        account: String,
        /// Requested amount; only the remaining capacity is admitted
        amount: Amount,
    },

    /// Withdraw principal plus reward
    Withdraw {
        account: String,
        amount: Amount,
    },

    /// Fund the reward reserve (administrator only)
    ConfigureReward {
        /// Reward added to the reserve
        total: Amount,
        /// Portion of `total` earned linearly during the window
        early: Amount,
        /// Calling account (defaults to the configured administrator)
        #[arg(long)]
        caller: Option<String>,
        /// Administrator secret, required when the key variable is set
        #[arg(long)]
        admin_key: Option<String>,
    },

    /// Set the allowance an account grants the pool
    Approve {
        account: String,
        amount: Amount,
    },

    /// Show an account's ledger balance, allowance and principal
    Balance {
        account: String,
    },

    /// Install or clear an elapsed-time override
    SetClock {
        /// Milliseconds since maturity (negative before maturity)
        #[arg(allow_negative_numbers = true, conflicts_with = "clear")]
        elapsed: Option<i64>,
        /// Remove the override and follow the system clock
        #[arg(long)]
        clear: bool,
    },

    /// Reward a withdrawal of `amount` would receive right now
    Quote {
        amount: Amount,
    },

    /// Export the pool to a snapshot file
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Replace the pool with a snapshot file (ledger balances are kept)
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), PoolError> {
    let config = AppConfig::load(&cli.config)?;
    let db = cli.database.as_path();
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Init { force }) => cmd_init(db, &config, force, json_mode),
        Some(Commands::Status) => cmd_status(db, &config, json_mode),
        Some(Commands::Phase) => cmd_phase(db, &config, json_mode),
        Some(Commands::Stake { account, amount }) => {
            cmd_stake(db, &config, json_mode, &account, amount)
        }
        Some(Commands::Withdraw { account, amount }) => {
            cmd_withdraw(db, &config, json_mode, &account, amount)
        }
        Some(Commands::ConfigureReward {
            total,
            early,
            caller,
            admin_key,
        }) => cmd_configure_reward(
            db,
            &config,
            json_mode,
            caller.as_deref(),
            admin_key.as_deref(),
            total,
            early,
        ),
        Some(Commands::Approve { account, amount }) => {
            cmd_approve(db, &config, json_mode, &account, amount)
        }
        Some(Commands::Balance { account }) => cmd_balance(db, &config, json_mode, &account),
        Some(Commands::SetClock { elapsed, clear }) => {
            cmd_set_clock(db, &config, json_mode, elapsed, clear)
        }
        Some(Commands::Quote { amount }) => cmd_quote(db, &config, json_mode, amount),
        Some(Commands::Export { output }) => cmd_export(db, &config, &output),
        Some(Commands::Import { input }) => cmd_import(db, &config, &input),
        None => {
            // No subcommand - show status by default
            cmd_status(db, &config, json_mode)
        }
    }
}
