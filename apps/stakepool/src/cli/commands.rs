//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//!
//! Every command opens the pool database, runs one operation through the
//! session (which commits it to redb), logs a structured event and prints
//! either a human summary or, with `--json-mode`, a JSON document.

use serde::Serialize;
use stakepool_core::{
    AccountId, Amount, AssetTransferPort, FixedAdmin, Phase, PoolError, PoolState, Session,
    reward, snapshot_from_bytes, snapshot_to_bytes,
};
use std::path::{Path, PathBuf};

use crate::AppConfig;
use crate::auth;

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum file size for import (256 MB).
///
/// Matches the largest snapshot the decoder accepts.
const MAX_IMPORT_FILE_SIZE: u64 = stakepool_core::formats::MAX_SNAPSHOT_SIZE as u64;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), PoolError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| PoolError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(PoolError::SerializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path to an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, PoolError> {
    let canonical = path.canonicalize().map_err(|e| {
        PoolError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(PoolError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an output path against its canonical parent directory.
fn validate_output_path(path: &Path) -> Result<PathBuf, PoolError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        PoolError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(PoolError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| PoolError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

// =============================================================================
// REPORTS
// =============================================================================

/// Pool aggregates as printed by `status`.
#[derive(Debug, Serialize)]
struct StatusReport<'a> {
    database: String,
    name: &'a str,
    capacity: Amount,
    remaining_capacity: Amount,
    total_staked: Amount,
    total_reward: Amount,
    early_withdraw_reward: Amount,
    reward_balance: Amount,
    staked_balance: Amount,
    frozen: bool,
    phase: Phase,
    elapsed_ms: i64,
    clock: &'static str,
    accounts: usize,
    pool_balance: Amount,
}

#[derive(Debug, Serialize)]
struct BalanceReport<'a> {
    account: &'a AccountId,
    balance: Amount,
    allowance: Amount,
    principal: Amount,
}

#[derive(Debug, Serialize)]
struct QuoteReport {
    amount: Amount,
    reward: Amount,
    phase: Phase,
    rate_per_million: Amount,
    annualized_rate_per_million: Amount,
}

#[derive(Debug, Serialize)]
struct ClockReport {
    clock_override: Option<i64>,
    elapsed_ms: i64,
    phase: Phase,
}

/// Print a value as pretty JSON.
fn print_json<T: Serialize>(value: &T) -> Result<(), PoolError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| PoolError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new pool database.
pub fn cmd_init(
    db_path: &Path,
    config: &AppConfig,
    force: bool,
    json_mode: bool,
) -> Result<(), PoolError> {
    if db_path.exists() {
        if !force {
            return Err(PoolError::InvalidConfig(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| PoolError::IoError(format!("Remove database: {}", e)))?;
    }

    let session = Session::create_redb(
        db_path,
        config.pool_params(),
        config.seed_ledger()?,
        config.system_clock(),
        admin(config)?,
    )?;

    tracing::info!(
        event = "init",
        database = %db_path.display(),
        name = %session.pool().params().name,
        capacity = %session.pool().capacity(),
        window_ms = session.pool().params().window_duration,
        seeded_accounts = config.ledger.seed.len(),
        "Pool initialized"
    );

    if json_mode {
        return print_json(session.pool().state());
    }

    println!("Initialized pool '{}'", session.pool().params().name);
    println!("Database: {:?}", db_path);
    println!("Capacity: {}", session.pool().capacity());
    println!("Window:   {} ms", session.pool().params().window_duration);
    Ok(())
}

// =============================================================================
// STATUS / PHASE COMMANDS
// =============================================================================

/// Show pool aggregates.
pub fn cmd_status(db_path: &Path, config: &AppConfig, json_mode: bool) -> Result<(), PoolError> {
    let session = open_session(db_path, config)?;
    let pool = session.pool();
    let state: &PoolState = pool.state();

    let report = StatusReport {
        database: db_path.display().to_string(),
        name: &state.params.name,
        capacity: state.params.capacity,
        remaining_capacity: state.remaining_capacity(),
        total_staked: state.total_staked,
        total_reward: state.total_reward,
        early_withdraw_reward: state.early_withdraw_reward,
        reward_balance: state.reward_balance,
        staked_balance: state.staked_balance,
        frozen: state.frozen,
        phase: pool.phase(),
        elapsed_ms: pool.elapsed(),
        clock: clock_label(&session),
        accounts: pool.accounts().filter(|(_, p)| *p > 0).count(),
        pool_balance: session.ledger().pool_balance(),
    };

    if json_mode {
        return print_json(&report);
    }

    println!("Stakepool Status");
    println!("================");
    println!("Database: {}", report.database);
    println!("Pool:     {}", report.name);
    println!();
    println!("Capacity:         {}", report.capacity);
    println!("Remaining:        {}", report.remaining_capacity);
    println!("Total Staked:     {}", report.total_staked);
    println!("Staked Balance:   {}", report.staked_balance);
    println!("Total Reward:     {}", report.total_reward);
    println!("Early Reward:     {}", report.early_withdraw_reward);
    println!("Reward Balance:   {}", report.reward_balance);
    println!("Pool Holdings:    {}", report.pool_balance);
    println!("Active Accounts:  {}", report.accounts);
    println!();
    println!("Phase:   {}", report.phase);
    println!("Elapsed: {} ms ({} clock)", report.elapsed_ms, report.clock);

    Ok(())
}

/// Show the current phase.
pub fn cmd_phase(db_path: &Path, config: &AppConfig, json_mode: bool) -> Result<(), PoolError> {
    let session = open_session(db_path, config)?;
    let phase = session.pool().phase();

    if json_mode {
        return print_json(&phase);
    }

    println!("Phase: {}", phase);
    match phase {
        Phase::PreMaturity { until } => println!("Withdrawals open in {} ms", until),
        Phase::Open { remaining, .. } => println!("Early window closes in {} ms", remaining),
        Phase::Closed { frozen: true } => println!("Balances frozen"),
        Phase::Closed { frozen: false } => {
            println!("Balances freeze on the next withdrawal")
        }
    }
    Ok(())
}

// =============================================================================
// STAKE / WITHDRAW COMMANDS
// =============================================================================

/// Stake principal from an account.
pub fn cmd_stake(
    db_path: &Path,
    config: &AppConfig,
    json_mode: bool,
    account: &str,
    amount: Amount,
) -> Result<(), PoolError> {
    let account = AccountId::new(account)?;
    let mut session = open_session(db_path, config)?;

    let receipt = session.stake(&account, amount).inspect_err(|e| {
        tracing::warn!(event = "stake_rejected", account = %account, requested = %amount, error = %e);
    })?;

    tracing::info!(
        event = "stake",
        account = %receipt.account,
        requested = %receipt.requested,
        admitted = %receipt.admitted,
        principal = %receipt.principal_after,
        "Stake admitted"
    );

    if json_mode {
        return print_json(&receipt);
    }

    println!("Staked {} for {}", receipt.admitted, receipt.account);
    if receipt.unadmitted() > 0 {
        println!(
            "{} not admitted (capacity reached), left in balance",
            receipt.unadmitted()
        );
    }
    println!("Principal: {}", receipt.principal_after);
    Ok(())
}

/// Withdraw principal plus reward.
pub fn cmd_withdraw(
    db_path: &Path,
    config: &AppConfig,
    json_mode: bool,
    account: &str,
    amount: Amount,
) -> Result<(), PoolError> {
    let account = AccountId::new(account)?;
    let mut session = open_session(db_path, config)?;
    let was_frozen = session.pool().is_frozen();

    let receipt = session.withdraw(&account, amount).inspect_err(|e| {
        tracing::warn!(event = "withdraw_rejected", account = %account, amount = %amount, error = %e);
    })?;

    if !was_frozen && session.pool().is_frozen() {
        tracing::info!(
            event = "freeze",
            reward_balance = %session.pool().reward_balance(),
            staked_balance = %session.pool().staked_balance(),
            "Window closed, balances frozen"
        );
    }
    tracing::info!(
        event = "withdraw",
        account = %receipt.account,
        amount = %receipt.amount,
        reward = %receipt.reward,
        payout = %receipt.payout,
        phase = receipt.phase.name(),
        "Paid out"
    );

    if json_mode {
        return print_json(&receipt);
    }

    println!(
        "Paid {} to {} ({} principal + {} reward)",
        receipt.payout, receipt.account, receipt.amount, receipt.reward
    );
    println!("Phase:     {}", receipt.phase);
    println!("Principal: {}", receipt.principal_after);
    Ok(())
}

// =============================================================================
// REWARD COMMAND
// =============================================================================

/// Fund the reward reserve.
pub fn cmd_configure_reward(
    db_path: &Path,
    config: &AppConfig,
    json_mode: bool,
    caller: Option<&str>,
    admin_key: Option<&str>,
    total: Amount,
    early: Amount,
) -> Result<(), PoolError> {
    let caller = match caller {
        Some(id) => AccountId::new(id)?,
        None => config.admin()?,
    };
    let expected = auth::admin_key_from_env(config.admin_key_env());
    auth::authorize_admin(&caller, expected.as_deref(), admin_key)?;

    let mut session = open_session(db_path, config)?;
    let receipt = session
        .configure_reward(&caller, total, early)
        .inspect_err(|e| {
            tracing::warn!(event = "reward_rejected", caller = %caller, total = %total, early = %early, error = %e);
        })?;

    tracing::info!(
        event = "configure_reward",
        caller = %caller,
        total = %receipt.total_reward,
        early = %receipt.early_portion,
        reward_balance = %receipt.reward_balance_after,
        "Reward configured"
    );

    if json_mode {
        return print_json(&receipt);
    }

    println!(
        "Added reward {} (early portion {})",
        receipt.total_reward, receipt.early_portion
    );
    println!("Reward balance: {}", receipt.reward_balance_after);
    Ok(())
}

// =============================================================================
// LEDGER COMMANDS
// =============================================================================

/// Set the allowance an account grants the pool.
pub fn cmd_approve(
    db_path: &Path,
    config: &AppConfig,
    json_mode: bool,
    account: &str,
    amount: Amount,
) -> Result<(), PoolError> {
    let account = AccountId::new(account)?;
    let mut session = open_session(db_path, config)?;
    session.approve(&account, amount)?;

    tracing::info!(event = "approve", account = %account, amount = %amount, "Allowance set");

    if json_mode {
        return print_balance(&session, &account, true);
    }
    println!("{} approved the pool for {}", account, amount);
    Ok(())
}

/// Show an account's balance, allowance and principal.
pub fn cmd_balance(
    db_path: &Path,
    config: &AppConfig,
    json_mode: bool,
    account: &str,
) -> Result<(), PoolError> {
    let account = AccountId::new(account)?;
    let session = open_session(db_path, config)?;
    print_balance(&session, &account, json_mode)
}

fn print_balance(session: &Session, account: &AccountId, json_mode: bool) -> Result<(), PoolError> {
    let report = BalanceReport {
        account,
        balance: session.ledger().balance_of(account),
        allowance: session.ledger().allowance(account),
        principal: session.pool().principal_of(account),
    };

    if json_mode {
        return print_json(&report);
    }

    println!("Account:   {}", report.account);
    println!("Balance:   {}", report.balance);
    println!("Allowance: {}", report.allowance);
    println!("Principal: {}", report.principal);
    Ok(())
}

// =============================================================================
// CLOCK / QUOTE COMMANDS
// =============================================================================

/// Install or clear the elapsed-time override.
pub fn cmd_set_clock(
    db_path: &Path,
    config: &AppConfig,
    json_mode: bool,
    elapsed: Option<i64>,
    clear: bool,
) -> Result<(), PoolError> {
    if elapsed.is_none() && !clear {
        return Err(PoolError::InvalidConfig(
            "Provide an elapsed time or --clear".to_string(),
        ));
    }

    let mut session = open_session(db_path, config)?;
    session.set_clock_override(elapsed)?;

    let report = ClockReport {
        clock_override: elapsed,
        elapsed_ms: session.pool().elapsed(),
        phase: session.pool().phase(),
    };
    tracing::info!(
        event = "set_clock",
        clock_override = ?report.clock_override,
        phase = report.phase.name(),
        "Clock updated"
    );

    if json_mode {
        return print_json(&report);
    }

    match elapsed {
        Some(t) => println!("Clock override set to {} ms", t),
        None => println!("Clock override cleared, following system clock"),
    }
    println!("Phase: {}", report.phase);
    Ok(())
}

/// Reward a withdrawal would receive right now.
pub fn cmd_quote(
    db_path: &Path,
    config: &AppConfig,
    json_mode: bool,
    amount: Amount,
) -> Result<(), PoolError> {
    let session = open_session(db_path, config)?;
    let pool = session.pool();

    let quoted = pool.quote_withdraw(amount)?;
    let rate = pool.rate_per_million()?;
    let period = match pool.phase() {
        Phase::Open { elapsed, .. } => elapsed,
        _ => pool.params().window_duration,
    };
    let report = QuoteReport {
        amount,
        reward: quoted,
        phase: pool.phase(),
        rate_per_million: rate,
        annualized_rate_per_million: reward::annualized(rate, period)?,
    };

    if json_mode {
        return print_json(&report);
    }

    println!("Withdrawing {} now pays {} reward", report.amount, report.reward);
    println!("Phase:      {}", report.phase);
    println!("Rate:       {} per million", report.rate_per_million);
    println!(
        "Annualized: {} per million",
        report.annualized_rate_per_million
    );
    Ok(())
}

// =============================================================================
// EXPORT / IMPORT COMMANDS
// =============================================================================

/// Export the pool snapshot.
pub fn cmd_export(db_path: &Path, config: &AppConfig, output: &Path) -> Result<(), PoolError> {
    let validated_output = validate_output_path(output)?;
    let session = open_session(db_path, config)?;

    let data = snapshot_to_bytes(&session.snapshot())?;
    std::fs::write(&validated_output, &data)
        .map_err(|e| PoolError::IoError(format!("Write file: {}", e)))?;

    tracing::info!(event = "export", output = %validated_output.display(), bytes = data.len(), "Snapshot exported");
    println!("Exported {} bytes to {:?}", data.len(), validated_output);
    Ok(())
}

/// Replace the pool with an imported snapshot.
pub fn cmd_import(db_path: &Path, config: &AppConfig, input: &Path) -> Result<(), PoolError> {
    let validated_path = validate_file_path(input)?;
    validate_file_size(&validated_path, MAX_IMPORT_FILE_SIZE)?;

    let data = std::fs::read(&validated_path)
        .map_err(|e| PoolError::IoError(format!("Read file: {}", e)))?;
    let snapshot = snapshot_from_bytes(&data)?;

    let mut session = open_session(db_path, config)?;
    session.import(snapshot)?;

    tracing::info!(
        event = "import",
        input = %validated_path.display(),
        total_staked = %session.pool().total_staked(),
        "Snapshot imported"
    );
    println!(
        "Imported pool '{}': {} staked, {} reward balance",
        session.pool().params().name,
        session.pool().total_staked(),
        session.pool().reward_balance()
    );
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn admin(config: &AppConfig) -> Result<FixedAdmin, PoolError> {
    Ok(FixedAdmin::new(config.admin()?))
}

/// Open the pool database created by `init`.
pub fn open_session(db_path: &Path, config: &AppConfig) -> Result<Session, PoolError> {
    if !db_path.exists() {
        return Err(PoolError::Uninitialized);
    }
    Session::open_redb(db_path, config.system_clock(), admin(config)?)
}

fn clock_label(session: &Session) -> &'static str {
    if session.pool().clock().is_manual() {
        "override"
    } else {
        "system"
    }
}
