//! # stakepool
//!
//! Library half of the operator binary: configuration loading, the
//! administrator key check and the command handlers, shared by `main.rs`
//! and the integration tests.

pub mod auth;
pub mod cli;
pub mod config;

pub use config::{AppConfig, LedgerSection, PoolSection, SeedBalance};
