//! # Stakepool - Operator CLI
//!
//! The main binary for the stakepool reward ledger.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              apps/stakepool (THE BINARY)            │
//! │                                                     │
//! │  ┌─────────────┐   ┌─────────────┐   ┌──────────┐   │
//! │  │    CLI      │   │   Config    │   │   Auth   │   │
//! │  │   (clap)    │   │   (toml)    │   │ (subtle) │   │
//! │  └──────┬──────┘   └──────┬──────┘   └────┬─────┘   │
//! │         └─────────────────┼───────────────┘         │
//! │                           ▼                         │
//! │                  ┌────────────────┐                 │
//! │                  │ stakepool-core │                 │
//! │                  │  (THE LEDGER)  │                 │
//! │                  └────────────────┘                 │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! stakepool init
//! stakepool approve alice 500
//! stakepool stake alice 500
//! stakepool set-clock 30000
//! stakepool withdraw alice 200
//! stakepool --json-mode status
//! ```

use clap::Parser;
use stakepool::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Initialize tracing; STAKEPOOL_LOG_FORMAT=json switches to JSON lines on stderr.
    let log_format = std::env::var("STAKEPOOL_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "stakepool=debug,stakepool_core=debug"
    } else {
        "stakepool=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    // Display startup banner
    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the stakepool startup banner.
fn print_banner() {
    println!(
        r#"
  ┌─┐┌┬┐┌─┐┬┌─┌─┐┌─┐┌─┐┌─┐┬
  └─┐ │ ├─┤├┴┐├┤ ├─┘│ ││ ││
  └─┘ ┴ ┴ ┴┴ ┴└─┘┴  └─┘└─┘┴─┘

  Staking Reward Ledger v{}

  Bounded • Linear • Proportional
"#,
        env!("CARGO_PKG_VERSION")
    );
}
