//! Keyward CLI wallet.
//!
//! Drives the rotation protocol against the file-backed dev ledger in
//! the data directory.
//!
//! Environment:
//!
//!   KEYWARD_PASSPHRASE   Wallet passphrase (avoids interactive prompt)
//!   KEYWARD_FACTOR       Second factor when --factor is not given

mod commands;
mod context;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use context::Context;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Keyward — forward-secure key rotation wallet.
#[derive(Parser)]
#[command(name = "keyward", version, about)]
struct Cli {
    /// Output in JSON format (no colors, machine-readable).
    #[arg(long, global = true)]
    json: bool,

    /// Data directory holding the seed, ledger, and snapshot files.
    #[arg(long, global = true, default_value = ".keyward")]
    data_dir: PathBuf,

    /// Second factor for key derivation (falls back to KEYWARD_FACTOR).
    #[arg(long, global = true)]
    factor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed management and key export.
    Wallet {
        #[command(subcommand)]
        action: commands::wallet::WalletAction,
    },
    /// Status, log, and balance queries.
    Chain {
        #[command(subcommand)]
        action: commands::chain::ChainAction,
    },
    /// Rotations and payments.
    #[command(alias = "tx")]
    Transfer {
        #[command(subcommand)]
        action: commands::transfer::TransferAction,
    },
    /// Dev-ledger administration.
    Dev {
        #[command(subcommand)]
        action: commands::dev::DevAction,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let ctx = Context::new(cli.json, cli.data_dir, cli.factor);

    let result = dispatch(&ctx, cli.command).await;

    if let Err(e) = result {
        output::print_error(&e, ctx.json);
        std::process::exit(1);
    }
}

async fn dispatch(ctx: &Context, cmd: Commands) -> std::result::Result<(), String> {
    match cmd {
        Commands::Wallet { action } => commands::wallet::run(action, ctx).await,
        Commands::Chain { action } => commands::chain::run(action, ctx).await,
        Commands::Transfer { action } => commands::transfer::run(action, ctx).await,
        Commands::Dev { action } => commands::dev::run(action, ctx).await,
    }
}
