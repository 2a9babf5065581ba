//! Dev-ledger administration: seeding balances and registering assets.
//!
//! These commands mutate the file-backed [`MemoryLedger`] directly and
//! exist so a rotation flow can be exercised end to end without a real
//! chain.

use clap::Subcommand;
use keyward_ledger::MemoryLedger;
use keyward_types::AssetId;

use crate::context::Context;
use crate::output;

#[derive(Subcommand)]
pub enum DevAction {
    /// Credit an address with funds out of thin air.
    Mint {
        /// Recipient address (kwd Bech32 or 64 hex chars).
        #[arg(long)]
        to: String,
        /// Amount to credit.
        #[arg(long)]
        amount: u128,
        /// Asset id (64 hex chars) or 'native'.
        #[arg(long, default_value = "native")]
        asset: String,
    },
    /// Register a fungible asset on the dev ledger.
    RegisterAsset {
        /// Asset id (64 hex chars).
        #[arg(long)]
        asset: String,
        /// Register without permit support (rotations will leave the
        /// asset behind).
        #[arg(long)]
        no_permits: bool,
    },
}

pub async fn run(action: DevAction, ctx: &Context) -> std::result::Result<(), String> {
    ctx.ensure_data_dir()?;
    let ledger = ctx.open_ledger()?;
    match action {
        DevAction::Mint { to, amount, asset } => mint(ctx, &ledger, &to, amount, &asset),
        DevAction::RegisterAsset { asset, no_permits } => {
            register_asset(ctx, &ledger, &asset, !no_permits)
        }
    }
}

fn mint(
    ctx: &Context,
    ledger: &MemoryLedger,
    to: &str,
    amount: u128,
    asset: &str,
) -> std::result::Result<(), String> {
    let address = output::parse_address(to)?;
    let asset = output::parse_asset(asset)?;
    ledger
        .mint(asset, address, amount)
        .map_err(|e| e.to_string())?;
    output::print_success(&format!("minted {amount} of {asset}"), ctx.json);
    Ok(())
}

fn register_asset(
    ctx: &Context,
    ledger: &MemoryLedger,
    asset: &str,
    supports_permits: bool,
) -> std::result::Result<(), String> {
    let asset = output::parse_asset(asset)?;
    if asset == AssetId::NATIVE {
        return Err("the native asset is always available and cannot be registered".into());
    }
    ledger
        .register_asset(asset, supports_permits)
        .map_err(|e| e.to_string())?;
    output::print_success(
        &format!(
            "registered asset {asset} ({} permits)",
            if supports_permits { "with" } else { "without" }
        ),
        ctx.json,
    );
    Ok(())
}
