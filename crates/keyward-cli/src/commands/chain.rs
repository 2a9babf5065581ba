//! Chain commands: status resolution, log inspection, balances.

use clap::Subcommand;
use keyward_crypto::encoding::encode_address;
use keyward_ledger::LedgerAdapter;
use keyward_protocol::{resolve, KeyEventLog};
use keyward_types::{Address, WalletStatus};
use keyward_wallet::KeyState;

use crate::context::Context;
use crate::output;

#[derive(Subcommand)]
pub enum ChainAction {
    /// Resolve the wallet's status against the ledger.
    Status,
    /// Show the key event log for this identity.
    Log,
    /// Show a balance held by the current key.
    Balance {
        /// Asset id (64 hex chars) or 'native'.
        #[arg(long, default_value = "native")]
        asset: String,
    },
}

pub async fn run(action: ChainAction, ctx: &Context) -> std::result::Result<(), String> {
    match action {
        ChainAction::Status => status(ctx).await,
        ChainAction::Log => log(ctx).await,
        ChainAction::Balance { asset } => balance(ctx, &asset).await,
    }
}

fn fmt_addr(address: &Address) -> String {
    encode_address(address).unwrap_or_else(|_| address.to_string())
}

async fn status(ctx: &Context) -> std::result::Result<(), String> {
    if !ctx.seed_path().exists() {
        print_status(ctx, WalletStatus::NoKey, None, 0, false);
        return Ok(());
    }

    let session = ctx.unlock_session()?;
    let factor = ctx.factor()?;
    let master = session.master().map_err(|e| e.to_string())?;
    let first = master
        .step(&factor)
        .map_err(|e| e.to_string())?
        .keypair()
        .address();

    match fetch_log(ctx, &first).await {
        Ok(log) => {
            let state = KeyState::align(&master, &factor, &log).map_err(|e| e.to_string())?;
            let claims = state.current_claims();
            let status = resolve(Some(&claims), &log);
            ctx.save_snapshot(Some(claims.clone()), log.clone())?;
            print_status(ctx, status, Some(&claims.address), log.len(), false);
            Ok(())
        }
        Err(error) => {
            // Ledger unreachable: fall back to the cached view.
            tracing::warn!(%error, "ledger unavailable, using cached snapshot");
            let Some(snapshot) = ctx.load_snapshot()? else {
                return Err(format!("ledger unavailable and no cached snapshot: {error}"));
            };
            let status = resolve(snapshot.claims.as_ref(), &snapshot.log);
            let address = snapshot.claims.as_ref().map(|c| c.address);
            print_status(ctx, status, address.as_ref(), snapshot.log.len(), true);
            Ok(())
        }
    }
}

fn print_status(
    ctx: &Context,
    status: WalletStatus,
    address: Option<&Address>,
    log_length: usize,
    cached: bool,
) {
    if ctx.json {
        let obj = serde_json::json!({
            "status": status,
            "address": address.map(fmt_addr),
            "log_length": log_length,
            "cached": cached,
        });
        println!("{obj}");
        return;
    }

    output::print_kv("status", &format!("{status:?}"), false);
    if let Some(address) = address {
        output::print_kv("address", &fmt_addr(address), false);
    }
    output::print_kv("log entries", &log_length.to_string(), false);
    if cached {
        output::print_kv("source", "cached snapshot (ledger unreachable)", false);
    }
}

async fn log(ctx: &Context) -> std::result::Result<(), String> {
    let session = ctx.unlock_session()?;
    let factor = ctx.factor()?;
    let master = session.master().map_err(|e| e.to_string())?;
    let first = master
        .step(&factor)
        .map_err(|e| e.to_string())?
        .keypair()
        .address();

    let log = match fetch_log(ctx, &first).await {
        Ok(log) => log,
        Err(error) => {
            tracing::warn!(%error, "ledger unavailable, using cached snapshot");
            ctx.load_snapshot()?
                .map(|s| s.log)
                .ok_or_else(|| format!("ledger unavailable and no cached snapshot: {error}"))?
        }
    };

    let rows: Vec<Vec<String>> = log
        .entries()
        .iter()
        .map(|e| {
            vec![
                e.rotation.to_string(),
                fmt_addr(&e.public_key_hash),
                fmt_addr(&e.prerotated_key_hash),
                if e.on_chain { "confirmed" } else { "pending" }.to_string(),
            ]
        })
        .collect();
    output::print_table(&["rotation", "key", "prerotated", "state"], &rows, ctx.json);
    Ok(())
}

async fn balance(ctx: &Context, asset: &str) -> std::result::Result<(), String> {
    let asset = output::parse_asset(asset)?;
    let session = ctx.unlock_session()?;
    let factor = ctx.factor()?;
    let master = session.master().map_err(|e| e.to_string())?;

    let ledger = ctx.open_ledger()?;
    let first = master
        .step(&factor)
        .map_err(|e| e.to_string())?
        .keypair()
        .address();
    let log = ledger.fetch_log(&first).await.map_err(|e| e.to_string())?;
    let state = KeyState::align(&master, &factor, &log).map_err(|e| e.to_string())?;

    let holder = state.current().address();
    let amount = ledger
        .balance_of(&asset, &holder)
        .await
        .map_err(|e| e.to_string())?;

    if ctx.json {
        let obj = serde_json::json!({
            "asset": asset.to_string(),
            "address": fmt_addr(&holder),
            "balance": amount.to_string(),
        });
        println!("{obj}");
    } else {
        output::print_kv("address", &fmt_addr(&holder), false);
        output::print_kv("asset", &asset.to_string(), false);
        output::print_kv("balance", &amount.to_string(), false);
    }
    Ok(())
}

async fn fetch_log(ctx: &Context, address: &Address) -> std::result::Result<KeyEventLog, String> {
    let ledger = ctx.open_ledger()?;
    ledger.fetch_log(address).await.map_err(|e| e.to_string())
}
