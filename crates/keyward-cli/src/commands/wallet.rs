//! Wallet commands: seed creation and out-of-band key export.

use clap::Subcommand;
use keyward_crypto::encoding::encode_address;
use keyward_protocol::wire::encode_wire;
use keyward_protocol::KeyEventLog;
use keyward_wallet::{KeyState, WalletSession};

use crate::context::Context;
use crate::output;

#[derive(Subcommand)]
pub enum WalletAction {
    /// Create a new encrypted seed in the data directory.
    Init {
        /// Overwrite an existing seed file.
        #[arg(long)]
        force: bool,
    },
    /// Print the current key as a scannable wire line.
    Export,
}

pub async fn run(action: WalletAction, ctx: &Context) -> std::result::Result<(), String> {
    match action {
        WalletAction::Init { force } => init(ctx, force).await,
        WalletAction::Export => export(ctx).await,
    }
}

async fn init(ctx: &Context, force: bool) -> std::result::Result<(), String> {
    ctx.ensure_data_dir()?;

    let seed_path = ctx.seed_path();
    if seed_path.exists() && !force {
        return Err(format!(
            "a wallet already exists at {}; pass --force to overwrite",
            seed_path.display()
        ));
    }

    let passphrase = ctx.read_passphrase("Choose a wallet passphrase: ");
    let session = WalletSession::create(&passphrase).map_err(|e| e.to_string())?;
    ctx.save_session(&session)?;

    output::print_success("wallet created", ctx.json);
    output::print_kv(
        "fingerprint",
        &hex::encode(session.fingerprint()),
        ctx.json,
    );

    // With a factor in hand we can already show the inception address.
    if let Ok(factor) = ctx.factor() {
        let mut session = session;
        session
            .unlock(&passphrase)
            .map_err(|e| format!("failed to unlock new wallet: {e}"))?;
        let master = session.master().map_err(|e| e.to_string())?;
        let state = KeyState::align(&master, &factor, &KeyEventLog::new())
            .map_err(|e| e.to_string())?;
        let address =
            encode_address(&state.current().address()).map_err(|e| e.to_string())?;
        output::print_kv("address", &address, ctx.json);
    }

    Ok(())
}

async fn export(ctx: &Context) -> std::result::Result<(), String> {
    let session = ctx.unlock_session()?;
    let factor = ctx.factor()?;
    let master = session.master().map_err(|e| e.to_string())?;

    // Align against the ledger when reachable; a fresh wallet exports
    // its inception key.
    let log = match ctx.open_ledger() {
        Ok(ledger) => {
            use keyward_ledger::LedgerAdapter;
            let first = master
                .step(&factor)
                .map_err(|e| e.to_string())?
                .keypair()
                .address();
            ledger
                .fetch_log(&first)
                .await
                .unwrap_or_else(|_| KeyEventLog::new())
        }
        Err(_) => KeyEventLog::new(),
    };

    let state = KeyState::align(&master, &factor, &log).map_err(|e| e.to_string())?;
    let line = encode_wire(state.current(), &state.current_claims())
        .map_err(|e| e.to_string())?;

    if ctx.json {
        let obj = serde_json::json!({
            "rotation": state.rotation(),
            "wire": line,
        });
        println!("{obj}");
    } else {
        output::print_kv("rotation", &state.rotation().to_string(), false);
        println!("{line}");
    }
    Ok(())
}
