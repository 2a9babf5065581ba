//! Transfer commands: rotation and payment.
//!
//! Every send is a rotation. A plain `rotate` sweeps the native
//! balance one hop forward; `send` does the same while settling
//! third-party payments out of the swept value. Both carry any
//! requested token balances along by permit.

use std::path::PathBuf;

use async_trait::async_trait;
use clap::Subcommand;
use keyward_ledger::{
    KeySource, LedgerAdapter, Recipient, RotationOutcome, RotationRequest,
};
use keyward_types::{AssetId, KeywardError, Result};
use keyward_wallet::KeyState;
use tokio::sync::watch;

use crate::context::Context;
use crate::output;

#[derive(Subcommand)]
pub enum TransferAction {
    /// Rotate to the next key, sweeping the native balance forward.
    Rotate {
        /// Read the successor key from this file instead of deriving it
        /// (wire-line format, e.g. from a QR scanner).
        #[arg(long)]
        scan_file: Option<PathBuf>,
        /// Token asset (64 hex chars) to carry along; repeatable.
        #[arg(long = "asset")]
        assets: Vec<String>,
    },
    /// Pay a recipient; the payment rides a rotation.
    Send {
        /// Recipient address (kwd Bech32 or 64 hex chars).
        #[arg(long)]
        to: String,
        /// Native amount to pay.
        #[arg(long)]
        amount: u128,
        /// Token asset (64 hex chars) to carry along; repeatable.
        #[arg(long = "asset")]
        assets: Vec<String>,
    },
}

pub async fn run(action: TransferAction, ctx: &Context) -> std::result::Result<(), String> {
    match action {
        TransferAction::Rotate { scan_file, assets } => {
            rotate(ctx, Vec::new(), &assets, scan_file).await
        }
        TransferAction::Send { to, amount, assets } => {
            let recipient = Recipient {
                address: output::parse_address(&to)?,
                amount,
            };
            rotate(ctx, vec![recipient], &assets, None).await
        }
    }
}

// ---------------------------------------------------------------------------
// FileSource
// ---------------------------------------------------------------------------

/// Key source that polls a file for a scanned wire line.
///
/// Stands in for a QR reader or paired device: whatever writes the
/// file plays the scanner. Absent or empty files mean "nothing scanned
/// yet".
struct FileSource {
    path: PathBuf,
}

#[async_trait]
impl KeySource for FileSource {
    async fn poll_scan(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let line = contents.trim();
                if line.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(line.to_string()))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(KeywardError::StorageError {
                reason: format!("failed to read scan file: {e}"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Rotation driver
// ---------------------------------------------------------------------------

async fn rotate(
    ctx: &Context,
    recipients: Vec<Recipient>,
    assets: &[String],
    scan_file: Option<PathBuf>,
) -> std::result::Result<(), String> {
    let assets = assets
        .iter()
        .map(|s| output::parse_asset(s))
        .collect::<std::result::Result<Vec<AssetId>, String>>()?;

    let session = ctx.unlock_session()?;
    let factor = ctx.factor()?;
    let master = session.master().map_err(|e| e.to_string())?;
    let coordinator = ctx.coordinator()?;

    let first = master
        .step(&factor)
        .map_err(|e| e.to_string())?
        .keypair()
        .address();
    let log = coordinator
        .ledger()
        .fetch_log(&first)
        .await
        .map_err(|e| e.to_string())?;
    let state = KeyState::align(&master, &factor, &log).map_err(|e| e.to_string())?;
    let current_claims = state.current_claims();

    let outcome = match scan_file {
        Some(path) => {
            let source = FileSource { path };
            let (_keep, mut cancel) = watch::channel(false);
            coordinator
                .rotate_scanned(
                    state.current(),
                    &current_claims,
                    &source,
                    &mut cancel,
                    recipients,
                    assets,
                )
                .await
        }
        None => {
            let next_claims = state.next_claims();
            coordinator
                .rotate(&RotationRequest {
                    current: state.current(),
                    current_claims: &current_claims,
                    next: state.next(),
                    next_claims: &next_claims,
                    recipients,
                    assets,
                })
                .await
        }
    }
    .map_err(|e| e.to_string())?;

    // Refresh the cached view against the advanced chain.
    let log = coordinator
        .ledger()
        .fetch_log(&first)
        .await
        .map_err(|e| e.to_string())?;
    let refreshed = KeyState::align(&master, &factor, &log).map_err(|e| e.to_string())?;
    ctx.save_snapshot(Some(refreshed.current_claims()), log)?;

    print_outcome(ctx, &outcome);
    Ok(())
}

fn print_outcome(ctx: &Context, outcome: &RotationOutcome) {
    if ctx.json {
        let obj = serde_json::json!({
            "tx_id": outcome.receipt.tx_id.to_string(),
            "log_length": outcome.receipt.log_length,
            "submitted_at": outcome.receipt.submitted_at.as_str(),
            "skipped_assets": outcome
                .skipped_assets
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>(),
        });
        println!("{obj}");
        return;
    }

    output::print_success("rotation submitted", false);
    output::print_kv("tx", &outcome.receipt.tx_id.to_string(), false);
    output::print_kv("log length", &outcome.receipt.log_length.to_string(), false);
    for asset in &outcome.skipped_assets {
        output::print_kv("skipped asset", &asset.to_string(), false);
    }
}
