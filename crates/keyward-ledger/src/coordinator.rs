//! Rotation orchestration over a [`LedgerAdapter`].
//!
//! [`RotationCoordinator`] drives the full flow the pure protocol
//! crate cannot: fetch the log, gate on continuity and pending
//! entries, sweep the native balance, aggregate token permits, build
//! the dual-transaction bundle, and submit it. A nonce conflict means
//! another attempt advanced the tail first; the whole pipeline re-runs
//! from a fresh fetch, bounded by the configured retry count.

use std::collections::BTreeMap;

use keyward_crypto::signing::Keypair;
use keyward_protocol::bundle::{self, BundleRequest};
use keyward_protocol::{collect_permits, resolve, validate, AssetHandle, ValidationMode};
use keyward_types::{
    Amount, AssetId, CandidateKey, KeywardError, Result, RotationConfig, WalletStatus,
};
use tokio::sync::watch;

use crate::adapter::{LedgerAdapter, Recipient, TxReceipt, ValueTransfer};
use crate::capture::{capture_key, KeySource};

// ---------------------------------------------------------------------------
// Request and outcome
// ---------------------------------------------------------------------------

/// One rotation the caller wants performed.
///
/// Every send is a rotation: payments ride on the retiring key's
/// transaction and the rest of the native balance sweeps forward to
/// the successor's span, so `recipients` may be empty for a pure
/// rotation. `assets` lists the token balances to carry along by
/// permit.
pub struct RotationRequest<'a> {
    /// The key being retired.
    pub current: &'a Keypair,
    /// The retiring key's commitments.
    pub current_claims: &'a CandidateKey,
    /// The successor key.
    pub next: &'a Keypair,
    /// The successor's commitments.
    pub next_claims: &'a CandidateKey,
    /// Third-party native payments to settle during the rotation.
    pub recipients: Vec<Recipient>,
    /// Token balances to move forward alongside the native sweep.
    pub assets: Vec<AssetId>,
}

/// What a completed rotation produced.
#[derive(Clone, Debug)]
pub struct RotationOutcome {
    /// The ledger's acceptance receipt.
    pub receipt: TxReceipt,
    /// Assets left behind because they lack permit support.
    pub skipped_assets: Vec<AssetId>,
}

// ---------------------------------------------------------------------------
// RotationCoordinator
// ---------------------------------------------------------------------------

/// Drives rotations and status queries against one ledger.
pub struct RotationCoordinator<L> {
    ledger: L,
    config: RotationConfig,
}

impl<L: LedgerAdapter> RotationCoordinator<L> {
    pub fn new(ledger: L, config: RotationConfig) -> Self {
        Self { ledger, config }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn config(&self) -> &RotationConfig {
        &self.config
    }

    /// Resolves the wallet status for the locally-held key.
    ///
    /// Pure resolution happens in the protocol crate; this method only
    /// supplies the fetched log and maps fetch failures to
    /// [`WalletStatus::Error`].
    pub async fn status(&self, local: Option<&CandidateKey>) -> WalletStatus {
        let Some(claims) = local else {
            return WalletStatus::NoKey;
        };
        match self.ledger.fetch_log(&claims.address).await {
            Ok(log) => resolve(Some(claims), &log),
            Err(error) => {
                tracing::warn!(%error, address = %claims.address, "status fetch failed");
                WalletStatus::Error
            }
        }
    }

    /// Performs one rotation, retrying through nonce conflicts.
    ///
    /// # Process
    ///
    /// 1. Fetch the log for the retiring key; pending entries mean a
    ///    prior submission is still confirming and block the attempt.
    /// 2. Gate on continuity: at inception both in-hand keys are
    ///    checked, afterwards the successor is checked against the
    ///    tail.
    /// 3. Sweep value: the full native balance rides the bundle, with
    ///    `recipients` paid out of it and the rest landing one hop
    ///    ahead.
    /// 4. Aggregate permits for every requested token; assets without
    ///    permit support are skipped with a warning.
    /// 5. Build the bundle at the identity's current nonce and submit.
    ///
    /// A [`KeywardError::NonceConflict`] from submission re-runs the
    /// pipeline from step 1, at most `config.nonce_retries` times.
    ///
    /// # Errors
    ///
    /// Anything the gates, the builder, or the ledger reject. These are
    /// surfaced as-is; only nonce conflicts are retried.
    pub async fn rotate(&self, request: &RotationRequest<'_>) -> Result<RotationOutcome> {
        let mut attempt: u32 = 0;
        loop {
            match self.attempt_rotation(request).await {
                Err(KeywardError::NonceConflict { reason })
                    if attempt < self.config.nonce_retries =>
                {
                    attempt += 1;
                    tracing::info!(attempt, %reason, "nonce conflict, rebuilding rotation");
                }
                outcome => return outcome,
            }
        }
    }

    /// Captures the successor key from `source`, then rotates to it.
    ///
    /// No ledger state is touched until a key is captured, so a
    /// cancelled or timed-out capture has no side effects.
    pub async fn rotate_scanned<S>(
        &self,
        current: &Keypair,
        current_claims: &CandidateKey,
        source: &S,
        cancel: &mut watch::Receiver<bool>,
        recipients: Vec<Recipient>,
        assets: Vec<AssetId>,
    ) -> Result<RotationOutcome>
    where
        S: KeySource + ?Sized,
    {
        let scanned = capture_key(source, &self.config, cancel).await?;
        let request = RotationRequest {
            current,
            current_claims,
            next: &scanned.keypair,
            next_claims: &scanned.claims,
            recipients,
            assets,
        };
        self.rotate(&request).await
    }

    /// One full pipeline pass: fetch, gate, aggregate, build, submit.
    async fn attempt_rotation(&self, request: &RotationRequest<'_>) -> Result<RotationOutcome> {
        let holder = request.current.address();
        if holder != request.current_claims.address {
            return Err(KeywardError::KeyMismatch {
                reason: format!(
                    "retiring keypair hashes to {holder} but claims assert {}",
                    request.current_claims.address
                ),
            });
        }

        let log = self.ledger.fetch_log(&holder).await?;
        if log.has_pending() {
            return Err(KeywardError::RotationInFlight {
                reason: "a prior rotation submission is still confirming".to_string(),
            });
        }
        let inception = log.is_empty();

        if inception {
            validate(request.current_claims, &log, ValidationMode::Rotation)?;
            validate(
                request.next_claims,
                &log,
                ValidationMode::TransactionFlow {
                    current: request.current_claims,
                },
            )?;
        } else {
            validate(request.next_claims, &log, ValidationMode::Rotation)?;
        }

        // Forward security: nothing stays behind on the retiring key,
        // so the swept value is the whole native balance.
        let value = self.ledger.balance_of(&AssetId::NATIVE, &holder).await?;
        let paying: Amount = request.recipients.iter().map(|r| r.amount).sum();
        if paying > value {
            return Err(KeywardError::InsufficientBalance {
                reason: format!("native balance {value} cannot cover {paying} in payments"),
            });
        }

        let mut handles = Vec::with_capacity(request.assets.len());
        for asset in &request.assets {
            if asset.is_native() {
                continue;
            }
            let balance = self.ledger.balance_of(asset, &holder).await?;
            match self.ledger.signing_nonce(asset, &holder).await {
                Ok(permit_nonce) => handles.push(AssetHandle {
                    asset: *asset,
                    balance,
                    permit_nonce,
                    supports_permits: true,
                }),
                Err(KeywardError::PermitUnsupported { .. }) => handles.push(AssetHandle {
                    asset: *asset,
                    balance,
                    permit_nonce: 0,
                    supports_permits: false,
                }),
                Err(error) => return Err(error),
            }
        }

        let output = bundle::rotation_output(request.next_claims, inception);
        let batch = collect_permits(
            &handles,
            request.current,
            self.ledger.endpoint(),
            output,
            self.config.permit_deadline_secs,
            &BTreeMap::new(),
        )?;
        for asset in &batch.skipped {
            tracing::warn!(%asset, "asset left behind: no permit support");
        }

        let nonce = self.ledger.signing_nonce(&AssetId::NATIVE, &holder).await?;
        let bundle = bundle::build(BundleRequest {
            current: request.current,
            current_claims: request.current_claims,
            next: request.next,
            next_claims: request.next_claims,
            asset: AssetId::NATIVE,
            value,
            permits: batch.permits,
            nonce,
            inception,
        })?;

        let transfer = ValueTransfer {
            recipients: request.recipients.clone(),
        };
        let receipt = self.ledger.submit_rotation(&bundle, &transfer).await?;
        tracing::info!(
            tx = %receipt.tx_id,
            log_length = receipt.log_length,
            value,
            "rotation submitted"
        );

        Ok(RotationOutcome {
            receipt,
            skipped_assets: batch.skipped,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
