//! Reference in-memory ledger.
//!
//! [`MemoryLedger`] is the deterministic back-end used by tests and
//! the dev CLI. It keeps every chain, balance, and nonce in one
//! mutex-guarded state table, optionally mirrored to a JSON snapshot
//! file after each accepted mutation.
//!
//! Submission rules:
//!
//! 1. An unknown signer with no predecessor pointer founds a new
//!    chain; its own entry is appended at rotation zero.
//! 2. A known signer must be the chain tail with exactly the
//!    commitments the tail recorded; the confirming side's entry is
//!    appended one rotation later.
//! 3. The identity's rotation nonce must match, and advances by two
//!    (both sides consume one) on acceptance.
//! 4. Every check runs before any state changes; a rejected bundle
//!    leaves no trace.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use keyward_crypto::hash::sha3_256;
use keyward_protocol::{KeyEventLog, RotationBundle};
use keyward_types::{
    Address, Amount, AssetId, KeyLogEntry, KeywardError, Result, Timestamp, TxId,
};
use serde::{Deserialize, Serialize};

use crate::adapter::{LedgerAdapter, TxReceipt, ValueTransfer};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Default)]
struct LedgerState {
    /// One log per identity chain, each keyed off its inception entry.
    chains: Vec<KeyEventLog>,
    /// Rotation-sequence nonce per chain, keyed by inception address.
    chain_nonces: BTreeMap<Address, u64>,
    /// Balances per (asset, holder).
    balances: BTreeMap<(AssetId, Address), Amount>,
    /// Permit nonces per (asset, owner).
    permit_nonces: BTreeMap<(AssetId, Address), u64>,
    /// Registered assets and whether they support permit signing.
    assets: BTreeMap<AssetId, bool>,
    /// Monotonic counter feeding transaction identifiers.
    tx_counter: u64,
    /// When set, accepted entries land pending instead of confirmed.
    hold_confirmations: bool,
}

impl LedgerState {
    /// Index of the chain the address belongs to, as a recorded key or
    /// as the tail's awaited successor.
    fn chain_index(&self, address: &Address) -> Option<usize> {
        self.chains.iter().position(|log| {
            log.entries().iter().any(|e| e.public_key_hash == *address)
                || log.tail().is_some_and(|t| t.prerotated_key_hash == *address)
        })
    }

    fn balance(&self, asset: &AssetId, address: &Address) -> Amount {
        self.balances.get(&(*asset, *address)).copied().unwrap_or(0)
    }

    fn credit(&mut self, asset: AssetId, address: Address, amount: Amount) {
        if amount == 0 {
            return;
        }
        let slot = self.balances.entry((asset, address)).or_insert(0);
        *slot = slot.saturating_add(amount);
    }

    fn debit(&mut self, asset: AssetId, address: Address, amount: Amount) {
        let slot = self.balances.entry((asset, address)).or_insert(0);
        *slot = slot.saturating_sub(amount);
    }
}

/// Persisted form of the state; maps flatten into pair lists so the
/// snapshot stays plain JSON.
#[derive(Default, Serialize, Deserialize)]
struct LedgerSnapshot {
    chains: Vec<KeyEventLog>,
    chain_nonces: Vec<(Address, u64)>,
    balances: Vec<(AssetId, Address, Amount)>,
    permit_nonces: Vec<(AssetId, Address, u64)>,
    assets: Vec<(AssetId, bool)>,
    tx_counter: u64,
}

impl LedgerSnapshot {
    fn capture(state: &LedgerState) -> Self {
        Self {
            chains: state.chains.clone(),
            chain_nonces: state
                .chain_nonces
                .iter()
                .map(|(a, n)| (*a, *n))
                .collect(),
            balances: state
                .balances
                .iter()
                .map(|((asset, addr), amt)| (*asset, *addr, *amt))
                .collect(),
            permit_nonces: state
                .permit_nonces
                .iter()
                .map(|((asset, addr), n)| (*asset, *addr, *n))
                .collect(),
            assets: state.assets.iter().map(|(a, s)| (*a, *s)).collect(),
            tx_counter: state.tx_counter,
        }
    }

    fn restore(self) -> LedgerState {
        LedgerState {
            chains: self.chains,
            chain_nonces: self.chain_nonces.into_iter().collect(),
            balances: self
                .balances
                .into_iter()
                .map(|(asset, addr, amt)| ((asset, addr), amt))
                .collect(),
            permit_nonces: self
                .permit_nonces
                .into_iter()
                .map(|(asset, addr, n)| ((asset, addr), n))
                .collect(),
            assets: self.assets.into_iter().collect(),
            tx_counter: self.tx_counter,
            hold_confirmations: false,
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryLedger
// ---------------------------------------------------------------------------

/// Deterministic in-memory ledger, optionally JSON-file backed.
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryLedger {
    /// Creates an empty, purely in-memory ledger.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            snapshot_path: None,
        }
    }

    /// Opens a file-backed ledger, loading the snapshot at `path` if
    /// it exists. Every accepted mutation rewrites the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`KeywardError::StorageError`] if the file exists but
    /// cannot be read or parsed.
    pub fn open(path: &Path) -> Result<Self> {
        let state = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                KeywardError::StorageError {
                    reason: format!("failed to read ledger snapshot: {e}"),
                }
            })?;
            let snapshot: LedgerSnapshot =
                serde_json::from_str(&raw).map_err(|e| KeywardError::StorageError {
                    reason: format!("failed to parse ledger snapshot: {e}"),
                })?;
            snapshot.restore()
        } else {
            LedgerState::default()
        };

        Ok(Self {
            state: Mutex::new(state),
            snapshot_path: Some(path.to_path_buf()),
        })
    }

    /// Registers a fungible asset and whether it supports permits.
    pub fn register_asset(&self, asset: AssetId, supports_permits: bool) -> Result<()> {
        let mut state = self.lock()?;
        state.assets.insert(asset, supports_permits);
        self.persist(&state)
    }

    /// Credits `amount` of `asset` to `address` out of thin air.
    ///
    /// # Errors
    ///
    /// Returns [`KeywardError::ConfigError`] for a non-native asset
    /// that was never registered.
    pub fn mint(&self, asset: AssetId, address: Address, amount: Amount) -> Result<()> {
        let mut state = self.lock()?;
        if !asset.is_native() && !state.assets.contains_key(&asset) {
            return Err(KeywardError::ConfigError {
                reason: format!("cannot mint unregistered asset {asset}"),
            });
        }
        state.credit(asset, address, amount);
        self.persist(&state)
    }

    /// When enabled, accepted entries stay pending until
    /// [`advance_confirmations`](Self::advance_confirmations) runs.
    pub fn set_hold_confirmations(&self, hold: bool) -> Result<()> {
        self.lock()?.hold_confirmations = hold;
        Ok(())
    }

    /// Confirms every pending entry across all chains, returning how
    /// many flipped.
    pub fn advance_confirmations(&self) -> Result<usize> {
        let mut state = self.lock()?;
        let flipped = state.chains.iter_mut().map(KeyEventLog::confirm_all).sum();
        self.persist(&state)?;
        Ok(flipped)
    }

    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>> {
        self.state.lock().map_err(|_| KeywardError::StorageError {
            reason: "ledger state mutex poisoned".to_string(),
        })
    }

    fn persist(&self, state: &LedgerState) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&LedgerSnapshot::capture(state))
            .map_err(|e| KeywardError::StorageError {
                reason: format!("failed to encode ledger snapshot: {e}"),
            })?;
        std::fs::write(path, json).map_err(|e| KeywardError::StorageError {
            reason: format!("failed to write ledger snapshot: {e}"),
        })
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Submission checks
// ---------------------------------------------------------------------------

/// Everything `submit_rotation` decides before touching state.
struct AcceptedSubmission {
    entry: KeyLogEntry,
    chain: Option<usize>,
    anchor: Address,
    permit_moves: Vec<(AssetId, Address, Address, Amount)>,
    permit_nonces: Vec<((AssetId, Address), u64)>,
}

fn check_submission(
    state: &LedgerState,
    bundle: &RotationBundle,
    transfer: &ValueTransfer,
    spender: Address,
    on_chain: bool,
) -> Result<AcceptedSubmission> {
    let unconfirmed = &bundle.unconfirmed;
    let confirming = &bundle.confirming;
    let signer = unconfirmed.address();

    // Shape of the two sides.
    if confirming.amount != 0 {
        return Err(KeywardError::LedgerRejected {
            reason: "confirming side carries value".to_string(),
        });
    }
    if !confirming.permits.is_empty() {
        return Err(KeywardError::LedgerRejected {
            reason: "confirming side carries permits".to_string(),
        });
    }
    if unconfirmed.output_address != confirming.output_address {
        return Err(KeywardError::LedgerRejected {
            reason: "bundle sides disagree on output address".to_string(),
        });
    }
    if transfer.total() > unconfirmed.amount {
        return Err(KeywardError::LedgerRejected {
            reason: format!(
                "recipient payments {} exceed the signed amount {}",
                transfer.total(),
                unconfirmed.amount
            ),
        });
    }

    // Chain resolution: founding submission or continuation of a tail.
    let chain = state.chain_index(&signer);
    let (entry, anchor) = match chain {
        None => {
            if unconfirmed.prev_public_key_hash.is_some() {
                return Err(KeywardError::LedgerRejected {
                    reason: format!(
                        "unknown identity {signer} presents a predecessor pointer"
                    ),
                });
            }
            let entry = unconfirmed.log_entry(0, on_chain);
            if !confirming.log_entry(1, true).follows(&entry) {
                return Err(KeywardError::LedgerRejected {
                    reason: "confirming side does not chain from the founding entry"
                        .to_string(),
                });
            }
            (entry, signer)
        }
        Some(index) => {
            let log = &state.chains[index];
            let Some(tail) = log.tail() else {
                return Err(KeywardError::StorageError {
                    reason: "recorded chain has no entries".to_string(),
                });
            };
            if tail.public_key_hash != signer {
                return Err(KeywardError::LedgerRejected {
                    reason: format!("submitting key {signer} is not the chain tail"),
                });
            }
            if tail.prerotated_key_hash != unconfirmed.prerotated_key_hash
                || tail.twice_prerotated_key_hash != unconfirmed.twice_prerotated_key_hash
                || tail.prev_public_key_hash != unconfirmed.prev_public_key_hash
            {
                return Err(KeywardError::LedgerRejected {
                    reason: "retiring key's claims diverge from its recorded entry"
                        .to_string(),
                });
            }
            let entry = confirming.log_entry(log.len() as u64, on_chain);
            if !entry.follows(tail) {
                return Err(KeywardError::LedgerRejected {
                    reason: "confirming side does not chain from the tail".to_string(),
                });
            }
            let Some(inception) = log.entries().first() else {
                return Err(KeywardError::StorageError {
                    reason: "recorded chain has no entries".to_string(),
                });
            };
            (entry, inception.public_key_hash)
        }
    };

    // Nonce sequencing: both sides consume one, so the stored value
    // must match the unconfirmed side exactly.
    let stored_nonce = state.chain_nonces.get(&anchor).copied().unwrap_or(0);
    if stored_nonce != bundle.nonce {
        return Err(KeywardError::NonceConflict {
            reason: format!(
                "identity {anchor} expects nonce {stored_nonce}, bundle carries {}",
                bundle.nonce
            ),
        });
    }

    // Residual value must land one hop ahead of the appended key.
    if entry.output_address != entry.prerotated_key_hash {
        return Err(KeywardError::LedgerRejected {
            reason: "output address must be the appended entry's prerotated commitment"
                .to_string(),
        });
    }

    // Both signatures, at their respective nonces.
    unconfirmed
        .verify_signature(bundle.asset, bundle.nonce)
        .map_err(|_| KeywardError::LedgerRejected {
            reason: "unconfirmed signature invalid".to_string(),
        })?;
    confirming
        .verify_signature(bundle.asset, bundle.nonce + 1)
        .map_err(|_| KeywardError::LedgerRejected {
            reason: "confirming signature invalid".to_string(),
        })?;

    // Funds for the native movement.
    let native_balance = state.balance(&AssetId::NATIVE, &signer);
    if native_balance < unconfirmed.amount {
        return Err(KeywardError::InsufficientBalance {
            reason: format!(
                "{signer} holds {native_balance} native, bundle moves {}",
                unconfirmed.amount
            ),
        });
    }

    // Permits: registered asset, live deadline, valid signature at the
    // owner's next nonce, sufficient balance. Planned nonces and
    // debits accumulate so several permits from one owner stay
    // consistent within the bundle.
    let now = Timestamp::now().unix_seconds().max(0) as u64;
    let mut planned_nonces: BTreeMap<(AssetId, Address), u64> = BTreeMap::new();
    let mut planned_debits: BTreeMap<(AssetId, Address), Amount> = BTreeMap::new();
    let mut permit_moves = Vec::with_capacity(unconfirmed.permits.len());

    for permit in &unconfirmed.permits {
        if permit.asset.is_native() {
            return Err(KeywardError::LedgerRejected {
                reason: "native asset cannot move by permit".to_string(),
            });
        }
        match state.assets.get(&permit.asset) {
            Some(true) => {}
            Some(false) => {
                return Err(KeywardError::LedgerRejected {
                    reason: format!("asset {} has no permit support", permit.asset),
                });
            }
            None => {
                return Err(KeywardError::LedgerRejected {
                    reason: format!("permit references unregistered asset {}", permit.asset),
                });
            }
        }
        if permit.deadline < now {
            return Err(KeywardError::LedgerRejected {
                reason: format!(
                    "permit for asset {} expired at {}",
                    permit.asset, permit.deadline
                ),
            });
        }

        let owner = permit.owner();
        let key = (permit.asset, owner);
        let nonce = planned_nonces
            .get(&key)
            .copied()
            .or_else(|| state.permit_nonces.get(&key).copied())
            .unwrap_or(0);
        permit.verify(spender, nonce).map_err(|_| {
            KeywardError::LedgerRejected {
                reason: format!("permit signature for asset {} invalid", permit.asset),
            }
        })?;
        planned_nonces.insert(key, nonce + 1);

        let debit = planned_debits.entry(key).or_insert(0);
        *debit = debit.saturating_add(permit.amount);
        let held = state.balance(&permit.asset, &owner);
        if held < *debit {
            return Err(KeywardError::InsufficientBalance {
                reason: format!(
                    "{owner} holds {held} of asset {}, permits move {debit}",
                    permit.asset
                ),
            });
        }

        permit_moves.push((permit.asset, owner, permit.recipient, permit.amount));
    }

    Ok(AcceptedSubmission {
        entry,
        chain,
        anchor,
        permit_moves,
        permit_nonces: planned_nonces.into_iter().collect(),
    })
}

// ---------------------------------------------------------------------------
// Adapter implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl LedgerAdapter for MemoryLedger {
    fn endpoint(&self) -> Address {
        Address::new(sha3_256(b"keyward-dev-ledger"))
    }

    async fn fetch_log(&self, address: &Address) -> Result<KeyEventLog> {
        let state = self.lock()?;
        Ok(match state.chain_index(address) {
            Some(index) => state.chains[index].clone(),
            None => KeyEventLog::new(),
        })
    }

    async fn submit_rotation(
        &self,
        bundle: &RotationBundle,
        transfer: &ValueTransfer,
    ) -> Result<TxReceipt> {
        let mut state = self.lock()?;
        let on_chain = !state.hold_confirmations;
        let accepted = check_submission(&state, bundle, transfer, self.endpoint(), on_chain)?;

        // All checks passed; apply every effect.
        let signer = bundle.unconfirmed.address();
        let amount = bundle.unconfirmed.amount;
        state.debit(AssetId::NATIVE, signer, amount);
        for recipient in &transfer.recipients {
            state.credit(AssetId::NATIVE, recipient.address, recipient.amount);
        }
        let remainder = amount.saturating_sub(transfer.total());
        state.credit(AssetId::NATIVE, accepted.entry.output_address, remainder);

        for (asset, owner, recipient, amount) in accepted.permit_moves {
            state.debit(asset, owner, amount);
            state.credit(asset, recipient, amount);
        }
        for (key, nonce) in accepted.permit_nonces {
            state.permit_nonces.insert(key, nonce);
        }

        let log_length = match accepted.chain {
            Some(index) => {
                state.chains[index].push(accepted.entry);
                state.chains[index].len()
            }
            None => {
                state.chains.push(KeyEventLog::from_entries(vec![accepted.entry]));
                1
            }
        };

        state.chain_nonces.insert(accepted.anchor, bundle.nonce + 2);
        state.tx_counter += 1;

        let mut preimage = Vec::with_capacity(24);
        preimage.extend_from_slice(b"keyward-memtx:");
        preimage.extend_from_slice(&state.tx_counter.to_be_bytes());
        let receipt = TxReceipt {
            tx_id: TxId::new(sha3_256(&preimage)),
            submitted_at: Timestamp::now(),
            log_length: log_length as u64,
        };

        self.persist(&state)?;
        tracing::debug!(
            signer = %signer,
            rotation = receipt.log_length - 1,
            "rotation accepted"
        );
        Ok(receipt)
    }

    async fn balance_of(&self, asset: &AssetId, address: &Address) -> Result<Amount> {
        Ok(self.lock()?.balance(asset, address))
    }

    async fn signing_nonce(&self, asset: &AssetId, address: &Address) -> Result<u64> {
        let state = self.lock()?;
        if asset.is_native() {
            let anchor = state
                .chain_index(address)
                .and_then(|i| state.chains[i].entries().first())
                .map(|e| e.public_key_hash);
            return Ok(match anchor {
                Some(anchor) => state.chain_nonces.get(&anchor).copied().unwrap_or(0),
                None => 0,
            });
        }
        match state.assets.get(asset) {
            Some(true) => Ok(state
                .permit_nonces
                .get(&(*asset, *address))
                .copied()
                .unwrap_or(0)),
            Some(false) => Err(KeywardError::PermitUnsupported {
                reason: format!("asset {asset} has no permit signing"),
            }),
            None => Err(KeywardError::PermitUnsupported {
                reason: format!("asset {asset} is not registered"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use keyward_crypto::signing::Keypair;
    use keyward_protocol::bundle::{build, BundleRequest};
    use keyward_protocol::permit::{collect_permits, AssetHandle};
    use keyward_types::CandidateKey;

    use super::*;
    use crate::adapter::Recipient;

    fn chain_keypairs(n: usize) -> Vec<Keypair> {
        (0..n)
            .map(|i| Keypair::from_seed(&[0x20 + i as u8; 32]))
            .collect()
    }

    fn claims_at(keys: &[Keypair], i: usize) -> CandidateKey {
        CandidateKey {
            address: keys[i].address(),
            prerotated_key_hash: keys[i + 1].address(),
            twice_prerotated_key_hash: keys[i + 2].address(),
            prev_public_key_hash: if i == 0 {
                None
            } else {
                Some(keys[i - 1].address())
            },
            rotation: i as u64,
        }
    }

    fn step_bundle(
        keys: &[Keypair],
        i: usize,
        value: Amount,
        nonce: u64,
        inception: bool,
        permits: Vec<keyward_protocol::Permit>,
    ) -> Result<RotationBundle> {
        let current_claims = claims_at(keys, i);
        let next_claims = claims_at(keys, i + 1);
        build(BundleRequest {
            current: &keys[i],
            current_claims: &current_claims,
            next: &keys[i + 1],
            next_claims: &next_claims,
            asset: AssetId::NATIVE,
            value,
            permits,
            nonce,
            inception,
        })
    }

    #[tokio::test]
    async fn founding_submission_creates_chain_and_moves_value() -> Result<()> {
        let keys = chain_keypairs(5);
        let ledger = MemoryLedger::new();
        ledger.mint(AssetId::NATIVE, keys[0].address(), 1000)?;

        let bundle = step_bundle(&keys, 0, 1000, 0, true, Vec::new())?;
        let receipt = ledger
            .submit_rotation(&bundle, &ValueTransfer::default())
            .await?;
        assert_eq!(receipt.log_length, 1);

        let log = ledger.fetch_log(&keys[0].address()).await?;
        assert_eq!(log.len(), 1);
        log.audit_chain()?;

        // Value sweeps one hop ahead of the founding key.
        assert_eq!(
            ledger.balance_of(&AssetId::NATIVE, &keys[0].address()).await?,
            0
        );
        assert_eq!(
            ledger.balance_of(&AssetId::NATIVE, &keys[1].address()).await?,
            1000
        );

        // The awaited successor resolves to the same chain.
        assert_eq!(ledger.fetch_log(&keys[1].address()).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn rotation_pays_recipients_and_sweeps_remainder() -> Result<()> {
        let keys = chain_keypairs(6);
        let ledger = MemoryLedger::new();
        ledger.mint(AssetId::NATIVE, keys[0].address(), 400)?;
        let founding = step_bundle(&keys, 0, 0, 0, true, Vec::new())?;
        ledger
            .submit_rotation(&founding, &ValueTransfer::default())
            .await?;

        let paid = Address::new([0xCC; 32]);
        let transfer = ValueTransfer {
            recipients: vec![Recipient {
                address: paid,
                amount: 150,
            }],
        };
        let bundle = step_bundle(&keys, 0, 400, 2, false, Vec::new())?;
        let receipt = ledger.submit_rotation(&bundle, &transfer).await?;
        assert_eq!(receipt.log_length, 2);

        assert_eq!(ledger.balance_of(&AssetId::NATIVE, &paid).await?, 150);
        // Remainder lands on the appended entry's prerotated commitment.
        assert_eq!(
            ledger.balance_of(&AssetId::NATIVE, &keys[2].address()).await?,
            250
        );
        ledger.fetch_log(&keys[0].address()).await?.audit_chain()?;
        Ok(())
    }

    #[tokio::test]
    async fn permits_move_tokens_and_advance_nonces() -> Result<()> {
        let keys = chain_keypairs(6);
        let token = AssetId::new([0x05; 32]);
        let ledger = MemoryLedger::new();
        ledger.register_asset(token, true)?;
        ledger.mint(AssetId::NATIVE, keys[0].address(), 100)?;
        ledger.mint(token, keys[0].address(), 500)?;
        let founding = step_bundle(&keys, 0, 0, 0, true, Vec::new())?;
        ledger
            .submit_rotation(&founding, &ValueTransfer::default())
            .await?;

        // Tokens follow the rotation to the output address.
        let output = keys[2].address();
        let handles = vec![AssetHandle {
            asset: token,
            balance: 500,
            permit_nonce: ledger.signing_nonce(&token, &keys[0].address()).await?,
            supports_permits: true,
        }];
        let batch = collect_permits(
            &handles,
            &keys[0],
            ledger.endpoint(),
            output,
            3600,
            &BTreeMap::new(),
        )?;
        let bundle = step_bundle(&keys, 0, 0, 2, false, batch.permits)?;
        ledger
            .submit_rotation(&bundle, &ValueTransfer::default())
            .await?;

        assert_eq!(ledger.balance_of(&token, &keys[0].address()).await?, 0);
        assert_eq!(ledger.balance_of(&token, &output).await?, 500);
        assert_eq!(
            ledger.signing_nonce(&token, &keys[0].address()).await?,
            1
        );
        Ok(())
    }

    #[tokio::test]
    async fn replayed_nonce_conflicts() -> Result<()> {
        let keys = chain_keypairs(5);
        let ledger = MemoryLedger::new();
        ledger.mint(AssetId::NATIVE, keys[0].address(), 100)?;

        let bundle = step_bundle(&keys, 0, 0, 0, true, Vec::new())?;
        ledger
            .submit_rotation(&bundle, &ValueTransfer::default())
            .await?;
        let replay = ledger
            .submit_rotation(&bundle, &ValueTransfer::default())
            .await;
        assert!(matches!(replay, Err(KeywardError::NonceConflict { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn superseded_tail_is_rejected() -> Result<()> {
        let keys = chain_keypairs(6);
        let ledger = MemoryLedger::new();
        ledger.mint(AssetId::NATIVE, keys[0].address(), 100)?;
        ledger
            .submit_rotation(&step_bundle(&keys, 0, 0, 0, true, Vec::new())?, &ValueTransfer::default())
            .await?;
        ledger
            .submit_rotation(&step_bundle(&keys, 0, 0, 2, false, Vec::new())?, &ValueTransfer::default())
            .await?;

        // keys[0] retired above; a further submission from it must fail
        // before the nonce is even considered.
        let stale = step_bundle(&keys, 0, 0, 4, false, Vec::new())?;
        let result = ledger
            .submit_rotation(&stale, &ValueTransfer::default())
            .await;
        assert!(matches!(result, Err(KeywardError::LedgerRejected { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn held_confirmations_leave_entries_pending() -> Result<()> {
        let keys = chain_keypairs(5);
        let ledger = MemoryLedger::new();
        ledger.mint(AssetId::NATIVE, keys[0].address(), 100)?;
        ledger.set_hold_confirmations(true)?;

        ledger
            .submit_rotation(&step_bundle(&keys, 0, 0, 0, true, Vec::new())?, &ValueTransfer::default())
            .await?;
        let log = ledger.fetch_log(&keys[0].address()).await?;
        assert!(log.has_pending());

        assert_eq!(ledger.advance_confirmations()?, 1);
        let log = ledger.fetch_log(&keys[0].address()).await?;
        assert!(!log.has_pending());
        Ok(())
    }

    #[tokio::test]
    async fn overdrawn_native_value_rejected() -> Result<()> {
        let keys = chain_keypairs(5);
        let ledger = MemoryLedger::new();
        ledger.mint(AssetId::NATIVE, keys[0].address(), 50)?;

        let bundle = step_bundle(&keys, 0, 51, 0, true, Vec::new())?;
        let result = ledger
            .submit_rotation(&bundle, &ValueTransfer::default())
            .await;
        assert!(matches!(
            result,
            Err(KeywardError::InsufficientBalance { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_identity_with_predecessor_rejected() -> Result<()> {
        let keys = chain_keypairs(6);
        let ledger = MemoryLedger::new();
        ledger.mint(AssetId::NATIVE, keys[1].address(), 100)?;

        // A mid-chain key presenting itself without its chain.
        let bundle = step_bundle(&keys, 1, 0, 0, false, Vec::new())?;
        let result = ledger
            .submit_rotation(&bundle, &ValueTransfer::default())
            .await;
        assert!(matches!(result, Err(KeywardError::LedgerRejected { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn nonce_queries_track_chain_and_permits() -> Result<()> {
        let keys = chain_keypairs(5);
        let token = AssetId::new([0x06; 32]);
        let plain = AssetId::new([0x07; 32]);
        let ledger = MemoryLedger::new();
        ledger.register_asset(token, true)?;
        ledger.register_asset(plain, false)?;
        ledger.mint(AssetId::NATIVE, keys[0].address(), 10)?;

        assert_eq!(
            ledger.signing_nonce(&AssetId::NATIVE, &keys[0].address()).await?,
            0
        );
        ledger
            .submit_rotation(&step_bundle(&keys, 0, 0, 0, true, Vec::new())?, &ValueTransfer::default())
            .await?;
        assert_eq!(
            ledger.signing_nonce(&AssetId::NATIVE, &keys[0].address()).await?,
            2
        );

        assert_eq!(ledger.signing_nonce(&token, &keys[0].address()).await?, 0);
        let no_permit = ledger.signing_nonce(&plain, &keys[0].address()).await;
        assert!(matches!(
            no_permit,
            Err(KeywardError::PermitUnsupported { .. })
        ));
        Ok(())
    }
}
