//! Integration tests for keyward-protocol.
//!
//! All tests use deterministic keypairs (fixed seeds) and fixed
//! nonces. A shared fixture derives one chain of successor keypairs
//! and builds claims and log entries from it, so every test walks the
//! same chain geometry.

use keyward_crypto::signing::Keypair;
use keyward_types::{Address, AssetId, CandidateKey, KeywardError, WalletStatus};

use keyward_protocol::bundle::{build, BundleRequest};
use keyward_protocol::continuity::{validate, validate_bootstrap, ValidationMode};
use keyward_protocol::log::KeyEventLog;
use keyward_protocol::status::resolve;
use keyward_protocol::wire;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Deterministic chain of successor keypairs, seed `[0x10 + i; 32]`.
fn chain_keypairs(n: usize) -> Vec<Keypair> {
    (0..n)
        .map(|i| Keypair::from_seed(&[0x10 + i as u8; 32]))
        .collect()
}

/// Claims for position `i` in the chain. Requires `keys[i + 2]`.
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

/// Builds the bundle for one rotation step: `keys[i]` is the tail key,
/// `keys[i + 1]` the successor. The founding submission (`inception`)
/// appends the tail key's own entry (`unconfirmed.log_entry(0, ..)`);
/// every later submission appends the successor's
/// (`confirming.log_entry(i + 1, ..)`).
fn step_bundle(
    keys: &[Keypair],
    i: usize,
    value: u128,
    nonce: u64,
    inception: bool,
) -> keyward_types::Result<keyward_protocol::RotationBundle> {
    let current_claims = claims_at(keys, i);
    let next_claims = claims_at(keys, i + 1);
    build(BundleRequest {
        current: &keys[i],
        current_claims: &current_claims,
        next: &keys[i + 1],
        next_claims: &next_claims,
        asset: AssetId::NATIVE,
        value,
        permits: Vec::new(),
        nonce,
        inception,
    })
}

// ---------------------------------------------------------------------------
// 1. Full rotation lifecycle
// ---------------------------------------------------------------------------

#[test]
fn inception_then_two_rotations_keeps_chain_intact() -> std::result::Result<(), KeywardError> {
    let keys = chain_keypairs(6);
    let mut log = KeyEventLog::new();

    // Fresh identity: nothing on ledger yet.
    let claims0 = claims_at(&keys, 0);
    assert_eq!(resolve(Some(&claims0), &log), WalletStatus::NoTransaction);
    validate(&claims0, &log, ValidationMode::Rotation)?;

    // Inception seeds the log with the founding key's own entry.
    let inception = step_bundle(&keys, 0, 1000, 0, true)?;
    assert_eq!(inception.unconfirmed.amount, 1000);
    log.push(inception.unconfirmed.log_entry(0, true));
    assert_eq!(log.len(), 1);
    assert_eq!(resolve(Some(&claims0), &log), WalletStatus::Active);

    // First rotation: the tail key signs, the successor's entry lands.
    let claims1 = claims_at(&keys, 1);
    validate(&claims1, &log, ValidationMode::Rotation)?;
    let first = step_bundle(&keys, 0, 0, 2, false)?;
    log.push(first.confirming.log_entry(1, true));
    assert_eq!(log.len(), 2);
    assert_eq!(resolve(Some(&claims1), &log), WalletStatus::Active);
    assert_eq!(resolve(Some(&claims0), &log), WalletStatus::Revoked);

    // Second rotation.
    let claims2 = claims_at(&keys, 2);
    validate(&claims2, &log, ValidationMode::Rotation)?;
    let second = step_bundle(&keys, 1, 0, 4, false)?;
    log.push(second.confirming.log_entry(2, true));
    assert_eq!(log.len(), 3);
    assert_eq!(resolve(Some(&claims2), &log), WalletStatus::Active);

    // A log built purely from builder outputs must audit clean.
    log.audit_chain()?;
    Ok(())
}

#[test]
fn appended_entries_output_to_their_own_prerotated_commitment(
) -> std::result::Result<(), KeywardError> {
    let keys = chain_keypairs(6);

    let inception = step_bundle(&keys, 0, 0, 0, true)?;
    let entry0 = inception.unconfirmed.log_entry(0, true);
    assert_eq!(entry0.output_address, entry0.prerotated_key_hash);

    let rotation = step_bundle(&keys, 0, 0, 2, false)?;
    let entry1 = rotation.confirming.log_entry(1, true);
    assert_eq!(entry1.output_address, entry1.prerotated_key_hash);
    Ok(())
}

// ---------------------------------------------------------------------------
// 2. Continuity scenarios
// ---------------------------------------------------------------------------

#[test]
fn successor_matching_tail_commitments_passes() -> std::result::Result<(), KeywardError> {
    let keys = chain_keypairs(5);
    let mut log = KeyEventLog::new();
    log.push(step_bundle(&keys, 0, 0, 0, true)?.unconfirmed.log_entry(0, true));

    validate(&claims_at(&keys, 1), &log, ValidationMode::Rotation)?;
    Ok(())
}

#[test]
fn successor_not_committed_by_tail_is_broken_chain() -> std::result::Result<(), KeywardError> {
    let keys = chain_keypairs(5);
    let mut log = KeyEventLog::new();
    log.push(step_bundle(&keys, 0, 0, 0, true)?.unconfirmed.log_entry(0, true));

    // An unrelated key claiming rotation 1.
    let stranger = Keypair::from_seed(&[0x77u8; 32]);
    let candidate = CandidateKey {
        address: stranger.address(),
        prerotated_key_hash: keys[2].address(),
        twice_prerotated_key_hash: keys[3].address(),
        prev_public_key_hash: Some(keys[0].address()),
        rotation: 1,
    };
    let result = validate(&candidate, &log, ValidationMode::Rotation);
    assert!(matches!(result, Err(KeywardError::BrokenChain { .. })));
    Ok(())
}

#[test]
fn transaction_flow_checks_against_key_in_hand() -> std::result::Result<(), KeywardError> {
    let keys = chain_keypairs(5);
    let log = KeyEventLog::new();
    let current = claims_at(&keys, 0);
    let scanned = claims_at(&keys, 1);

    validate(&scanned, &log, ValidationMode::TransactionFlow { current: &current })?;

    // A scan skipping one position must fail against the same key.
    let skipped = claims_at(&keys, 2);
    let result = validate(
        &skipped,
        &log,
        ValidationMode::TransactionFlow { current: &current },
    );
    assert!(matches!(result, Err(KeywardError::BrokenChain { .. })));
    Ok(())
}

#[test]
fn bootstrap_accepts_ordered_trio_rejects_reordered() -> std::result::Result<(), KeywardError> {
    let keys = chain_keypairs(5);
    let trio = [
        claims_at(&keys, 0),
        claims_at(&keys, 1),
        claims_at(&keys, 2),
    ];
    validate_bootstrap(&trio)?;

    let reordered = [trio[0].clone(), trio[2].clone(), trio[1].clone()];
    assert!(validate_bootstrap(&reordered).is_err());
    Ok(())
}

// ---------------------------------------------------------------------------
// 3. Stale keys
// ---------------------------------------------------------------------------

#[test]
fn superseded_keys_never_resolve_active() -> std::result::Result<(), KeywardError> {
    let keys = chain_keypairs(7);
    let mut log = KeyEventLog::new();
    log.push(step_bundle(&keys, 0, 0, 0, true)?.unconfirmed.log_entry(0, true));
    for i in 1..4 {
        let bundle = step_bundle(&keys, i - 1, 0, 2 * i as u64, false)?;
        log.push(bundle.confirming.log_entry(i as u64, true));
    }
    log.audit_chain()?;

    // Every non-tail position resolves Revoked, never Active.
    for i in 0..3 {
        let status = resolve(Some(&claims_at(&keys, i)), &log);
        assert_eq!(status, WalletStatus::Revoked, "position {i}");
    }
    assert_eq!(resolve(Some(&claims_at(&keys, 3)), &log), WalletStatus::Active);
    Ok(())
}

#[test]
fn matched_entry_with_diverged_commitments_is_invalid(
) -> std::result::Result<(), KeywardError> {
    let keys = chain_keypairs(6);
    let mut log = KeyEventLog::new();
    log.push(step_bundle(&keys, 0, 0, 0, true)?.unconfirmed.log_entry(0, true));
    log.push(step_bundle(&keys, 0, 0, 2, false)?.confirming.log_entry(1, true));

    // Same address as the confirmed inception entry, different
    // forward commitments: a fork, not a clean retirement.
    let mut forked = claims_at(&keys, 0);
    forked.prerotated_key_hash = Address::new([0xAB; 32]);
    assert_eq!(
        resolve(Some(&forked), &log),
        WalletStatus::InvalidContinuity
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// 4. Bundle properties
// ---------------------------------------------------------------------------

#[test]
fn confirming_side_signs_at_next_nonce_with_zero_value(
) -> std::result::Result<(), KeywardError> {
    let keys = chain_keypairs(5);
    let bundle = step_bundle(&keys, 1, 750, 8, false)?;

    assert_eq!(bundle.nonce, 8);
    assert_eq!(bundle.unconfirmed.amount, 750);
    assert_eq!(bundle.confirming.amount, 0);
    bundle.unconfirmed.verify_signature(bundle.asset, 8)?;
    bundle.confirming.verify_signature(bundle.asset, 9)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// 5. Wire interop
// ---------------------------------------------------------------------------

#[test]
fn scanned_wire_key_validates_and_builds() -> std::result::Result<(), KeywardError> {
    let keys = chain_keypairs(5);
    let mut log = KeyEventLog::new();
    log.push(step_bundle(&keys, 0, 0, 0, true)?.unconfirmed.log_entry(0, true));

    // The successor arrives over the wire, as a scan would deliver it.
    let next_claims = claims_at(&keys, 1);
    let encoded = wire::encode_wire(&keys[1], &next_claims)?;
    let scanned = wire::parse_wire(&encoded)?;

    assert_eq!(scanned.claims, next_claims);
    validate(&scanned.claims, &log, ValidationMode::Rotation)?;

    let current_claims = claims_at(&keys, 0);
    let bundle = build(BundleRequest {
        current: &keys[0],
        current_claims: &current_claims,
        next: &scanned.keypair,
        next_claims: &scanned.claims,
        asset: AssetId::NATIVE,
        value: 0,
        permits: Vec::new(),
        nonce: 2,
        inception: false,
    })?;
    assert_eq!(bundle.confirming.address(), keys[1].address());
    Ok(())
}

// ---------------------------------------------------------------------------
// 6. Status idempotence
// ---------------------------------------------------------------------------

#[test]
fn resolution_is_pure() -> std::result::Result<(), KeywardError> {
    let keys = chain_keypairs(5);
    let mut log = KeyEventLog::new();
    log.push(step_bundle(&keys, 0, 0, 0, true)?.unconfirmed.log_entry(0, true));
    let claims = claims_at(&keys, 0);

    let first = resolve(Some(&claims), &log);
    let second = resolve(Some(&claims), &log);
    assert_eq!(first, second);
    assert_eq!(resolve(None, &log), WalletStatus::NoKey);
    Ok(())
}
