//! The capability interface every ledger back-end implements.
//!
//! Chains differ in how a rotation lands (contract call, UTXO
//! covenant, REST submission) but the core only ever needs four
//! operations plus the endpoint address permits are signed over to.
//! Adapters translate ledger-native records into canonical
//! [`KeyLogEntry`](keyward_types::KeyLogEntry) values before the core
//! sees them.

use async_trait::async_trait;
use keyward_protocol::{KeyEventLog, RotationBundle};
use keyward_types::{Address, Amount, AssetId, Result, Timestamp, TxId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Value movement
// ---------------------------------------------------------------------------

/// One third-party payment carried by a rotation submission.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    /// Who gets paid.
    pub address: Address,
    /// Native amount to pay.
    pub amount: Amount,
}

/// Native value movement accompanying a rotation bundle.
///
/// The debit itself is the signature-bound `unconfirmed.amount`:
/// recipients are paid from it and the remainder lands on the bundle's
/// output address. This struct only names who gets paid along the way.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValueTransfer {
    /// Third-party payments, drawn from the retiring key's balance.
    pub recipients: Vec<Recipient>,
}

impl ValueTransfer {
    /// Sum of all recipient amounts.
    pub fn total(&self) -> Amount {
        self.recipients.iter().map(|r| r.amount).sum()
    }
}

// ---------------------------------------------------------------------------
// TxReceipt
// ---------------------------------------------------------------------------

/// Ledger acknowledgement of an accepted rotation submission.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxReceipt {
    /// Ledger-assigned transaction identifier.
    pub tx_id: TxId,
    /// When the ledger accepted the submission.
    pub submitted_at: Timestamp,
    /// Log length after the submission, pending entries included.
    pub log_length: u64,
}

// ---------------------------------------------------------------------------
// LedgerAdapter
// ---------------------------------------------------------------------------

/// Capability interface to one ledger back-end.
#[async_trait]
pub trait LedgerAdapter: Send + Sync {
    /// The address permits authorize as spender: whatever contract or
    /// service executes transfers on this ledger.
    fn endpoint(&self) -> Address;

    /// Fetches the key event log for the chain the given address
    /// belongs to, either as a recorded key or as the tail's awaited
    /// successor. An unknown address yields an empty log.
    async fn fetch_log(&self, address: &Address) -> Result<KeyEventLog>;

    /// Submits a rotation bundle and its accompanying value movement
    /// as one atomic unit: both sides land, with all balance effects,
    /// or nothing does.
    async fn submit_rotation(
        &self,
        bundle: &RotationBundle,
        transfer: &ValueTransfer,
    ) -> Result<TxReceipt>;

    /// The holder's balance in the given asset.
    async fn balance_of(&self, asset: &AssetId, address: &Address) -> Result<Amount>;

    /// The holder's next signing nonce: the identity's
    /// rotation-sequence nonce for the native asset, the per-token
    /// permit nonce for any other.
    ///
    /// # Errors
    ///
    /// Returns [`KeywardError::PermitUnsupported`]
    /// (`keyward_types::KeywardError`) for assets without permit
    /// signing; callers use this to detect capability.
    async fn signing_nonce(&self, asset: &AssetId, address: &Address) -> Result<u64>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_total_sums_recipients() {
        let transfer = ValueTransfer {
            recipients: vec![
                Recipient {
                    address: Address::new([0x01; 32]),
                    amount: 300,
                },
                Recipient {
                    address: Address::new([0x02; 32]),
                    amount: 450,
                },
            ],
        };
        assert_eq!(transfer.total(), 750);
        assert_eq!(ValueTransfer::default().total(), 0);
    }
}
