use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::certificate::Certificate;
use crate::models::chain::{BlockNo, Slot};
use crate::models::ids::{RewardAccount, TransactionId};
use crate::models::value::{TxIn, TxOut};
use crate::provider::ProviderError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityInterval {
    pub invalid_before: Option<Slot>,
    pub invalid_hereafter: Option<Slot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub stake_address: RewardAccount,
    pub quantity: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxBody {
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub fee: u64,
    #[serde(default)]
    pub validity_interval: ValidityInterval,
    #[serde(default)]
    pub certificates: Vec<Certificate>,
    #[serde(default)]
    pub withdrawals: Vec<Withdrawal>,
}

/// Verification key (hex) to signature (hex)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    pub signatures: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    pub id: TransactionId,
    pub body: TxBody,
    pub witness: Witness,
}

/// Confirmed transaction as reported by chain history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HydratedTx {
    pub id: TransactionId,
    pub block_no: BlockNo,
    pub slot: Slot,
    pub body: TxBody,
}

/// Output of `finalize_tx`: the signed transaction and its wire encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTx {
    pub tx: Tx,
    pub wire_bytes: Vec<u8>,
    pub context: Option<serde_json::Value>,
}

/// A transaction on its way to the network. The id is derived once, when
/// the record is built, and travels with it from then on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingTx {
    pub id: TransactionId,
    pub body: TxBody,
    pub wire_bytes: Vec<u8>,
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionFailure {
    FailedToSubmit,
    /// Validity interval ended before the transaction was seen on chain
    Timeout,
    InvalidTransaction,
}

/// Terminal record of an outgoing transaction that will not make it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedTx {
    pub tx: OutgoingTx,
    pub reason: TransactionFailure,
    pub error: Option<ProviderError>,
}

/// In-flight entry; `submitted_at` is the tip slot observed when the
/// provider accepted the transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInFlight {
    pub tx: OutgoingTx,
    pub submitted_at: Option<Slot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSignature {
    pub key: String,
    pub signature: String,
}

/// Everything `submit_tx` accepts
#[derive(Debug, Clone)]
pub enum TxInput {
    WireBytes(Vec<u8>),
    Tx(Tx),
    Signed(SignedTx),
    /// Resubmission of a record the wallet already built
    Outgoing(OutgoingTx),
}

impl From<Vec<u8>> for TxInput {
    fn from(bytes: Vec<u8>) -> Self {
        TxInput::WireBytes(bytes)
    }
}

impl From<Tx> for TxInput {
    fn from(tx: Tx) -> Self {
        TxInput::Tx(tx)
    }
}

impl From<SignedTx> for TxInput {
    fn from(signed: SignedTx) -> Self {
        TxInput::Signed(signed)
    }
}

impl From<OutgoingTx> for TxInput {
    fn from(tx: OutgoingTx) -> Self {
        TxInput::Outgoing(tx)
    }
}
