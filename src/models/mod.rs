pub mod address;
pub mod asset;
pub mod certificate;
pub mod chain;
pub mod delegation;
pub mod ids;
pub mod params;
pub mod transaction;
pub mod value;

pub use address::{AddressType, GroupedAddress, KeyPath, KeyRole};
pub use asset::{AssetInfo, TokenMetadata};
pub use certificate::{Certificate, CertificateKind, MirPot};
pub use chain::{BlockNo, EpochInfo, EraParameters, EraStart, EraSummary, Slot, SyncStatus, Tip};
pub use delegation::{Balance, RewardAccountInfo, StakeKeyStatus, UtxoBalance};
pub use ids::{Address, AssetId, PoolId, RewardAccount, TransactionId};
pub use params::{GenesisParameters, ProtocolParameters};
pub use transaction::{
    DataSignature, FailedTx, HydratedTx, OutgoingTx, SignedTx, TransactionFailure, Tx, TxBody,
    TxInFlight, TxInput, ValidityInterval, Withdrawal, Witness,
};
pub use value::{TxIn, TxOut, Utxo, Value};
