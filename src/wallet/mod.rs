pub mod api;
pub mod builder;
pub mod classifier;
pub mod facade;
pub mod submit;

pub use builder::{
    FinalizeTxProps, InitializeTxProps, InitializeTxResult, InputSelector, Selection,
    SelectionParams, SignDataProps, DEFAULT_TTL_SLOTS,
};
pub use classifier::{DefaultClassifier, SubmissionErrorClassifier};
pub use facade::{Wallet, WalletDependencies, WalletProps, WalletProviders};
pub use submit::{SubmissionCoordinator, SubmitTxOptions};

use thiserror::Error;

use crate::codec::CodecError;
use crate::discovery::KeyAgentError;
use crate::provider::ProviderError;
use crate::tracker::TrackerError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WalletError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("submission failed: {0}")]
    Submission(#[from] ProviderError),
    #[error("wallet is shut down")]
    Shutdown,
    #[error("submission task ended: {0}")]
    Interrupted(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    KeyAgent(#[from] KeyAgentError),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error("input selection failed: {0}")]
    InputSelection(String),
    #[error("not enough collateral: requested {requested}, available {available}")]
    InsufficientCollateral { requested: u64, available: u64 },
    #[error("collateral outputs must not carry assets")]
    CollateralWithAssets,
    #[error("address {0} does not belong to this wallet")]
    UnknownAddress(String),
}
