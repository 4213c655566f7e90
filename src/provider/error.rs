use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Slot, TxIn};

/// Failure reason carried by every provider error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderFailure {
    NotFound,
    Unknown,
    InvalidResponse,
    NotImplemented,
    Unhealthy,
    ConnectionFailure,
    BadRequest,
    ServerUnavailable,
}

impl ProviderFailure {
    /// Transient failures are worth another attempt after a backoff
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ProviderFailure::Unknown
                | ProviderFailure::Unhealthy
                | ProviderFailure::ConnectionFailure
                | ProviderFailure::ServerUnavailable
        )
    }

    pub fn from_status(status: u16) -> Self {
        match status {
            400 => ProviderFailure::BadRequest,
            404 => ProviderFailure::NotFound,
            501 => ProviderFailure::NotImplemented,
            503 => ProviderFailure::ServerUnavailable,
            500..=599 => ProviderFailure::Unhealthy,
            _ => ProviderFailure::Unknown,
        }
    }
}

/// Ledger rejection reasons reported by the submit endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TxSubmissionError {
    #[error("value not conserved: consumed {consumed}, produced {produced}")]
    ValueNotConserved { consumed: u64, produced: u64 },
    #[error("unknown or incomplete withdrawals")]
    UnknownOrIncompleteWithdrawals,
    #[error("collateral errors: {detail}")]
    CollectErrors { detail: String },
    #[error("bad inputs: {inputs:?}")]
    BadInputs { inputs: Vec<TxIn> },
    #[error("outside of validity interval (current slot {current_slot:?})")]
    OutsideOfValidityInterval {
        current_slot: Option<Slot>,
        invalid_before: Option<Slot>,
        invalid_hereafter: Option<Slot>,
    },
    #[error("fee too small: {actual} < {required}")]
    FeeTooSmall { actual: u64, required: u64 },
    #[error("{message}")]
    Other { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{reason:?}: {detail}")]
pub struct ProviderError {
    pub reason: ProviderFailure,
    pub detail: String,
    #[serde(default)]
    pub inner: Option<TxSubmissionError>,
}

impl ProviderError {
    pub fn new(reason: ProviderFailure, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
            inner: None,
        }
    }

    /// Ledger rejection of a submitted transaction
    pub fn submission(inner: TxSubmissionError) -> Self {
        Self {
            reason: ProviderFailure::BadRequest,
            detail: inner.to_string(),
            inner: Some(inner),
        }
    }

    /// Only transport-level failures are retried; a ledger verdict is final
    pub fn is_retryable(&self) -> bool {
        self.inner.is_none() && self.reason.is_retryable()
    }
}
