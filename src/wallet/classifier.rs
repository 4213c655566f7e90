use crate::provider::{ProviderError, TxSubmissionError};

/// Decides whether a failed resubmission means the ledger already has the
/// transaction. The ledger's error taxonomy changes between protocol
/// versions, so implementations carry a version.
pub trait SubmissionErrorClassifier: Send + Sync {
    fn version(&self) -> u32;

    fn is_already_submitted(&self, error: &ProviderError) -> bool;
}

/// Rejections that all point at inputs which are already spent
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl SubmissionErrorClassifier for DefaultClassifier {
    fn version(&self) -> u32 {
        1
    }

    fn is_already_submitted(&self, error: &ProviderError) -> bool {
        matches!(
            error.inner,
            Some(
                TxSubmissionError::ValueNotConserved { .. }
                    | TxSubmissionError::UnknownOrIncompleteWithdrawals
                    | TxSubmissionError::CollectErrors { .. }
                    | TxSubmissionError::BadInputs { .. }
            )
        )
    }
}
