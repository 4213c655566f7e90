use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

use crate::models::{OutgoingTx, Tip, ValidityInterval};
use crate::provider::{
    ConnectionStatus, ProviderError, ProviderFailure, ProviderResult, TxSubmissionError,
    TxSubmitProvider,
};
use crate::tracker::{ColdProvider, RetryBackoffConfig, RetryError, Subscription};
use crate::utils::format_tx_id;

/// Submit provider that holds transactions back until they can be valid,
/// refuses ones that can no longer be, and retries transport failures
pub struct SmartTxSubmitProvider {
    inner: Arc<dyn TxSubmitProvider>,
    tip: Subscription<Tip>,
    connection: Subscription<ConnectionStatus>,
    retry: RetryBackoffConfig,
}

impl SmartTxSubmitProvider {
    pub fn new(
        inner: Arc<dyn TxSubmitProvider>,
        tip: Subscription<Tip>,
        connection: Subscription<ConnectionStatus>,
        retry: RetryBackoffConfig,
    ) -> Self {
        Self {
            inner,
            tip,
            connection,
            retry,
        }
    }

    /// Submits `tx` once the tip is inside its validity interval
    pub async fn submit(&self, tx: &OutgoingTx) -> ProviderResult<()> {
        let interval = &tx.body.validity_interval;
        let mut tip = self.tip.clone();
        let current = tip
            .wait_for(|tip| interval.invalid_before.map_or(true, |start| tip.slot >= start))
            .await
            .ok_or_else(|| ProviderError::new(ProviderFailure::Unknown, "tip tracker shut down"))?;
        if let Some(error) = outside_of_validity(interval, current.slot) {
            return Err(error);
        }

        debug!("Submitting {} at slot {}", format_tx_id(&tx.id), current.slot);
        self.submit_with_retry(tx.wire_bytes.clone(), tx.context.clone())
            .await
    }

    async fn submit_with_retry(
        &self,
        wire_bytes: Vec<u8>,
        context: Option<serde_json::Value>,
    ) -> ProviderResult<()> {
        let inner = self.inner.clone();
        let wire_bytes = Arc::new(wire_bytes);
        let context = Arc::new(context);
        let mut submission: ColdProvider<()> = ColdProvider::new(
            "tx-submit",
            self.retry.clone(),
            self.connection.clone(),
            move || {
                let inner = inner.clone();
                let wire_bytes = wire_bytes.clone();
                let context = context.clone();
                async move { inner.submit_tx(&wire_bytes, (*context).as_ref()).await }
            },
        );
        submission.fetch().await.map_err(|e| match e {
            RetryError::Cancelled => {
                ProviderError::new(ProviderFailure::ConnectionFailure, "submission cancelled")
            }
            other => other.into_inner().unwrap_or_else(|| {
                ProviderError::new(ProviderFailure::Unknown, "submission failed")
            }),
        })
    }
}

fn outside_of_validity(interval: &ValidityInterval, slot: u64) -> Option<ProviderError> {
    let expired = interval.invalid_hereafter.is_some_and(|end| slot > end);
    expired.then(|| {
        ProviderError::submission(TxSubmissionError::OutsideOfValidityInterval {
            current_slot: Some(slot),
            invalid_before: interval.invalid_before,
            invalid_hereafter: interval.invalid_hereafter,
        })
    })
}

#[async_trait]
impl TxSubmitProvider for SmartTxSubmitProvider {
    async fn submit_tx(
        &self,
        wire_bytes: &[u8],
        context: Option<&serde_json::Value>,
    ) -> ProviderResult<()> {
        self.submit_with_retry(wire_bytes.to_vec(), context.cloned())
            .await
    }
}
