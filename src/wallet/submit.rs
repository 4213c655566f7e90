use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::codec::{to_outgoing, TxCodec};
use crate::models::{FailedTx, OutgoingTx, Tip, TransactionFailure, TransactionId, TxInput};
use crate::provider::{ProviderError, ProviderFailure, SmartTxSubmitProvider};
use crate::tracker::{Resubmit, Shutdown, Subscription, TransactionsTracker};
use crate::utils::{format_tx_id, lock};
use crate::wallet::{SubmissionErrorClassifier, WalletError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitTxOptions {
    /// The ledger may already hold this transaction (a resubmission).
    /// Rejections caused by spent inputs then count as success.
    pub might_be_already_submitted: bool,
}

type Submission = Shared<BoxFuture<'static, Result<TransactionId, WalletError>>>;
type InFlightMap = Arc<Mutex<HashMap<TransactionId, Submission>>>;

/// Removes the map entry of a submission once it has settled
struct InFlightEntry {
    submissions: InFlightMap,
    id: TransactionId,
}

impl Drop for InFlightEntry {
    fn drop(&mut self) {
        lock(&self.submissions).remove(&self.id);
    }
}

struct Pipeline {
    provider: Arc<SmartTxSubmitProvider>,
    transactions: Arc<TransactionsTracker>,
    tip: Subscription<Tip>,
    classifier: Arc<dyn SubmissionErrorClassifier>,
}

impl Pipeline {
    async fn submitted_at(&self) -> u64 {
        // the tip only goes away on shutdown
        self.tip.clone().next().await.map_or(0, |tip| tip.slot)
    }

    async fn submit(&self, tx: OutgoingTx, options: SubmitTxOptions) -> Result<TransactionId, WalletError> {
        if !options.might_be_already_submitted && self.transactions.is_in_flight(&tx.id) {
            debug!("{} is already in flight, not submitting again", format_tx_id(&tx.id));
            return Ok(tx.id);
        }

        debug!("Submitting transaction {}", format_tx_id(&tx.id));
        self.transactions.submitting(tx.clone()).await;
        match self.provider.submit(&tx).await {
            Ok(()) => {
                let slot = self.submitted_at().await;
                debug!("Submitted transaction {} at slot {}", format_tx_id(&tx.id), slot);
                let id = tx.id.clone();
                self.transactions.pending(tx, slot).await;
                Ok(id)
            }
            Err(error)
                if options.might_be_already_submitted
                    && self.classifier.is_already_submitted(&error) =>
            {
                info!(
                    "{} rejected with '{}' but appears to be already submitted",
                    format_tx_id(&tx.id),
                    error
                );
                let slot = self.submitted_at().await;
                let id = tx.id.clone();
                self.transactions.pending(tx, slot).await;
                Ok(id)
            }
            Err(error) => {
                self.transactions
                    .failed_to_submit(FailedTx {
                        tx,
                        reason: TransactionFailure::FailedToSubmit,
                        error: Some(error.clone()),
                    })
                    .await;
                Err(WalletError::Submission(error))
            }
        }
    }
}

/// At most one submission per transaction id at any time. Concurrent
/// callers with the same id share the outcome of a single provider call.
pub struct SubmissionCoordinator {
    pipeline: Arc<Pipeline>,
    codec: Option<Arc<dyn TxCodec>>,
    submissions: InFlightMap,
    shut_down: AtomicBool,
}

impl SubmissionCoordinator {
    pub fn new(
        provider: Arc<SmartTxSubmitProvider>,
        transactions: Arc<TransactionsTracker>,
        tip: Subscription<Tip>,
        classifier: Arc<dyn SubmissionErrorClassifier>,
        codec: Option<Arc<dyn TxCodec>>,
    ) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                provider,
                transactions,
                tip,
                classifier,
            }),
            codec,
            submissions: Arc::new(Mutex::new(HashMap::new())),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn is_submitting(&self, id: &TransactionId) -> bool {
        lock(&self.submissions).contains_key(id)
    }

    pub async fn submit_tx(
        &self,
        input: impl Into<TxInput>,
        options: SubmitTxOptions,
    ) -> Result<TransactionId, WalletError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(WalletError::Shutdown);
        }
        let tx = to_outgoing(input.into(), self.codec.as_deref())?;

        let submission = {
            let mut submissions = lock(&self.submissions);
            match submissions.get(&tx.id) {
                Some(existing) => {
                    debug!("{} is being submitted, joining", format_tx_id(&tx.id));
                    existing.clone()
                }
                None => {
                    let id = tx.id.clone();
                    let entry = InFlightEntry {
                        submissions: self.submissions.clone(),
                        id: id.clone(),
                    };
                    let pipeline = self.pipeline.clone();
                    // runs to completion even when every caller goes away
                    let task = tokio::spawn(async move {
                        let _entry = entry;
                        pipeline.submit(tx, options).await
                    });
                    let submission = async move {
                        task.await
                            .unwrap_or_else(|e| Err(WalletError::Interrupted(e.to_string())))
                    }
                    .boxed()
                    .shared();
                    submissions.insert(id, submission.clone());
                    submission
                }
            }
        };
        submission.await
    }
}

#[async_trait]
impl Resubmit for SubmissionCoordinator {
    async fn resubmit(&self, tx: OutgoingTx) -> Result<TransactionId, ProviderError> {
        let options = SubmitTxOptions {
            might_be_already_submitted: true,
        };
        self.submit_tx(tx, options).await.map_err(|e| match e {
            WalletError::Submission(error) => error,
            other => ProviderError::new(ProviderFailure::Unknown, other.to_string()),
        })
    }
}

impl Shutdown for SubmissionCoordinator {
    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}
