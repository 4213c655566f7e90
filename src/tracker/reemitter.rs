use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::models::{
    FailedTx, GenesisParameters, OutgoingTx, Slot, Tip, TransactionFailure, TransactionId,
    TxInFlight,
};
use crate::provider::ProviderError;
use crate::tracker::{
    EventChannel, EventStream, Shutdown, Subscription, TaskGroup, TransactionsTracker,
};
use crate::utils::{format_tx_id, lock};

/// How many poll intervals an unconfirmed transaction may take before it
/// counts as lost
pub const LOSS_MULTIPLIER: f64 = 2.5;

/// Resubmission entry point; implemented by the submission coordinator
#[async_trait]
pub trait Resubmit: Send + Sync {
    async fn resubmit(&self, tx: OutgoingTx) -> Result<TransactionId, ProviderError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct LostTx {
    pub tx: OutgoingTx,
    pub submitted_at: Slot,
    pub tip_slot: Slot,
}

/// Loss threshold in slots for the given poll interval
pub fn loss_threshold(max_interval: Duration, slot_length: Duration) -> u64 {
    let slot_secs = slot_length.as_secs_f64();
    if slot_secs <= 0.0 {
        return u64::MAX;
    }
    (max_interval.as_secs_f64() * LOSS_MULTIPLIER / slot_secs).ceil() as u64
}

/// In-flight transactions submitted more than `threshold` slots before
/// `tip_slot` that are still not in confirmed history
pub fn find_lost(
    in_flight: &[TxInFlight],
    confirmed: &HashSet<TransactionId>,
    tip_slot: Slot,
    threshold: u64,
) -> Vec<LostTx> {
    in_flight
        .iter()
        .filter(|entry| !confirmed.contains(&entry.tx.id))
        .filter_map(|entry| {
            let submitted_at = entry.submitted_at?;
            (tip_slot.saturating_sub(submitted_at) > threshold).then(|| LostTx {
                tx: entry.tx.clone(),
                submitted_at,
                tip_slot,
            })
        })
        .collect()
}

/// In-flight transactions whose validity interval ended before `tip_slot`
pub fn find_expired(in_flight: &[TxInFlight], tip_slot: Slot) -> Vec<OutgoingTx> {
    in_flight
        .iter()
        .filter(|entry| {
            entry
                .tx
                .body
                .validity_interval
                .invalid_hereafter
                .is_some_and(|deadline| deadline < tip_slot)
        })
        .map(|entry| entry.tx.clone())
        .collect()
}

/// Watches in-flight transactions and resubmits the ones that look lost
pub struct Reemitter {
    lost: EventChannel<LostTx>,
    reemitted: Mutex<HashSet<(TransactionId, Option<Slot>)>>,
    tasks: TaskGroup,
}

impl Reemitter {
    pub fn new() -> Self {
        Self {
            lost: EventChannel::new("reemitter"),
            reemitted: Mutex::new(HashSet::new()),
            tasks: TaskGroup::new("reemitter"),
        }
    }

    /// Transactions presumed lost, as they are found
    pub fn lost(&self) -> EventStream<LostTx> {
        self.lost.subscribe()
    }

    /// First attempt for this (tx, submission) pair?
    fn claim(&self, id: &TransactionId, submitted_at: Option<Slot>) -> bool {
        lock(&self.reemitted).insert((id.clone(), submitted_at))
    }

    /// Forget pairs that no longer match an in-flight entry
    fn prune(&self, in_flight: &[TxInFlight]) {
        let current: HashSet<(&TransactionId, Option<Slot>)> = in_flight
            .iter()
            .map(|entry| (&entry.tx.id, entry.submitted_at))
            .collect();
        lock(&self.reemitted).retain(|(id, slot)| current.contains(&(id, *slot)));
    }

    fn resubmit(&self, resubmit: &Arc<dyn Resubmit>, tx: OutgoingTx) {
        let resubmit = resubmit.clone();
        self.tasks.spawn(async move {
            let id = tx.id.clone();
            match resubmit.resubmit(tx).await {
                Ok(_) => debug!("Resubmitted {}", format_tx_id(&id)),
                Err(e) => error!("Failed to resubmit {}: {}", format_tx_id(&id), e),
            }
        });
    }

    /// Scans on every tip. Entries restored without a submission slot were
    /// interrupted mid-submission and are resubmitted once at startup.
    pub fn start(
        self: &Arc<Self>,
        transactions: Arc<TransactionsTracker>,
        mut tip: Subscription<Tip>,
        mut genesis: Subscription<GenesisParameters>,
        max_interval: Duration,
        resubmit: Arc<dyn Resubmit>,
    ) {
        let reemitter = self.clone();
        self.tasks.spawn(async move {
            for entry in transactions.in_flight() {
                if entry.submitted_at.is_none() && reemitter.claim(&entry.tx.id, None) {
                    info!("Resubmitting interrupted {}", format_tx_id(&entry.tx.id));
                    reemitter.resubmit(&resubmit, entry.tx);
                }
            }

            let Some(parameters) = genesis.next().await else {
                return;
            };
            let mut threshold = loss_threshold(max_interval, parameters.slot_length);

            while let Some(tip) = tip.next().await {
                if let Some(parameters) = genesis.has_changed().then(|| genesis.latest()).flatten() {
                    genesis.mark_seen();
                    threshold = loss_threshold(max_interval, parameters.slot_length);
                }
                let in_flight = transactions.in_flight();
                reemitter.prune(&in_flight);

                for tx in find_expired(&in_flight, tip.slot) {
                    warn!("{} expired at slot {}", format_tx_id(&tx.id), tip.slot);
                    transactions
                        .failed(FailedTx {
                            tx,
                            reason: TransactionFailure::Timeout,
                            error: None,
                        })
                        .await;
                }

                let confirmed: HashSet<TransactionId> =
                    transactions.history().into_iter().map(|tx| tx.id).collect();
                for lost in find_lost(&in_flight, &confirmed, tip.slot, threshold) {
                    if lost.tx.body.validity_interval.invalid_hereafter.is_some_and(|d| d < tip.slot) {
                        continue;
                    }
                    if !reemitter.claim(&lost.tx.id, Some(lost.submitted_at)) {
                        continue;
                    }
                    warn!(
                        "{} submitted at slot {} not confirmed by slot {}, resubmitting",
                        format_tx_id(&lost.tx.id),
                        lost.submitted_at,
                        lost.tip_slot
                    );
                    reemitter.lost.emit(lost.clone());
                    reemitter.resubmit(&resubmit, lost.tx);
                }
            }
        });
    }
}

impl Default for Reemitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown for Reemitter {
    fn shutdown(&self) {
        self.tasks.stop();
        self.lost.complete();
    }
}
