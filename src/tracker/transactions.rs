use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::models::{
    Address, FailedTx, GroupedAddress, HydratedTx, OutgoingTx, Slot, Tip, TransactionId,
    TxInFlight,
};
use crate::provider::{ChainHistoryProvider, ConnectionStatus};
use crate::store::Store;
use crate::tracker::{
    AnyOf, ColdProvider, EventChannel, EventStream, FatalError, PersistentDocumentTracker,
    RetryBackoffConfig, Shutdown, Subscription, TaskGroup,
};
use crate::utils::{format_tx_id, lock};

/// Lifecycle of an outgoing transaction
#[derive(Debug, Clone, PartialEq)]
pub enum TxEvent {
    Submitting(OutgoingTx),
    Pending { tx: OutgoingTx, submitted_at: Slot },
    FailedToSubmit(FailedTx),
    /// Dropped for a reason other than submission, e.g. an expired validity interval
    Failed(FailedTx),
    Confirmed(OutgoingTx),
}

/// Merges a history fetch into the current history. With `since` set, the
/// fetch covered blocks from `since` on; older entries are kept as they are.
fn merge_history(current: Vec<HydratedTx>, fetched: Vec<HydratedTx>, since: Option<u64>) -> Vec<HydratedTx> {
    let mut merged: Vec<HydratedTx> = match since {
        Some(since) => current.into_iter().filter(|tx| tx.block_no < since).collect(),
        None => Vec::new(),
    };
    let mut seen: HashSet<TransactionId> = merged.iter().map(|tx| tx.id.clone()).collect();
    for tx in fetched {
        if seen.insert(tx.id.clone()) {
            merged.push(tx);
        }
    }
    merged.sort_by_key(|tx| (tx.block_no, tx.slot));
    merged
}

/// Confirmed history plus the wallet's own in-flight transactions
pub struct TransactionsTracker {
    history: Arc<PersistentDocumentTracker<Vec<HydratedTx>>>,
    in_flight: Arc<PersistentDocumentTracker<Vec<TxInFlight>>>,
    events: EventChannel<TxEvent>,
    tasks: TaskGroup,
}

impl TransactionsTracker {
    pub async fn new(history: Store<Vec<HydratedTx>>, in_flight: Store<Vec<TxInFlight>>) -> Self {
        Self {
            history: Arc::new(PersistentDocumentTracker::load("transactions", history).await),
            in_flight: Arc::new(PersistentDocumentTracker::load("in-flight", in_flight).await),
            events: EventChannel::new("transactions"),
            tasks: TaskGroup::new("transactions"),
        }
    }

    pub fn history(&self) -> Vec<HydratedTx> {
        self.history.value().unwrap_or_default()
    }

    pub fn subscribe_history(&self) -> Subscription<Vec<HydratedTx>> {
        self.history.subscribe()
    }

    pub fn in_flight(&self) -> Vec<TxInFlight> {
        self.in_flight.value().unwrap_or_default()
    }

    pub fn subscribe_in_flight(&self) -> Subscription<Vec<TxInFlight>> {
        self.in_flight.subscribe()
    }

    pub fn events(&self) -> EventStream<TxEvent> {
        self.events.subscribe()
    }

    pub fn is_in_flight(&self, id: &TransactionId) -> bool {
        self.in_flight().iter().any(|entry| &entry.tx.id == id)
    }

    pub fn is_confirmed(&self, id: &TransactionId) -> bool {
        self.history().iter().any(|tx| &tx.id == id)
    }

    /// About to hand `tx` to the submit provider
    pub async fn submitting(&self, tx: OutgoingTx) {
        self.events.emit(TxEvent::Submitting(tx.clone()));
        self.in_flight
            .update(|current| {
                let mut entries = current.unwrap_or_default();
                if !entries.iter().any(|entry| entry.tx.id == tx.id) {
                    entries.push(TxInFlight {
                        tx,
                        submitted_at: None,
                    });
                }
                entries
            })
            .await;
    }

    /// Accepted by the provider at tip `submitted_at`
    pub async fn pending(&self, tx: OutgoingTx, submitted_at: Slot) {
        debug!("{} pending since slot {}", format_tx_id(&tx.id), submitted_at);
        self.events.emit(TxEvent::Pending {
            tx: tx.clone(),
            submitted_at,
        });
        self.in_flight
            .update(|current| {
                let mut entries = current.unwrap_or_default();
                match entries.iter_mut().find(|entry| entry.tx.id == tx.id) {
                    Some(entry) => entry.submitted_at = Some(submitted_at),
                    None => entries.push(TxInFlight {
                        tx,
                        submitted_at: Some(submitted_at),
                    }),
                }
                entries
            })
            .await;
    }

    pub async fn failed_to_submit(&self, failed: FailedTx) {
        warn!("{} failed to submit: {:?}", format_tx_id(&failed.tx.id), failed.error);
        self.remove_in_flight(&failed.tx.id).await;
        self.events.emit(TxEvent::FailedToSubmit(failed));
    }

    pub async fn failed(&self, failed: FailedTx) {
        warn!("{} failed: {:?}", format_tx_id(&failed.tx.id), failed.reason);
        self.remove_in_flight(&failed.tx.id).await;
        self.events.emit(TxEvent::Failed(failed));
    }

    async fn remove_in_flight(&self, id: &TransactionId) {
        self.in_flight
            .update(|current| {
                let mut entries = current.unwrap_or_default();
                entries.retain(|entry| &entry.tx.id != id);
                entries
            })
            .await;
    }

    /// Stores a fetched history and settles the in-flight entries it confirms
    pub async fn apply_history(&self, history: Vec<HydratedTx>) {
        let confirmed_ids: HashSet<TransactionId> = history.iter().map(|tx| tx.id.clone()).collect();
        self.history.accept(history).await;

        let mut confirmed = Vec::new();
        self.in_flight
            .update(|current| {
                let mut entries = current.unwrap_or_default();
                entries.retain(|entry| {
                    if confirmed_ids.contains(&entry.tx.id) {
                        confirmed.push(entry.tx.clone());
                        false
                    } else {
                        true
                    }
                });
                entries
            })
            .await;
        for tx in confirmed {
            info!("{} confirmed", format_tx_id(&tx.id));
            self.events.emit(TxEvent::Confirmed(tx));
        }
    }

    /// Fetches history whenever the addresses or the tip change
    pub fn start(
        self: &Arc<Self>,
        provider: Arc<dyn ChainHistoryProvider>,
        mut addresses: Subscription<Vec<GroupedAddress>>,
        mut tip: Subscription<Tip>,
        connection: Subscription<ConnectionStatus>,
        retry: RetryBackoffConfig,
        fatal: Arc<EventChannel<FatalError>>,
    ) {
        let history = self.history.clone();
        let synced_for: Arc<Mutex<Vec<Address>>> = Arc::new(Mutex::new(Vec::new()));
        let current_addresses = addresses.clone();
        let fetcher: ColdProvider<Vec<HydratedTx>> =
            ColdProvider::new("transactions", retry, connection, move || {
                let provider = provider.clone();
                let synced_for = synced_for.clone();
                let addresses: Vec<Address> = current_addresses
                    .latest()
                    .unwrap_or_default()
                    .into_iter()
                    .map(|a| a.address)
                    .collect();
                let current = history.value().unwrap_or_default();
                // a changed address set needs a full fetch
                let since = if *lock(&synced_for) == addresses {
                    current.last().map(|tx| tx.block_no)
                } else {
                    None
                };
                async move {
                    let fetched = provider.transactions_by_addresses(&addresses, since).await?;
                    *lock(&synced_for) = addresses;
                    Ok(merge_history(current, fetched, since))
                }
            });

        let tracker = self.clone();
        let mut ready = addresses.clone();
        self.tasks.spawn(async move {
            if ready.wait_for(|a| !a.is_empty()).await.is_none() {
                return;
            }
            addresses.mark_seen();
            tip.mark_seen();
            fetcher
                .run(AnyOf(addresses, tip), fatal, move |history| {
                    let tracker = tracker.clone();
                    async move { tracker.apply_history(history).await }
                })
                .await;
        });
    }
}

impl Shutdown for TransactionsTracker {
    fn shutdown(&self) {
        self.tasks.stop();
        self.history.complete();
        self.in_flight.complete();
        self.events.complete();
    }
}
