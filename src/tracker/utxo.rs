use std::collections::HashSet;
use std::sync::Arc;

use crate::models::{Address, GroupedAddress, Tip, TxIn, TxInFlight, Utxo, Value};
use crate::provider::{ConnectionStatus, UtxoProvider};
use crate::store::Store;
use crate::tracker::{
    AnyOf, ColdProvider, EventChannel, FatalError, PersistentDocumentTracker, RetryBackoffConfig,
    Shutdown, Subscription, TaskGroup, TrackerError, TrackerSubject,
};

/// Splits `total` into (available, unspendable). Outputs spent by an
/// in-flight transaction are in neither.
pub fn partition_utxo(
    total: &[Utxo],
    unspendable: &[Utxo],
    in_flight: &[TxInFlight],
) -> (Vec<Utxo>, Vec<Utxo>) {
    let spent: HashSet<&TxIn> = in_flight
        .iter()
        .flat_map(|entry| entry.tx.body.inputs.iter())
        .collect();
    let locked: HashSet<&TxIn> = unspendable.iter().map(|utxo| &utxo.input).collect();

    let mut available = Vec::new();
    let mut held = Vec::new();
    for utxo in total {
        if spent.contains(&utxo.input) {
            continue;
        }
        if locked.contains(&utxo.input) {
            held.push(utxo.clone());
        } else {
            available.push(utxo.clone());
        }
    }
    (available, held)
}

pub fn utxo_value(utxo: &[Utxo]) -> Value {
    Value::sum(utxo.iter().map(|u| &u.output.value))
}

/// Unspent outputs of the wallet addresses
pub struct UtxoTracker {
    total: Arc<PersistentDocumentTracker<Vec<Utxo>>>,
    unspendable_set: Arc<PersistentDocumentTracker<Vec<Utxo>>>,
    available: TrackerSubject<Vec<Utxo>>,
    unspendable: TrackerSubject<Vec<Utxo>>,
    tasks: TaskGroup,
}

impl UtxoTracker {
    pub async fn new(total: Store<Vec<Utxo>>, unspendable: Store<Vec<Utxo>>) -> Self {
        Self {
            total: Arc::new(PersistentDocumentTracker::load("utxo", total).await),
            unspendable_set: Arc::new(PersistentDocumentTracker::load("unspendable-utxo", unspendable).await),
            available: TrackerSubject::new(),
            unspendable: TrackerSubject::new(),
            tasks: TaskGroup::new("utxo"),
        }
    }

    pub fn total(&self) -> Vec<Utxo> {
        self.total.value().unwrap_or_default()
    }

    pub fn available(&self) -> Vec<Utxo> {
        self.available.value().unwrap_or_default()
    }

    pub fn unspendable(&self) -> Vec<Utxo> {
        self.unspendable.value().unwrap_or_default()
    }

    pub fn subscribe_total(&self) -> Subscription<Vec<Utxo>> {
        self.total.subscribe()
    }

    pub fn subscribe_available(&self) -> Subscription<Vec<Utxo>> {
        self.available.subscribe()
    }

    pub fn subscribe_unspendable(&self) -> Subscription<Vec<Utxo>> {
        self.unspendable.subscribe()
    }

    pub async fn first_available(&self) -> Result<Vec<Utxo>, TrackerError> {
        self.available.first_value().await
    }

    /// Marks outputs (e.g. collateral) as not to be spent by input selection
    pub async fn set_unspendable(&self, mut utxo: Vec<Utxo>) {
        utxo.sort_by(|a, b| a.input.cmp(&b.input));
        self.unspendable_set.accept(utxo).await;
    }

    pub fn start(
        self: &Arc<Self>,
        provider: Arc<dyn UtxoProvider>,
        mut addresses: Subscription<Vec<GroupedAddress>>,
        mut tip: Subscription<Tip>,
        in_flight: Subscription<Vec<TxInFlight>>,
        connection: Subscription<ConnectionStatus>,
        retry: RetryBackoffConfig,
        fatal: Arc<EventChannel<FatalError>>,
    ) {
        let current_addresses = addresses.clone();
        let fetcher: ColdProvider<Vec<Utxo>> = ColdProvider::new("utxo", retry, connection, move || {
            let provider = provider.clone();
            let addresses: Vec<Address> = current_addresses
                .latest()
                .unwrap_or_default()
                .into_iter()
                .map(|a| a.address)
                .collect();
            async move {
                let mut utxo = provider.utxo_by_addresses(&addresses).await?;
                utxo.sort_by(|a, b| a.input.cmp(&b.input));
                Ok(utxo)
            }
        });

        let total = self.total.clone();
        let mut ready = addresses.clone();
        self.tasks.spawn(async move {
            if ready.wait_for(|a| !a.is_empty()).await.is_none() {
                return;
            }
            addresses.mark_seen();
            tip.mark_seen();
            fetcher
                .run(AnyOf(addresses, tip), fatal, move |utxo| {
                    let total = total.clone();
                    async move {
                        total.accept(utxo).await;
                    }
                })
                .await;
        });

        let tracker = self.clone();
        let mut total = self.total.subscribe();
        let mut unspendable = self.unspendable_set.subscribe();
        let mut in_flight = in_flight;
        self.tasks.spawn(async move {
            loop {
                if let Some(total) = total.latest() {
                    let (available, held) = partition_utxo(
                        &total,
                        &unspendable.latest().unwrap_or_default(),
                        &in_flight.latest().unwrap_or_default(),
                    );
                    tracker.available.next_distinct(available);
                    tracker.unspendable.next_distinct(held);
                }
                let open = tokio::select! {
                    open = total.changed() => open,
                    open = unspendable.changed() => open,
                    open = in_flight.changed() => open,
                };
                if !open {
                    break;
                }
            }
        });
    }
}

impl Shutdown for UtxoTracker {
    fn shutdown(&self) {
        self.tasks.stop();
        self.total.complete();
        self.unspendable_set.complete();
        self.available.complete();
        self.unspendable.complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OutgoingTx, TransactionId, TxBody, TxOut};

    fn utxo(tx: &str, coins: u64) -> Utxo {
        Utxo {
            input: TxIn {
                tx_id: TransactionId::from(tx),
                index: 0,
            },
            output: TxOut {
                address: Address::from("addr1"),
                value: Value::coins(coins),
            },
        }
    }

    #[test]
    fn in_flight_inputs_and_unspendable_outputs_are_not_available() {
        let total = vec![utxo("a", 1), utxo("b", 2), utxo("c", 3)];
        let in_flight = vec![TxInFlight {
            tx: OutgoingTx {
                id: TransactionId::from("spend"),
                body: TxBody {
                    inputs: vec![total[0].input.clone()],
                    ..Default::default()
                },
                wire_bytes: vec![],
                context: None,
            },
            submitted_at: Some(10),
        }];
        let unspendable = vec![utxo("c", 3), utxo("gone", 9)];

        let (available, held) = partition_utxo(&total, &unspendable, &in_flight);
        assert_eq!(available, vec![utxo("b", 2)]);
        assert_eq!(held, vec![utxo("c", 3)]);
        assert_eq!(utxo_value(&total).coins, 6);
    }
}
