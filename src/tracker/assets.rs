use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::models::{AssetId, AssetInfo, Utxo};
use crate::provider::{AssetProvider, ConnectionStatus};
use crate::store::Store;
use crate::tracker::{
    ColdProvider, EventChannel, FatalError, PersistentDocumentTracker, RetryBackoffConfig,
    Shutdown, Subscription, TaskGroup,
};

fn held_assets(utxo: &[Utxo]) -> BTreeSet<AssetId> {
    utxo.iter()
        .flat_map(|u| u.output.value.assets.keys())
        .cloned()
        .collect()
}

/// Metadata of every asset held in the wallet's outputs
pub struct AssetsTracker {
    document: Arc<PersistentDocumentTracker<BTreeMap<AssetId, AssetInfo>>>,
    tasks: TaskGroup,
}

impl AssetsTracker {
    pub async fn new(store: Store<BTreeMap<AssetId, AssetInfo>>) -> Self {
        Self {
            document: Arc::new(PersistentDocumentTracker::load("assets", store).await),
            tasks: TaskGroup::new("assets"),
        }
    }

    pub fn value(&self) -> BTreeMap<AssetId, AssetInfo> {
        self.document.value().unwrap_or_default()
    }

    pub fn subscribe(&self) -> Subscription<BTreeMap<AssetId, AssetInfo>> {
        self.document.subscribe()
    }

    /// Resolves newly held assets whenever the total UTXO set changes.
    /// Known entries are reused; assets no longer held are dropped.
    pub fn start(
        &self,
        provider: Arc<dyn AssetProvider>,
        utxo_total: Subscription<Vec<Utxo>>,
        connection: Subscription<ConnectionStatus>,
        retry: RetryBackoffConfig,
        fatal: Arc<EventChannel<FatalError>>,
    ) {
        let document = self.document.clone();
        let current_utxo = utxo_total.clone();
        let fetcher: ColdProvider<BTreeMap<AssetId, AssetInfo>> =
            ColdProvider::new("assets", retry, connection, move || {
                let provider = provider.clone();
                let held = held_assets(&current_utxo.latest().unwrap_or_default());
                let known = document.value().unwrap_or_default();
                async move {
                    let mut assets = BTreeMap::new();
                    for asset_id in held {
                        let info = match known.get(&asset_id) {
                            Some(info) => info.clone(),
                            None => provider.asset_info(&asset_id).await?,
                        };
                        assets.insert(asset_id, info);
                    }
                    Ok(assets)
                }
            });

        let document = self.document.clone();
        let mut ready = utxo_total.clone();
        let mut trigger = utxo_total;
        self.tasks.spawn(async move {
            if ready.next().await.is_none() {
                return;
            }
            trigger.mark_seen();
            fetcher
                .run(trigger, fatal, move |assets| {
                    let document = document.clone();
                    async move {
                        document.accept(assets).await;
                    }
                })
                .await;
        });
    }
}

impl Shutdown for AssetsTracker {
    fn shutdown(&self) {
        self.tasks.stop();
        self.document.complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Address, TransactionId, TxIn, TxOut, Value};

    #[test]
    fn collects_distinct_asset_ids() {
        let asset = AssetId::from("policy.token");
        let mut value = Value::coins(2);
        value.assets.insert(asset.clone(), 10);
        let utxo = |index| Utxo {
            input: TxIn {
                tx_id: TransactionId::from("a"),
                index,
            },
            output: TxOut {
                address: Address::from("addr1"),
                value: value.clone(),
            },
        };
        let held = held_assets(&[utxo(0), utxo(1)]);
        assert_eq!(held.into_iter().collect::<Vec<_>>(), vec![asset]);
    }
}
