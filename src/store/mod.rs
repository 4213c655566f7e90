pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::{Database, SqliteDocumentStore};

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{
    AssetId, AssetInfo, EraSummary, GenesisParameters, GroupedAddress, HydratedTx,
    ProtocolParameters, RewardAccountInfo, Tip, TxInFlight, Utxo,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt document {key}: {source}")]
    Corrupt {
        key: String,
        source: serde_json::Error,
    },
    #[error("failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable slot for a single document
#[async_trait]
pub trait DocumentStore<T: Send + Sync>: Send + Sync {
    async fn get(&self) -> Result<Option<T>, StoreError>;

    async fn set(&self, value: &T) -> Result<(), StoreError>;

    async fn delete(&self) -> Result<(), StoreError>;
}

pub type Store<T> = Arc<dyn DocumentStore<T>>;

/// One store per wallet document
#[derive(Clone)]
pub struct WalletStores {
    pub tip: Store<Tip>,
    pub protocol_parameters: Store<ProtocolParameters>,
    pub genesis_parameters: Store<GenesisParameters>,
    pub era_summaries: Store<Vec<EraSummary>>,
    pub addresses: Store<Vec<GroupedAddress>>,
    pub utxo: Store<Vec<Utxo>>,
    pub unspendable_utxo: Store<Vec<Utxo>>,
    pub transactions: Store<Vec<HydratedTx>>,
    pub in_flight: Store<Vec<TxInFlight>>,
    pub reward_accounts: Store<Vec<RewardAccountInfo>>,
    pub assets: Store<BTreeMap<AssetId, AssetInfo>>,
}

impl WalletStores {
    pub fn in_memory() -> Self {
        Self {
            tip: Arc::new(InMemoryStore::new()),
            protocol_parameters: Arc::new(InMemoryStore::new()),
            genesis_parameters: Arc::new(InMemoryStore::new()),
            era_summaries: Arc::new(InMemoryStore::new()),
            addresses: Arc::new(InMemoryStore::new()),
            utxo: Arc::new(InMemoryStore::new()),
            unspendable_utxo: Arc::new(InMemoryStore::new()),
            transactions: Arc::new(InMemoryStore::new()),
            in_flight: Arc::new(InMemoryStore::new()),
            reward_accounts: Arc::new(InMemoryStore::new()),
            assets: Arc::new(InMemoryStore::new()),
        }
    }

    /// Documents of wallet `name`, keyed `<name>/<document>`
    pub fn sqlite(database: Arc<Database>, name: &str) -> Self {
        Self {
            tip: sqlite_document(&database, name, "tip"),
            protocol_parameters: sqlite_document(&database, name, "protocol_parameters"),
            genesis_parameters: sqlite_document(&database, name, "genesis_parameters"),
            era_summaries: sqlite_document(&database, name, "era_summaries"),
            addresses: sqlite_document(&database, name, "addresses"),
            utxo: sqlite_document(&database, name, "utxo"),
            unspendable_utxo: sqlite_document(&database, name, "unspendable_utxo"),
            transactions: sqlite_document(&database, name, "transactions"),
            in_flight: sqlite_document(&database, name, "in_flight"),
            reward_accounts: sqlite_document(&database, name, "reward_accounts"),
            assets: sqlite_document(&database, name, "assets"),
        }
    }
}

fn sqlite_document<T>(database: &Arc<Database>, wallet: &str, document: &str) -> Store<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static,
{
    Arc::new(SqliteDocumentStore::new(
        database.clone(),
        format!("{wallet}/{document}"),
    ))
}
