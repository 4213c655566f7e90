pub mod connection;
pub mod error;
pub mod http;
pub mod smart_submit;
pub mod tracked;

pub use connection::ConnectionStatus;
pub use connection::ConnectionStatusTracker;
pub use error::{ProviderError, ProviderFailure, TxSubmissionError};
pub use http::HttpProvider;
pub use smart_submit::SmartTxSubmitProvider;
pub use tracked::{CallStats, ProviderStats, TrackedProvider};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{
    Address, AssetId, AssetInfo, BlockNo, EraSummary, GenesisParameters, HydratedTx,
    ProtocolParameters, RewardAccount, Tip, Utxo,
};

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub ok: bool,
    pub local_node: Option<Tip>,
}

#[async_trait]
pub trait NetworkInfoProvider: Send + Sync {
    async fn ledger_tip(&self) -> ProviderResult<Tip>;

    async fn era_summaries(&self) -> ProviderResult<Vec<EraSummary>>;

    async fn protocol_parameters(&self) -> ProviderResult<ProtocolParameters>;

    async fn genesis_parameters(&self) -> ProviderResult<GenesisParameters>;

    async fn health_check(&self) -> ProviderResult<HealthCheckResponse>;
}

#[async_trait]
pub trait UtxoProvider: Send + Sync {
    async fn utxo_by_addresses(&self, addresses: &[Address]) -> ProviderResult<Vec<Utxo>>;
}

#[async_trait]
pub trait ChainHistoryProvider: Send + Sync {
    /// Confirmed transactions touching any of `addresses`, oldest first.
    /// `since_block` limits the result to blocks at or above it.
    async fn transactions_by_addresses(
        &self,
        addresses: &[Address],
        since_block: Option<BlockNo>,
    ) -> ProviderResult<Vec<HydratedTx>>;
}

#[async_trait]
pub trait RewardsProvider: Send + Sync {
    async fn rewards_balance(&self, account: &RewardAccount) -> ProviderResult<u64>;
}

#[async_trait]
pub trait AssetProvider: Send + Sync {
    async fn asset_info(&self, asset_id: &AssetId) -> ProviderResult<AssetInfo>;
}

#[async_trait]
pub trait TxSubmitProvider: Send + Sync {
    async fn submit_tx(
        &self,
        wire_bytes: &[u8],
        context: Option<&serde_json::Value>,
    ) -> ProviderResult<()>;
}
