use async_trait::async_trait;
use log::debug;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tokio::sync::watch;

use crate::models::{
    Address, AssetId, AssetInfo, BlockNo, EraSummary, GenesisParameters, HydratedTx,
    ProtocolParameters, RewardAccount, Tip, Utxo,
};
use crate::provider::{
    AssetProvider, ChainHistoryProvider, HealthCheckResponse, NetworkInfoProvider,
    ProviderResult, RewardsProvider, TxSubmitProvider, UtxoProvider,
};

/// Request statistics of one provider
#[derive(Debug, Clone, Default)]
pub struct CallStats {
    pub pending: u32,
    pub responded: bool,
    pub last_response: Option<Instant>,
    pub failures: u64,
}

/// Records every call made through a tracked provider
pub struct ProviderStats {
    name: &'static str,
    state: watch::Sender<CallStats>,
}

struct PendingCall<'a> {
    stats: &'a ProviderStats,
    ok: bool,
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        let ok = self.ok;
        self.stats.state.send_modify(|stats| {
            stats.pending = stats.pending.saturating_sub(1);
            if ok {
                stats.responded = true;
                stats.last_response = Some(Instant::now());
            } else {
                stats.failures += 1;
            }
        });
    }
}

impl ProviderStats {
    pub fn new(name: &'static str) -> Self {
        let (state, _) = watch::channel(CallStats::default());
        Self { name, state }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn snapshot(&self) -> CallStats {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CallStats> {
        self.state.subscribe()
    }

    /// Run `call`, counting it as pending until it resolves or is dropped
    pub async fn track<T, F>(&self, call: F) -> ProviderResult<T>
    where
        F: Future<Output = ProviderResult<T>>,
    {
        self.state.send_modify(|stats| stats.pending += 1);
        let mut pending = PendingCall {
            stats: self,
            ok: false,
        };
        let result = call.await;
        pending.ok = result.is_ok();
        if let Err(e) = &result {
            debug!("{} call failed: {}", self.name, e);
        }
        result
    }
}

/// Provider wrapper feeding [`ProviderStats`], used to derive the sync status
pub struct TrackedProvider<P: ?Sized> {
    inner: Arc<P>,
    stats: Arc<ProviderStats>,
}

impl<P: ?Sized> TrackedProvider<P> {
    pub fn new(name: &'static str, inner: Arc<P>) -> Self {
        Self {
            inner,
            stats: Arc::new(ProviderStats::new(name)),
        }
    }

    pub fn stats(&self) -> Arc<ProviderStats> {
        self.stats.clone()
    }
}

#[async_trait]
impl<P: NetworkInfoProvider + ?Sized> NetworkInfoProvider for TrackedProvider<P> {
    async fn ledger_tip(&self) -> ProviderResult<Tip> {
        self.stats.track(self.inner.ledger_tip()).await
    }

    async fn era_summaries(&self) -> ProviderResult<Vec<EraSummary>> {
        self.stats.track(self.inner.era_summaries()).await
    }

    async fn protocol_parameters(&self) -> ProviderResult<ProtocolParameters> {
        self.stats.track(self.inner.protocol_parameters()).await
    }

    async fn genesis_parameters(&self) -> ProviderResult<GenesisParameters> {
        self.stats.track(self.inner.genesis_parameters()).await
    }

    // Health checks come from the connection monitor, not from the sync loops
    async fn health_check(&self) -> ProviderResult<HealthCheckResponse> {
        self.inner.health_check().await
    }
}

#[async_trait]
impl<P: UtxoProvider + ?Sized> UtxoProvider for TrackedProvider<P> {
    async fn utxo_by_addresses(&self, addresses: &[Address]) -> ProviderResult<Vec<Utxo>> {
        self.stats
            .track(self.inner.utxo_by_addresses(addresses))
            .await
    }
}

#[async_trait]
impl<P: ChainHistoryProvider + ?Sized> ChainHistoryProvider for TrackedProvider<P> {
    async fn transactions_by_addresses(
        &self,
        addresses: &[Address],
        since_block: Option<BlockNo>,
    ) -> ProviderResult<Vec<HydratedTx>> {
        self.stats
            .track(self.inner.transactions_by_addresses(addresses, since_block))
            .await
    }
}

#[async_trait]
impl<P: RewardsProvider + ?Sized> RewardsProvider for TrackedProvider<P> {
    async fn rewards_balance(&self, account: &RewardAccount) -> ProviderResult<u64> {
        self.stats.track(self.inner.rewards_balance(account)).await
    }
}

#[async_trait]
impl<P: AssetProvider + ?Sized> AssetProvider for TrackedProvider<P> {
    async fn asset_info(&self, asset_id: &AssetId) -> ProviderResult<AssetInfo> {
        self.stats.track(self.inner.asset_info(asset_id)).await
    }
}

#[async_trait]
impl<P: TxSubmitProvider + ?Sized> TxSubmitProvider for TrackedProvider<P> {
    async fn submit_tx(
        &self,
        wire_bytes: &[u8],
        context: Option<&serde_json::Value>,
    ) -> ProviderResult<()> {
        self.stats
            .track(self.inner.submit_tx(wire_bytes, context))
            .await
    }
}
