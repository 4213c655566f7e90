use log::{debug, info};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::codec::TxCodec;
use crate::discovery::{AddressDiscovery, HdSequentialDiscovery, KeyAgent, DEFAULT_LOOK_AHEAD};
use crate::models::{
    DataSignature, EpochInfo, EraSummary, GenesisParameters, ProtocolParameters, SignedTx,
    TransactionId, TxInput,
};
use crate::provider::{
    AssetProvider, ChainHistoryProvider, ConnectionStatus, ConnectionStatusTracker,
    NetworkInfoProvider, ProviderResult, RewardsProvider, SmartTxSubmitProvider, TrackedProvider,
    TxSubmitProvider, UtxoProvider,
};
use crate::store::WalletStores;
use crate::tracker::{
    AddressTracker, AssetsTracker, BalanceSources, BalanceTracker, ColdProvider,
    CurrentEpochTracker, DelegationTracker, EventChannel, EventStream, FatalError, LostTx,
    PersistentDocumentTracker, PollingConfig, Reemitter, RetryBackoffConfig, Shutdown,
    Subscription, SyncStatusTracker, TaskGroup, TipTracker, TransactionsTracker, UtxoTracker,
};
use crate::wallet::builder::{self, BuildContext};
use crate::wallet::{
    DefaultClassifier, FinalizeTxProps, InitializeTxProps, InitializeTxResult, InputSelector,
    SignDataProps, SubmissionCoordinator, SubmissionErrorClassifier, SubmitTxOptions, WalletError,
};

#[derive(Debug, Clone)]
pub struct WalletProps {
    pub name: String,
    pub polling: PollingConfig,
}

impl Default for WalletProps {
    fn default() -> Self {
        Self {
            name: "wallet".to_string(),
            polling: PollingConfig::default(),
        }
    }
}

#[derive(Clone)]
pub struct WalletProviders {
    pub network_info: Arc<dyn NetworkInfoProvider>,
    pub utxo: Arc<dyn UtxoProvider>,
    pub chain_history: Arc<dyn ChainHistoryProvider>,
    pub rewards: Arc<dyn RewardsProvider>,
    pub assets: Arc<dyn AssetProvider>,
    pub tx_submit: Arc<dyn TxSubmitProvider>,
}

impl WalletProviders {
    /// Every provider served by one backend
    pub fn from_backend<P>(backend: Arc<P>) -> Self
    where
        P: NetworkInfoProvider
            + UtxoProvider
            + ChainHistoryProvider
            + RewardsProvider
            + AssetProvider
            + TxSubmitProvider
            + 'static,
    {
        Self {
            network_info: backend.clone(),
            utxo: backend.clone(),
            chain_history: backend.clone(),
            rewards: backend.clone(),
            assets: backend.clone(),
            tx_submit: backend,
        }
    }
}

/// Collaborators of a [`Wallet`]. Optional ones fall back to defaults:
/// sequential HD discovery, an always-up connection and the v1 classifier.
/// A missing codec or input selector fails the operations that need it.
pub struct WalletDependencies {
    pub providers: WalletProviders,
    pub key_agent: Arc<dyn KeyAgent>,
    pub stores: WalletStores,
    pub discovery: Option<Arc<dyn AddressDiscovery>>,
    pub codec: Option<Arc<dyn TxCodec>>,
    pub input_selector: Option<Arc<dyn InputSelector>>,
    pub connection: Option<Arc<ConnectionStatusTracker>>,
    pub classifier: Option<Arc<dyn SubmissionErrorClassifier>>,
}

impl WalletDependencies {
    pub fn new(providers: WalletProviders, key_agent: Arc<dyn KeyAgent>, stores: WalletStores) -> Self {
        Self {
            providers,
            key_agent,
            stores,
            discovery: None,
            codec: None,
            input_selector: None,
            connection: None,
            classifier: None,
        }
    }
}

/// Refetches a network document on every epoch change
#[allow(clippy::too_many_arguments)]
fn track_epoch_document<T, F, Fut>(
    tasks: &TaskGroup,
    name: &'static str,
    document: Arc<PersistentDocumentTracker<T>>,
    epochs: Subscription<EpochInfo>,
    connection: Subscription<ConnectionStatus>,
    retry: RetryBackoffConfig,
    fatal: Arc<EventChannel<FatalError>>,
    fetch: F,
) where
    T: Clone + PartialEq + Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ProviderResult<T>> + Send + 'static,
{
    let fetcher: ColdProvider<T> =
        ColdProvider::new(name, retry, connection, fetch).with_equals(|a, b| a == b);
    tasks.spawn(async move {
        fetcher
            .run(epochs, fatal, move |value| {
                let document = document.clone();
                async move {
                    document.accept(value).await;
                }
            })
            .await;
    });
}

/// A synchronized wallet: every tracker, the submission pipeline and the
/// reemitter, owned together and shut down together
pub struct Wallet {
    name: String,
    key_agent: Arc<dyn KeyAgent>,
    codec: Option<Arc<dyn TxCodec>>,
    input_selector: Option<Arc<dyn InputSelector>>,
    connection: Arc<ConnectionStatusTracker>,
    owns_connection: bool,
    fatal: Arc<EventChannel<FatalError>>,
    sync_status: Arc<SyncStatusTracker>,
    tip: Arc<TipTracker>,
    era_summaries: Arc<PersistentDocumentTracker<Vec<EraSummary>>>,
    protocol_parameters: Arc<PersistentDocumentTracker<ProtocolParameters>>,
    genesis_parameters: Arc<PersistentDocumentTracker<GenesisParameters>>,
    current_epoch: Arc<CurrentEpochTracker>,
    addresses: Arc<AddressTracker>,
    transactions: Arc<TransactionsTracker>,
    utxo: Arc<UtxoTracker>,
    delegation: Arc<DelegationTracker>,
    assets: Arc<AssetsTracker>,
    balance: Arc<BalanceTracker>,
    reemitter: Arc<Reemitter>,
    submission: Arc<SubmissionCoordinator>,
    tasks: TaskGroup,
    shut_down: AtomicBool,
}

impl Wallet {
    /// Restores every document from the stores and starts synchronizing
    pub async fn new(props: WalletProps, dependencies: WalletDependencies) -> Self {
        let WalletProps { name, polling } = props;
        let WalletDependencies {
            providers,
            key_agent,
            stores,
            discovery,
            codec,
            input_selector,
            connection,
            classifier,
        } = dependencies;
        let retry = polling.retry.clone();

        let owns_connection = connection.is_none();
        let connection = connection.unwrap_or_else(|| Arc::new(ConnectionStatusTracker::new()));

        let network_info = Arc::new(TrackedProvider::new("network-info", providers.network_info));
        let utxo_provider = Arc::new(TrackedProvider::new("utxo", providers.utxo));
        let chain_history = Arc::new(TrackedProvider::new("chain-history", providers.chain_history));
        let rewards = Arc::new(TrackedProvider::new("rewards", providers.rewards));
        let asset_provider = Arc::new(TrackedProvider::new("assets", providers.assets));
        let tx_submit = Arc::new(TrackedProvider::new("tx-submit", providers.tx_submit));

        let sync_status = Arc::new(SyncStatusTracker::new(
            vec![
                network_info.stats(),
                utxo_provider.stats(),
                chain_history.stats(),
                rewards.stats(),
            ],
            polling.considered_out_of_sync_after,
        ));
        let fatal = Arc::new(EventChannel::new("fatal-errors"));

        let tip = Arc::new(TipTracker::new(stores.tip).await);
        let era_summaries =
            Arc::new(PersistentDocumentTracker::load("era-summaries", stores.era_summaries).await);
        let protocol_parameters = Arc::new(
            PersistentDocumentTracker::load("protocol-parameters", stores.protocol_parameters).await,
        );
        let genesis_parameters = Arc::new(
            PersistentDocumentTracker::load("genesis-parameters", stores.genesis_parameters).await,
        );
        let current_epoch = Arc::new(CurrentEpochTracker::new());
        let addresses = Arc::new(AddressTracker::new(stores.addresses).await);
        let transactions =
            Arc::new(TransactionsTracker::new(stores.transactions, stores.in_flight).await);
        let utxo = Arc::new(UtxoTracker::new(stores.utxo, stores.unspendable_utxo).await);
        let delegation = Arc::new(DelegationTracker::new(stores.reward_accounts).await);
        let assets = Arc::new(AssetsTracker::new(stores.assets).await);
        let balance = Arc::new(BalanceTracker::new());
        let reemitter = Arc::new(Reemitter::new());

        let smart_submit = Arc::new(SmartTxSubmitProvider::new(
            tx_submit,
            tip.subscribe(),
            connection.subscribe(),
            retry.clone(),
        ));
        let submission = Arc::new(SubmissionCoordinator::new(
            smart_submit,
            transactions.clone(),
            tip.subscribe(),
            classifier.unwrap_or_else(|| Arc::new(DefaultClassifier)),
            codec.clone(),
        ));

        let wallet = Self {
            name,
            key_agent,
            codec,
            input_selector,
            connection,
            owns_connection,
            fatal,
            sync_status,
            tip,
            era_summaries,
            protocol_parameters,
            genesis_parameters,
            current_epoch,
            addresses,
            transactions,
            utxo,
            delegation,
            assets,
            balance,
            reemitter,
            submission,
            tasks: TaskGroup::new("wallet"),
            shut_down: AtomicBool::new(false),
        };

        let discovery = discovery.unwrap_or_else(|| {
            Arc::new(HdSequentialDiscovery::new(
                chain_history.clone(),
                DEFAULT_LOOK_AHEAD,
            ))
        });
        wallet.sync_status.start();
        wallet.tip.start(
            network_info.clone(),
            wallet.connection.subscribe(),
            wallet.sync_status.subscribe(),
            &polling,
            wallet.fatal.clone(),
        );
        wallet
            .current_epoch
            .start(wallet.tip.subscribe(), wallet.era_summaries.subscribe());
        wallet.start_epoch_cascade(network_info, &retry);

        wallet
            .addresses
            .start(
                wallet.key_agent.clone(),
                discovery,
                wallet.connection.subscribe(),
                retry.clone(),
            )
            .await;
        wallet.transactions.start(
            chain_history,
            wallet.addresses.subscribe(),
            wallet.tip.subscribe(),
            wallet.connection.subscribe(),
            retry.clone(),
            wallet.fatal.clone(),
        );
        wallet.utxo.start(
            utxo_provider,
            wallet.addresses.subscribe(),
            wallet.tip.subscribe(),
            wallet.transactions.subscribe_in_flight(),
            wallet.connection.subscribe(),
            retry.clone(),
            wallet.fatal.clone(),
        );
        wallet.delegation.start(
            rewards,
            wallet.addresses.subscribe(),
            wallet.current_epoch.subscribe(),
            wallet.transactions.subscribe_history(),
            wallet.transactions.subscribe_in_flight(),
            wallet.connection.subscribe(),
            retry.clone(),
            wallet.fatal.clone(),
        );
        wallet.assets.start(
            asset_provider,
            wallet.utxo.subscribe_total(),
            wallet.connection.subscribe(),
            retry,
            wallet.fatal.clone(),
        );
        wallet.balance.start(BalanceSources {
            protocol_parameters: wallet.protocol_parameters.subscribe(),
            total: wallet.utxo.subscribe_total(),
            available: wallet.utxo.subscribe_available(),
            unspendable: wallet.utxo.subscribe_unspendable(),
            reward_accounts: wallet.delegation.subscribe(),
        });
        wallet.reemitter.start(
            wallet.transactions.clone(),
            wallet.tip.subscribe(),
            wallet.genesis_parameters.subscribe(),
            polling.max_interval,
            wallet.submission.clone(),
        );

        info!("Wallet '{}' started", wallet.name);
        wallet
    }

    /// Era summaries, protocol and genesis parameters: fetched at startup
    /// and again whenever the epoch changes
    fn start_epoch_cascade(&self, provider: Arc<dyn NetworkInfoProvider>, retry: &RetryBackoffConfig) {
        let network = provider.clone();
        track_epoch_document(
            &self.tasks,
            "era-summaries",
            self.era_summaries.clone(),
            self.current_epoch.changes(),
            self.connection.subscribe(),
            retry.clone(),
            self.fatal.clone(),
            move || {
                let network = network.clone();
                async move { network.era_summaries().await }
            },
        );

        let network = provider.clone();
        track_epoch_document(
            &self.tasks,
            "protocol-parameters",
            self.protocol_parameters.clone(),
            self.current_epoch.changes(),
            self.connection.subscribe(),
            retry.clone(),
            self.fatal.clone(),
            move || {
                let network = network.clone();
                async move { network.protocol_parameters().await }
            },
        );

        track_epoch_document(
            &self.tasks,
            "genesis-parameters",
            self.genesis_parameters.clone(),
            self.current_epoch.changes(),
            self.connection.subscribe(),
            retry.clone(),
            self.fatal.clone(),
            move || {
                let network = provider.clone();
                async move { network.genesis_parameters().await }
            },
        );
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_agent(&self) -> &Arc<dyn KeyAgent> {
        &self.key_agent
    }

    pub fn connection(&self) -> &Arc<ConnectionStatusTracker> {
        &self.connection
    }

    pub fn tip(&self) -> &Arc<TipTracker> {
        &self.tip
    }

    pub fn balance(&self) -> &Arc<BalanceTracker> {
        &self.balance
    }

    pub fn utxo(&self) -> &Arc<UtxoTracker> {
        &self.utxo
    }

    pub fn delegation(&self) -> &Arc<DelegationTracker> {
        &self.delegation
    }

    pub fn transactions(&self) -> &Arc<TransactionsTracker> {
        &self.transactions
    }

    pub fn addresses(&self) -> &Arc<AddressTracker> {
        &self.addresses
    }

    pub fn protocol_parameters(&self) -> &Arc<PersistentDocumentTracker<ProtocolParameters>> {
        &self.protocol_parameters
    }

    pub fn genesis_parameters(&self) -> &Arc<PersistentDocumentTracker<GenesisParameters>> {
        &self.genesis_parameters
    }

    pub fn era_summaries(&self) -> &Arc<PersistentDocumentTracker<Vec<EraSummary>>> {
        &self.era_summaries
    }

    pub fn current_epoch(&self) -> &Arc<CurrentEpochTracker> {
        &self.current_epoch
    }

    pub fn assets(&self) -> &Arc<AssetsTracker> {
        &self.assets
    }

    pub fn sync_status(&self) -> &Arc<SyncStatusTracker> {
        &self.sync_status
    }

    pub fn fatal_errors(&self) -> EventStream<FatalError> {
        self.fatal.subscribe()
    }

    /// Transactions the reemitter found unconfirmed for too long
    pub fn lost_transactions(&self) -> EventStream<LostTx> {
        self.reemitter.lost()
    }

    pub async fn submit_tx(
        &self,
        input: impl Into<TxInput>,
        options: SubmitTxOptions,
    ) -> Result<TransactionId, WalletError> {
        self.submission.submit_tx(input, options).await
    }

    pub async fn initialize_tx(&self, props: InitializeTxProps) -> Result<InitializeTxResult, WalletError> {
        self.ensure_running()?;
        let addresses = self.addresses.value();
        let context = BuildContext {
            selector: self.input_selector.as_deref(),
            codec: self.codec.as_deref(),
            addresses: &addresses,
            available: self.utxo.available(),
            protocol_parameters: self.protocol_parameters.value(),
            tip: self.tip.value(),
        };
        builder::initialize_tx(props, context).await
    }

    pub async fn finalize_tx(&self, props: FinalizeTxProps) -> Result<SignedTx, WalletError> {
        self.ensure_running()?;
        builder::finalize_tx(props, self.key_agent.as_ref(), self.codec.as_deref()).await
    }

    pub async fn sign_data(&self, props: SignDataProps) -> Result<DataSignature, WalletError> {
        self.ensure_running()?;
        builder::sign_data(props, &self.addresses.value(), self.key_agent.as_ref()).await
    }

    /// Polls the tip right away; every tip-driven tracker follows
    pub fn sync(&self) {
        self.tip.sync();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn ensure_running(&self) -> Result<(), WalletError> {
        if self.is_shut_down() {
            Err(WalletError::Shutdown)
        } else {
            Ok(())
        }
    }

    /// Tears everything down, dependents before their sources. Calling it
    /// again does nothing.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            debug!("Wallet '{}' already shut down", self.name);
            return;
        }
        self.submission.shutdown();
        self.reemitter.shutdown();
        self.balance.shutdown();
        self.assets.shutdown();
        self.delegation.shutdown();
        self.utxo.shutdown();
        self.transactions.shutdown();
        self.addresses.shutdown();
        self.tasks.stop();
        self.current_epoch.shutdown();
        self.era_summaries.shutdown();
        self.protocol_parameters.shutdown();
        self.genesis_parameters.shutdown();
        self.tip.shutdown();
        self.sync_status.shutdown();
        if self.owns_connection {
            self.connection.shutdown();
        }
        self.fatal.complete();
        info!("Wallet '{}' shut down", self.name);
    }
}

impl Shutdown for Wallet {
    fn shutdown(&self) {
        Wallet::shutdown(self);
    }
}

impl Drop for Wallet {
    fn drop(&mut self) {
        self.shutdown();
    }
}
