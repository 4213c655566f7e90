#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracked_wallet::codec::{CodecError, TxCodec};
use tracked_wallet::discovery::{KeyAgent, KeyAgentError};
use tracked_wallet::models::{
    Address, AddressType, AssetId, AssetInfo, BlockNo, DataSignature, EraParameters, EraStart,
    EraSummary, GenesisParameters, GroupedAddress, HydratedTx, KeyPath, KeyRole, OutgoingTx,
    ProtocolParameters, RewardAccount, Tip, TransactionId, Tx, TxBody, TxIn, TxOut, Utxo, Value,
    TxInFlight, Witness,
};
use tracked_wallet::provider::{
    AssetProvider, ChainHistoryProvider, ConnectionStatusTracker, HealthCheckResponse,
    NetworkInfoProvider, ProviderResult, RewardsProvider,
    SmartTxSubmitProvider, TxSubmitProvider, UtxoProvider,
};
use tracked_wallet::store::InMemoryStore;
use tracked_wallet::tracker::{RetryBackoffConfig, TrackerSubject, TransactionsTracker};
use tracked_wallet::wallet::{DefaultClassifier, SubmissionCoordinator};

pub const REWARD_ACCOUNT: &str = "stake_test1";

pub fn fast_retry() -> RetryBackoffConfig {
    RetryBackoffConfig {
        initial_interval: Duration::from_millis(10),
        max_interval: Duration::from_millis(50),
        max_retries: Some(3),
        jitter: false,
    }
}

pub fn tip(slot: u64) -> Tip {
    Tip {
        slot,
        block_no: slot / 20,
        hash: format!("block-{}", slot),
    }
}

pub fn protocol_parameters() -> ProtocolParameters {
    ProtocolParameters {
        min_fee_a: 44,
        min_fee_b: 155_381,
        max_tx_size: 16_384,
        key_deposit: 2_000_000,
        pool_deposit: 500_000_000,
        coins_per_utxo_byte: 4_310,
        collateral_percentage: 150,
        max_collateral_inputs: 3,
        protocol_version: (8, 0),
    }
}

pub fn genesis_parameters(slot_length: Duration) -> GenesisParameters {
    GenesisParameters {
        network_id: 0,
        network_magic: 1,
        system_start: Utc.timestamp_opt(1_654_041_600, 0).unwrap(),
        slot_length,
        epoch_length: 432_000,
        security_parameter: 2_160,
        active_slots_coefficient: 0.05,
        max_lovelace_supply: 45_000_000_000_000_000,
    }
}

pub fn era_summaries() -> Vec<EraSummary> {
    vec![EraSummary {
        start: EraStart {
            slot: 0,
            epoch: 0,
            time: Utc.timestamp_opt(1_654_041_600, 0).unwrap(),
        },
        parameters: EraParameters {
            epoch_length: 432_000,
            slot_length: Duration::from_secs(1),
        },
    }]
}

pub fn utxo(tx_id: &str, index: u32, address: &str, coins: u64) -> Utxo {
    Utxo {
        input: TxIn {
            tx_id: TransactionId::from(tx_id),
            index,
        },
        output: TxOut {
            address: Address::from(address),
            value: Value::coins(coins),
        },
    }
}

/// History entry with a single output to `address`
pub fn history_tx(id: &str, block_no: BlockNo, address: &str) -> HydratedTx {
    HydratedTx {
        id: TransactionId::from(id),
        block_no,
        slot: block_no * 20,
        body: TxBody {
            outputs: vec![TxOut {
                address: Address::from(address),
                value: Value::coins(1_000_000),
            }],
            ..TxBody::default()
        },
    }
}

pub fn outgoing(id: &str) -> OutgoingTx {
    OutgoingTx {
        id: TransactionId::from(id),
        body: TxBody::default(),
        wire_bytes: id.as_bytes().to_vec(),
        context: None,
    }
}

/// Every provider capability over scripted in-memory state
pub struct FakeBackend {
    pub tip: Mutex<Tip>,
    pub utxo: Mutex<Vec<Utxo>>,
    pub history: Mutex<Vec<HydratedTx>>,
    pub rewards: Mutex<u64>,
    /// Consumed front to back; an empty queue accepts the submission
    pub submit_results: Mutex<VecDeque<ProviderResult<()>>>,
    pub submit_delay: Mutex<Duration>,
    pub submitted: Mutex<Vec<Vec<u8>>>,
    pub tip_calls: AtomicUsize,
    pub utxo_calls: AtomicUsize,
    pub history_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new(slot: u64) -> Self {
        Self {
            tip: Mutex::new(tip(slot)),
            utxo: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
            rewards: Mutex::new(0),
            submit_results: Mutex::new(VecDeque::new()),
            submit_delay: Mutex::new(Duration::ZERO),
            submitted: Mutex::new(Vec::new()),
            tip_calls: AtomicUsize::new(0),
            utxo_calls: AtomicUsize::new(0),
            history_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
        }
    }

    pub fn push_submit_result(&self, result: ProviderResult<()>) {
        self.submit_results.lock().unwrap().push_back(result);
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkInfoProvider for FakeBackend {
    async fn ledger_tip(&self) -> ProviderResult<Tip> {
        self.tip_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.tip.lock().unwrap().clone())
    }

    async fn era_summaries(&self) -> ProviderResult<Vec<EraSummary>> {
        Ok(era_summaries())
    }

    async fn protocol_parameters(&self) -> ProviderResult<ProtocolParameters> {
        Ok(protocol_parameters())
    }

    async fn genesis_parameters(&self) -> ProviderResult<GenesisParameters> {
        Ok(genesis_parameters(Duration::from_secs(1)))
    }

    async fn health_check(&self) -> ProviderResult<HealthCheckResponse> {
        Ok(HealthCheckResponse {
            ok: true,
            local_node: None,
        })
    }
}

#[async_trait]
impl UtxoProvider for FakeBackend {
    async fn utxo_by_addresses(&self, addresses: &[Address]) -> ProviderResult<Vec<Utxo>> {
        self.utxo_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .utxo
            .lock()
            .unwrap()
            .iter()
            .filter(|utxo| addresses.contains(&utxo.output.address))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ChainHistoryProvider for FakeBackend {
    async fn transactions_by_addresses(
        &self,
        addresses: &[Address],
        since_block: Option<BlockNo>,
    ) -> ProviderResult<Vec<HydratedTx>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|tx| since_block.map_or(true, |since| tx.block_no >= since))
            .filter(|tx| {
                tx.body
                    .outputs
                    .iter()
                    .any(|output| addresses.contains(&output.address))
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RewardsProvider for FakeBackend {
    async fn rewards_balance(&self, _account: &RewardAccount) -> ProviderResult<u64> {
        Ok(*self.rewards.lock().unwrap())
    }
}

#[async_trait]
impl AssetProvider for FakeBackend {
    async fn asset_info(&self, asset_id: &AssetId) -> ProviderResult<AssetInfo> {
        Ok(AssetInfo {
            asset_id: asset_id.clone(),
            policy_id: asset_id.policy_id().to_string(),
            name: asset_id.asset_name().to_string(),
            supply: 1,
            token_metadata: None,
        })
    }
}

#[async_trait]
impl TxSubmitProvider for FakeBackend {
    async fn submit_tx(
        &self,
        wire_bytes: &[u8],
        _context: Option<&serde_json::Value>,
    ) -> ProviderResult<()> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.submit_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.submitted.lock().unwrap().push(wire_bytes.to_vec());
        self.submit_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }
}

/// Deterministic key agent deriving `addr_<chain>_<index>` up to `limit`
/// addresses per chain
pub struct FakeKeyAgent {
    limit: u32,
    known: Mutex<Vec<GroupedAddress>>,
}

impl FakeKeyAgent {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            known: Mutex::new(Vec::new()),
        }
    }
}

pub fn address_name(kind: AddressType, index: u32) -> String {
    match kind {
        AddressType::External => format!("addr_ext_{}", index),
        AddressType::Internal => format!("addr_int_{}", index),
    }
}

#[async_trait]
impl KeyAgent for FakeKeyAgent {
    fn account_index(&self) -> u32 {
        0
    }

    fn network_id(&self) -> u8 {
        0
    }

    fn known_addresses(&self) -> Vec<GroupedAddress> {
        self.known.lock().unwrap().clone()
    }

    fn set_known_addresses(&self, addresses: Vec<GroupedAddress>) {
        *self.known.lock().unwrap() = addresses;
    }

    async fn derive_address(
        &self,
        kind: AddressType,
        index: u32,
    ) -> Result<GroupedAddress, KeyAgentError> {
        if index >= self.limit {
            return Err(KeyAgentError::OutOfRange { kind, index });
        }
        Ok(GroupedAddress {
            address: Address(address_name(kind, index)),
            reward_account: RewardAccount::from(REWARD_ACCOUNT),
            network_id: 0,
            account_index: 0,
            index,
            kind,
            stake_key_derivation_path: Some(KeyPath {
                role: KeyRole::Stake,
                index: 0,
            }),
        })
    }

    async fn derive_public_key(&self, path: KeyPath) -> Result<String, KeyAgentError> {
        Ok(format!("pub_{:?}_{}", path.role, path.index))
    }

    async fn sign_transaction(
        &self,
        id: &TransactionId,
        _body: &TxBody,
    ) -> Result<Witness, KeyAgentError> {
        Ok(Witness {
            signatures: BTreeMap::from([("pub_External_0".to_string(), format!("sig_{}", id))]),
        })
    }

    async fn sign_blob(&self, path: KeyPath, payload: &[u8]) -> Result<DataSignature, KeyAgentError> {
        Ok(DataSignature {
            key: format!("pub_{:?}_{}", path.role, path.index),
            signature: format!("sig_{}", payload.len()),
        })
    }
}

/// JSON wire format with an FNV-1a body hash as id
pub struct JsonCodec;

impl TxCodec for JsonCodec {
    fn serialize(&self, tx: &Tx) -> Vec<u8> {
        serde_json::to_vec(tx).unwrap()
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Tx, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Malformed(e.to_string()))
    }

    fn id(&self, body: &TxBody) -> TransactionId {
        let bytes = serde_json::to_vec(body).unwrap();
        let hash = bytes.iter().fold(0xcbf2_9ce4_8422_2325u64, |hash, byte| {
            (hash ^ u64::from(*byte)).wrapping_mul(0x0100_0000_01b3)
        });
        TransactionId(format!("{:016x}", hash))
    }
}

/// Submission pipeline over a fake backend, without the rest of the wallet
pub struct SubmissionHarness {
    pub backend: Arc<FakeBackend>,
    pub tip: TrackerSubject<Tip>,
    pub connection: Arc<ConnectionStatusTracker>,
    pub transactions: Arc<TransactionsTracker>,
    pub coordinator: Arc<SubmissionCoordinator>,
}

impl SubmissionHarness {
    pub async fn new(slot: u64) -> Self {
        Self::with_in_flight(slot, Vec::new()).await
    }

    pub async fn with_in_flight(slot: u64, in_flight: Vec<TxInFlight>) -> Self {
        let backend = Arc::new(FakeBackend::new(slot));
        let tip = TrackerSubject::with_value(tip(slot));
        let connection = Arc::new(ConnectionStatusTracker::new());
        let transactions = Arc::new(
            TransactionsTracker::new(
                Arc::new(InMemoryStore::<Vec<HydratedTx>>::new()),
                Arc::new(InMemoryStore::with_value(in_flight)),
            )
            .await,
        );
        let provider = Arc::new(SmartTxSubmitProvider::new(
            backend.clone(),
            tip.subscribe(),
            connection.subscribe(),
            fast_retry(),
        ));
        let coordinator = Arc::new(SubmissionCoordinator::new(
            provider,
            transactions.clone(),
            tip.subscribe(),
            Arc::new(DefaultClassifier),
            Some(Arc::new(JsonCodec)),
        ));
        Self {
            backend,
            tip,
            connection,
            transactions,
            coordinator,
        }
    }
}
