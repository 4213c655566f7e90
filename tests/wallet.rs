mod common;

use async_trait::async_trait;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::timeout;

use common::{address_name, history_tx, utxo, FakeBackend, FakeKeyAgent, JsonCodec};
use tracked_wallet::discovery::{AddressDiscovery, DiscoveryError, HdSequentialDiscovery, KeyAgent};
use tracked_wallet::models::{AddressType, GroupedAddress, TxOut, Value};
use tracked_wallet::store::{DocumentStore, InMemoryStore, WalletStores};
use tracked_wallet::tracker::PollingConfig;
use tracked_wallet::wallet::{
    FinalizeTxProps, SignDataProps, SubmitTxOptions, Wallet, WalletDependencies, WalletError,
    WalletProps, WalletProviders,
};

const WAIT: Duration = Duration::from_secs(5);

fn props() -> WalletProps {
    WalletProps {
        name: "test".to_string(),
        polling: PollingConfig {
            retry: common::fast_retry(),
            ..PollingConfig::default()
        },
    }
}

fn backend_with_funds() -> Arc<FakeBackend> {
    let backend = Arc::new(FakeBackend::new(1_000));
    backend
        .history
        .lock()
        .unwrap()
        .push(history_tx("funding", 10, "addr_ext_0"));
    backend
        .utxo
        .lock()
        .unwrap()
        .push(utxo("funding", 0, "addr_ext_0", 10_000_000));
    backend
}

/// Discovery that holds its answer back until released
struct GatedDiscovery {
    inner: HdSequentialDiscovery,
    release: Arc<Notify>,
}

#[async_trait]
impl AddressDiscovery for GatedDiscovery {
    async fn discover(&self, key_agent: &dyn KeyAgent) -> Result<Vec<GroupedAddress>, DiscoveryError> {
        self.release.notified().await;
        self.inner.discover(key_agent).await
    }
}

#[tokio::test]
async fn first_start_discovers_persists_and_reports_balance() {
    let backend = backend_with_funds();
    let key_agent = Arc::new(FakeKeyAgent::new(10));
    let address_store = Arc::new(InMemoryStore::<Vec<GroupedAddress>>::new());
    let mut stores = WalletStores::in_memory();
    stores.addresses = address_store.clone();

    let mut dependencies = WalletDependencies::new(
        WalletProviders::from_backend(backend.clone()),
        key_agent.clone(),
        stores,
    );
    dependencies.discovery = Some(Arc::new(HdSequentialDiscovery::new(backend.clone(), 2)));
    let wallet = Wallet::new(props(), dependencies).await;

    let addresses = timeout(WAIT, wallet.addresses().first_non_empty())
        .await
        .unwrap()
        .unwrap();
    // external: index 0 used, then two unused; internal: two unused
    let names: Vec<String> = addresses.iter().map(|a| a.address.0.clone()).collect();
    assert_eq!(
        names,
        vec![
            address_name(AddressType::External, 0),
            address_name(AddressType::External, 1),
            address_name(AddressType::External, 2),
            address_name(AddressType::Internal, 0),
            address_name(AddressType::Internal, 1),
        ]
    );
    assert_eq!(key_agent.known_addresses(), addresses);
    assert_eq!(address_store.get().await.unwrap(), Some(addresses.clone()));

    let mut balance = wallet.balance().subscribe();
    let funded = timeout(WAIT, balance.wait_for(|b| b.utxo.total.coins > 0))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(funded.utxo.total, Value::coins(10_000_000));
    assert_eq!(funded.utxo.available, Value::coins(10_000_000));
    assert_eq!(funded.rewards, 0);
}

#[tokio::test]
async fn balance_waits_for_addresses() {
    let backend = backend_with_funds();
    let release = Arc::new(Notify::new());
    let mut dependencies = WalletDependencies::new(
        WalletProviders::from_backend(backend.clone()),
        Arc::new(FakeKeyAgent::new(10)),
        WalletStores::in_memory(),
    );
    dependencies.discovery = Some(Arc::new(GatedDiscovery {
        inner: HdSequentialDiscovery::new(backend.clone(), 2),
        release: release.clone(),
    }));
    let wallet = Wallet::new(props(), dependencies).await;

    timeout(WAIT, wallet.tip().first_value()).await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(wallet.addresses().value().is_empty());
    assert_eq!(wallet.balance().value(), None);
    assert_eq!(backend.utxo_calls.load(Ordering::SeqCst), 0);

    release.notify_one();
    let balance = timeout(WAIT, wallet.balance().first_value())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(balance.utxo.total, Value::coins(10_000_000));
}

#[tokio::test]
async fn stored_addresses_skip_discovery() {
    let backend = backend_with_funds();
    let key_agent = Arc::new(FakeKeyAgent::new(10));
    let stored = vec![key_agent
        .derive_address(AddressType::External, 0)
        .await
        .unwrap()];
    let mut stores = WalletStores::in_memory();
    stores.addresses = Arc::new(InMemoryStore::with_value(stored.clone()));

    let wallet = Wallet::new(
        props(),
        WalletDependencies::new(
            WalletProviders::from_backend(backend.clone()),
            key_agent.clone(),
            stores,
        ),
    )
    .await;

    assert_eq!(wallet.addresses().value(), stored);
    assert_eq!(key_agent.known_addresses(), stored);
    let balance = timeout(WAIT, wallet.balance().first_value())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(balance.utxo.total.coins, 10_000_000);
}

#[tokio::test]
async fn network_documents_follow_the_epoch() {
    let backend = backend_with_funds();
    let wallet = Wallet::new(
        props(),
        WalletDependencies::new(
            WalletProviders::from_backend(backend.clone()),
            Arc::new(FakeKeyAgent::new(3)),
            WalletStores::in_memory(),
        ),
    )
    .await;

    let epoch = timeout(WAIT, wallet.current_epoch().first_value())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(epoch.epoch_no, 0);
    let parameters = timeout(WAIT, wallet.protocol_parameters().first_value())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(parameters, common::protocol_parameters());
    let genesis = timeout(WAIT, wallet.genesis_parameters().first_value())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(wallet.network_id(), genesis.network_id);
}

#[tokio::test]
async fn shutdown_is_idempotent_and_stops_operations() {
    let backend = backend_with_funds();
    let mut dependencies = WalletDependencies::new(
        WalletProviders::from_backend(backend.clone()),
        Arc::new(FakeKeyAgent::new(3)),
        WalletStores::in_memory(),
    );
    dependencies.codec = Some(Arc::new(JsonCodec));
    let wallet = Wallet::new(props(), dependencies).await;
    timeout(WAIT, wallet.tip().first_value()).await.unwrap().unwrap();

    wallet.shutdown();
    wallet.shutdown();

    assert!(wallet.is_shut_down());
    assert!(wallet.protocol_parameters().is_completed());
    assert_eq!(
        wallet
            .submit_tx(common::outgoing("late"), SubmitTxOptions::default())
            .await,
        Err(WalletError::Shutdown)
    );
    let sign = wallet
        .sign_data(SignDataProps {
            sign_with: "addr_ext_0".to_string(),
            payload: vec![1, 2, 3],
        })
        .await;
    assert_eq!(sign, Err(WalletError::Shutdown));
    assert_eq!(backend.submit_calls(), 0);
    assert!(timeout(WAIT, wallet.fatal_errors().next())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn finalize_and_submit_round_through_the_codec() {
    let backend = backend_with_funds();
    let mut dependencies = WalletDependencies::new(
        WalletProviders::from_backend(backend.clone()),
        Arc::new(FakeKeyAgent::new(3)),
        WalletStores::in_memory(),
    );
    dependencies.codec = Some(Arc::new(JsonCodec));
    let wallet = Wallet::new(props(), dependencies).await;
    timeout(WAIT, wallet.tip().first_value()).await.unwrap().unwrap();

    let body = tracked_wallet::models::TxBody {
        outputs: vec![TxOut {
            address: "addr_elsewhere".into(),
            value: Value::coins(2_000_000),
        }],
        fee: 170_000,
        ..Default::default()
    };
    let id = tracked_wallet::codec::TxCodec::id(&JsonCodec, &body);
    let signed = wallet
        .finalize_tx(FinalizeTxProps {
            id: id.clone(),
            body,
            context: None,
        })
        .await
        .unwrap();
    assert_eq!(signed.tx.id, id);
    assert!(!signed.tx.witness.signatures.is_empty());

    let submitted = wallet
        .submit_tx(signed.clone(), SubmitTxOptions::default())
        .await;
    assert_eq!(submitted, Ok(id.clone()));
    assert_eq!(backend.submitted.lock().unwrap().as_slice(), &[signed.wire_bytes]);
    assert!(wallet.transactions().is_in_flight(&id));
}

#[tokio::test]
async fn sign_data_rejects_foreign_addresses() {
    let backend = backend_with_funds();
    let key_agent = Arc::new(FakeKeyAgent::new(3));
    let stored = vec![key_agent
        .derive_address(AddressType::External, 0)
        .await
        .unwrap()];
    let mut stores = WalletStores::in_memory();
    stores.addresses = Arc::new(InMemoryStore::with_value(stored));
    let wallet = Wallet::new(
        props(),
        WalletDependencies::new(WalletProviders::from_backend(backend), key_agent, stores),
    )
    .await;

    let signature = wallet
        .sign_data(SignDataProps {
            sign_with: "addr_ext_0".to_string(),
            payload: vec![0xca, 0xfe],
        })
        .await
        .unwrap();
    assert_eq!(signature.key, "pub_External_0");

    let foreign = wallet
        .sign_data(SignDataProps {
            sign_with: "addr_somebody_else".to_string(),
            payload: vec![],
        })
        .await;
    assert_eq!(
        foreign,
        Err(WalletError::UnknownAddress("addr_somebody_else".to_string()))
    );
}
