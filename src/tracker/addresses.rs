use log::{debug, error, info};
use std::sync::Arc;

use crate::discovery::{AddressDiscovery, DiscoveryError, KeyAgent};
use crate::models::GroupedAddress;
use crate::provider::ConnectionStatus;
use crate::store::Store;
use crate::tracker::{
    ColdProvider, PersistentDocumentTracker, RetryBackoffConfig, Shutdown, Subscription, TaskGroup,
    TrackerError,
};

/// Wallet addresses: restored from the store, taken from the key agent, or
/// discovered on chain when neither knows any
pub struct AddressTracker {
    document: Arc<PersistentDocumentTracker<Vec<GroupedAddress>>>,
    tasks: TaskGroup,
}

impl AddressTracker {
    pub async fn new(store: Store<Vec<GroupedAddress>>) -> Self {
        Self {
            document: Arc::new(PersistentDocumentTracker::load("addresses", store).await),
            tasks: TaskGroup::new("addresses"),
        }
    }

    pub fn value(&self) -> Vec<GroupedAddress> {
        self.document.value().unwrap_or_default()
    }

    pub fn subscribe(&self) -> Subscription<Vec<GroupedAddress>> {
        self.document.subscribe()
    }

    pub async fn first_value(&self) -> Result<Vec<GroupedAddress>, TrackerError> {
        self.document.first_value().await
    }

    /// Waits until at least one address is known
    pub async fn first_non_empty(&self) -> Result<Vec<GroupedAddress>, TrackerError> {
        self.document
            .subscribe()
            .wait_for(|addresses| !addresses.is_empty())
            .await
            .ok_or(TrackerError::Completed)
    }

    pub async fn start(
        &self,
        key_agent: Arc<dyn KeyAgent>,
        discovery: Arc<dyn AddressDiscovery>,
        connection: Subscription<ConnectionStatus>,
        retry: RetryBackoffConfig,
    ) {
        let known = key_agent.known_addresses();
        let stored = self.value();

        if !known.is_empty() {
            self.document.accept(known).await;
            return;
        }
        if !stored.is_empty() {
            debug!("Restoring {} stored addresses into the key agent", stored.len());
            key_agent.set_known_addresses(stored);
            return;
        }

        debug!("No addresses available; initiating address discovery process");
        let document = self.document.clone();
        let agent = key_agent.clone();
        let mut discover: ColdProvider<Vec<GroupedAddress>, DiscoveryError> =
            ColdProvider::new("address-discovery", retry, connection, move || {
                let discovery = discovery.clone();
                let agent = agent.clone();
                async move { discovery.discover(agent.as_ref()).await }
            });

        self.tasks.spawn(async move {
            match discover.fetch().await {
                Ok(addresses) if !addresses.is_empty() => {
                    info!("Discovered {} addresses", addresses.len());
                    key_agent.set_known_addresses(addresses.clone());
                    document.accept(addresses).await;
                }
                Ok(_) => error!("Address discovery returned no addresses"),
                Err(e) => error!("Failed to complete the address discovery process: {}", e),
            }
        });
    }
}

impl Shutdown for AddressTracker {
    fn shutdown(&self) {
        self.tasks.stop();
        self.document.complete();
    }
}
