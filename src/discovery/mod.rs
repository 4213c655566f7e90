pub mod key_agent;

pub use key_agent::{AccountAddresses, KeyAgent, KeyAgentError, WatchOnlyKeyAgent};

use async_trait::async_trait;
use log::debug;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{AddressType, GroupedAddress};
use crate::provider::{ChainHistoryProvider, ProviderError, ProviderFailure};
use crate::tracker::Retryable;

pub const DEFAULT_LOOK_AHEAD: u32 = 20;

#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    #[error("chain history lookup failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("address derivation failed: {0}")]
    KeyAgent(#[from] KeyAgentError),
}

impl Retryable for DiscoveryError {
    fn is_retryable(&self) -> bool {
        match self {
            DiscoveryError::Provider(e) => e.is_retryable(),
            DiscoveryError::KeyAgent(_) => false,
        }
    }

    fn failure(&self) -> Option<ProviderFailure> {
        match self {
            DiscoveryError::Provider(e) => Some(e.reason),
            DiscoveryError::KeyAgent(_) => None,
        }
    }
}

/// Finds the addresses of an account that has no known addresses yet
#[async_trait]
pub trait AddressDiscovery: Send + Sync {
    async fn discover(&self, key_agent: &dyn KeyAgent) -> Result<Vec<GroupedAddress>, DiscoveryError>;
}

/// Derives each chain sequentially until `look_ahead` consecutive
/// addresses have no on-chain history
pub struct HdSequentialDiscovery {
    chain_history: Arc<dyn ChainHistoryProvider>,
    look_ahead: u32,
}

impl HdSequentialDiscovery {
    pub fn new(chain_history: Arc<dyn ChainHistoryProvider>, look_ahead: u32) -> Self {
        Self {
            chain_history,
            look_ahead: look_ahead.max(1),
        }
    }

    async fn discover_chain(
        &self,
        key_agent: &dyn KeyAgent,
        kind: AddressType,
    ) -> Result<Vec<GroupedAddress>, DiscoveryError> {
        let mut addresses = Vec::new();
        let mut unused = 0;
        let mut index = 0;
        while unused < self.look_ahead {
            let address = match key_agent.derive_address(kind, index).await {
                Ok(address) => address,
                // agents over a fixed list run out before the gap is reached
                Err(KeyAgentError::OutOfRange { .. }) => break,
                Err(e) => return Err(e.into()),
            };
            let history = self
                .chain_history
                .transactions_by_addresses(std::slice::from_ref(&address.address), None)
                .await?;
            if history.is_empty() {
                unused += 1;
            } else {
                unused = 0;
            }
            addresses.push(address);
            index += 1;
        }
        debug!(
            "Discovered {} {:?} addresses ({} unused at the end)",
            addresses.len(),
            kind,
            unused
        );
        Ok(addresses)
    }
}

#[async_trait]
impl AddressDiscovery for HdSequentialDiscovery {
    async fn discover(&self, key_agent: &dyn KeyAgent) -> Result<Vec<GroupedAddress>, DiscoveryError> {
        let mut addresses = self.discover_chain(key_agent, AddressType::External).await?;
        addresses.extend(self.discover_chain(key_agent, AddressType::Internal).await?);
        Ok(addresses)
    }
}
