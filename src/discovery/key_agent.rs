use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

use crate::models::{
    Address, AddressType, DataSignature, GroupedAddress, KeyPath, KeyRole, RewardAccount,
    TransactionId, TxBody, Witness,
};
use crate::utils::lock;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyAgentError {
    #[error("key agent holds no signing keys")]
    WatchOnly,
    #[error("no {kind:?} address at index {index}")]
    OutOfRange { kind: AddressType, index: u32 },
    #[error("signing failed: {0}")]
    Signing(String),
}

/// Key management capability; keys themselves never leave the agent
#[async_trait]
pub trait KeyAgent: Send + Sync {
    fn account_index(&self) -> u32;

    fn network_id(&self) -> u8;

    /// Addresses the agent has handed out so far
    fn known_addresses(&self) -> Vec<GroupedAddress>;

    fn set_known_addresses(&self, addresses: Vec<GroupedAddress>);

    async fn derive_address(
        &self,
        kind: AddressType,
        index: u32,
    ) -> Result<GroupedAddress, KeyAgentError>;

    async fn derive_public_key(&self, path: KeyPath) -> Result<String, KeyAgentError>;

    async fn sign_transaction(
        &self,
        id: &TransactionId,
        body: &TxBody,
    ) -> Result<Witness, KeyAgentError>;

    async fn sign_blob(&self, path: KeyPath, payload: &[u8]) -> Result<DataSignature, KeyAgentError>;
}

/// Account export consumed by [`WatchOnlyKeyAgent`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAddresses {
    #[serde(default)]
    pub account_index: u32,
    pub network_id: u8,
    pub reward_account: RewardAccount,
    pub external: Vec<Address>,
    #[serde(default)]
    pub internal: Vec<Address>,
}

/// Key agent over a fixed list of pre-derived addresses. Cannot sign.
pub struct WatchOnlyKeyAgent {
    account: AccountAddresses,
    known: Mutex<Vec<GroupedAddress>>,
}

impl WatchOnlyKeyAgent {
    pub fn new(account: AccountAddresses) -> Self {
        Self {
            account,
            known: Mutex::new(Vec::new()),
        }
    }

    /// Load an account export (JSON) from disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(&path)
            .with_context(|| format!("Failed to open account file at {:?}", path.as_ref()))?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .with_context(|| format!("Failed to read account file at {:?}", path.as_ref()))?;

        let account: AccountAddresses = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse account file at {:?}", path.as_ref()))?;
        if account.external.is_empty() {
            anyhow::bail!("Account file {:?} lists no addresses", path.as_ref());
        }
        Ok(Self::new(account))
    }

    fn grouped(&self, kind: AddressType, index: u32, address: Address) -> GroupedAddress {
        GroupedAddress {
            address,
            reward_account: self.account.reward_account.clone(),
            network_id: self.account.network_id,
            account_index: self.account.account_index,
            index,
            kind,
            stake_key_derivation_path: Some(KeyPath {
                role: KeyRole::Stake,
                index: 0,
            }),
        }
    }
}

#[async_trait]
impl KeyAgent for WatchOnlyKeyAgent {
    fn account_index(&self) -> u32 {
        self.account.account_index
    }

    fn network_id(&self) -> u8 {
        self.account.network_id
    }

    fn known_addresses(&self) -> Vec<GroupedAddress> {
        lock(&self.known).clone()
    }

    fn set_known_addresses(&self, addresses: Vec<GroupedAddress>) {
        *lock(&self.known) = addresses;
    }

    async fn derive_address(
        &self,
        kind: AddressType,
        index: u32,
    ) -> Result<GroupedAddress, KeyAgentError> {
        let chain = match kind {
            AddressType::External => &self.account.external,
            AddressType::Internal => &self.account.internal,
        };
        chain
            .get(index as usize)
            .cloned()
            .map(|address| self.grouped(kind, index, address))
            .ok_or(KeyAgentError::OutOfRange { kind, index })
    }

    async fn derive_public_key(&self, _path: KeyPath) -> Result<String, KeyAgentError> {
        Err(KeyAgentError::WatchOnly)
    }

    async fn sign_transaction(
        &self,
        _id: &TransactionId,
        _body: &TxBody,
    ) -> Result<Witness, KeyAgentError> {
        Err(KeyAgentError::WatchOnly)
    }

    async fn sign_blob(&self, _path: KeyPath, _payload: &[u8]) -> Result<DataSignature, KeyAgentError> {
        Err(KeyAgentError::WatchOnly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn account() -> AccountAddresses {
        AccountAddresses {
            account_index: 0,
            network_id: 0,
            reward_account: "stake_test1".into(),
            external: vec!["addr_test1".into(), "addr_test2".into()],
            internal: vec![],
        }
    }

    #[tokio::test]
    async fn derives_from_the_exported_chains() {
        let agent = WatchOnlyKeyAgent::new(account());
        let second = agent.derive_address(AddressType::External, 1).await.unwrap();
        assert_eq!(second.address, Address::from("addr_test2"));
        assert_eq!(second.index, 1);
        assert_eq!(
            agent.derive_address(AddressType::Internal, 0).await,
            Err(KeyAgentError::OutOfRange {
                kind: AddressType::Internal,
                index: 0
            })
        );
        assert_eq!(
            agent.sign_blob(KeyPath { role: KeyRole::External, index: 0 }, b"x").await,
            Err(KeyAgentError::WatchOnly)
        );
    }

    #[test]
    fn loads_account_file() {
        let path = std::env::temp_dir().join(format!("watch-only-{}.json", std::process::id()));
        let mut file = File::create(&path).unwrap();
        file.write_all(serde_json::to_string(&account()).unwrap().as_bytes())
            .unwrap();

        let agent = WatchOnlyKeyAgent::from_file(&path).unwrap();
        assert_eq!(agent.network_id(), 0);
        assert!(agent.known_addresses().is_empty());
        std::fs::remove_file(path).unwrap();

        assert!(WatchOnlyKeyAgent::from_file("/nonexistent/account.json").is_err());
    }
}
