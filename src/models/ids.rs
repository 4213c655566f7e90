use serde::{Deserialize, Serialize};
use std::fmt;

/// Content-derived transaction identifier (hex encoded body hash)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

/// Payment address in its textual (bech32 or base58) form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub String);

/// Stake (reward) account address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RewardAccount(pub String);

/// Stake pool identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(pub String);

/// Native asset identifier (policy id followed by the hex asset name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub String);

impl AssetId {
    /// Policy ids are 28 byte hashes, i.e. the first 56 hex characters
    pub fn policy_id(&self) -> &str {
        let end = self.0.len().min(56);
        &self.0[..end]
    }

    pub fn asset_name(&self) -> &str {
        let start = self.0.len().min(56);
        &self.0[start..]
    }
}

macro_rules! display_inner {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl From<&str> for $ty {
                fn from(value: &str) -> Self {
                    Self(value.to_string())
                }
            }
        )*
    };
}

display_inner!(TransactionId, Address, RewardAccount, PoolId, AssetId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_id_splits_policy_and_name() {
        let policy = "a".repeat(56);
        let id = AssetId(format!("{}{}", policy, "6d696e74"));
        assert_eq!(id.policy_id(), policy);
        assert_eq!(id.asset_name(), "6d696e74");
    }
}
