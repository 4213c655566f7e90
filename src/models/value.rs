use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::ids::{Address, AssetId, TransactionId};

/// Coins plus native asset quantities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value {
    pub coins: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub assets: BTreeMap<AssetId, u64>,
}

impl Value {
    pub fn coins(coins: u64) -> Self {
        Self {
            coins,
            assets: BTreeMap::new(),
        }
    }

    pub fn has_assets(&self) -> bool {
        self.assets.values().any(|quantity| *quantity > 0)
    }

    pub fn add(&mut self, other: &Value) {
        self.coins = self.coins.saturating_add(other.coins);
        for (asset, quantity) in &other.assets {
            let entry = self.assets.entry(asset.clone()).or_insert(0);
            *entry = entry.saturating_add(*quantity);
        }
    }

    /// Saturating subtraction; assets that drop to zero are removed
    pub fn subtract(&mut self, other: &Value) {
        self.coins = self.coins.saturating_sub(other.coins);
        for (asset, quantity) in &other.assets {
            if let Some(entry) = self.assets.get_mut(asset) {
                *entry = entry.saturating_sub(*quantity);
            }
        }
        self.assets.retain(|_, quantity| *quantity > 0);
    }

    /// True when every component of `self` is at least as large as in `other`
    pub fn covers(&self, other: &Value) -> bool {
        self.coins >= other.coins
            && other
                .assets
                .iter()
                .all(|(asset, quantity)| self.assets.get(asset).copied().unwrap_or(0) >= *quantity)
    }

    pub fn sum<'a>(values: impl IntoIterator<Item = &'a Value>) -> Value {
        values.into_iter().fold(Value::default(), |mut total, value| {
            total.add(value);
            total
        })
    }
}

/// Reference to a transaction output
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxIn {
    pub tx_id: TransactionId,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub address: Address,
    pub value: Value,
}

/// Unspent output owned by one of the wallet addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub input: TxIn,
    pub output: TxOut,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(name: &str) -> AssetId {
        AssetId(name.to_string())
    }

    #[test]
    fn add_and_subtract_keep_assets_consistent() {
        let mut total = Value::coins(10);
        let mut other = Value::coins(5);
        other.assets.insert(asset("token"), 3);

        total.add(&other);
        assert_eq!(total.coins, 15);
        assert_eq!(total.assets.get(&asset("token")), Some(&3));

        total.subtract(&other);
        assert_eq!(total, Value::coins(10));
        assert!(!total.has_assets());
    }

    #[test]
    fn covers_checks_every_asset() {
        let mut held = Value::coins(100);
        held.assets.insert(asset("token"), 1);

        let mut wanted = Value::coins(50);
        wanted.assets.insert(asset("token"), 2);
        assert!(!held.covers(&wanted));

        wanted.assets.insert(asset("token"), 1);
        assert!(held.covers(&wanted));
    }
}
