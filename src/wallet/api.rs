use log::debug;

use crate::models::{Address, RewardAccount, Utxo, Value};
use crate::tracker::delegation::reward_accounts_of;
use crate::wallet::{Wallet, WalletError};

/// Largest collateral a dApp may ask for, in lovelace
pub const MAX_COLLATERAL_AMOUNT: u64 = 5_000_000;

/// Picks collateral from the unspendable set, in input order, until
/// `amount` is covered. `Ok(None)` when no collateral was set aside.
pub fn select_collateral(unspendable: &[Utxo], amount: u64) -> Result<Option<Vec<Utxo>>, WalletError> {
    if amount > MAX_COLLATERAL_AMOUNT {
        return Err(WalletError::InvalidConfiguration(format!(
            "requested collateral {} exceeds {}",
            amount, MAX_COLLATERAL_AMOUNT
        )));
    }
    if unspendable.is_empty() {
        return Ok(None);
    }
    if unspendable.iter().any(|utxo| utxo.output.value.has_assets()) {
        return Err(WalletError::CollateralWithAssets);
    }

    let mut sorted = unspendable.to_vec();
    sorted.sort_by(|a, b| a.input.cmp(&b.input));
    let mut selected = Vec::new();
    let mut coins = 0u64;
    for utxo in sorted {
        coins = coins.saturating_add(utxo.output.value.coins);
        selected.push(utxo);
        if coins >= amount {
            return Ok(Some(selected));
        }
    }
    Err(WalletError::InsufficientCollateral {
        requested: amount,
        available: coins,
    })
}

/// Smallest prefix of the largest-first ordering of `available` that
/// covers `amount`
pub fn select_covering(available: &[Utxo], amount: &Value) -> Option<Vec<Utxo>> {
    let mut sorted = available.to_vec();
    sorted.sort_by(|a, b| b.output.value.coins.cmp(&a.output.value.coins));
    let mut selected = Vec::new();
    let mut total = Value::default();
    for utxo in sorted {
        if total.covers(amount) {
            break;
        }
        total.add(&utxo.output.value);
        selected.push(utxo);
    }
    total.covers(amount).then_some(selected)
}

impl Wallet {
    /// Address that receives change; the first known address
    pub fn change_address(&self) -> Option<Address> {
        self.addresses().value().into_iter().next().map(|a| a.address)
    }

    pub fn reward_addresses(&self) -> Vec<RewardAccount> {
        reward_accounts_of(&self.addresses().value())
    }

    pub fn used_addresses(&self) -> Vec<Address> {
        self.addresses()
            .value()
            .into_iter()
            .map(|a| a.address)
            .collect()
    }

    /// Network of the genesis parameters, or the key agent's until those arrive
    pub fn network_id(&self) -> u8 {
        self.genesis_parameters()
            .value()
            .map_or_else(|| self.key_agent().network_id(), |g| g.network_id)
    }

    pub fn collateral(&self, amount: Option<u64>) -> Result<Option<Vec<Utxo>>, WalletError> {
        let amount = amount.unwrap_or(MAX_COLLATERAL_AMOUNT);
        debug!("Selecting {} lovelace of collateral", amount);
        select_collateral(&self.utxo().unspendable(), amount)
    }

    /// Spendable outputs; with `amount`, just enough of them to cover it
    pub fn utxos(&self, amount: Option<&Value>) -> Option<Vec<Utxo>> {
        let available = self.utxo().available();
        match amount {
            Some(amount) => select_covering(&available, amount),
            None => Some(available),
        }
    }
}
