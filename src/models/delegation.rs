use serde::{Deserialize, Serialize};

use crate::models::ids::{PoolId, RewardAccount};
use crate::models::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StakeKeyStatus {
    Registered,
    Unregistered,
    /// A registration certificate is in flight
    Registering,
    /// A deregistration certificate is in flight
    Unregistering,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardAccountInfo {
    pub address: RewardAccount,
    pub key_status: StakeKeyStatus,
    pub delegatee: Option<PoolId>,
    pub rewards_balance: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoBalance {
    pub total: Value,
    pub available: Value,
    pub unspendable: Value,
}

/// Aggregate wallet balance; derived, never stored
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub utxo: UtxoBalance,
    pub rewards: u64,
    pub deposits: u64,
}
