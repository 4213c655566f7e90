use serde::{Deserialize, Serialize};

use crate::models::ids::{Address, RewardAccount};

/// Derivation chain of a payment address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AddressType {
    External = 0,
    Internal = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyRole {
    External = 0,
    Internal = 1,
    Stake = 2,
    DRep = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyPath {
    pub role: KeyRole,
    pub index: u32,
}

/// A wallet address together with the stake account it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedAddress {
    pub address: Address,
    pub reward_account: RewardAccount,
    pub network_id: u8,
    pub account_index: u32,
    pub index: u32,
    pub kind: AddressType,
    pub stake_key_derivation_path: Option<KeyPath>,
}
