use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolParameters {
    pub min_fee_a: u64,
    pub min_fee_b: u64,
    pub max_tx_size: u32,
    pub key_deposit: u64,
    pub pool_deposit: u64,
    pub coins_per_utxo_byte: u64,
    pub collateral_percentage: u32,
    pub max_collateral_inputs: u32,
    pub protocol_version: (u32, u32),
}

impl ProtocolParameters {
    /// Linear fee for a transaction of `size` bytes
    pub fn min_fee(&self, size: usize) -> u64 {
        self.min_fee_a
            .saturating_mul(size as u64)
            .saturating_add(self.min_fee_b)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenesisParameters {
    pub network_id: u8,
    pub network_magic: u32,
    pub system_start: DateTime<Utc>,
    pub slot_length: Duration,
    pub epoch_length: u64,
    pub security_parameter: u64,
    pub active_slots_coefficient: f64,
    pub max_lovelace_supply: u64,
}
