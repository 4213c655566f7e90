use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub type Slot = u64;
pub type BlockNo = u64;

/// Latest observed chain head
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tip {
    pub slot: Slot,
    pub block_no: BlockNo,
    pub hash: String,
}

/// Start boundary of an era
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EraStart {
    pub slot: Slot,
    pub epoch: u64,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EraParameters {
    pub epoch_length: u64,
    pub slot_length: Duration,
}

/// Maps a slot range to epoch length and slot length
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EraSummary {
    pub start: EraStart,
    pub parameters: EraParameters,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochInfo {
    pub epoch_no: u64,
    pub first_slot: Slot,
    pub last_slot: Slot,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Every tracked provider has answered and none has a request outstanding
    pub is_settled: bool,
    /// Every tracked provider answered within the staleness bound
    pub is_up_to_date: bool,
}
