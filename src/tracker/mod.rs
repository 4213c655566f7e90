pub mod addresses;
pub mod assets;
pub mod balance;
pub mod delegation;
pub mod epoch;
pub mod events;
pub mod lifecycle;
pub mod persistent;
pub mod reemitter;
pub mod retry;
pub mod subject;
pub mod sync_status;
pub mod tip;
pub mod transactions;
pub mod utxo;

pub use addresses::AddressTracker;
pub use assets::AssetsTracker;
pub use balance::{compute_balance, BalanceSources, BalanceTracker};
pub use delegation::{derive_reward_accounts, DelegationTracker};
pub use epoch::{epoch_info, CurrentEpochTracker};
pub use events::{EventChannel, EventStream};
pub use lifecycle::{Shutdown, TaskGroup};
pub use persistent::PersistentDocumentTracker;
pub use reemitter::{find_lost, loss_threshold, LostTx, Reemitter, Resubmit};
pub use retry::{AnyOf, ColdProvider, FatalError, Once, RetryBackoffConfig, RetryError, Retryable, Trigger};
pub use subject::{Subscription, TrackerSubject};
pub use sync_status::{compute_sync_status, SyncStatusTracker};
pub use tip::TipTracker;
pub use transactions::{TransactionsTracker, TxEvent};
pub use utxo::{partition_utxo, UtxoTracker};

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Timing knobs shared by the polling loops
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Tip poll interval while unsettled or right after a change
    pub interval: Duration,
    /// Upper bound for the adaptive tip interval
    pub max_interval: Duration,
    /// Providers silent for longer than this make the wallet out of date
    pub considered_out_of_sync_after: Duration,
    pub retry: RetryBackoffConfig,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_interval: Duration::from_secs(100),
            considered_out_of_sync_after: Duration::from_secs(180),
            retry: RetryBackoffConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("tracker completed before producing a value")]
    Completed,
    #[error("tracker is shut down")]
    ShutDown,
}
