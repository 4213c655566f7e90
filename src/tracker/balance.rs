use std::sync::Arc;

use crate::models::{Balance, ProtocolParameters, RewardAccountInfo, StakeKeyStatus, Utxo, UtxoBalance};
use crate::tracker::utxo::utxo_value;
use crate::tracker::{Shutdown, Subscription, TaskGroup, TrackerError, TrackerSubject};

/// Balance of the wallet; deposits count every key still registered on chain
pub fn compute_balance(
    protocol_parameters: Option<&ProtocolParameters>,
    total: &[Utxo],
    available: &[Utxo],
    unspendable: &[Utxo],
    reward_accounts: &[RewardAccountInfo],
) -> Balance {
    let rewards = reward_accounts
        .iter()
        .map(|account| account.rewards_balance)
        .sum();
    let registered = reward_accounts
        .iter()
        .filter(|account| {
            matches!(
                account.key_status,
                StakeKeyStatus::Registered | StakeKeyStatus::Unregistering
            )
        })
        .count() as u64;
    let deposits = protocol_parameters.map_or(0, |p| p.key_deposit.saturating_mul(registered));

    Balance {
        utxo: UtxoBalance {
            total: utxo_value(total),
            available: utxo_value(available),
            unspendable: utxo_value(unspendable),
        },
        rewards,
        deposits,
    }
}

/// Derived balance; holds no storage of its own
pub struct BalanceTracker {
    subject: TrackerSubject<Balance>,
    tasks: TaskGroup,
}

/// Inputs of [`BalanceTracker::start`]
pub struct BalanceSources {
    pub protocol_parameters: Subscription<ProtocolParameters>,
    pub total: Subscription<Vec<Utxo>>,
    pub available: Subscription<Vec<Utxo>>,
    pub unspendable: Subscription<Vec<Utxo>>,
    pub reward_accounts: Subscription<Vec<RewardAccountInfo>>,
}

impl BalanceTracker {
    pub fn new() -> Self {
        Self {
            subject: TrackerSubject::new(),
            tasks: TaskGroup::new("balance"),
        }
    }

    pub fn value(&self) -> Option<Balance> {
        self.subject.value()
    }

    pub fn subscribe(&self) -> Subscription<Balance> {
        self.subject.subscribe()
    }

    pub async fn first_value(&self) -> Result<Balance, TrackerError> {
        self.subject.first_value().await
    }

    pub fn start(self: &Arc<Self>, sources: BalanceSources) {
        let tracker = self.clone();
        let BalanceSources {
            mut protocol_parameters,
            mut total,
            mut available,
            mut unspendable,
            mut reward_accounts,
        } = sources;
        self.tasks.spawn(async move {
            loop {
                // nothing to report until the UTXO views exist
                if let (Some(total), Some(available)) = (total.latest(), available.latest()) {
                    let balance = compute_balance(
                        protocol_parameters.latest().as_ref(),
                        &total,
                        &available,
                        &unspendable.latest().unwrap_or_default(),
                        &reward_accounts.latest().unwrap_or_default(),
                    );
                    tracker.subject.next_distinct(balance);
                }
                let open = tokio::select! {
                    open = protocol_parameters.changed() => open,
                    open = total.changed() => open,
                    open = available.changed() => open,
                    open = unspendable.changed() => open,
                    open = reward_accounts.changed() => open,
                };
                if !open {
                    break;
                }
            }
        });
    }
}

impl Default for BalanceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown for BalanceTracker {
    fn shutdown(&self) {
        self.tasks.stop();
        self.subject.complete();
    }
}
