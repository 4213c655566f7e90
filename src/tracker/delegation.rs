use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::models::{
    Certificate, EpochInfo, GroupedAddress, HydratedTx, RewardAccount, RewardAccountInfo,
    StakeKeyStatus, TxBody, TxInFlight,
};
use crate::provider::{ConnectionStatus, RewardsProvider};
use crate::store::Store;
use crate::tracker::{
    AnyOf, ColdProvider, EventChannel, FatalError, PersistentDocumentTracker, RetryBackoffConfig,
    Shutdown, Subscription, TaskGroup, TrackerSubject,
};

/// Unique reward accounts of `addresses`, in first-seen order
pub fn reward_accounts_of(addresses: &[GroupedAddress]) -> Vec<RewardAccount> {
    let mut accounts: Vec<RewardAccount> = Vec::new();
    for address in addresses {
        if !accounts.contains(&address.reward_account) {
            accounts.push(address.reward_account.clone());
        }
    }
    accounts
}

fn touches_account(body: &TxBody, accounts: &[RewardAccount]) -> bool {
    body.certificates
        .iter()
        .filter_map(Certificate::stake_credential)
        .any(|credential| accounts.contains(credential))
        || body
            .withdrawals
            .iter()
            .any(|w| accounts.contains(&w.stake_address))
}

/// Key status and delegatee of every account, replayed from stake
/// certificates in confirmed history; in-flight certificates turn into
/// `Registering` / `Unregistering`
pub fn derive_reward_accounts(
    accounts: &[RewardAccount],
    history: &[HydratedTx],
    in_flight: &[TxInFlight],
    rewards: &BTreeMap<RewardAccount, u64>,
) -> Vec<RewardAccountInfo> {
    accounts
        .iter()
        .map(|account| {
            let mut key_status = StakeKeyStatus::Unregistered;
            let mut delegatee = None;
            let confirmed = history.iter().flat_map(|tx| tx.body.certificates.iter());
            for certificate in confirmed {
                match certificate {
                    Certificate::StakeRegistration { stake_credential } if stake_credential == account => {
                        key_status = StakeKeyStatus::Registered;
                    }
                    Certificate::StakeDeregistration { stake_credential } if stake_credential == account => {
                        key_status = StakeKeyStatus::Unregistered;
                        delegatee = None;
                    }
                    Certificate::StakeDelegation {
                        stake_credential,
                        pool_id,
                    } if stake_credential == account => {
                        delegatee = Some(pool_id.clone());
                    }
                    _ => {}
                }
            }

            let pending = in_flight.iter().flat_map(|entry| entry.tx.body.certificates.iter());
            for certificate in pending {
                match certificate {
                    Certificate::StakeRegistration { stake_credential }
                        if stake_credential == account && key_status == StakeKeyStatus::Unregistered =>
                    {
                        key_status = StakeKeyStatus::Registering;
                    }
                    Certificate::StakeDeregistration { stake_credential }
                        if stake_credential == account && key_status == StakeKeyStatus::Registered =>
                    {
                        key_status = StakeKeyStatus::Unregistering;
                    }
                    _ => {}
                }
            }

            RewardAccountInfo {
                address: account.clone(),
                key_status,
                delegatee,
                rewards_balance: rewards.get(account).copied().unwrap_or(0),
            }
        })
        .collect()
}

/// Reward accounts with their registration, delegation and rewards balance
pub struct DelegationTracker {
    document: Arc<PersistentDocumentTracker<Vec<RewardAccountInfo>>>,
    rewards: TrackerSubject<BTreeMap<RewardAccount, u64>>,
    stake_activity: TrackerSubject<usize>,
    tasks: TaskGroup,
}

impl DelegationTracker {
    pub async fn new(store: Store<Vec<RewardAccountInfo>>) -> Self {
        let document = PersistentDocumentTracker::load("reward-accounts", store).await;
        let rewards = document
            .value()
            .unwrap_or_default()
            .into_iter()
            .map(|info| (info.address, info.rewards_balance))
            .collect();
        Self {
            document: Arc::new(document),
            rewards: TrackerSubject::with_value(rewards),
            stake_activity: TrackerSubject::with_value(0),
            tasks: TaskGroup::new("delegation"),
        }
    }

    pub fn reward_accounts(&self) -> Vec<RewardAccountInfo> {
        self.document.value().unwrap_or_default()
    }

    pub fn subscribe(&self) -> Subscription<Vec<RewardAccountInfo>> {
        self.document.subscribe()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn start(
        self: &Arc<Self>,
        provider: Arc<dyn RewardsProvider>,
        addresses: Subscription<Vec<GroupedAddress>>,
        epoch: Subscription<EpochInfo>,
        history: Subscription<Vec<HydratedTx>>,
        in_flight: Subscription<Vec<TxInFlight>>,
        connection: Subscription<ConnectionStatus>,
        retry: RetryBackoffConfig,
        fatal: Arc<EventChannel<FatalError>>,
    ) {
        let current_addresses = addresses.clone();
        let fetcher: ColdProvider<BTreeMap<RewardAccount, u64>> =
            ColdProvider::new("rewards", retry, connection, move || {
                let provider = provider.clone();
                let accounts = reward_accounts_of(&current_addresses.latest().unwrap_or_default());
                async move {
                    let mut balances = BTreeMap::new();
                    for account in accounts {
                        let balance = provider.rewards_balance(&account).await?;
                        balances.insert(account, balance);
                    }
                    Ok(balances)
                }
            })
            .with_equals(|a, b| a == b);

        let tracker = self.clone();
        let mut ready = addresses.clone();
        let mut epochs = epoch;
        let mut activity = self.stake_activity.subscribe();
        let mut address_changes = addresses.clone();
        self.tasks.spawn(async move {
            if ready.wait_for(|a| !a.is_empty()).await.is_none() {
                return;
            }
            epochs.mark_seen();
            activity.mark_seen();
            address_changes.mark_seen();
            let trigger = AnyOf(AnyOf(epochs, activity), address_changes);
            fetcher
                .run(trigger, fatal, move |balances| {
                    let tracker = tracker.clone();
                    async move {
                        tracker.rewards.next(balances);
                    }
                })
                .await;
        });

        let tracker = self.clone();
        let mut addresses = addresses;
        let mut history = history;
        let mut in_flight = in_flight;
        let mut rewards = self.rewards.subscribe();
        self.tasks.spawn(async move {
            loop {
                let accounts = reward_accounts_of(&addresses.latest().unwrap_or_default());
                if !accounts.is_empty() {
                    let confirmed = history.latest().unwrap_or_default();
                    let stake_txs = confirmed
                        .iter()
                        .filter(|tx| touches_account(&tx.body, &accounts))
                        .count();
                    if tracker.stake_activity.next_distinct(stake_txs) {
                        debug!("{} stake transactions in history", stake_txs);
                    }
                    let infos = derive_reward_accounts(
                        &accounts,
                        &confirmed,
                        &in_flight.latest().unwrap_or_default(),
                        &rewards.latest().unwrap_or_default(),
                    );
                    tracker.document.accept(infos).await;
                }
                let open = tokio::select! {
                    open = addresses.changed() => open,
                    open = history.changed() => open,
                    open = in_flight.changed() => open,
                    open = rewards.changed() => open,
                };
                if !open {
                    break;
                }
            }
        });
    }
}

impl Shutdown for DelegationTracker {
    fn shutdown(&self) {
        self.tasks.stop();
        self.document.complete();
        self.rewards.complete();
        self.stake_activity.complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OutgoingTx, PoolId, TransactionId, Withdrawal};

    fn account() -> RewardAccount {
        RewardAccount::from("stake_test1")
    }

    fn confirmed(certificates: Vec<Certificate>) -> HydratedTx {
        HydratedTx {
            id: TransactionId::from("tx"),
            block_no: 1,
            slot: 1,
            body: TxBody {
                certificates,
                ..Default::default()
            },
        }
    }

    fn in_flight(certificates: Vec<Certificate>) -> TxInFlight {
        TxInFlight {
            tx: OutgoingTx {
                id: TransactionId::from("pending"),
                body: TxBody {
                    certificates,
                    ..Default::default()
                },
                wire_bytes: vec![],
                context: None,
            },
            submitted_at: None,
        }
    }

    #[test]
    fn registration_and_delegation_come_from_history() {
        let history = vec![
            confirmed(vec![Certificate::StakeRegistration {
                stake_credential: account(),
            }]),
            confirmed(vec![Certificate::StakeDelegation {
                stake_credential: account(),
                pool_id: PoolId::from("pool1"),
            }]),
        ];
        let rewards = BTreeMap::from([(account(), 42)]);
        let infos = derive_reward_accounts(&[account()], &history, &[], &rewards);
        assert_eq!(infos[0].key_status, StakeKeyStatus::Registered);
        assert_eq!(infos[0].delegatee, Some(PoolId::from("pool1")));
        assert_eq!(infos[0].rewards_balance, 42);

        let pending = vec![in_flight(vec![Certificate::StakeDeregistration {
            stake_credential: account(),
        }])];
        let infos = derive_reward_accounts(&[account()], &history, &pending, &rewards);
        assert_eq!(infos[0].key_status, StakeKeyStatus::Unregistering);
    }

    #[test]
    fn unregistered_account_with_pending_registration_is_registering() {
        let pending = vec![in_flight(vec![Certificate::StakeRegistration {
            stake_credential: account(),
        }])];
        let infos = derive_reward_accounts(&[account()], &[], &pending, &BTreeMap::new());
        assert_eq!(infos[0].key_status, StakeKeyStatus::Registering);
        assert_eq!(infos[0].delegatee, None);
    }

    #[test]
    fn withdrawals_count_as_stake_activity() {
        let body = TxBody {
            withdrawals: vec![Withdrawal {
                stake_address: account(),
                quantity: 5,
            }],
            ..Default::default()
        };
        assert!(touches_account(&body, &[account()]));
        assert!(!touches_account(&TxBody::default(), &[account()]));
    }
}
