use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::models::{SyncStatus, Tip};
use crate::provider::{ConnectionStatus, NetworkInfoProvider};
use crate::store::Store;
use crate::tracker::{
    ColdProvider, EventChannel, FatalError, PersistentDocumentTracker, PollingConfig, RetryError,
    Shutdown, Subscription, TaskGroup, TrackerError,
};

/// Chain head, polled at an adaptive interval
pub struct TipTracker {
    document: Arc<PersistentDocumentTracker<Tip>>,
    sync_requested: Arc<Notify>,
    tasks: TaskGroup,
}

/// Next poll interval: back to the minimum after a change or while the
/// wallet is unsettled, otherwise doubled up to `max`
fn next_interval(current: Duration, changed: bool, settled: bool, min: Duration, max: Duration) -> Duration {
    if changed || !settled {
        min
    } else {
        current.saturating_mul(2).clamp(min, max)
    }
}

impl TipTracker {
    pub async fn new(store: Store<Tip>) -> Self {
        Self {
            document: Arc::new(PersistentDocumentTracker::load("tip", store).await),
            sync_requested: Arc::new(Notify::new()),
            tasks: TaskGroup::new("tip"),
        }
    }

    pub fn value(&self) -> Option<Tip> {
        self.document.value()
    }

    pub fn subscribe(&self) -> Subscription<Tip> {
        self.document.subscribe()
    }

    pub async fn first_value(&self) -> Result<Tip, TrackerError> {
        self.document.first_value().await
    }

    /// Polls right away and resets the interval. A fetch still waiting on
    /// the provider or sleeping through retry backoff is dropped in favour
    /// of a fresh one, so its backoff starts over.
    pub fn sync(&self) {
        self.sync_requested.notify_one();
    }

    pub fn start(
        &self,
        provider: Arc<dyn NetworkInfoProvider>,
        connection: Subscription<ConnectionStatus>,
        sync_status: Subscription<SyncStatus>,
        polling: &PollingConfig,
        fatal: Arc<EventChannel<FatalError>>,
    ) {
        let document = self.document.clone();
        let sync_requested = self.sync_requested.clone();
        let min = polling.interval;
        let max = polling.max_interval.max(min);
        let mut reconnects = connection.clone();
        reconnects.mark_seen();

        let mut fetcher = ColdProvider::new("tip", polling.retry.clone(), connection, move || {
            let provider = provider.clone();
            async move { provider.ledger_tip().await }
        });

        self.tasks.spawn(async move {
            let mut interval = min;
            // the first tip after startup or a reconnect is taken as is
            let mut resync = true;
            loop {
                let fetched = tokio::select! {
                    result = fetcher.fetch() => result,
                    _ = sync_requested.notified() => {
                        debug!("tip: sync requested, restarting fetch");
                        interval = min;
                        continue;
                    }
                };
                match fetched {
                    Ok(tip) => {
                        if reconnects.has_changed() {
                            reconnects.mark_seen();
                            resync = true;
                        }
                        let current = document.value();
                        let behind = current.as_ref().is_some_and(|c| tip.slot < c.slot);
                        let changed = if behind && !resync {
                            debug!(
                                "tip: ignoring slot {} behind current {}",
                                tip.slot,
                                current.map_or(0, |c| c.slot)
                            );
                            false
                        } else {
                            if resync && behind {
                                info!("tip: resynced to provider at slot {}", tip.slot);
                            }
                            document.accept(tip).await
                        };
                        resync = false;
                        let settled = sync_status.latest().is_some_and(|s| s.is_settled);
                        interval = next_interval(interval, changed, settled, min, max);
                    }
                    Err(RetryError::Cancelled) => break,
                    Err(e) => {
                        if let Some(error) = FatalError::from_retry("tip", &e) {
                            fatal.emit(error);
                        }
                        interval = min;
                    }
                }

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = sync_requested.notified() => {
                        debug!("tip: sync requested");
                        interval = min;
                    }
                }
            }
            debug!("tip: polling stopped");
        });
    }
}

impl Shutdown for TipTracker {
    fn shutdown(&self) {
        self.tasks.stop();
        self.document.complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EraSummary, GenesisParameters, ProtocolParameters};
    use crate::provider::{HealthCheckResponse, ProviderError, ProviderFailure, ProviderResult};
    use crate::store::InMemoryStore;
    use crate::tracker::{RetryBackoffConfig, TrackerSubject};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedTips {
        slots: Mutex<VecDeque<u64>>,
        calls: AtomicUsize,
        failing: AtomicBool,
    }

    impl ScriptedTips {
        fn new(slots: &[u64]) -> Arc<Self> {
            Arc::new(Self {
                slots: Mutex::new(slots.iter().copied().collect()),
                calls: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
            })
        }
    }

    fn unsupported<T>() -> ProviderResult<T> {
        Err(ProviderError::new(ProviderFailure::NotImplemented, "unused"))
    }

    #[async_trait]
    impl NetworkInfoProvider for ScriptedTips {
        async fn ledger_tip(&self) -> ProviderResult<Tip> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(ProviderError::new(ProviderFailure::ConnectionFailure, "reset"));
            }
            let mut slots = self.slots.lock().unwrap();
            let slot = if slots.len() > 1 {
                slots.pop_front().unwrap()
            } else {
                *slots.front().unwrap()
            };
            Ok(Tip {
                slot,
                block_no: slot / 20,
                hash: format!("{slot:x}"),
            })
        }
        async fn era_summaries(&self) -> ProviderResult<Vec<EraSummary>> {
            unsupported()
        }
        async fn protocol_parameters(&self) -> ProviderResult<ProtocolParameters> {
            unsupported()
        }
        async fn genesis_parameters(&self) -> ProviderResult<GenesisParameters> {
            unsupported()
        }
        async fn health_check(&self) -> ProviderResult<HealthCheckResponse> {
            unsupported()
        }
    }

    fn polling() -> PollingConfig {
        PollingConfig {
            interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(8),
            considered_out_of_sync_after: Duration::from_secs(180),
            retry: RetryBackoffConfig {
                jitter: false,
                ..Default::default()
            },
        }
    }

    #[test]
    fn interval_doubles_while_settled_and_unchanged() {
        let min = Duration::from_secs(1);
        let max = Duration::from_secs(8);
        let mut interval = min;
        for expected in [2, 4, 8, 8] {
            interval = next_interval(interval, false, true, min, max);
            assert_eq!(interval, Duration::from_secs(expected));
        }
        assert_eq!(next_interval(interval, true, true, min, max), min);
        assert_eq!(next_interval(interval, false, false, min, max), min);
    }

    #[tokio::test(start_paused = true)]
    async fn emitted_slots_never_decrease_while_connected() {
        let provider = ScriptedTips::new(&[10, 30, 20, 25, 40]);
        let connection = TrackerSubject::with_value(ConnectionStatus::Up);
        let sync_status = TrackerSubject::with_value(SyncStatus::default());
        let tracker = TipTracker::new(Arc::new(InMemoryStore::<Tip>::new())).await;
        let mut tips = tracker.subscribe();

        tracker.start(
            provider.clone(),
            connection.subscribe(),
            sync_status.subscribe(),
            &polling(),
            Arc::new(EventChannel::new("fatal")),
        );

        let mut emitted = Vec::new();
        while let Some(tip) = tips.next().await {
            emitted.push(tip.slot);
            if tip.slot == 40 {
                break;
            }
        }
        assert_eq!(emitted, vec![10, 30, 40]);
        tracker.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn accepts_lower_slot_after_reconnect() {
        let provider = ScriptedTips::new(&[50, 20]);
        let connection = TrackerSubject::with_value(ConnectionStatus::Up);
        let sync_status = TrackerSubject::with_value(SyncStatus::default());
        let tracker = TipTracker::new(Arc::new(InMemoryStore::<Tip>::new())).await;
        let mut tips = tracker.subscribe();

        tracker.start(
            provider.clone(),
            connection.subscribe(),
            sync_status.subscribe(),
            &polling(),
            Arc::new(EventChannel::new("fatal")),
        );
        assert_eq!(tips.next().await.map(|t| t.slot), Some(50));

        connection.next(ConnectionStatus::Down);
        tokio::time::sleep(Duration::from_secs(3)).await;
        connection.next(ConnectionStatus::Up);
        assert_eq!(tips.next().await.map(|t| t.slot), Some(20));
        tracker.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn sync_polls_immediately_and_shutdown_stops_polling() {
        let provider = ScriptedTips::new(&[1]);
        let connection = TrackerSubject::with_value(ConnectionStatus::Up);
        let settled = SyncStatus {
            is_settled: true,
            is_up_to_date: true,
        };
        let sync_status = TrackerSubject::with_value(settled);
        let tracker = TipTracker::new(Arc::new(InMemoryStore::<Tip>::new())).await;
        let mut config = polling();
        config.interval = Duration::from_secs(60);
        config.max_interval = Duration::from_secs(60);

        tracker.start(
            provider.clone(),
            connection.subscribe(),
            sync_status.subscribe(),
            &config,
            Arc::new(EventChannel::new("fatal")),
        );
        tracker.first_value().await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        tracker.sync();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        tracker.shutdown();
        tracker.shutdown();
        tracker.sync();
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sync_during_backoff_fetches_now_and_restarts_backoff() {
        let provider = ScriptedTips::new(&[7]);
        provider.failing.store(true, Ordering::SeqCst);
        let connection = TrackerSubject::with_value(ConnectionStatus::Up);
        let sync_status = TrackerSubject::with_value(SyncStatus::default());
        let tracker = TipTracker::new(Arc::new(InMemoryStore::<Tip>::new())).await;

        tracker.start(
            provider.clone(),
            connection.subscribe(),
            sync_status.subscribe(),
            &polling(),
            Arc::new(EventChannel::new("fatal")),
        );

        // attempts at 0, 1, 3, 7 and 15 seconds; the next waits 16 seconds
        tokio::time::sleep(Duration::from_millis(15_500)).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 5);

        tracker.sync();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 6);

        // backoff starts again from the initial interval
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 7);

        provider.failing.store(false, Ordering::SeqCst);
        tracker.sync();
        assert_eq!(tracker.first_value().await.map(|t| t.slot), Ok(7));
        tracker.shutdown();
    }
}
