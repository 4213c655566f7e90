use futures::future::select_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::models::SyncStatus;
use crate::provider::{CallStats, ProviderStats};
use crate::tracker::{Shutdown, Subscription, TaskGroup, TrackerSubject};

const RECHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Settled: every provider answered at least once and nothing is pending.
/// Up to date: every provider answered within `window`.
pub fn compute_sync_status(stats: &[CallStats], now: Instant, window: Duration) -> SyncStatus {
    let is_settled = stats.iter().all(|s| s.responded && s.pending == 0);
    let is_up_to_date = stats.iter().all(|s| {
        s.last_response
            .is_some_and(|at| now.saturating_duration_since(at) <= window)
    });
    SyncStatus {
        is_settled,
        is_up_to_date,
    }
}

/// Aggregates the call statistics of every tracked provider
pub struct SyncStatusTracker {
    subject: TrackerSubject<SyncStatus>,
    providers: Vec<Arc<ProviderStats>>,
    window: Duration,
    tasks: TaskGroup,
}

impl SyncStatusTracker {
    pub fn new(providers: Vec<Arc<ProviderStats>>, considered_out_of_sync_after: Duration) -> Self {
        let tracker = Self {
            subject: TrackerSubject::new(),
            providers,
            window: considered_out_of_sync_after,
            tasks: TaskGroup::new("sync-status"),
        };
        tracker.recompute();
        tracker
    }

    pub fn value(&self) -> SyncStatus {
        self.subject.value().unwrap_or_default()
    }

    pub fn subscribe(&self) -> Subscription<SyncStatus> {
        self.subject.subscribe()
    }

    fn recompute(&self) {
        let stats: Vec<CallStats> = self.providers.iter().map(|p| p.snapshot()).collect();
        self.subject
            .next_distinct(compute_sync_status(&stats, Instant::now(), self.window));
    }

    /// Re-evaluates on every provider call and once per second for staleness
    pub fn start(self: &Arc<Self>) {
        let tracker = Arc::downgrade(self);
        let mut receivers: Vec<_> = self.providers.iter().map(|p| p.subscribe()).collect();
        let recheck = RECHECK_INTERVAL.min(self.window);

        self.tasks.spawn(async move {
            loop {
                {
                    let Some(tracker) = tracker.upgrade() else {
                        break;
                    };
                    tracker.recompute();
                }
                if receivers.is_empty() {
                    tokio::time::sleep(recheck).await;
                    continue;
                }
                let changes = receivers.iter_mut().map(|r| Box::pin(r.changed()));
                tokio::select! {
                    (result, _, _) = select_all(changes) => {
                        if result.is_err() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(recheck) => {}
                }
            }
        });
    }
}

impl Shutdown for SyncStatusTracker {
    fn shutdown(&self) {
        self.tasks.stop();
        self.subject.complete();
    }
}
