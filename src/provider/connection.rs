use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

use crate::provider::NetworkInfoProvider;
use crate::tracker::{Shutdown, Subscription, TaskGroup, TrackerSubject};

/// Whether fetch loops may reach the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Up,
    Down,
}

impl ConnectionStatus {
    pub fn is_up(&self) -> bool {
        matches!(self, ConnectionStatus::Up)
    }
}

/// Up/down gate shared by every retry-driven loop
pub struct ConnectionStatusTracker {
    status: TrackerSubject<ConnectionStatus>,
    tasks: TaskGroup,
}

impl ConnectionStatusTracker {
    /// A tracker that reports `Up` until told otherwise
    pub fn new() -> Self {
        Self {
            status: TrackerSubject::with_value(ConnectionStatus::Up),
            tasks: TaskGroup::new("connection"),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.value().unwrap_or(ConnectionStatus::Down)
    }

    pub fn subscribe(&self) -> Subscription<ConnectionStatus> {
        self.status.subscribe()
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        if self.status.next_distinct(status) {
            match status {
                ConnectionStatus::Up => info!("Connection UP"),
                ConnectionStatus::Down => warn!("Connection DOWN"),
            }
        }
    }

    /// Start a background task that derives the status from provider health checks
    pub fn start_health_check_task(
        self: &Arc<Self>,
        provider: Arc<dyn NetworkInfoProvider>,
        interval: Duration,
    ) {
        let tracker = Arc::downgrade(self);
        self.tasks.spawn(async move {
            let mut interval = time::interval(interval);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                let healthy = match provider.health_check().await {
                    Ok(response) => response.ok,
                    Err(e) => {
                        warn!("Health check failed: {}", e);
                        false
                    }
                };

                let Some(tracker) = tracker.upgrade() else {
                    break;
                };
                tracker.set_status(if healthy {
                    ConnectionStatus::Up
                } else {
                    ConnectionStatus::Down
                });
            }
        });
    }
}

impl Default for ConnectionStatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown for ConnectionStatusTracker {
    fn shutdown(&self) {
        self.tasks.stop();
        self.status.complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EraSummary, GenesisParameters, ProtocolParameters, Tip};
    use crate::provider::{HealthCheckResponse, ProviderError, ProviderFailure, ProviderResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Flaky {
        healthy: AtomicBool,
    }

    fn unsupported<T>() -> ProviderResult<T> {
        Err(ProviderError::new(ProviderFailure::NotImplemented, "unused"))
    }

    #[async_trait]
    impl NetworkInfoProvider for Flaky {
        async fn ledger_tip(&self) -> ProviderResult<Tip> {
            unsupported()
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
            Ok(HealthCheckResponse {
                ok: self.healthy.load(Ordering::SeqCst),
                local_node: None,
            })
        }
    }

    #[tokio::test]
    async fn health_check_flips_status() {
        let provider = Arc::new(Flaky {
            healthy: AtomicBool::new(false),
        });
        let tracker = Arc::new(ConnectionStatusTracker::new());
        let mut status = tracker.subscribe();
        tracker.start_health_check_task(provider.clone(), Duration::from_millis(5));

        assert!(status.wait_for(|s| !s.is_up()).await.is_some());
        provider.healthy.store(true, Ordering::SeqCst);
        assert!(status.wait_for(|s| s.is_up()).await.is_some());

        tracker.shutdown();
        tracker.shutdown();
    }
}
