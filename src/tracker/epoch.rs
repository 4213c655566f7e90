use log::info;
use std::sync::Arc;

use crate::models::{EpochInfo, EraSummary, Slot, Tip};
use crate::tracker::{Shutdown, Subscription, TaskGroup, TrackerError, TrackerSubject};

/// Epoch containing `slot`, or `None` if no era covers it
pub fn epoch_info(slot: Slot, era_summaries: &[EraSummary]) -> Option<EpochInfo> {
    let era = era_summaries
        .iter()
        .filter(|era| era.start.slot <= slot)
        .max_by_key(|era| era.start.slot)?;
    let epoch_length = era.parameters.epoch_length;
    if epoch_length == 0 {
        return None;
    }
    let epochs_into_era = (slot - era.start.slot) / epoch_length;
    let first_slot = era.start.slot + epochs_into_era * epoch_length;
    Some(EpochInfo {
        epoch_no: era.start.epoch + epochs_into_era,
        first_slot,
        last_slot: first_slot + epoch_length - 1,
    })
}

/// Current epoch, derived from tip and era summaries; emits only when the
/// epoch number changes
pub struct CurrentEpochTracker {
    subject: TrackerSubject<EpochInfo>,
    tasks: TaskGroup,
}

impl CurrentEpochTracker {
    pub fn new() -> Self {
        Self {
            subject: TrackerSubject::new(),
            tasks: TaskGroup::new("epoch"),
        }
    }

    pub fn value(&self) -> Option<EpochInfo> {
        self.subject.value()
    }

    pub fn subscribe(&self) -> Subscription<EpochInfo> {
        self.subject.subscribe()
    }

    pub fn changes(&self) -> Subscription<EpochInfo> {
        self.subject.changes()
    }

    pub async fn first_value(&self) -> Result<EpochInfo, TrackerError> {
        self.subject.first_value().await
    }

    fn recompute(&self, tip: Option<Tip>, eras: Option<Vec<EraSummary>>) {
        let (Some(tip), Some(eras)) = (tip, eras) else {
            return;
        };
        let Some(epoch) = epoch_info(tip.slot, &eras) else {
            return;
        };
        let current = self.subject.value().map(|e| e.epoch_no);
        if current != Some(epoch.epoch_no) {
            info!("Epoch {} (slots {}..={})", epoch.epoch_no, epoch.first_slot, epoch.last_slot);
            self.subject.next(epoch);
        }
    }

    pub fn start(
        self: &Arc<Self>,
        mut tip: Subscription<Tip>,
        mut era_summaries: Subscription<Vec<EraSummary>>,
    ) {
        let tracker = self.clone();
        self.tasks.spawn(async move {
            loop {
                tracker.recompute(tip.latest(), era_summaries.latest());
                let open = tokio::select! {
                    open = tip.changed() => open,
                    open = era_summaries.changed() => open,
                };
                if !open {
                    break;
                }
            }
        });
    }
}

impl Default for CurrentEpochTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown for CurrentEpochTracker {
    fn shutdown(&self) {
        self.tasks.stop();
        self.subject.complete();
    }
}
