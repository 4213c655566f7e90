use std::sync::Mutex;
use tokio::sync::watch;

use crate::tracker::TrackerError;
use crate::utils::lock;

/// Latest-value container with replay on subscribe.
///
/// Readers take immutable snapshots through [`TrackerSubject::value`] or
/// follow changes through a [`Subscription`]. Completing the subject drops
/// the sender, which ends every subscription after it has drained the last
/// value.
pub struct TrackerSubject<T> {
    sender: Mutex<Option<watch::Sender<Option<T>>>>,
    receiver: watch::Receiver<Option<T>>,
}

impl<T: Clone + Send + Sync + 'static> TrackerSubject<T> {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(None);
        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
        }
    }

    pub fn with_value(value: T) -> Self {
        let subject = Self::new();
        subject.next(value);
        subject
    }

    /// Snapshot of the latest value
    pub fn value(&self) -> Option<T> {
        self.receiver.borrow().clone()
    }

    /// Replays the latest value (if any), then every later one
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            receiver: self.receiver.clone(),
            primed: false,
        }
    }

    /// Only values emitted after this call
    pub fn changes(&self) -> Subscription<T> {
        let mut receiver = self.receiver.clone();
        receiver.borrow_and_update();
        Subscription {
            receiver,
            primed: true,
        }
    }

    /// Waits for the first available value
    pub async fn first_value(&self) -> Result<T, TrackerError> {
        self.subscribe().next().await.ok_or(TrackerError::Completed)
    }

    /// Publishes `value`; returns false once completed
    pub fn next(&self, value: T) -> bool {
        match lock(&self.sender).as_ref() {
            Some(sender) => {
                sender.send_replace(Some(value));
                true
            }
            None => false,
        }
    }

    pub fn is_completed(&self) -> bool {
        lock(&self.sender).is_none()
    }

    /// Closes the subject; safe to call more than once
    pub fn complete(&self) {
        lock(&self.sender).take();
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> TrackerSubject<T> {
    /// Publishes `value` unless it equals the current one
    pub fn next_distinct(&self, value: T) -> bool {
        if self.receiver.borrow().as_ref() == Some(&value) {
            return false;
        }
        self.next(value)
    }
}

impl<T: Clone + Send + Sync + 'static> Default for TrackerSubject<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A single consumer's view of a [`TrackerSubject`]
pub struct Subscription<T> {
    receiver: watch::Receiver<Option<T>>,
    primed: bool,
}

impl<T: Clone> Clone for Subscription<T> {
    fn clone(&self) -> Self {
        Self {
            receiver: self.receiver.clone(),
            primed: self.primed,
        }
    }
}

impl<T: Clone + Send + Sync> Subscription<T> {
    /// Next value, or `None` once the subject completed
    pub async fn next(&mut self) -> Option<T> {
        if !self.primed {
            self.primed = true;
            if let Some(value) = self.receiver.borrow_and_update().clone() {
                return Some(value);
            }
        }
        loop {
            if self.receiver.changed().await.is_err() {
                return None;
            }
            if let Some(value) = self.receiver.borrow_and_update().clone() {
                return Some(value);
            }
        }
    }

    /// Resolves when a new value is published; false once completed
    pub async fn changed(&mut self) -> bool {
        self.primed = true;
        let changed = self.receiver.changed().await.is_ok();
        self.receiver.borrow_and_update();
        changed
    }

    /// True if a value was published since the last read
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    pub fn mark_seen(&mut self) {
        self.primed = true;
        self.receiver.borrow_and_update();
    }

    pub fn latest(&self) -> Option<T> {
        self.receiver.borrow().clone()
    }

    /// Waits until the latest value satisfies `predicate`
    pub async fn wait_for(&mut self, mut predicate: impl FnMut(&T) -> bool) -> Option<T> {
        self.primed = true;
        loop {
            let matched = {
                let current = self.receiver.borrow_and_update();
                current.as_ref().filter(|value| predicate(value)).cloned()
            };
            if matched.is_some() {
                return matched;
            }
            if self.receiver.changed().await.is_err() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn subscribe_replays_latest_value() {
        let subject = TrackerSubject::with_value(1u32);
        subject.next(2);

        let mut subscription = subject.subscribe();
        assert_eq!(subscription.next().await, Some(2));

        subject.next(3);
        assert_eq!(subscription.next().await, Some(3));
    }

    #[tokio::test]
    async fn changes_skip_the_current_value() {
        let subject = TrackerSubject::with_value(1u32);
        let mut changes = subject.changes();
        assert!(timeout(Duration::from_millis(10), changes.next()).await.is_err());

        subject.next(2);
        assert_eq!(changes.next().await, Some(2));
    }

    #[tokio::test]
    async fn complete_ends_subscriptions_and_is_idempotent() {
        let subject = TrackerSubject::<u32>::new();
        let mut subscription = subject.subscribe();

        subject.complete();
        subject.complete();
        assert!(subject.is_completed());
        assert!(!subject.next(5));
        assert_eq!(subscription.next().await, None);
        assert!(subject.first_value().await.is_err());
    }

    #[tokio::test]
    async fn next_distinct_suppresses_equal_values() {
        let subject = TrackerSubject::new();
        assert!(subject.next_distinct(7u32));
        assert!(!subject.next_distinct(7u32));
        assert!(subject.next_distinct(8u32));
    }

    #[tokio::test]
    async fn wait_for_resolves_on_matching_value() {
        let subject = std::sync::Arc::new(TrackerSubject::with_value(1u32));
        let mut subscription = subject.subscribe();
        let publisher = subject.clone();
        tokio::spawn(async move {
            publisher.next(2);
            publisher.next(10);
        });
        assert_eq!(subscription.wait_for(|value| *value >= 10).await, Some(10));
    }
}
