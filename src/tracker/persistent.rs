use log::{debug, warn};
use std::sync::Mutex;

use crate::store::{DocumentStore, Store};
use crate::tracker::{Shutdown, Subscription, TrackerError, TrackerSubject};
use crate::utils::lock;

/// State container bound to a document store.
///
/// The stored value (if any) is replayed to subscribers before the first
/// fetch resolves. Every accepted value passes an equality gate, is written
/// to the store and only then published.
pub struct PersistentDocumentTracker<T> {
    name: &'static str,
    subject: TrackerSubject<T>,
    store: Mutex<Option<Store<T>>>,
    writer: tokio::sync::Mutex<()>,
}

impl<T> PersistentDocumentTracker<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Creates the tracker, seeding it from `store`
    pub async fn load(name: &'static str, store: Store<T>) -> Self {
        let subject = TrackerSubject::new();
        match store.get().await {
            Ok(Some(value)) => {
                debug!("{}: restored from store", name);
                subject.next(value);
            }
            Ok(None) => {}
            Err(e) => warn!("{}: failed to load stored value: {}", name, e),
        }
        Self {
            name,
            subject,
            store: Mutex::new(Some(store)),
            writer: tokio::sync::Mutex::new(()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn value(&self) -> Option<T> {
        self.subject.value()
    }

    pub fn subscribe(&self) -> Subscription<T> {
        self.subject.subscribe()
    }

    pub fn changes(&self) -> Subscription<T> {
        self.subject.changes()
    }

    pub async fn first_value(&self) -> Result<T, TrackerError> {
        self.subject.first_value().await
    }

    /// Persists and publishes `value` unless it equals the current one.
    /// Returns whether anything was published.
    pub async fn accept(&self, value: T) -> bool {
        let _writer = self.writer.lock().await;
        self.write(value).await
    }

    /// Derives the next value from the current one under the writer lock
    pub async fn update(&self, f: impl FnOnce(Option<T>) -> T) -> bool {
        let _writer = self.writer.lock().await;
        let next = f(self.subject.value());
        self.write(next).await
    }

    async fn write(&self, value: T) -> bool {
        if self.subject.value().as_ref() == Some(&value) {
            return false;
        }
        let Some(store) = lock(&self.store).clone() else {
            return false;
        };
        if let Err(e) = store.set(&value).await {
            warn!("{}: failed to persist: {}", self.name, e);
        }
        self.subject.next(value)
    }

    pub fn is_completed(&self) -> bool {
        self.subject.is_completed()
    }

    /// Releases the store and ends every subscription
    pub fn complete(&self) {
        if lock(&self.store).take().is_some() {
            debug!("{}: completed", self.name);
        }
        self.subject.complete();
    }
}

impl<T> Shutdown for PersistentDocumentTracker<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn shutdown(&self) {
        self.complete();
    }
}
