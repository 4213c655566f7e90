use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::store::{DocumentStore, StoreError};
use crate::utils::lock;

/// Store kept in process memory; counts writes so tests can assert on them
pub struct InMemoryStore<T> {
    value: Mutex<Option<T>>,
    writes: AtomicUsize,
}

impl<T> InMemoryStore<T> {
    pub fn new() -> Self {
        Self {
            value: Mutex::new(None),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn with_value(value: T) -> Self {
        Self {
            value: Mutex::new(Some(value)),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl<T> Default for InMemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Clone + Send + Sync> DocumentStore<T> for InMemoryStore<T> {
    async fn get(&self) -> Result<Option<T>, StoreError> {
        Ok(lock(&self.value).clone())
    }

    async fn set(&self, value: &T) -> Result<(), StoreError> {
        *lock(&self.value) = Some(value.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self) -> Result<(), StoreError> {
        lock(&self.value).take();
        Ok(())
    }
}
