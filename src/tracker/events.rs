use log::warn;
use std::sync::Mutex;
use tokio::sync::broadcast;

use crate::utils::lock;

const DEFAULT_CAPACITY: usize = 256;

/// Fan-out event stream without replay
pub struct EventChannel<T> {
    name: &'static str,
    sender: Mutex<Option<broadcast::Sender<T>>>,
}

impl<T: Clone + Send + 'static> EventChannel<T> {
    pub fn new(name: &'static str) -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CAPACITY);
        Self {
            name,
            sender: Mutex::new(Some(sender)),
        }
    }

    /// Delivers to current subscribers; events with no listener are dropped
    pub fn emit(&self, event: T) {
        if let Some(sender) = lock(&self.sender).as_ref() {
            let _ = sender.send(event);
        }
    }

    pub fn subscribe(&self) -> EventStream<T> {
        let receiver = match lock(&self.sender).as_ref() {
            Some(sender) => sender.subscribe(),
            None => {
                // already completed: hand out a stream that is closed from the start
                let (sender, receiver) = broadcast::channel(1);
                drop(sender);
                receiver
            }
        };
        EventStream {
            name: self.name,
            receiver,
        }
    }

    pub fn complete(&self) {
        lock(&self.sender).take();
    }
}

pub struct EventStream<T> {
    name: &'static str,
    receiver: broadcast::Receiver<T>,
}

impl<T: Clone> EventStream<T> {
    /// Next event, or `None` once the channel completed
    pub async fn next(&mut self) -> Option<T> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("{} subscriber lagged, skipped {} events", self.name, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking read of an already delivered event
    pub fn try_next(&mut self) -> Option<T> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}
