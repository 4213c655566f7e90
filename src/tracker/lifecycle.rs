use log::debug;
use std::future::Future;
use std::sync::Mutex;
use tokio::task::JoinHandle;

use crate::utils::lock;

/// One-way, idempotent teardown
pub trait Shutdown {
    fn shutdown(&self);
}

struct Tasks {
    stopped: bool,
    handles: Vec<JoinHandle<()>>,
}

/// Background tasks owned by a single tracker
pub struct TaskGroup {
    name: &'static str,
    tasks: Mutex<Tasks>,
}

impl TaskGroup {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            tasks: Mutex::new(Tasks {
                stopped: false,
                handles: Vec::new(),
            }),
        }
    }

    /// Spawns `task` unless the group was already shut down
    pub fn spawn<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = lock(&self.tasks);
        if tasks.stopped {
            debug!("{}: not spawning task after shutdown", self.name);
            return false;
        }
        tasks.handles.retain(|handle| !handle.is_finished());
        tasks.handles.push(tokio::spawn(task));
        true
    }

    pub fn is_stopped(&self) -> bool {
        lock(&self.tasks).stopped
    }

    /// Aborts every task; returns false if the group was already stopped
    pub fn stop(&self) -> bool {
        let handles = {
            let mut tasks = lock(&self.tasks);
            if tasks.stopped {
                return false;
            }
            tasks.stopped = true;
            std::mem::take(&mut tasks.handles)
        };
        for handle in handles {
            handle.abort();
        }
        debug!("{}: stopped", self.name);
        true
    }
}
