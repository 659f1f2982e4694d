//! Background-task registry.
//!
//! Plugins and the orchestrator can spawn fire-and-forget work (e.g. a
//! post-turn summarization pass) that should outlive the turn that started
//! it but still be discoverable and cancellable by name. This is a
//! deliberately small cousin of a full run tracker: no persistence, no
//! event log, just a name-keyed table of join handles.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use turnloom_domain::TraceEvent;

/// Tracks named background tasks spawned off the request path.
pub struct BackgroundTasks {
    handles: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Spawn `fut` under `name`, replacing (and aborting) any previous task
    /// registered under the same name.
    pub fn spawn<F>(&self, name: impl Into<String>, fut: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let handle = tokio::spawn(fut);
        TraceEvent::BackgroundTaskStarted { name: name.clone() }.emit();
        let mut handles = self.handles.lock();
        if let Some(prev) = handles.insert(name, handle) {
            prev.abort();
        }
    }

    /// True if a task registered under `name` exists and has not finished.
    pub fn is_running(&self, name: &str) -> bool {
        let mut handles = self.handles.lock();
        match handles.get(name) {
            Some(h) if h.is_finished() => {
                handles.remove(name);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Abort the task registered under `name`, if any. Returns whether a
    /// task was found.
    pub fn cancel(&self, name: &str) -> bool {
        let mut handles = self.handles.lock();
        if let Some(handle) = handles.remove(name) {
            handle.abort();
            TraceEvent::BackgroundTaskAborted {
                name: name.to_string(),
                reason: "cancelled".to_string(),
            }
            .emit();
            true
        } else {
            false
        }
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedBackgroundTasks = Arc<BackgroundTasks>;
