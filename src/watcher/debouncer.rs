//! Debouncing of configuration change signals.
//!
//! Editors often write a configuration file several times in a row (save,
//! format, auto-save). Each signal for a directory resets that directory's
//! timer; only after a quiet period does a single reload fire.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::types::ProjectDirectory;

/// Receiver of debounced reload requests.
///
/// Implementations handle their own errors; nothing crosses the timer
/// boundary.
#[async_trait]
pub trait DebounceTarget: Send + Sync {
    async fn fire(&self, dir: ProjectDirectory);
}

/// Scheduled reload for one directory.
struct PendingDebounce {
    generation: u64,
    task: JoinHandle<()>,
}

/// At most one pending timer per directory, reset on every signal.
pub struct ChangeDebouncer {
    delay: Duration,
    pending: Arc<Mutex<HashMap<ProjectDirectory, PendingDebounce>>>,
    generation: AtomicU64,
    target: Arc<dyn DebounceTarget>,
}

impl ChangeDebouncer {
    pub fn new(delay: Duration, target: Arc<dyn DebounceTarget>) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
            target,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Record that the configuration of `dir` changed now.
    ///
    /// Replaces any pending timer for `dir`. Must be called from within a
    /// Tokio runtime.
    pub fn signal(&self, dir: ProjectDirectory) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let pending = Arc::clone(&self.pending);
        let target = Arc::clone(&self.target);
        let delay = self.delay;
        let key = dir.clone();

        // Held across spawn + insert so the timer cannot look itself up early.
        let mut guard = self.pending.lock();

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            // Only the latest generation for this directory may fire.
            let claimed = {
                let mut pending = pending.lock();
                match pending.get(&key) {
                    Some(entry) if entry.generation == generation => {
                        pending.remove(&key);
                        true
                    }
                    _ => false,
                }
            };

            if claimed {
                crate::debug_event!("debounce", "fired", "{key}");
                target.fire(key).await;
            }
        });

        if let Some(previous) = guard.insert(dir.clone(), PendingDebounce { generation, task }) {
            previous.task.abort();
            crate::debug_event!("debounce", "reset", "{dir}");
        } else {
            crate::debug_event!("debounce", "scheduled", "{dir} in {}ms", delay.as_millis());
        }
    }

    /// Drop the pending timer of `dir`, if any.
    pub fn cancel(&self, dir: &ProjectDirectory) -> bool {
        match self.pending.lock().remove(dir) {
            Some(entry) => {
                entry.task.abort();
                crate::debug_event!("debounce", "cancelled", "{dir}");
                true
            }
            None => false,
        }
    }

    /// Drop every pending timer.
    pub fn cancel_all(&self) {
        let drained: Vec<_> = self.pending.lock().drain().collect();
        for (_, entry) in drained {
            entry.task.abort();
        }
    }

    pub fn is_pending(&self, dir: &ProjectDirectory) -> bool {
        self.pending.lock().contains_key(dir)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Drop for ChangeDebouncer {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
