//! Watches the active project's configuration file.
//!
//! One `notify::RecommendedWatcher` on the project directory (non-recursive).
//! Modifications of the configuration file are forwarded to the
//! [`ChangeDebouncer`]; everything else in the directory is ignored.

use std::sync::Arc;

use async_trait::async_trait;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::services::AuxiliaryResource;
use crate::types::ProjectDirectory;

use super::debouncer::ChangeDebouncer;
use super::error::WatchError;

/// Whether `event` touches the configuration file named `config_file`.
fn is_config_change(event: &Event, config_file: &str) -> bool {
    let relevant = matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_));
    relevant
        && event
            .paths
            .iter()
            .any(|path| path.file_name().is_some_and(|name| name == config_file))
}

pub struct ConfigWatcher {
    dir: ProjectDirectory,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConfigWatcher {
    /// Start watching `dir` for changes to `config_file`.
    pub fn start(
        dir: ProjectDirectory,
        config_file: &str,
        debouncer: Arc<ChangeDebouncer>,
    ) -> Result<Self, WatchError> {
        let (tx, mut rx) = mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.blocking_send(res);
        })?;

        watcher
            .watch(dir.path(), RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: dir.path().to_path_buf(),
                reason: e.to_string(),
            })?;

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let config_file = config_file.to_string();
        let watched = dir.clone();

        let task = tokio::spawn(async move {
            // Keeps the OS watch alive for as long as the loop runs.
            let _watcher = watcher;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    received = rx.recv() => match received {
                        Some(Ok(event)) => {
                            if is_config_change(&event, &config_file) {
                                crate::debug_event!("watcher", "changed", "{:?} {watched}", event.kind);
                                debouncer.signal(watched.clone());
                            }
                        }
                        Some(Err(e)) => tracing::error!("[watcher] file watch error: {e}"),
                        None => break,
                    },
                }
            }

            crate::debug_event!("watcher", "stopped", "{watched}");
        });

        crate::debug_event!("watcher", "watching", "{dir}");

        Ok(Self {
            dir,
            cancel,
            task: Mutex::new(Some(task)),
        })
    }

    pub fn dir(&self) -> &ProjectDirectory {
        &self.dir
    }
}

#[async_trait]
impl AuxiliaryResource for ConfigWatcher {
    fn name(&self) -> &str {
        "config-watcher"
    }

    /// Stops the event loop and waits until the OS watch is released.
    async fn dispose(&self) {
        self.cancel.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!("[watcher] watcher task for {} failed: {e}", self.dir);
            }
        }
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
