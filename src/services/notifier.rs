//! User-facing prompt surface.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

/// Identifies one loading indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadingHandle(pub u64);

/// Best-effort notifications. Nothing here is required for correctness.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show_error(&self, message: &str);

    fn show_loading(&self, text: &str) -> LoadingHandle;

    fn update_loading(&self, handle: LoadingHandle, text: &str);

    /// Open a file in the editor so the user can fix it.
    async fn open_file(&self, path: &Path);
}

/// Notifier that only writes to the log.
#[derive(Debug, Default)]
pub struct LogNotifier {
    next_handle: AtomicU64,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn show_error(&self, message: &str) {
        tracing::error!("[notify] {message}");
    }

    fn show_loading(&self, text: &str) -> LoadingHandle {
        let handle = LoadingHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        crate::debug_event!("notify", "loading", "#{} {text}", handle.0);
        handle
    }

    fn update_loading(&self, handle: LoadingHandle, text: &str) {
        crate::log_event!("notify", "status", "#{} {text}", handle.0);
    }

    async fn open_file(&self, path: &Path) {
        tracing::warn!("[notify] please review {}", path.display());
    }
}
