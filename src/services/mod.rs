//! Contracts for the collaborators the switching core depends on.
//!
//! The linter, the per-project index service, auxiliary resource
//! construction, persisted state and user prompts all live outside the core.
//! They are injected as `Arc<dyn Trait>` so hosts and tests can supply their
//! own implementations.

mod notifier;
mod state;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CollaboratorError;
use crate::observer::Observer;
use crate::types::ProjectDirectory;

pub use notifier::{LoadingHandle, LogNotifier, Notifier};
pub use state::{JsonStateStore, MemoryStateStore, StateStore};

/// Parser/linter for the build-tool configuration file.
#[async_trait]
pub trait ConfigLinter: Send + Sync {
    /// Whether the configuration at `path` parses and passes structural lint.
    async fn validate(&self, path: &Path) -> Result<bool, CollaboratorError>;

    /// Environments declared by the configuration, in declaration order.
    async fn environments(&self, path: &Path) -> Result<Vec<String>, CollaboratorError>;
}

/// Opaque handle to one project's index/build state inside the service pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexHandle {
    pub id: u64,
    pub dir: ProjectDirectory,
}

/// Pool of per-project background indexers, keyed by directory.
#[async_trait]
pub trait IndexService: Send + Sync {
    /// Return the handle for `dir`, registering it on first use.
    ///
    /// Must be cheap and must not block; indexing starts lazily.
    fn get_or_create(&self, dir: &ProjectDirectory) -> IndexHandle;

    /// Treat `dir` as the foreground project. May schedule reindexing.
    async fn set_active(&self, dir: &ProjectDirectory) -> Result<(), CollaboratorError>;

    async fn rebuild_index(&self, handle: &IndexHandle, force: bool)
    -> Result<(), CollaboratorError>;

    async fn dispose(&self, handle: &IndexHandle);

    /// Release the pool itself. Called once after every handle is disposed.
    async fn shutdown(&self) {}
}

/// A per-session object (task list, test list, subscription) bound to the
/// active project.
#[async_trait]
pub trait AuxiliaryResource: Send + Sync {
    fn name(&self) -> &str;

    async fn dispose(&self);
}

/// Builds the auxiliary resources for a freshly activated project.
#[async_trait]
pub trait AuxiliaryFactory: Send + Sync {
    async fn create(
        &self,
        dir: &ProjectDirectory,
        observer: Arc<Observer>,
    ) -> Result<Vec<Box<dyn AuxiliaryResource>>, CollaboratorError>;
}
