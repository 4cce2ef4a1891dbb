//! Per-project observers and the registry that owns them.
//!
//! An [`Observer`] wraps the index service handle for one project and caches
//! its environment selection. Observers are created lazily on first access and
//! survive switching away from their project, so coming back to a project
//! keeps its environment without touching persisted state.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::error::CollaboratorError;
use crate::services::{IndexHandle, IndexService};
use crate::types::{Environment, ProjectDirectory};

/// Per-project state holder.
pub struct Observer {
    dir: ProjectDirectory,
    handle: IndexHandle,
    service: Arc<dyn IndexService>,
    /// `None` until an environment has been resolved for this project.
    selected_env: RwLock<Option<Environment>>,
}

impl Observer {
    fn new(dir: ProjectDirectory, service: Arc<dyn IndexService>) -> Self {
        let handle = service.get_or_create(&dir);
        Self {
            dir,
            handle,
            service,
            selected_env: RwLock::new(None),
        }
    }

    pub fn dir(&self) -> &ProjectDirectory {
        &self.dir
    }

    pub fn handle(&self) -> &IndexHandle {
        &self.handle
    }

    /// Cached environment, if one was resolved before.
    pub fn selected_env(&self) -> Option<Environment> {
        self.selected_env.read().clone()
    }

    pub fn set_selected_env(&self, env: Environment) {
        *self.selected_env.write() = Some(env);
    }

    /// Ask the index service to rebuild this project's index.
    pub async fn rebuild_index(&self, force: bool) -> Result<(), CollaboratorError> {
        self.service.rebuild_index(&self.handle, force).await
    }
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("dir", &self.dir)
            .field("handle", &self.handle)
            .field("selected_env", &*self.selected_env.read())
            .finish()
    }
}

/// Directory to observer pool.
///
/// Lookups may happen from any task; insertion only happens through
/// [`ObserverRegistry::get_observer`], which is idempotent under concurrent
/// calls for the same directory.
pub struct ObserverRegistry {
    observers: DashMap<ProjectDirectory, Arc<Observer>>,
    service: Arc<dyn IndexService>,
}

impl ObserverRegistry {
    pub fn new(service: Arc<dyn IndexService>) -> Self {
        Self {
            observers: DashMap::new(),
            service,
        }
    }

    /// Return the observer for `dir`, creating it on first access.
    pub fn get_observer(&self, dir: &ProjectDirectory) -> Arc<Observer> {
        if let Some(existing) = self.observers.get(dir) {
            return Arc::clone(existing.value());
        }

        let observer = self
            .observers
            .entry(dir.clone())
            .or_insert_with(|| {
                crate::debug_event!("registry", "created", "{dir}");
                Arc::new(Observer::new(dir.clone(), Arc::clone(&self.service)))
            });
        Arc::clone(observer.value())
    }

    /// Observer for `dir` without creating one.
    pub fn find(&self, dir: &ProjectDirectory) -> Option<Arc<Observer>> {
        self.observers.get(dir).map(|o| Arc::clone(o.value()))
    }

    /// Observer of the active project, if any.
    pub fn get_active_observer(&self, active: Option<&ProjectDirectory>) -> Option<Arc<Observer>> {
        active.and_then(|dir| self.find(dir))
    }

    pub fn contains(&self, dir: &ProjectDirectory) -> bool {
        self.observers.contains_key(dir)
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Directories that currently have an observer.
    pub fn dirs(&self) -> Vec<ProjectDirectory> {
        self.observers.iter().map(|e| e.key().clone()).collect()
    }

    /// Make the observer's project the index service's foreground project.
    ///
    /// Leaves auxiliary resources and the active selection alone, and never
    /// re-registers an observer that was removed meanwhile.
    pub async fn switch_active(&self, observer: &Observer) -> Result<(), CollaboratorError> {
        self.service.set_active(observer.dir()).await
    }

    /// Drop the observer of a project that left the workspace.
    pub async fn remove(&self, dir: &ProjectDirectory) -> bool {
        match self.observers.remove(dir) {
            Some((_, observer)) => {
                self.service.dispose(observer.handle()).await;
                crate::debug_event!("registry", "removed", "{dir}");
                true
            }
            None => false,
        }
    }

    /// Remove every observer whose directory is not in `keep`.
    ///
    /// Returns the removed directories.
    pub async fn retain(&self, keep: &[ProjectDirectory]) -> Vec<ProjectDirectory> {
        let stale: Vec<ProjectDirectory> = self
            .observers
            .iter()
            .filter(|entry| !keep.contains(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        for dir in &stale {
            self.remove(dir).await;
        }
        stale
    }

    /// Release every observer and the index service. Called once at shutdown.
    pub async fn dispose(&self) {
        let dirs = self.dirs();
        for dir in &dirs {
            self.remove(dir).await;
        }
        self.service.shutdown().await;
        crate::log_event!("registry", "disposed", "{} observers", dirs.len());
    }
}
