//! The switch pipeline: validate, pick an environment, tear down the old
//! auxiliary resources, build the new ones, persist.
//!
//! # Ordering
//!
//! Requests for the same directory run strictly one after another. Requests
//! for different directories may overlap while they wait on the linter, but
//! only the newest one is allowed to commit: every request stamps a
//! generation number when it starts and re-checks it before each mutation of
//! shared state. The teardown/create/commit section runs under a single lock
//! so the resources of two projects are never live at the same time.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::error::{CollaboratorError, GateFailure, SwitchError, SwitchResult};
use crate::gate::ConfigGate;
use crate::observer::{Observer, ObserverRegistry};
use crate::services::{AuxiliaryFactory, AuxiliaryResource, Notifier, StateStore};
use crate::types::{Environment, ProjectDirectory, Selection, SwitchOptions};

use super::broadcast::{SelectionBroadcaster, SelectionEvent};

const LAST_ACTIVE_KEY: &str = "last-active-dir";

fn env_key(dir: &ProjectDirectory) -> String {
    format!("env:{dir}")
}

/// Auxiliary resources of the active project.
#[derive(Default)]
struct LiveResources {
    dir: Option<ProjectDirectory>,
    resources: Vec<Box<dyn AuxiliaryResource>>,
}

pub struct SwitchCoordinator {
    registry: Arc<ObserverRegistry>,
    gate: ConfigGate,
    factory: Arc<dyn AuxiliaryFactory>,
    state: Arc<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
    broadcaster: SelectionBroadcaster,
    /// Latest issued switch generation.
    generation: AtomicU64,
    /// Per-directory serialization of requests.
    dir_locks: DashMap<ProjectDirectory, Arc<Mutex<()>>>,
    live: Mutex<LiveResources>,
    /// Written only while `live` is held.
    active: RwLock<Option<Selection>>,
}

impl SwitchCoordinator {
    pub fn new(
        registry: Arc<ObserverRegistry>,
        gate: ConfigGate,
        factory: Arc<dyn AuxiliaryFactory>,
        state: Arc<dyn StateStore>,
        notifier: Arc<dyn Notifier>,
        broadcaster: SelectionBroadcaster,
    ) -> Self {
        Self {
            registry,
            gate,
            factory,
            state,
            notifier,
            broadcaster,
            generation: AtomicU64::new(0),
            dir_locks: DashMap::new(),
            live: Mutex::new(LiveResources::default()),
            active: RwLock::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<ObserverRegistry> {
        &self.registry
    }

    pub fn broadcaster(&self) -> &SelectionBroadcaster {
        &self.broadcaster
    }

    /// The active project and environment, `None` while idle.
    pub fn active_selection(&self) -> Option<Selection> {
        self.active.read().clone()
    }

    pub fn active_observer(&self) -> Option<Arc<Observer>> {
        let active = self.active.read();
        self.registry
            .get_active_observer(active.as_ref().map(|s| &s.dir))
    }

    /// Read-only access to a project's observer without switching to it.
    pub fn get_observer(&self, dir: &ProjectDirectory) -> Arc<Observer> {
        self.registry.get_observer(dir)
    }

    /// Abandon whatever switch is in flight.
    ///
    /// The abandoned request discards its own effects as if a newer request
    /// had superseded it. External processes it is waiting on keep running.
    pub fn cancel_in_flight(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        crate::debug_event!("switch", "cancelled", "generation {generation}");
    }

    /// Switch the active project to `dir`.
    pub async fn request_switch(
        &self,
        dir: Option<ProjectDirectory>,
        options: SwitchOptions,
    ) -> SwitchResult<Selection> {
        let dir = dir.ok_or(SwitchError::MissingDirectory)?;

        let dir_lock = self.dir_lock(&dir);
        let _serial = dir_lock.lock().await;

        let token = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        crate::debug_event!("switch", "requested", "{dir} {options:?} generation {token}");

        let loading = self.notifier.show_loading(&format!("Loading {dir}"));
        let previous = self.active_selection();
        let observer = self.registry.get_observer(&dir);

        let result = self.run(token, &dir, &observer, &options).await;

        match &result {
            Ok(selection) => {
                self.notifier.update_loading(loading, &selection.label());
            }
            Err(SwitchError::Internal { .. }) => {
                self.notifier.update_loading(loading, "No active project");
                self.notifier
                    .show_error(&format!("Could not activate project {dir}"))
                    .await;
            }
            Err(_) => {
                let label = self
                    .active_selection()
                    .or(previous)
                    .map(|s| s.label())
                    .unwrap_or_else(|| "No active project".to_string());
                self.notifier.update_loading(loading, &label);
            }
        }

        match &result {
            Ok(selection) => crate::log_event!("switch", "active", "{selection}"),
            Err(e) if e.is_silent() => crate::debug_event!("switch", "discarded", "{e}"),
            Err(e @ SwitchError::Internal { .. }) => tracing::error!("[switch] {e}"),
            Err(e) => tracing::warn!("[switch] {e}"),
        }

        result
    }

    async fn run(
        &self,
        token: u64,
        dir: &ProjectDirectory,
        observer: &Arc<Observer>,
        options: &SwitchOptions,
    ) -> SwitchResult<Selection> {
        self.gate.check(dir).await?;

        let env = self
            .resolve_environment(dir, observer, options.env.as_ref())
            .await?;
        let target = Selection::new(dir.clone(), env);

        let mut live = self.live.lock().await;
        self.ensure_current(token, dir)?;

        if !options.force && self.active_selection().as_ref() == Some(&target) {
            crate::debug_event!("switch", "unchanged", "{target}");
            self.persist(&target).await;
            self.broadcaster.send(SelectionEvent::Changed {
                dir: target.dir.clone(),
                env: target.env.clone(),
            });
            return Ok(target);
        }

        let had_live = live.dir.is_some();
        self.teardown(&mut live).await;

        let resources = match self.build(dir, observer).await {
            Ok(resources) => resources,
            Err(e) => {
                drop(live);
                let current = self.is_current(token);
                if current || had_live {
                    self.broadcaster.send(SelectionEvent::Cleared);
                }
                // A newer request owns the outcome; this failure is moot.
                if !current {
                    crate::debug_event!("switch", "failed after supersession", "{dir}: {e}");
                    return Err(SwitchError::Superseded { dir: dir.clone() });
                }
                return Err(SwitchError::Internal {
                    dir: dir.clone(),
                    reason: e.to_string(),
                });
            }
        };

        if !self.is_current(token) {
            for resource in &resources {
                resource.dispose().await;
            }
            drop(live);
            if had_live {
                self.broadcaster.send(SelectionEvent::Cleared);
            }
            return Err(SwitchError::Superseded { dir: dir.clone() });
        }

        live.dir = Some(dir.clone());
        live.resources = resources;
        observer.set_selected_env(target.env.clone());
        *self.active.write() = Some(target.clone());
        self.persist(&target).await;
        drop(live);

        if options.force {
            self.spawn_rebuild(Arc::clone(observer), true);
        }

        self.broadcaster.send(SelectionEvent::Changed {
            dir: target.dir.clone(),
            env: target.env.clone(),
        });
        Ok(target)
    }

    /// Pick the environment for `dir`: explicit request, then the observer's
    /// cached choice, then the persisted one. Cached and persisted choices
    /// that the configuration no longer declares fall back to `Default`.
    async fn resolve_environment(
        &self,
        dir: &ProjectDirectory,
        observer: &Observer,
        requested: Option<&Environment>,
    ) -> Result<Environment, GateFailure> {
        let declared = self.gate.environments(dir).await?;

        if let Some(env) = requested {
            self.gate.require_environment(dir, env, &declared).await?;
            observer.set_selected_env(env.clone());
            return Ok(env.clone());
        }

        let remembered = match observer.selected_env() {
            Some(env) => env,
            None => self.persisted_env(dir).await,
        };

        if remembered.is_declared_in(&declared) {
            Ok(remembered)
        } else {
            crate::debug_event!(
                "switch",
                "environment gone",
                "{dir}: '{remembered}' no longer declared"
            );
            Ok(Environment::Default)
        }
    }

    /// Switch the index service and build the new auxiliary resources.
    async fn build(
        &self,
        dir: &ProjectDirectory,
        observer: &Arc<Observer>,
    ) -> Result<Vec<Box<dyn AuxiliaryResource>>, CollaboratorError> {
        self.registry.switch_active(observer).await?;
        let resources = self.factory.create(dir, Arc::clone(observer)).await?;
        crate::debug_event!("switch", "created", "{} resources for {dir}", resources.len());
        Ok(resources)
    }

    /// Dispose every live auxiliary resource and mark the session idle.
    async fn teardown(&self, live: &mut LiveResources) {
        *self.active.write() = None;
        let Some(dir) = live.dir.take() else {
            return;
        };

        for resource in live.resources.drain(..) {
            resource.dispose().await;
            crate::debug_event!("switch", "disposed", "{} of {dir}", resource.name());
        }
    }

    /// Drop the active project's resources and return to idle.
    pub async fn deactivate(&self) {
        self.cancel_in_flight();
        let mut live = self.live.lock().await;
        let was_active = live.dir.is_some();
        self.teardown(&mut live).await;
        drop(live);

        if was_active {
            crate::log_event!("switch", "idle");
            self.broadcaster.send(SelectionEvent::Cleared);
        }
    }

    /// Rebuild the active project's index in the background.
    pub fn rebuild_active_index(&self, force: bool) -> bool {
        match self.active_observer() {
            Some(observer) => {
                self.spawn_rebuild(observer, force);
                true
            }
            None => false,
        }
    }

    fn spawn_rebuild(&self, observer: Arc<Observer>, force: bool) {
        tokio::spawn(async move {
            match observer.rebuild_index(force).await {
                Ok(()) => crate::debug_event!("switch", "index rebuilt", "{}", observer.dir()),
                Err(e) => tracing::warn!("[switch] index rebuild failed: {e}"),
            }
        });
    }

    /// Forget per-directory bookkeeping of a project that left the workspace.
    pub fn forget(&self, dir: &ProjectDirectory) {
        self.dir_locks.remove(dir);
    }

    /// Last active project recorded by a previous switch.
    pub async fn last_active_dir(&self) -> Option<ProjectDirectory> {
        match self.state.get(LAST_ACTIVE_KEY).await {
            Ok(value) => value.and_then(|v| serde_json::from_value(v).ok()),
            Err(e) => {
                tracing::warn!("[switch] failed to read last active project: {e}");
                None
            }
        }
    }

    async fn persisted_env(&self, dir: &ProjectDirectory) -> Environment {
        match self.state.get(&env_key(dir)).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_default(),
            Ok(None) => Environment::Default,
            Err(e) => {
                tracing::warn!("[switch] failed to read environment of {dir}: {e}");
                Environment::Default
            }
        }
    }

    async fn persist(&self, selection: &Selection) {
        let env = serde_json::to_value(&selection.env).unwrap_or_default();
        let dir = serde_json::to_value(&selection.dir).unwrap_or_default();

        if let Err(e) = self.state.set(&env_key(&selection.dir), env).await {
            tracing::warn!("[switch] failed to persist environment: {e}");
        }
        if let Err(e) = self.state.set(LAST_ACTIVE_KEY, dir).await {
            tracing::warn!("[switch] failed to persist last active project: {e}");
        }
    }

    fn dir_lock(&self, dir: &ProjectDirectory) -> Arc<Mutex<()>> {
        Arc::clone(self.dir_locks.entry(dir.clone()).or_default().value())
    }

    fn is_current(&self, token: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == token
    }

    fn ensure_current(&self, token: u64, dir: &ProjectDirectory) -> SwitchResult<()> {
        if self.is_current(token) {
            Ok(())
        } else {
            Err(SwitchError::Superseded { dir: dir.clone() })
        }
    }
}
