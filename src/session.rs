//! Inbound signals from the editor host, wired to the switching core.
//!
//! Focus changes, workspace folder changes, configuration file changes and
//! explicit picks all end up as a switch request on the
//! [`SwitchCoordinator`]. The session decides which project to ask for
//! when the host does not name one.

use std::path::Path;
use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::config::{Settings, SwitchingConfig};
use crate::error::{CollaboratorError, SessionError, StateError, SwitchResult};
use crate::gate::ConfigGate;
use crate::observer::{Observer, ObserverRegistry};
use crate::policy::{SelectionPolicy, project_for_path};
use crate::services::{
    AuxiliaryFactory, AuxiliaryResource, ConfigLinter, IndexService, JsonStateStore,
    LogNotifier, MemoryStateStore, Notifier, StateStore,
};
use crate::switching::{SelectionBroadcaster, SelectionEvent, SwitchCoordinator};
use crate::types::{Environment, ProjectDirectory, Selection, SwitchOptions};
use crate::watcher::{ChangeDebouncer, ConfigWatcher, DebounceTarget};

type ProjectList = Arc<RwLock<Vec<ProjectDirectory>>>;

/// Debounced configuration changes become forced switch requests.
struct ReloadOnChange {
    coordinator: OnceLock<Weak<SwitchCoordinator>>,
    projects: ProjectList,
}

#[async_trait]
impl DebounceTarget for ReloadOnChange {
    async fn fire(&self, dir: ProjectDirectory) {
        let Some(coordinator) = self.coordinator.get().and_then(Weak::upgrade) else {
            return;
        };

        let known = self.projects.read().contains(&dir) || coordinator.registry().contains(&dir);
        if !known {
            crate::debug_event!("debounce", "ignored", "{dir} is no longer a project");
            return;
        }

        // The coordinator already logged and reported the outcome.
        if let Err(e) = coordinator
            .request_switch(Some(dir), SwitchOptions::forced())
            .await
        {
            crate::debug_event!("debounce", "reload not applied", "{e}");
        }
    }
}

/// Host factory plus a watcher on the project's configuration file.
struct WatchingFactory {
    inner: Arc<dyn AuxiliaryFactory>,
    debouncer: Arc<ChangeDebouncer>,
    config_file: String,
    watch: bool,
}

#[async_trait]
impl AuxiliaryFactory for WatchingFactory {
    async fn create(
        &self,
        dir: &ProjectDirectory,
        observer: Arc<Observer>,
    ) -> Result<Vec<Box<dyn AuxiliaryResource>>, CollaboratorError> {
        let mut resources = self.inner.create(dir, observer).await?;

        if self.watch {
            match ConfigWatcher::start(dir.clone(), &self.config_file, Arc::clone(&self.debouncer)) {
                Ok(watcher) => resources.push(Box::new(watcher)),
                Err(e) => tracing::warn!("[session] not watching {dir}: {e}"),
            }
        }

        Ok(resources)
    }
}

/// Factory for hosts without task or test lists.
struct NoAuxiliary;

#[async_trait]
impl AuxiliaryFactory for NoAuxiliary {
    async fn create(
        &self,
        _dir: &ProjectDirectory,
        _observer: Arc<Observer>,
    ) -> Result<Vec<Box<dyn AuxiliaryResource>>, CollaboratorError> {
        Ok(Vec::new())
    }
}

/// One workspace session.
pub struct Session {
    coordinator: Arc<SwitchCoordinator>,
    debouncer: Arc<ChangeDebouncer>,
    policy: SelectionPolicy,
    projects: ProjectList,
    focused: RwLock<Option<ProjectDirectory>>,
    config_file: String,
}

impl Session {
    pub fn builder(config: SwitchingConfig) -> SessionBuilder {
        SessionBuilder::new(config)
    }

    pub fn coordinator(&self) -> &Arc<SwitchCoordinator> {
        &self.coordinator
    }

    pub fn debouncer(&self) -> &Arc<ChangeDebouncer> {
        &self.debouncer
    }

    pub fn projects(&self) -> Vec<ProjectDirectory> {
        self.projects.read().clone()
    }

    pub fn active_selection(&self) -> Option<Selection> {
        self.coordinator.active_selection()
    }

    pub fn observer(&self, dir: &ProjectDirectory) -> Arc<Observer> {
        self.coordinator.get_observer(dir)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SelectionEvent> {
        self.coordinator.broadcaster().subscribe()
    }

    /// Project that should be active according to the selection policy.
    pub async fn resolve(&self) -> Option<ProjectDirectory> {
        let persisted = self.coordinator.last_active_dir().await;
        let current = self.active_selection().map(|s| s.dir);
        let projects = self.projects.read();
        let focused = self.focused.read();

        self.policy.resolve(
            &projects,
            focused.as_ref(),
            current.as_ref(),
            persisted.as_ref(),
        )
    }

    /// Switch to `dir`, or to the policy's choice when `dir` is `None`.
    pub async fn activate(
        &self,
        dir: Option<ProjectDirectory>,
        options: SwitchOptions,
    ) -> SwitchResult<Selection> {
        let dir = match dir {
            Some(dir) => Some(dir),
            None => self.resolve().await,
        };
        self.coordinator.request_switch(dir, options).await
    }

    /// Change the environment of the active project.
    pub async fn select_environment(&self, env: Environment) -> SwitchResult<Selection> {
        let dir = self.active_selection().map(|s| s.dir);
        self.coordinator
            .request_switch(dir, SwitchOptions::with_env(env))
            .await
    }

    /// The workspace's set of projects changed.
    ///
    /// A switch in flight when projects vanish is abandoned, and an active
    /// project that vanished is torn down before its observer is released.
    /// Pending reloads of vanished projects are dropped. Then the policy picks
    /// a project again. Returns `None` when there are no projects.
    pub async fn set_projects(
        &self,
        candidates: Vec<ProjectDirectory>,
    ) -> SwitchResult<Option<Selection>> {
        let previous = std::mem::replace(&mut *self.projects.write(), candidates.clone());

        let mut removed: Vec<ProjectDirectory> = previous
            .into_iter()
            .chain(self.coordinator.registry().dirs())
            .filter(|dir| !candidates.contains(dir))
            .collect();
        removed.sort();
        removed.dedup();

        if !removed.is_empty() {
            for dir in &removed {
                self.debouncer.cancel(dir);
            }
            self.coordinator.cancel_in_flight();
        }

        if let Some(active) = self.active_selection() {
            if !candidates.contains(&active.dir) {
                crate::log_event!("session", "active project removed", "{}", active.dir);
                self.coordinator.deactivate().await;
            }
        }

        self.coordinator.registry().retain(&candidates).await;
        for dir in &removed {
            self.coordinator.forget(dir);
        }

        if candidates.is_empty() {
            return Ok(None);
        }
        self.activate(None, SwitchOptions::default()).await.map(Some)
    }

    /// An editor showing `path` gained focus.
    ///
    /// Returns the new selection when focus caused a switch.
    pub async fn editor_focused(&self, path: &Path) -> SwitchResult<Option<Selection>> {
        let dir = project_for_path(&self.projects.read(), path);
        *self.focused.write() = dir.clone();

        match dir {
            Some(dir) if self.policy.activate_on_focus => self
                .coordinator
                .request_switch(Some(dir), SwitchOptions::default())
                .await
                .map(Some),
            _ => Ok(None),
        }
    }

    /// A file changed on disk. Configuration files of known projects schedule
    /// a debounced reload; anything else is ignored.
    pub fn config_file_changed(&self, path: &Path) -> bool {
        let is_config = path
            .file_name()
            .is_some_and(|name| name == self.config_file.as_str());
        if !is_config {
            return false;
        }

        let Some(parent) = path.parent() else {
            return false;
        };
        let dir = ProjectDirectory::from(parent);
        let known =
            self.projects.read().contains(&dir) || self.coordinator.registry().contains(&dir);
        if !known {
            return false;
        }

        self.debouncer.signal(dir);
        true
    }

    /// Rebuild the active project's index in the background.
    pub fn rebuild_index(&self) -> bool {
        self.coordinator.rebuild_active_index(true)
    }

    /// Abandon the in-flight switch (cancel button of the loading indicator).
    pub fn cancel(&self) {
        self.coordinator.cancel_in_flight();
    }

    /// Tear everything down at workspace close.
    pub async fn shutdown(&self) {
        self.debouncer.cancel_all();
        self.coordinator.deactivate().await;
        self.coordinator.registry().dispose().await;
        crate::log_event!("session", "closed");
    }
}

/// Builder for constructing a [`Session`].
pub struct SessionBuilder {
    config: SwitchingConfig,
    linter: Option<Arc<dyn ConfigLinter>>,
    index_service: Option<Arc<dyn IndexService>>,
    factory: Option<Arc<dyn AuxiliaryFactory>>,
    state: Option<Arc<dyn StateStore>>,
    notifier: Option<Arc<dyn Notifier>>,
    watch_config: bool,
}

impl SessionBuilder {
    pub fn new(config: SwitchingConfig) -> Self {
        Self {
            config,
            linter: None,
            index_service: None,
            factory: None,
            state: None,
            notifier: None,
            watch_config: true,
        }
    }

    /// Builder for `settings`, with selections persisted at
    /// `settings.state_path`.
    pub async fn from_settings(settings: &Settings) -> Result<Self, StateError> {
        let state = JsonStateStore::open(&settings.state_path).await?;
        Ok(Self::new(settings.switching.clone()).state(Arc::new(state)))
    }

    pub fn linter(mut self, linter: Arc<dyn ConfigLinter>) -> Self {
        self.linter = Some(linter);
        self
    }

    pub fn index_service(mut self, service: Arc<dyn IndexService>) -> Self {
        self.index_service = Some(service);
        self
    }

    pub fn auxiliary_factory(mut self, factory: Arc<dyn AuxiliaryFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn state(mut self, state: Arc<dyn StateStore>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Watch the active project's configuration file (default: on).
    ///
    /// Hosts with their own file watch service turn this off and call
    /// [`Session::config_file_changed`] instead.
    pub fn watch_config(mut self, watch: bool) -> Self {
        self.watch_config = watch;
        self
    }

    pub fn build(self) -> Result<Session, SessionError> {
        let linter = self
            .linter
            .ok_or(SessionError::MissingCollaborator("Config linter"))?;
        let index_service = self
            .index_service
            .ok_or(SessionError::MissingCollaborator("Index service"))?;

        let factory = self.factory.unwrap_or_else(|| Arc::new(NoAuxiliary));
        let state = self
            .state
            .unwrap_or_else(|| Arc::new(MemoryStateStore::new()));
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(LogNotifier::new()));

        let projects: ProjectList = Arc::new(RwLock::new(Vec::new()));
        let target = Arc::new(ReloadOnChange {
            coordinator: OnceLock::new(),
            projects: Arc::clone(&projects),
        });
        let debouncer = Arc::new(ChangeDebouncer::new(
            self.config.debounce(),
            Arc::clone(&target) as Arc<dyn DebounceTarget>,
        ));

        let factory = Arc::new(WatchingFactory {
            inner: factory,
            debouncer: Arc::clone(&debouncer),
            config_file: self.config.config_file.clone(),
            watch: self.watch_config,
        });

        let gate = ConfigGate::new(linter, Arc::clone(&notifier), self.config.config_file.clone());
        let registry = Arc::new(ObserverRegistry::new(index_service));

        let coordinator = Arc::new(SwitchCoordinator::new(
            registry,
            gate,
            factory,
            state,
            notifier,
            SelectionBroadcaster::default(),
        ));
        let _ = target.coordinator.set(Arc::downgrade(&coordinator));

        Ok(Session {
            coordinator,
            debouncer,
            policy: SelectionPolicy::new(self.config.activate_on_focus),
            projects,
            focused: RwLock::new(None),
            config_file: self.config.config_file,
        })
    }
}
