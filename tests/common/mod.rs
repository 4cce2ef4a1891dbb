//! Fake collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use projswitch::config::SwitchingConfig;
use projswitch::error::CollaboratorError;
use projswitch::services::{
    AuxiliaryFactory, AuxiliaryResource, ConfigLinter, IndexHandle, IndexService, LoadingHandle,
    Notifier, StateStore,
};
use projswitch::{Observer, ProjectDirectory, Session, SessionBuilder};

fn project_of(config_path: &Path) -> String {
    config_path
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}

/// Suspends a collaborator call for one project to observe interleavings.
pub struct Hold {
    pub entered: Notify,
    pub release: Notify,
}

impl Hold {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            entered: Notify::new(),
            release: Notify::new(),
        })
    }

    async fn wait(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

/// Disposal order across the index service and the auxiliary resources.
pub type Timeline = Arc<Mutex<Vec<String>>>;

#[derive(Default)]
pub struct FakeLinter {
    invalid: Mutex<HashSet<String>>,
    environments: Mutex<HashMap<String, Vec<String>>>,
    holds: Mutex<HashMap<String, Arc<Hold>>>,
}

impl FakeLinter {
    pub fn set_invalid(&self, dir: &str, invalid: bool) {
        let mut set = self.invalid.lock();
        if invalid {
            set.insert(dir.to_string());
        } else {
            set.remove(dir);
        }
    }

    pub fn set_environments(&self, dir: &str, envs: &[&str]) {
        self.environments
            .lock()
            .insert(dir.to_string(), envs.iter().map(|e| e.to_string()).collect());
    }

    /// Suspend the next validation of `dir` until released.
    pub fn hold(&self, dir: &str) -> Arc<Hold> {
        let hold = Hold::new();
        self.holds.lock().insert(dir.to_string(), Arc::clone(&hold));
        hold
    }
}

#[async_trait]
impl ConfigLinter for FakeLinter {
    async fn validate(&self, path: &Path) -> Result<bool, CollaboratorError> {
        let dir = project_of(path);

        let hold = self.holds.lock().remove(&dir);
        if let Some(hold) = hold {
            hold.wait().await;
        }

        Ok(!self.invalid.lock().contains(&dir))
    }

    async fn environments(&self, path: &Path) -> Result<Vec<String>, CollaboratorError> {
        let dir = project_of(path);
        Ok(self
            .environments
            .lock()
            .get(&dir)
            .cloned()
            .unwrap_or_else(|| vec!["debug".to_string(), "release".to_string(), "x".to_string()]))
    }
}

#[derive(Default)]
pub struct FakeIndexService {
    next_id: AtomicU64,
    pub calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    timeline: Timeline,
}

impl FakeIndexService {
    pub fn with_timeline(timeline: Timeline) -> Self {
        Self {
            timeline,
            ..Self::default()
        }
    }

    pub fn fail_activation(&self, dir: &str) {
        self.failing.lock().insert(dir.to_string());
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl IndexService for FakeIndexService {
    fn get_or_create(&self, dir: &ProjectDirectory) -> IndexHandle {
        self.calls.lock().push(format!("create {dir}"));
        IndexHandle {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            dir: dir.clone(),
        }
    }

    async fn set_active(&self, dir: &ProjectDirectory) -> Result<(), CollaboratorError> {
        if self.failing.lock().contains(&dir.to_string()) {
            return Err(CollaboratorError::IndexService {
                dir: dir.clone(),
                reason: "indexer crashed".to_string(),
            });
        }
        self.calls.lock().push(format!("active {dir}"));
        Ok(())
    }

    async fn rebuild_index(&self, handle: &IndexHandle, force: bool) -> Result<(), CollaboratorError> {
        self.calls
            .lock()
            .push(format!("rebuild {} {force}", handle.dir));
        Ok(())
    }

    async fn dispose(&self, handle: &IndexHandle) {
        self.calls.lock().push(format!("dispose {}", handle.dir));
        self.timeline
            .lock()
            .push(format!("index-dispose {}", handle.dir));
    }

    async fn shutdown(&self) {
        self.calls.lock().push("shutdown".to_string());
    }
}

/// Tracks which projects have live task/test lists.
#[derive(Default)]
pub struct Ledger {
    pub live: Mutex<Vec<String>>,
    pub log: Mutex<Vec<String>>,
    pub overlaps: AtomicU64,
    timeline: Timeline,
}

impl Ledger {
    pub fn created(&self, dir: &str) -> usize {
        let needle = format!("create {dir}");
        self.log.lock().iter().filter(|l| **l == needle).count()
    }

    pub fn live_dirs(&self) -> Vec<String> {
        let mut dirs: Vec<String> = self.live.lock().clone();
        dirs.sort();
        dirs.dedup();
        dirs
    }
}

pub struct FakeResource {
    name: String,
    dir: String,
    ledger: Arc<Ledger>,
}

#[async_trait]
impl AuxiliaryResource for FakeResource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn dispose(&self) {
        let mut live = self.ledger.live.lock();
        if let Some(pos) = live.iter().position(|d| *d == self.dir) {
            live.remove(pos);
        }
        self.ledger
            .log
            .lock()
            .push(format!("dispose {} {}", self.name, self.dir));
        self.ledger
            .timeline
            .lock()
            .push(format!("resource-dispose {} {}", self.name, self.dir));
    }
}

#[derive(Default)]
pub struct FakeFactory {
    pub ledger: Arc<Ledger>,
    failing: Mutex<HashSet<String>>,
    holds: Mutex<HashMap<String, Arc<Hold>>>,
}

impl FakeFactory {
    pub fn with_timeline(timeline: Timeline) -> Self {
        Self {
            ledger: Arc::new(Ledger {
                timeline,
                ..Ledger::default()
            }),
            ..Self::default()
        }
    }

    pub fn fail_for(&self, dir: &str) {
        self.failing.lock().insert(dir.to_string());
    }

    /// Suspend the next resource construction for `dir` until released.
    pub fn hold(&self, dir: &str) -> Arc<Hold> {
        let hold = Hold::new();
        self.holds.lock().insert(dir.to_string(), Arc::clone(&hold));
        hold
    }
}

#[async_trait]
impl AuxiliaryFactory for FakeFactory {
    async fn create(
        &self,
        dir: &ProjectDirectory,
        _observer: Arc<Observer>,
    ) -> Result<Vec<Box<dyn AuxiliaryResource>>, CollaboratorError> {
        let key = dir.to_string();

        let hold = self.holds.lock().remove(&key);
        if let Some(hold) = hold {
            hold.wait().await;
        }

        if self.failing.lock().contains(&key) {
            return Err(CollaboratorError::Resource {
                resource: "task list".to_string(),
                dir: dir.clone(),
                reason: "task enumeration failed".to_string(),
            });
        }

        // Yield so overlapping requests get a chance to interleave.
        tokio::task::yield_now().await;

        {
            let mut live = self.ledger.live.lock();
            if live.iter().any(|d| *d != key) {
                self.ledger.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            live.push(key.clone());
            live.push(key.clone());
        }
        self.ledger.log.lock().push(format!("create {key}"));

        Ok(["tasks", "tests"]
            .into_iter()
            .map(|name| {
                Box::new(FakeResource {
                    name: name.to_string(),
                    dir: key.clone(),
                    ledger: Arc::clone(&self.ledger),
                }) as Box<dyn AuxiliaryResource>
            })
            .collect())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub errors: Mutex<Vec<String>>,
    pub opened: Mutex<Vec<PathBuf>>,
    pub statuses: Mutex<Vec<String>>,
    next: AtomicU64,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn show_error(&self, message: &str) {
        self.errors.lock().push(message.to_string());
    }

    fn show_loading(&self, _text: &str) -> LoadingHandle {
        LoadingHandle(self.next.fetch_add(1, Ordering::SeqCst))
    }

    fn update_loading(&self, _handle: LoadingHandle, text: &str) {
        self.statuses.lock().push(text.to_string());
    }

    async fn open_file(&self, path: &Path) {
        self.opened.lock().push(path.to_path_buf());
    }
}

pub struct Harness {
    pub session: Session,
    pub linter: Arc<FakeLinter>,
    pub index: Arc<FakeIndexService>,
    pub factory: Arc<FakeFactory>,
    pub notifier: Arc<RecordingNotifier>,
    pub timeline: Timeline,
}

impl Harness {
    pub fn ledger(&self) -> &Ledger {
        &self.factory.ledger
    }
}

pub fn switching_config(debounce_ms: u64) -> SwitchingConfig {
    SwitchingConfig {
        debounce_ms,
        ..SwitchingConfig::default()
    }
}

pub fn harness_with(config: SwitchingConfig, state: Arc<dyn StateStore>, watch: bool) -> Harness {
    harness_from(Session::builder(config).state(state), watch)
}

/// Harness around a builder the caller already configured.
pub fn harness_from(builder: SessionBuilder, watch: bool) -> Harness {
    let timeline = Timeline::default();
    let linter = Arc::new(FakeLinter::default());
    let index = Arc::new(FakeIndexService::with_timeline(Arc::clone(&timeline)));
    let factory = Arc::new(FakeFactory::with_timeline(Arc::clone(&timeline)));
    let notifier = Arc::new(RecordingNotifier::default());

    let session = builder
        .linter(linter.clone())
        .index_service(index.clone())
        .auxiliary_factory(factory.clone())
        .notifier(notifier.clone())
        .watch_config(watch)
        .build()
        .unwrap();

    Harness {
        session,
        linter,
        index,
        factory,
        notifier,
        timeline,
    }
}

pub fn harness() -> Harness {
    harness_with(
        switching_config(50),
        Arc::new(projswitch::services::MemoryStateStore::new()),
        false,
    )
}

pub fn dirs(names: &[&str]) -> Vec<ProjectDirectory> {
    names.iter().map(|n| ProjectDirectory::new(*n)).collect()
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn eventually(timeout: Duration, check: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
