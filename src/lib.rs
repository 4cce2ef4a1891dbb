//! Keeps one project of a multi-project workspace, and one build environment
//! within it, active while the user edits files, switches editors, changes
//! workspace folders or edits the project's configuration file.
//!
//! - [`session`] - inbound signals from the editor host
//! - [`switching`] - the switch pipeline and selection events
//! - [`observer`] - per-project observers wrapping the index service
//! - [`gate`] - configuration validation before a switch commits
//! - [`policy`] - which project to activate when none is named
//! - [`watcher`] - configuration file watching and debouncing
//! - [`services`] - collaborator contracts (linter, index service, state, prompts)

pub mod config;
pub mod error;
pub mod gate;
pub mod logging;
pub mod observer;
pub mod policy;
pub mod services;
pub mod session;
pub mod switching;
pub mod types;
pub mod watcher;

pub use config::Settings;
pub use error::{GateFailure, SwitchError, SwitchResult};
pub use observer::{Observer, ObserverRegistry};
pub use session::{Session, SessionBuilder};
pub use switching::{SelectionEvent, SwitchCoordinator};
pub use types::{Environment, ProjectDirectory, Selection, SwitchOptions};
