//! Reacting to configuration file changes.
//!
//! # Architecture
//!
//! ```text
//! ConfigWatcher (auxiliary resource of the active project)
//!   - notify::RecommendedWatcher on the project directory
//!   - forwards config file events
//!         |
//! ChangeDebouncer
//!   - one timer per directory, reset on every signal
//!         |
//! DebounceTarget::fire(dir)  ->  forced switch request
//! ```

mod config_watcher;
mod debouncer;
mod error;

pub use config_watcher::ConfigWatcher;
pub use debouncer::{ChangeDebouncer, DebounceTarget};
pub use error::WatchError;
