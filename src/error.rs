//! Error types for project switching and its collaborators.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ProjectDirectory;

/// Configuration of a project failed validation.
///
/// Recoverable: the previously active project stays untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Configuration of {dir} is invalid: {reason}")]
pub struct GateFailure {
    pub dir: ProjectDirectory,
    pub reason: String,
}

/// Errors returned by a switch request.
#[derive(Error, Debug)]
pub enum SwitchError {
    #[error("No project directory to switch to")]
    MissingDirectory,

    #[error(transparent)]
    Gate(#[from] GateFailure),

    /// A newer request took over while this one was suspended.
    #[error("Switch to {dir} was superseded by a newer request")]
    Superseded { dir: ProjectDirectory },

    #[error("Failed to activate {dir}: {reason}")]
    Internal {
        dir: ProjectDirectory,
        reason: String,
    },
}

impl SwitchError {
    /// Superseded requests are not reported to the user.
    pub fn is_silent(&self) -> bool {
        matches!(self, SwitchError::Superseded { .. })
    }
}

pub type SwitchResult<T> = Result<T, SwitchError>;

/// Errors reported by injected collaborators (linter, index service,
/// auxiliary resource factory).
#[derive(Error, Debug, Clone)]
pub enum CollaboratorError {
    #[error("Failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Index service error for {dir}: {reason}")]
    IndexService {
        dir: ProjectDirectory,
        reason: String,
    },

    #[error("Failed to create {resource} for {dir}: {reason}")]
    Resource {
        resource: String,
        dir: ProjectDirectory,
        reason: String,
    },
}

/// Errors from the persisted key-value store.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupted state file {path}: {reason}")]
    Corrupted { path: PathBuf, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors while assembling a session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("{0} is required")]
    MissingCollaborator(&'static str),
}
