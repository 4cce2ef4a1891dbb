use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A directory holding one build-tool configuration file.
///
/// The natural key for every piece of per-project state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectDirectory(PathBuf);

impl ProjectDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Path of the configuration file inside this project.
    pub fn config_file(&self, file_name: &str) -> PathBuf {
        self.0.join(file_name)
    }

    /// Whether `path` is this directory or lives somewhere below it.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.0)
    }

    /// Number of path components, used to prefer the deepest project.
    pub fn depth(&self) -> usize {
        self.0.components().count()
    }
}

impl fmt::Display for ProjectDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<PathBuf> for ProjectDirectory {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl From<&Path> for ProjectDirectory {
    fn from(path: &Path) -> Self {
        Self(path.to_path_buf())
    }
}

impl From<&str> for ProjectDirectory {
    fn from(path: &str) -> Self {
        Self(PathBuf::from(path))
    }
}

impl AsRef<Path> for ProjectDirectory {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Build environment selected inside a project.
///
/// `Default` means no environment was explicitly chosen and the build tool
/// falls back to whatever the configuration declares as default.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum Environment {
    #[default]
    Default,
    Named(String),
}

impl Environment {
    pub fn named(name: impl Into<String>) -> Self {
        Environment::Named(name.into())
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Environment::Default => None,
            Environment::Named(name) => Some(name),
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Environment::Default)
    }

    /// Label shown next to the project name.
    pub fn label(&self) -> &str {
        self.name().unwrap_or("Default")
    }

    /// Whether this environment is defined by `declared`.
    ///
    /// `Default` is always available.
    pub fn is_declared_in(&self, declared: &[String]) -> bool {
        match self {
            Environment::Default => true,
            Environment::Named(name) => declared.iter().any(|d| d == name),
        }
    }
}

impl From<Option<String>> for Environment {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(name) if !name.is_empty() => Environment::Named(name),
            _ => Environment::Default,
        }
    }
}

impl From<Environment> for Option<String> {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Default => None,
            Environment::Named(name) => Some(name),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The active project and environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub dir: ProjectDirectory,
    pub env: Environment,
}

impl Selection {
    pub fn new(dir: ProjectDirectory, env: Environment) -> Self {
        Self { dir, env }
    }

    /// Text for the loading indicator once a switch resolves.
    pub fn label(&self) -> String {
        let name = self
            .dir
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.dir.to_string());
        format!("{name} ({})", self.env.label())
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.dir, self.env)
    }
}

/// Options accepted by a switch request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwitchOptions {
    /// Environment to select; `None` keeps the cached or persisted one.
    pub env: Option<Environment>,
    /// Rebuild auxiliary resources even when nothing changed.
    pub force: bool,
}

impl SwitchOptions {
    pub fn forced() -> Self {
        Self {
            env: None,
            force: true,
        }
    }

    pub fn with_env(env: Environment) -> Self {
        Self {
            env: Some(env),
            force: false,
        }
    }
}
