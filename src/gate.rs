//! Configuration validation ahead of a switch.
//!
//! The gate fails closed: a configuration that cannot be parsed or linted
//! blocks the switch, the user is told why and the offending file is opened.

use std::sync::Arc;

use crate::error::GateFailure;
use crate::services::{ConfigLinter, Notifier};
use crate::types::{Environment, ProjectDirectory};

pub struct ConfigGate {
    linter: Arc<dyn ConfigLinter>,
    notifier: Arc<dyn Notifier>,
    config_file: String,
}

impl ConfigGate {
    pub fn new(
        linter: Arc<dyn ConfigLinter>,
        notifier: Arc<dyn Notifier>,
        config_file: impl Into<String>,
    ) -> Self {
        Self {
            linter,
            notifier,
            config_file: config_file.into(),
        }
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// `true` when the configuration of `dir` is valid.
    pub async fn validate(&self, dir: &ProjectDirectory) -> bool {
        self.check(dir).await.is_ok()
    }

    /// Validate `dir`, reporting the reason on failure.
    ///
    /// A failure surfaces a diagnostic and opens the configuration file.
    pub async fn check(&self, dir: &ProjectDirectory) -> Result<(), GateFailure> {
        let path = dir.config_file(&self.config_file);

        let reason = match self.linter.validate(&path).await {
            Ok(true) => return Ok(()),
            Ok(false) => format!("{} failed validation", path.display()),
            Err(e) => e.to_string(),
        };

        let failure = GateFailure {
            dir: dir.clone(),
            reason,
        };
        self.reject(&failure).await;
        Err(failure)
    }

    /// Environments declared by the configuration of `dir`.
    ///
    /// A parse error here is treated like a failed validation.
    pub async fn environments(&self, dir: &ProjectDirectory) -> Result<Vec<String>, GateFailure> {
        let path = dir.config_file(&self.config_file);
        match self.linter.environments(&path).await {
            Ok(envs) => Ok(envs),
            Err(e) => {
                let failure = GateFailure {
                    dir: dir.clone(),
                    reason: e.to_string(),
                };
                self.reject(&failure).await;
                Err(failure)
            }
        }
    }

    /// Reject an explicitly requested environment the configuration lacks.
    pub async fn require_environment(
        &self,
        dir: &ProjectDirectory,
        env: &Environment,
        declared: &[String],
    ) -> Result<(), GateFailure> {
        if env.is_declared_in(declared) {
            return Ok(());
        }

        let failure = GateFailure {
            dir: dir.clone(),
            reason: format!("environment '{env}' is not defined"),
        };
        self.reject(&failure).await;
        Err(failure)
    }

    async fn reject(&self, failure: &GateFailure) {
        tracing::warn!("[gate] {failure}");
        self.notifier.show_error(&failure.to_string()).await;
        self.notifier
            .open_file(&failure.dir.config_file(&self.config_file))
            .await;
    }
}
