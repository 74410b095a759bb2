//! Builder pattern for Dispatcher construction

use std::sync::Arc;
use std::time::Duration;

use crate::artifact::ArtifactFetch;
use crate::error::{BeesError, BeesResult};
use crate::traits::{Credentials, Engine, RemoteShell};

use super::executor::Dispatcher;

/// Builder for creating a Dispatcher
///
/// # Example
///
/// ```ignore
/// let dispatcher = DispatcherBuilder::new()
///     .shell(Arc::new(SshShell::default()))
///     .engine(registry.get("ab")?)
///     .credentials(Credentials::new("newsapps", key_path))
///     .task_timeout(Some(Duration::from_secs(600)))
///     .build()?;
///
/// let outcomes = dispatcher.run(&targets, &plan.command).await?;
/// ```
#[derive(Default)]
pub struct DispatcherBuilder {
    shell: Option<Arc<dyn RemoteShell>>,
    engine: Option<Arc<dyn Engine>>,
    credentials: Option<Credentials>,
    fetch: Option<ArtifactFetch>,
    task_timeout: Option<Duration>,
}

impl DispatcherBuilder {
    /// Create a new dispatcher builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the remote shell
    pub fn shell(mut self, shell: Arc<dyn RemoteShell>) -> Self {
        self.shell = Some(shell);
        self
    }

    /// Set the engine
    pub fn engine(mut self, engine: Arc<dyn Engine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Set the fleet credentials
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Have every bee pull a staged artifact before attacking
    pub fn fetch(mut self, fetch: Option<ArtifactFetch>) -> Self {
        self.fetch = fetch;
        self
    }

    /// Limit each bee's task; `None` (the default) waits indefinitely
    pub fn task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Build the dispatcher
    ///
    /// # Errors
    ///
    /// Returns an error if shell, engine or credentials are not set, or if
    /// the timeout is zero.
    pub fn build(self) -> BeesResult<Dispatcher> {
        let shell = self.shell.ok_or_else(|| BeesError::missing_config("shell"))?;
        let engine = self
            .engine
            .ok_or_else(|| BeesError::missing_config("engine"))?;
        let credentials = self
            .credentials
            .ok_or_else(|| BeesError::missing_config("credentials"))?;

        if self.task_timeout.is_some_and(|t| t.is_zero()) {
            return Err(BeesError::config("task timeout must be greater than zero"));
        }

        let mut dispatcher = Dispatcher::new(shell, engine, credentials);
        dispatcher.fetch = self.fetch;
        dispatcher.task_timeout = self.task_timeout;

        Ok(dispatcher)
    }
}
