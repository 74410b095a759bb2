//! Attack configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::traits::CommandSpec;

/// What the bees attack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackTarget {
    /// A single URL
    Url(String),
    /// A file of URLs already present on each worker
    UrlFile {
        /// Path of the file on the worker
        remote_path: String,
    },
}

impl AttackTarget {
    /// Human-readable description for logs
    pub fn describe(&self) -> String {
        match self {
            AttackTarget::Url(url) => url.clone(),
            AttackTarget::UrlFile { remote_path } => format!("urls from {remote_path}"),
        }
    }
}

/// Attack configuration
///
/// Totals are for the whole fleet; [`AttackConfig::split`] divides them
/// across the live workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackConfig {
    /// Total requests across the fleet
    pub total_requests: usize,

    /// Total concurrent connections across the fleet
    pub total_concurrency: usize,

    /// Reuse connections between requests
    pub keepalive: bool,

    /// Engine name, resolved through the engine registry
    pub engine: String,

    /// What to attack
    pub target: AttackTarget,

    /// Per-worker time limit; `None` waits for every worker indefinitely
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_timeout: Option<Duration>,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            total_requests: 1000,
            total_concurrency: 100,
            keepalive: false,
            engine: "ab".into(),
            target: AttackTarget::Url(String::new()),
            task_timeout: None,
        }
    }
}

impl AttackConfig {
    /// Create a config attacking `url` with default totals
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            target: AttackTarget::Url(url.into()),
            ..Default::default()
        }
    }

    /// Set the total request count
    pub fn with_requests(mut self, total: usize) -> Self {
        self.total_requests = total;
        self
    }

    /// Set the total concurrency
    pub fn with_concurrency(mut self, total: usize) -> Self {
        self.total_concurrency = total;
        self
    }

    /// Enable or disable keepalive
    pub fn with_keepalive(mut self, keepalive: bool) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Select the engine by name
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    /// Replace the attack target
    pub fn with_target(mut self, target: AttackTarget) -> Self {
        self.target = target;
        self
    }

    /// Set a per-worker time limit
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_requests == 0 {
            return Err(ConfigError::InvalidRequests(
                "request count must be at least 1".into(),
            ));
        }

        if self.total_concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency(
                "concurrency must be at least 1".into(),
            ));
        }

        match &self.target {
            AttackTarget::Url(url) if url.trim().is_empty() => {
                return Err(ConfigError::InvalidTarget("target URL is empty".into()));
            }
            AttackTarget::UrlFile { remote_path } if remote_path.trim().is_empty() => {
                return Err(ConfigError::InvalidTarget("URL file path is empty".into()));
            }
            _ => {}
        }

        if let Some(timeout) = self.task_timeout {
            if timeout.is_zero() {
                return Err(ConfigError::InvalidTimeout(timeout));
            }
        }

        Ok(())
    }

    /// Divide the fleet totals evenly across `workers`
    ///
    /// Integer division: remainders are dropped, so every worker gets the
    /// same command. A split that leaves a worker with nothing to do fails.
    pub fn split(&self, workers: usize) -> Result<AttackPlan, ConfigError> {
        self.validate()?;

        if workers == 0 {
            return Err(ConfigError::NoWorkers);
        }

        let requests_per_worker = self.total_requests / workers;
        let concurrency_per_worker = self.total_concurrency / workers;

        if requests_per_worker == 0 {
            return Err(ConfigError::InvalidRequests(format!(
                "{} requests cannot be split across {} bees",
                self.total_requests, workers
            )));
        }
        if concurrency_per_worker == 0 {
            return Err(ConfigError::InvalidConcurrency(format!(
                "{} connections cannot be split across {} bees",
                self.total_concurrency, workers
            )));
        }

        Ok(AttackPlan {
            workers,
            command: CommandSpec {
                requests: requests_per_worker,
                concurrency: concurrency_per_worker,
                keepalive: self.keepalive,
                target: self.target.clone(),
            },
            task_timeout: self.task_timeout,
        })
    }
}

/// An attack config resolved against a concrete fleet size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackPlan {
    /// Number of workers the plan was split for
    pub workers: usize,
    /// Per-worker command parameters
    pub command: CommandSpec,
    /// Per-worker time limit
    pub task_timeout: Option<Duration>,
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Invalid request count
    #[error("Invalid request count: {0}")]
    InvalidRequests(String),

    /// Invalid concurrency
    #[error("Invalid concurrency: {0}")]
    InvalidConcurrency(String),

    /// Invalid target
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Invalid timeout
    #[error("Invalid timeout: {0:?}")]
    InvalidTimeout(Duration),

    /// No live workers to split across
    #[error("No bees are available to attack")]
    NoWorkers,
}

impl From<ConfigError> for crate::error::BeesError {
    fn from(err: ConfigError) -> Self {
        crate::error::BeesError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AttackConfig::default();
        assert_eq!(config.total_requests, 1000);
        assert_eq!(config.total_concurrency, 100);
        assert!(!config.keepalive);
        assert_eq!(config.engine, "ab");
        assert!(config.task_timeout.is_none());
    }

    #[test]
    fn test_config_builder_pattern() {
        let config = AttackConfig::new("http://www.example.com/")
            .with_requests(500)
            .with_concurrency(50)
            .with_keepalive(true)
            .with_engine("siege")
            .with_task_timeout(Duration::from_secs(60));

        assert_eq!(config.total_requests, 500);
        assert_eq!(config.total_concurrency, 50);
        assert!(config.keepalive);
        assert_eq!(config.engine, "siege");
        assert_eq!(config.task_timeout, Some(Duration::from_secs(60)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_requests() {
        let config = AttackConfig::new("http://www.example.com/").with_requests(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRequests(_))
        ));
    }

    #[test]
    fn test_config_validation_empty_url() {
        let config = AttackConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTarget(_))));
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let config =
            AttackConfig::new("http://www.example.com/").with_task_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout(_))));
    }

    #[test]
    fn test_split_divides_evenly() {
        let config = AttackConfig::new("http://www.example.com/")
            .with_requests(1000)
            .with_concurrency(100);

        let plan = config.split(4).unwrap();
        assert_eq!(plan.workers, 4);
        assert_eq!(plan.command.requests, 250);
        assert_eq!(plan.command.concurrency, 25);
    }

    #[test]
    fn test_split_drops_remainder() {
        let config = AttackConfig::new("http://www.example.com/")
            .with_requests(1001)
            .with_concurrency(10);

        let plan = config.split(3).unwrap();
        assert_eq!(plan.command.requests, 333);
        assert_eq!(plan.command.concurrency, 3);
    }

    #[test]
    fn test_split_rejects_starved_workers() {
        let config = AttackConfig::new("http://www.example.com/")
            .with_requests(1000)
            .with_concurrency(2);

        assert!(matches!(
            config.split(5),
            Err(ConfigError::InvalidConcurrency(_))
        ));
        assert!(matches!(config.split(0), Err(ConfigError::NoWorkers)));
    }
}
