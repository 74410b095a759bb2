//! Core traits for engines and external collaborators
//!
//! These traits are defined in core so the dispatcher can be written against
//! them. Implementations live in their respective crates (engines/, storage/,
//! remote/).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::config::AttackTarget;
use crate::metrics::{MetricRecord, RawOutput};
use crate::roster::WorkerTarget;

// ============================================================================
// Engine Trait
// ============================================================================

/// Parameters for one worker's benchmark command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Requests this worker should issue
    pub requests: usize,
    /// Concurrent connections this worker should hold
    pub concurrency: usize,
    /// Reuse connections between requests
    pub keepalive: bool,
    /// What to attack
    pub target: AttackTarget,
}

/// A benchmark tool: how to invoke it and how to read what it prints
///
/// Implementations must be pure. `parse` returns `None` when the primary
/// timing measure cannot be located, whatever else the text contains.
pub trait Engine: Send + Sync {
    /// Engine identifier (e.g., "ab", "siege")
    fn name(&self) -> &str;

    /// Shell command that runs the tool on a worker
    fn build_command(&self, spec: &CommandSpec) -> Result<String, EngineError>;

    /// Extract a canonical record from the tool's output
    fn parse(&self, output: &RawOutput) -> Option<MetricRecord>;
}

/// Engine-specific errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Parameters the tool cannot express
    #[error("invalid parameters for {engine}: {reason}")]
    InvalidParameters {
        /// Engine name
        engine: String,
        /// What was wrong
        reason: String,
    },

    /// No engine registered under this name
    #[error("unknown engine: {0}")]
    Unknown(String),
}

// ============================================================================
// Remote Shell Traits
// ============================================================================

/// Login material shared by every bee in the fleet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Remote login name
    pub username: String,
    /// Private key used for authentication
    pub key_path: PathBuf,
}

impl Credentials {
    /// Create credentials
    pub fn new(username: impl Into<String>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            username: username.into(),
            key_path: key_path.into(),
        }
    }
}

/// Opens command channels to workers
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Open a command channel to `target`
    async fn connect(
        &self,
        target: &WorkerTarget,
        credentials: &Credentials,
    ) -> Result<Box<dyn RemoteSession>, TransportError>;
}

/// An open command channel to one worker
#[async_trait]
pub trait RemoteSession: Send {
    /// Run `command` and capture its output
    ///
    /// A non-zero exit status is not an error here; it is reported in
    /// [`RawOutput::exit_status`].
    async fn exec(&mut self, command: &str) -> Result<RawOutput, TransportError>;
}

/// Transport-level failures against one worker
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Worker unreachable
    #[error("cannot connect to {address}: {detail}")]
    Connect {
        /// Worker address
        address: String,
        /// Underlying failure
        detail: String,
    },

    /// Worker reachable but refused the credentials
    #[error("authentication failed for {address}: {detail}")]
    Auth {
        /// Worker address
        address: String,
        /// Underlying failure
        detail: String,
    },

    /// Channel broke while a command was running
    #[error("remote I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Blob Store Trait
// ============================================================================

/// Durable, name-addressed object store for shared attack inputs
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store identifier for logs (e.g., "s3://bucket", "/var/lib/bees")
    fn location(&self) -> String;

    /// Content hash of the object stored under `name`, if any
    async fn stored_hash(&self, name: &str) -> Result<Option<String>, StorageError>;

    /// Upload `source` under `artifact.name`, recording `artifact.hash`
    async fn put(&self, artifact: &Artifact, source: &Path) -> Result<(), StorageError>;

    /// Shell command a worker runs to copy the object to `dest`
    fn fetch_command(&self, name: &str, dest: &str) -> String;
}

/// Blob store errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// IO error
    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend rejected the operation
    #[error("storage backend error: {0}")]
    Backend(String),
}

// ============================================================================
// Hive Trait
// ============================================================================

/// A compute instance as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeeInstance {
    /// Provider instance id
    pub id: String,
    /// Provider lifecycle state (e.g., "running")
    pub state: String,
    /// Public address, once assigned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl BeeInstance {
    /// Whether the instance can receive an attack order
    pub fn is_ready(&self) -> bool {
        self.state == "running" && self.address.is_some()
    }
}

/// How to provision a fleet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Number of instances
    pub count: usize,
    /// Security group name
    pub group: String,
    /// Availability zone
    pub zone: String,
    /// Machine image id
    pub image_id: String,
    /// Key pair name
    pub key_name: String,
    /// Instance type
    pub instance_type: String,
}

/// Starts, lists and stops remote compute workers
#[async_trait]
pub trait Hive: Send + Sync {
    /// Launch instances and wait until they are addressable
    async fn launch(&self, request: &LaunchRequest) -> Result<Vec<BeeInstance>, HiveError>;

    /// Current state of the given instances
    async fn describe(&self, ids: &[String]) -> Result<Vec<BeeInstance>, HiveError>;

    /// Terminate instances, returning the ids the provider accepted
    async fn terminate(&self, ids: &[String]) -> Result<Vec<String>, HiveError>;
}

/// Compute provider errors
#[derive(Debug, thiserror::Error)]
pub enum HiveError {
    /// Provider call failed
    #[error("provider call failed: {0}")]
    Call(String),

    /// Provider answered with something unreadable
    #[error("unexpected provider response: {0}")]
    Response(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bee_instance_ready() {
        let mut bee = BeeInstance {
            id: "i-1".into(),
            state: "pending".into(),
            address: None,
        };
        assert!(!bee.is_ready());

        bee.state = "running".into();
        assert!(!bee.is_ready());

        bee.address = Some("203.0.113.7".into());
        assert!(bee.is_ready());
    }

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::InvalidParameters {
            engine: "siege".into(),
            reason: "zero repetitions".into(),
        };
        assert_eq!(err.to_string(), "invalid parameters for siege: zero repetitions");
    }
}
