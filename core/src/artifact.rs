//! Content-addressed staging of a shared attack input
//!
//! An [`Artifact`] is pushed to a [`BlobStore`] once, before fan-out. A stored
//! object with the same name and hash is left alone; a stored object with the
//! same name and a different hash is a conflict and is never overwritten.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::error::BeesError;
use crate::traits::{BlobStore, StorageError};

/// Where workers put the fetched artifact
pub const REMOTE_ARTIFACT_DIR: &str = "/tmp";

/// A shared input file, identified by name and content hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Logical name in the store
    pub name: String,
    /// Lowercase hex sha256 of the content
    pub hash: String,
    /// Content length in bytes
    pub len: u64,
    /// Local copy, when the artifact was computed from a file
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Artifact {
    /// Hash a local file; the logical name is the file name
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, StageError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StageError::InvalidName(path.display().to_string()))?
            .to_string();

        let mut file = File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 64 * 1024];
        let mut len = 0u64;
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            len += n as u64;
        }

        Ok(Self {
            name,
            hash: hex::encode(hasher.finalize()),
            len,
            source: Some(path.to_path_buf()),
        })
    }

    /// Reference an object by name and hash without a local copy
    pub fn declared(name: impl Into<String>, hash: impl Into<String>, len: u64) -> Self {
        Self {
            name: name.into(),
            hash: hash.into(),
            len,
            source: None,
        }
    }

    /// Hash an in-memory buffer
    pub fn hash_bytes(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    /// Path the artifact lands at on each worker
    pub fn remote_path(&self) -> String {
        format!("{}/{}", REMOTE_ARTIFACT_DIR, self.name)
    }
}

/// Quote `arg` for a POSIX shell
///
/// Fetch commands run through the worker's login shell, so every path and
/// object key is wrapped in single quotes.
pub fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// Result of staging an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Store already held identical content; nothing was transferred
    AlreadyPresent,
    /// Content was uploaded
    Uploaded,
    /// Store holds different content under the same name; nothing was uploaded
    Conflict {
        /// Hash of the stored object
        stored_hash: String,
    },
}

/// Instructions for a worker to pull a staged artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFetch {
    /// Where the artifact lands on the worker
    pub remote_path: String,
    /// Command that copies it there
    pub command: String,
}

/// Pushes artifacts to a blob store without ever overwriting
#[derive(Clone)]
pub struct ArtifactDistributor {
    store: Arc<dyn BlobStore>,
}

impl ArtifactDistributor {
    /// Distributor over `store`
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Compare against the stored object and upload only if absent
    pub async fn stage(&self, artifact: &Artifact) -> Result<StageOutcome, StageError> {
        match self.store.stored_hash(&artifact.name).await? {
            Some(stored) if stored == artifact.hash => {
                tracing::info!(
                    name = %artifact.name,
                    store = %self.store.location(),
                    "Artifact already staged"
                );
                Ok(StageOutcome::AlreadyPresent)
            }
            Some(stored) => {
                tracing::warn!(
                    name = %artifact.name,
                    stored_hash = %stored,
                    local_hash = %artifact.hash,
                    "Stored artifact differs from local content"
                );
                Ok(StageOutcome::Conflict {
                    stored_hash: stored,
                })
            }
            None => {
                let source = artifact
                    .source
                    .as_deref()
                    .ok_or_else(|| StageError::MissingSource(artifact.name.clone()))?;
                self.store.put(artifact, source).await?;
                tracing::info!(
                    name = %artifact.name,
                    bytes = artifact.len,
                    store = %self.store.location(),
                    "Artifact uploaded"
                );
                Ok(StageOutcome::Uploaded)
            }
        }
    }

    /// Stage, turning a conflict into a fatal error
    pub async fn stage_or_fail(&self, artifact: &Artifact) -> Result<ArtifactFetch, BeesError> {
        match self.stage(artifact).await? {
            StageOutcome::Conflict { stored_hash } => Err(BeesError::Conflict {
                name: artifact.name.clone(),
                stored_hash,
                local_hash: artifact.hash.clone(),
            }),
            StageOutcome::AlreadyPresent | StageOutcome::Uploaded => Ok(self.fetch(artifact)),
        }
    }

    /// Fetch instructions for a staged artifact
    pub fn fetch(&self, artifact: &Artifact) -> ArtifactFetch {
        let remote_path = artifact.remote_path();
        ArtifactFetch {
            command: self.store.fetch_command(&artifact.name, &remote_path),
            remote_path,
        }
    }
}

impl std::fmt::Debug for ArtifactDistributor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactDistributor")
            .field("store", &self.store.location())
            .finish()
    }
}

/// Artifact staging errors
#[derive(Debug, Error)]
pub enum StageError {
    /// Path has no usable file name
    #[error("cannot derive an artifact name from {0}")]
    InvalidName(String),

    /// Declared artifact is not in the store and there is nothing to upload
    #[error("artifact {0} is not stored and has no local source")]
    MissingSource(String),

    /// Blob store failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// IO error while hashing
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
