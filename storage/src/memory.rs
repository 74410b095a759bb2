//! In-memory blob store
//!
//! Holds objects in a map and counts uploads. Workers receive the content
//! inline in their fetch command, which suits small inputs such as URL
//! lists.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use bees_core::{shell_quote, Artifact, BlobStore, StorageError};

const HEREDOC_MARKER: &str = "BEES_ARTIFACT_EOF";

/// Blob store living in process memory
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    transfers: AtomicUsize,
}

impl MemoryBlobStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `content` under `name`, not counted as a transfer
    pub fn with_object(self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), content.into());
        self
    }

    /// Number of uploads performed so far
    pub fn transfers(&self) -> usize {
        self.transfers.load(Ordering::SeqCst)
    }

    /// Stored content under `name`
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn location(&self) -> String {
        "memory".to_string()
    }

    async fn stored_hash(&self, name: &str) -> Result<Option<String>, StorageError> {
        Ok(self.get(name).map(|bytes| Artifact::hash_bytes(&bytes)))
    }

    async fn put(&self, artifact: &Artifact, source: &Path) -> Result<(), StorageError> {
        let bytes = tokio::fs::read(source).await?;
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(artifact.name.clone(), bytes);
        self.transfers.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn fetch_command(&self, name: &str, dest: &str) -> String {
        let content = self
            .get(name)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default();
        let body = content.strip_suffix('\n').unwrap_or(&content);
        format!(
            "cat > {} <<'{HEREDOC_MARKER}'\n{body}\n{HEREDOC_MARKER}",
            shell_quote(dest)
        )
    }
}
