//! Filesystem blob store
//!
//! Objects live as plain files under a root directory. Workers copy them
//! with `cp`, so the root must be visible on the workers too (a shared
//! mount, or a directory baked into the image).

use std::fs::File;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use bees_core::{shell_quote, Artifact, BlobStore, StorageError};

/// Blob store backed by a local directory
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Store rooted at `root`; the directory is created on first upload
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        // names are flat; refuse anything that could escape the root
        if name.is_empty() || name.contains('/') || name.contains('\\') || name == ".." {
            return Err(StorageError::Backend(format!("invalid object name: {name:?}")));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn location(&self) -> String {
        self.root.display().to_string()
    }

    async fn stored_hash(&self, name: &str) -> Result<Option<String>, StorageError> {
        let path = self.object_path(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(Artifact::hash_bytes(&bytes))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, artifact: &Artifact, source: &Path) -> Result<(), StorageError> {
        let dest = self.object_path(&artifact.name)?;
        tokio::fs::create_dir_all(&self.root).await?;

        let root = self.root.clone();
        let source = source.to_path_buf();
        let expected = artifact.hash.clone();
        let stored = dest.clone();
        tokio::task::spawn_blocking(move || store_noclobber(&root, &source, &stored, &expected))
            .await
            .map_err(|e| StorageError::Backend(format!("staging task failed: {e}")))??;

        tracing::debug!(path = %dest.display(), bytes = artifact.len, "Stored artifact");
        Ok(())
    }

    fn fetch_command(&self, name: &str, dest: &str) -> String {
        let source = self.root.join(name);
        format!(
            "cp {} {}",
            shell_quote(&source.display().to_string()),
            shell_quote(dest)
        )
    }
}

/// Copy `source` beside `dest`, check its hash, then link it into place
///
/// Fails rather than replacing an object that appeared at `dest` meanwhile.
fn store_noclobber(
    root: &Path,
    source: &Path,
    dest: &Path,
    expected: &str,
) -> Result<(), StorageError> {
    let mut partial = tempfile::Builder::new()
        .prefix(".partial-")
        .tempfile_in(root)?;
    let mut input = File::open(source)?;
    io::copy(&mut input, partial.as_file_mut())?;
    partial.as_file().sync_all()?;

    // a partial that fails the check is removed when dropped
    let copied = Artifact::hash_bytes(&std::fs::read(partial.path())?);
    if copied != expected {
        return Err(StorageError::Backend(format!(
            "{} changed while staging (expected {}, copied {})",
            source.display(),
            expected,
            copied
        )));
    }

    partial.persist_noclobber(dest).map_err(|e| {
        if e.error.kind() == ErrorKind::AlreadyExists {
            StorageError::Backend(format!(
                "{} already exists; refusing to overwrite it",
                dest.display()
            ))
        } else {
            StorageError::Io(e.error)
        }
    })?;
    Ok(())
}
