//! S3 blob store via the `aws` CLI
//!
//! The content hash is recorded as `sha256` user metadata on upload and read
//! back with `head-object`. Workers fetch with `aws s3 cp`, so they need the
//! CLI and read access to the bucket (an instance profile is enough).

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use bees_core::{shell_quote, Artifact, BlobStore, StorageError};

use crate::aws::{AwsCli, AwsError};

/// Metadata key holding the content hash
pub const HASH_METADATA_KEY: &str = "sha256";

/// Blob store backed by one S3 bucket
#[derive(Debug, Clone)]
pub struct S3BlobStore {
    cli: AwsCli,
    bucket: String,
}

impl S3BlobStore {
    /// Store over `bucket` in `region`
    pub fn new(region: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            cli: AwsCli::new(region),
            bucket: bucket.into(),
        }
    }

    /// `s3://bucket/name`
    pub fn object_url(&self, name: &str) -> String {
        format!("s3://{}/{}", self.bucket, name)
    }
}

impl From<AwsError> for StorageError {
    fn from(err: AwsError) -> Self {
        StorageError::Backend(err.to_string())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HeadObjectOutput {
    #[serde(default)]
    metadata: std::collections::HashMap<String, String>,
    #[serde(default)]
    e_tag: Option<String>,
}

/// Recorded content hash from a `head-object` response
///
/// An object stored without a recorded hash cannot be compared, so it is
/// reported under a placeholder that never matches a real digest.
pub fn parse_head_object(json: &str) -> Result<String, StorageError> {
    let head: HeadObjectOutput = serde_json::from_str(json)
        .map_err(|e| StorageError::Backend(format!("head-object: {e}")))?;

    Ok(match head.metadata.get(HASH_METADATA_KEY) {
        Some(hash) => hash.to_lowercase(),
        None => format!(
            "unrecorded (etag {})",
            head.e_tag.as_deref().unwrap_or("unknown").trim_matches('"')
        ),
    })
}

#[async_trait]
impl BlobStore for S3BlobStore {
    fn location(&self) -> String {
        format!("s3://{}", self.bucket)
    }

    async fn stored_hash(&self, name: &str) -> Result<Option<String>, StorageError> {
        let result = self
            .cli
            .run(&["s3api", "head-object", "--bucket", self.bucket.as_str(), "--key", name])
            .await;

        match result {
            Ok(json) => parse_head_object(&json).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, artifact: &Artifact, source: &Path) -> Result<(), StorageError> {
        let source = source.display().to_string();
        let dest = self.object_url(&artifact.name);
        let metadata = format!("{HASH_METADATA_KEY}={}", artifact.hash);

        self.cli
            .run(&[
                "s3",
                "cp",
                source.as_str(),
                dest.as_str(),
                "--metadata",
                metadata.as_str(),
                "--only-show-errors",
            ])
            .await?;

        tracing::debug!(%dest, bytes = artifact.len, "Uploaded artifact");
        Ok(())
    }

    fn fetch_command(&self, name: &str, dest: &str) -> String {
        format!(
            "aws --region {} s3 cp {} {} --only-show-errors",
            shell_quote(self.cli.region()),
            shell_quote(&self.object_url(name)),
            shell_quote(dest)
        )
    }
}
