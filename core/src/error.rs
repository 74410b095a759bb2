//! Error types for bees-core

use thiserror::Error;

use crate::orchestrator::AggregationError;
use crate::artifact::StageError;
use crate::roster::RosterError;
use crate::traits::{EngineError, HiveError, StorageError};

/// Fleet-level error type
///
/// Per-worker transport and parse failures never surface here; they are
/// captured into an [`Outcome`](crate::outcome::Outcome) for that worker.
#[derive(Error, Debug)]
pub enum BeesError {
    /// Missing roster, missing key file, invalid attack parameters
    #[error("configuration error: {0}")]
    Config(String),

    /// Staged artifact disagrees with a stored object of the same name
    #[error(
        "artifact conflict: {name} is already stored with hash {stored_hash}, local hash is \
         {local_hash}; rename your file or manually replace the stored copy"
    )]
    Conflict {
        /// Logical artifact name
        name: String,
        /// Hash of the object already in the store
        stored_hash: String,
        /// Hash of the local content
        local_hash: String,
    },

    /// Nothing to aggregate
    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    /// Roster persistence failure
    #[error(transparent)]
    Roster(#[from] RosterError),

    /// Artifact staging failure
    #[error(transparent)]
    Stage(#[from] StageError),

    /// Blob store failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Compute provider failure
    #[error(transparent)]
    Hive(#[from] HiveError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BeesError {
    /// Build a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        BeesError::Config(msg.into())
    }

    /// Build a "missing required setting" configuration error
    pub fn missing_config(field: &str) -> Self {
        BeesError::Config(format!("missing required setting: {field}"))
    }

    /// Error raised when a command needs a fleet and none is assembled
    pub fn no_fleet() -> Self {
        BeesError::Config("no bees are ready; run `bees up` first".into())
    }
}

impl From<EngineError> for BeesError {
    fn from(err: EngineError) -> Self {
        BeesError::Config(err.to_string())
    }
}

/// Result type alias
pub type BeesResult<T> = std::result::Result<T, BeesError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_message_mentions_remedy() {
        let err = BeesError::Conflict {
            name: "urls.txt".into(),
            stored_hash: "aaa".into(),
            local_hash: "bbb".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("urls.txt"));
        assert!(msg.contains("rename your file"));
    }

    #[test]
    fn test_aggregation_error_converts() {
        let err: BeesError = AggregationError::NoRecords.into();
        assert!(matches!(err, BeesError::Aggregation(AggregationError::NoRecords)));
    }

    #[test]
    fn test_unknown_engine_is_config_error() {
        let err: BeesError = EngineError::Unknown("wrk".into()).into();
        assert!(matches!(err, BeesError::Config(ref msg) if msg.contains("wrk")));
    }

    #[test]
    fn test_missing_config_message() {
        let err = BeesError::missing_config("engine");
        assert_eq!(err.to_string(), "configuration error: missing required setting: engine");
    }
}
