//! Durable record of the active fleet
//!
//! The roster file is line-oriented:
//!
//! ```text
//! us-east-1        <- region
//! newsapps         <- username
//! frontend         <- key pair name
//! i-0a1b2c3d       <- one worker id per line
//! i-0e4f5a6b
//! ```
//!
//! Only one fleet exists at a time. [`RosterStore::save`] refuses to replace
//! an existing roster and never leaves a partial file behind.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::traits::BeeInstance;

/// One remote worker, resolved to an address for the current attack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerTarget {
    /// Provider instance id
    pub id: String,
    /// Address used to open a command channel
    pub address: String,
    /// Position in the roster
    pub index: usize,
}

/// The active fleet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    /// Provider region the fleet lives in
    pub region: String,
    /// Remote login name
    pub username: String,
    /// Key pair name; the private key is expected at `~/.ssh/<key_name>.pem`
    pub key_name: String,
    /// Worker ids in launch order
    pub workers: Vec<String>,
}

impl Roster {
    /// Create a roster
    pub fn new(
        region: impl Into<String>,
        username: impl Into<String>,
        key_name: impl Into<String>,
        workers: Vec<String>,
    ) -> Self {
        Self {
            region: region.into(),
            username: username.into(),
            key_name: key_name.into(),
            workers,
        }
    }

    /// Number of workers on the roster
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether the roster lists no workers
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Resolve roster ids to attack targets
    ///
    /// Keeps roster order. Instances the provider does not report as ready
    /// are skipped; [`WorkerTarget::index`] is the position among the ready
    /// ones.
    pub fn targets(&self, instances: &[BeeInstance]) -> Vec<WorkerTarget> {
        let by_id: HashMap<&str, &BeeInstance> =
            instances.iter().map(|bee| (bee.id.as_str(), bee)).collect();

        self.workers
            .iter()
            .filter_map(|id| by_id.get(id.as_str()))
            .filter(|bee| bee.is_ready())
            .filter_map(|bee| bee.address.clone().map(|address| (bee.id.clone(), address)))
            .enumerate()
            .map(|(index, (id, address))| WorkerTarget { id, address, index })
            .collect()
    }

    /// Reject fields that would not read back unchanged
    fn check_fields(&self) -> Result<(), RosterError> {
        let headers = [
            ("region", &self.region),
            ("username", &self.username),
            ("key name", &self.key_name),
        ];
        let workers = self.workers.iter().map(|id| ("worker id", id));

        for (field, value) in headers.into_iter().chain(workers) {
            let unreadable = value.is_empty()
                || value.trim() != value.as_str()
                || value.contains(['\n', '\r']);
            if unreadable {
                return Err(RosterError::InvalidField {
                    field,
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    fn to_text(&self) -> String {
        let mut lines = vec![
            self.region.as_str(),
            self.username.as_str(),
            self.key_name.as_str(),
        ];
        lines.extend(self.workers.iter().map(String::as_str));
        lines.join("\n")
    }

    fn from_text(text: &str) -> Result<Self, RosterError> {
        let mut lines = text.lines().map(str::trim);

        let mut header = |field: &'static str| {
            lines
                .next()
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .ok_or(RosterError::Malformed(field))
        };
        let region = header("region")?;
        let username = header("username")?;
        let key_name = header("key name")?;

        let workers = lines
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            region,
            username,
            key_name,
            workers,
        })
    }
}

/// File-backed roster persistence
#[derive(Debug, Clone)]
pub struct RosterStore {
    path: PathBuf,
}

impl RosterStore {
    /// Default file name under the home directory
    pub const DEFAULT_FILE_NAME: &'static str = ".bees";

    /// Store backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store backed by `~/.bees`
    pub fn in_home() -> Result<Self, RosterError> {
        let home = std::env::var_os("HOME").ok_or(RosterError::NoHome)?;
        Ok(Self::new(Path::new(&home).join(Self::DEFAULT_FILE_NAME)))
    }

    /// Path of the roster file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the roster; `None` when no fleet is assembled
    pub fn load(&self) -> Result<Option<Roster>, RosterError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let roster = Roster::from_text(&text)?;
        tracing::debug!(
            path = %self.path.display(),
            bees = roster.len(),
            "Read roster"
        );
        Ok(Some(roster))
    }

    /// Write a new roster
    ///
    /// The content goes to a temporary file next to the roster and is moved
    /// into place in one step. Fails with [`RosterError::AlreadyAssembled`]
    /// if a roster exists.
    pub fn save(&self, roster: &Roster) -> Result<(), RosterError> {
        if roster.is_empty() {
            return Err(RosterError::Empty);
        }
        roster.check_fields()?;

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(roster.to_text().as_bytes())?;
        tmp.as_file().sync_all()?;

        tmp.persist_noclobber(&self.path).map_err(|e| {
            if e.error.kind() == io::ErrorKind::AlreadyExists {
                RosterError::AlreadyAssembled
            } else {
                RosterError::Io(e.error)
            }
        })?;

        tracing::debug!(
            path = %self.path.display(),
            bees = roster.len(),
            "Wrote roster"
        );
        Ok(())
    }

    /// Remove the roster; removing a missing roster is a no-op
    pub fn delete(&self) -> Result<(), RosterError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Roster persistence errors
#[derive(Debug, Error)]
pub enum RosterError {
    /// A fleet is already recorded
    #[error("bees are already assembled and awaiting orders")]
    AlreadyAssembled,

    /// Refused to record a fleet without workers
    #[error("refusing to record an empty fleet")]
    Empty,

    /// A field is empty, padded or spans lines
    #[error("roster {field} {value:?} cannot be recorded")]
    InvalidField {
        /// Which field
        field: &'static str,
        /// Offending value
        value: String,
    },

    /// Roster file is missing a header line
    #[error("roster file is missing the {0} line")]
    Malformed(&'static str),

    /// No home directory to keep the roster in
    #[error("HOME is not set; cannot locate the roster")]
    NoHome,

    /// IO error
    #[error("roster IO error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_roster() -> Roster {
        Roster::new(
            "us-east-1",
            "newsapps",
            "frontend",
            vec!["i-0a1b".into(), "i-0c2d".into(), "i-0e3f".into()],
        )
    }

    fn running(id: &str, address: &str) -> BeeInstance {
        BeeInstance {
            id: id.into(),
            state: "running".into(),
            address: Some(address.into()),
        }
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = RosterStore::new(dir.path().join(".bees"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = RosterStore::new(dir.path().join(".bees"));
        let roster = sample_roster();

        store.save(&roster).unwrap();
        assert_eq!(store.load().unwrap(), Some(roster));
    }

    #[test]
    fn test_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = RosterStore::new(dir.path().join(".bees"));
        store.save(&sample_roster()).unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        assert_eq!(text, "us-east-1\nnewsapps\nfrontend\ni-0a1b\ni-0c2d\ni-0e3f");
    }

    #[test]
    fn test_save_refuses_existing_fleet() {
        let dir = tempfile::tempdir().unwrap();
        let store = RosterStore::new(dir.path().join(".bees"));
        store.save(&sample_roster()).unwrap();

        let other = Roster::new("eu-west-1", "ubuntu", "other", vec!["i-9".into()]);
        assert!(matches!(
            store.save(&other),
            Err(RosterError::AlreadyAssembled)
        ));
        assert_eq!(store.load().unwrap(), Some(sample_roster()));
    }

    #[test]
    fn test_save_rejects_empty_fleet() {
        let dir = tempfile::tempdir().unwrap();
        let store = RosterStore::new(dir.path().join(".bees"));
        let empty = Roster::new("us-east-1", "newsapps", "frontend", vec![]);

        assert!(matches!(store.save(&empty), Err(RosterError::Empty)));
        assert!(!store.path().exists());
    }

    #[test]
    fn test_save_rejects_fields_that_do_not_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = RosterStore::new(dir.path().join(".bees"));

        let mut blank_region = sample_roster();
        blank_region.region = String::new();
        let mut padded_user = sample_roster();
        padded_user.username = "newsapps ".into();
        let mut split_key = sample_roster();
        split_key.key_name = "front\nend".into();
        let mut padded_worker = sample_roster();
        padded_worker.workers[0] = " i-0a1b".into();
        let mut blank_worker = sample_roster();
        blank_worker.workers.insert(1, String::new());
        let mut carriage_return = sample_roster();
        carriage_return.workers[2] = "i-0e3f\r".into();

        for (roster, field) in [
            (blank_region, "region"),
            (padded_user, "username"),
            (split_key, "key name"),
            (padded_worker, "worker id"),
            (blank_worker, "worker id"),
            (carriage_return, "worker id"),
        ] {
            match store.save(&roster) {
                Err(RosterError::InvalidField { field: got, .. }) => assert_eq!(got, field),
                other => panic!("expected InvalidField for {field}, got {other:?}"),
            }
            assert!(!store.path().exists());
        }
    }

    #[test]
    fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = RosterStore::new(dir.path().join(".bees"));
        store.save(&sample_roster()).unwrap();

        store.delete().unwrap();
        assert!(store.load().unwrap().is_none());

        // second delete is harmless
        store.delete().unwrap();
    }

    #[test]
    fn test_load_ignores_trailing_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".bees");
        fs::write(&path, "us-east-1\nnewsapps\nfrontend\ni-1\ni-2\n\n").unwrap();

        let roster = RosterStore::new(&path).load().unwrap().unwrap();
        assert_eq!(roster.workers, vec!["i-1".to_string(), "i-2".to_string()]);
    }

    #[test]
    fn test_load_malformed_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".bees");
        fs::write(&path, "us-east-1\nnewsapps\n").unwrap();

        assert!(matches!(
            RosterStore::new(&path).load(),
            Err(RosterError::Malformed("key name"))
        ));
    }

    #[test]
    fn test_targets_keep_roster_order_and_skip_unready() {
        let roster = sample_roster();
        let instances = vec![
            running("i-0e3f", "203.0.113.3"),
            BeeInstance {
                id: "i-0c2d".into(),
                state: "stopped".into(),
                address: None,
            },
            running("i-0a1b", "203.0.113.1"),
        ];

        let targets = roster.targets(&instances);
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].id, "i-0a1b");
        assert_eq!(targets[0].address, "203.0.113.1");
        assert_eq!(targets[0].index, 0);
        assert_eq!(targets[1].id, "i-0e3f");
        assert_eq!(targets[1].index, 1);
    }
}
