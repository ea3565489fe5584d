//! # Baseline Storage
//!
//! Named snapshots a project can diff against later.
//!
//! Two backends:
//! - `Memory`: a `BTreeMap`, gone when the process exits
//! - `Redb`: `RedbBaselines`, disk-backed with ACID transactions
//!
//! Every save of a name bumps its revision, starting at 1.

mod redb_baselines;

pub use redb_baselines::RedbBaselines;

use crate::primitives::MAX_BASELINE_NAME_LENGTH;
use crate::snapshot::Snapshot;
use crate::ReqlintError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// =============================================================================
// TRAIT
// =============================================================================

/// Summary of a stored baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineInfo {
    pub name: String,
    pub revision: u64,
    pub entries: usize,
}

/// Storage for named snapshots.
pub trait BaselineStore {
    /// Store `snapshot` under `name`, returning the new revision.
    fn save(&mut self, name: &str, snapshot: &Snapshot) -> Result<u64, ReqlintError>;

    /// The snapshot stored under `name`, if any.
    fn load(&self, name: &str) -> Result<Option<Snapshot>, ReqlintError>;

    /// All baselines, sorted by name.
    fn list(&self) -> Result<Vec<BaselineInfo>, ReqlintError>;

    /// Delete `name`. Returns whether it existed.
    fn remove(&mut self, name: &str) -> Result<bool, ReqlintError>;
}

/// Baseline names are path- and URL-safe: `[A-Za-z0-9._-]`, non-empty.
pub fn validate_baseline_name(name: &str) -> Result<(), ReqlintError> {
    if name.is_empty() {
        return Err(ReqlintError::InvalidName(
            "baseline name is empty".to_string(),
        ));
    }
    if name.len() > MAX_BASELINE_NAME_LENGTH {
        return Err(ReqlintError::InvalidName(format!(
            "baseline name exceeds {} characters",
            MAX_BASELINE_NAME_LENGTH
        )));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(ReqlintError::InvalidName(format!(
            "baseline name contains '{}'",
            bad
        )));
    }
    Ok(())
}

// =============================================================================
// IN-MEMORY BACKEND
// =============================================================================

/// Volatile baseline store.
#[derive(Debug, Clone, Default)]
pub struct MemoryBaselines {
    baselines: BTreeMap<String, (u64, Snapshot)>,
}

impl MemoryBaselines {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl BaselineStore for MemoryBaselines {
    fn save(&mut self, name: &str, snapshot: &Snapshot) -> Result<u64, ReqlintError> {
        validate_baseline_name(name)?;
        let revision = self
            .baselines
            .get(name)
            .map_or(1, |(revision, _)| revision.saturating_add(1));
        self.baselines
            .insert(name.to_string(), (revision, snapshot.clone()));
        Ok(revision)
    }

    fn load(&self, name: &str) -> Result<Option<Snapshot>, ReqlintError> {
        validate_baseline_name(name)?;
        Ok(self.baselines.get(name).map(|(_, s)| s.clone()))
    }

    fn list(&self) -> Result<Vec<BaselineInfo>, ReqlintError> {
        Ok(self
            .baselines
            .iter()
            .map(|(name, (revision, snapshot))| BaselineInfo {
                name: name.clone(),
                revision: *revision,
                entries: snapshot.len(),
            })
            .collect())
    }

    fn remove(&mut self, name: &str) -> Result<bool, ReqlintError> {
        validate_baseline_name(name)?;
        Ok(self.baselines.remove(name).is_some())
    }
}

// =============================================================================
// BACKEND SELECTION
// =============================================================================

/// A baseline store over either backend.
// Not Clone: the redb handle owns the file lock.
#[derive(Debug)]
pub enum Baselines {
    Memory(MemoryBaselines),
    Redb(RedbBaselines),
}

impl Default for Baselines {
    fn default() -> Self {
        Self::Memory(MemoryBaselines::new())
    }
}

impl Baselines {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open or create a redb database at `path`.
    pub fn open_redb(path: impl AsRef<Path>) -> Result<Self, ReqlintError> {
        Ok(Self::Redb(RedbBaselines::open(path)?))
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Redb(_))
    }
}

impl BaselineStore for Baselines {
    fn save(&mut self, name: &str, snapshot: &Snapshot) -> Result<u64, ReqlintError> {
        match self {
            Self::Memory(store) => store.save(name, snapshot),
            Self::Redb(store) => store.save(name, snapshot),
        }
    }

    fn load(&self, name: &str) -> Result<Option<Snapshot>, ReqlintError> {
        match self {
            Self::Memory(store) => store.load(name),
            Self::Redb(store) => store.load(name),
        }
    }

    fn list(&self) -> Result<Vec<BaselineInfo>, ReqlintError> {
        match self {
            Self::Memory(store) => store.list(),
            Self::Redb(store) => store.list(),
        }
    }

    fn remove(&mut self, name: &str) -> Result<bool, ReqlintError> {
        match self {
            Self::Memory(store) => store.remove(name),
            Self::Redb(store) => store.remove(name),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
