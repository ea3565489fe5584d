//! # redb-backed Baselines
//!
//! Baselines persisted in a redb database. Snapshots are stored in their
//! canonical export form, so every load re-verifies header and checksum.

use super::{BaselineInfo, BaselineStore, validate_baseline_name};
use crate::snapshot::{Snapshot, export_snapshot, import_snapshot};
use crate::ReqlintError;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;

/// Table for snapshots: name -> canonical export bytes
const BASELINES: TableDefinition<&str, &[u8]> = TableDefinition::new("baselines");

/// Table for revisions: name -> revision counter
const REVISIONS: TableDefinition<&str, u64> = TableDefinition::new("revisions");

fn io(e: impl std::fmt::Display) -> ReqlintError {
    ReqlintError::IoError(e.to_string())
}

/// A disk-backed baseline store.
pub struct RedbBaselines {
    db: Database,
}

impl std::fmt::Debug for RedbBaselines {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbBaselines").finish_non_exhaustive()
    }
}

impl RedbBaselines {
    /// Open or create a baseline database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReqlintError> {
        let db = Database::create(path.as_ref()).map_err(io)?;

        // Create tables up front so readers never see them missing.
        {
            let write_txn = db.begin_write().map_err(io)?;
            let _ = write_txn.open_table(BASELINES).map_err(io)?;
            let _ = write_txn.open_table(REVISIONS).map_err(io)?;
            write_txn.commit().map_err(io)?;
        }

        Ok(Self { db })
    }
}

impl BaselineStore for RedbBaselines {
    fn save(&mut self, name: &str, snapshot: &Snapshot) -> Result<u64, ReqlintError> {
        validate_baseline_name(name)?;
        let bytes = export_snapshot(snapshot)?;

        let write_txn = self.db.begin_write().map_err(io)?;
        let revision = {
            let mut revisions = write_txn.open_table(REVISIONS).map_err(io)?;
            let revision = revisions
                .get(name)
                .map_err(io)?
                .map_or(1, |v| v.value().saturating_add(1));
            revisions.insert(name, revision).map_err(io)?;

            let mut baselines = write_txn.open_table(BASELINES).map_err(io)?;
            baselines.insert(name, bytes.as_slice()).map_err(io)?;
            revision
        };
        write_txn.commit().map_err(io)?;

        Ok(revision)
    }

    fn load(&self, name: &str) -> Result<Option<Snapshot>, ReqlintError> {
        validate_baseline_name(name)?;
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(BASELINES).map_err(io)?;
        match table.get(name).map_err(io)? {
            Some(bytes) => Ok(Some(import_snapshot(bytes.value())?)),
            None => Ok(None),
        }
    }

    fn list(&self) -> Result<Vec<BaselineInfo>, ReqlintError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let baselines = read_txn.open_table(BASELINES).map_err(io)?;
        let revisions = read_txn.open_table(REVISIONS).map_err(io)?;

        let mut infos = Vec::new();
        for entry in baselines.iter().map_err(io)? {
            let (key, value) = entry.map_err(io)?;
            let name = key.value().to_string();
            let snapshot = import_snapshot(value.value())?;
            let revision = revisions
                .get(name.as_str())
                .map_err(io)?
                .map_or(0, |v| v.value());
            infos.push(BaselineInfo {
                name,
                revision,
                entries: snapshot.len(),
            });
        }
        Ok(infos)
    }

    fn remove(&mut self, name: &str) -> Result<bool, ReqlintError> {
        validate_baseline_name(name)?;
        let write_txn = self.db.begin_write().map_err(io)?;
        let existed = {
            let mut baselines = write_txn.open_table(BASELINES).map_err(io)?;
            let existed = baselines.remove(name).map_err(io)?.is_some();
            let mut revisions = write_txn.open_table(REVISIONS).map_err(io)?;
            revisions.remove(name).map_err(io)?;
            existed
        };
        write_txn.commit().map_err(io)?;
        Ok(existed)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;
    use tempfile::tempdir;

    fn snapshot(text: &str) -> Snapshot {
        Snapshot::from_manifest(&Manifest::parse(text).unwrap())
    }

    #[test]
    fn save_load_remove() {
        let dir = tempdir().unwrap();
        let mut store = RedbBaselines::open(dir.path().join("baselines.redb")).unwrap();

        let snap = snapshot("# Core\ntorch>=1.10.0\nnumpy>=1.21.0\n");
        assert_eq!(store.save("main", &snap).unwrap(), 1);
        assert_eq!(store.save("main", &snap).unwrap(), 2);
        assert_eq!(store.load("main").unwrap(), Some(snap));

        let list = store.list().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].revision, 2);
        assert_eq!(list[0].entries, 2);

        assert!(store.remove("main").unwrap());
        assert!(store.load("main").unwrap().is_none());
        assert!(!store.remove("main").unwrap());
    }

    #[test]
    fn survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("baselines.redb");
        let snap = snapshot("matplotlib>=3.4.0\n");

        {
            let mut store = RedbBaselines::open(&path).unwrap();
            store.save("release", &snap).unwrap();
        }

        let mut store = RedbBaselines::open(&path).unwrap();
        assert_eq!(store.load("release").unwrap(), Some(snap));
        assert_eq!(store.save("release", &Snapshot::default()).unwrap(), 2);
    }

    #[test]
    fn invalid_names_rejected() {
        let dir = tempdir().unwrap();
        let mut store = RedbBaselines::open(dir.path().join("b.redb")).unwrap();
        assert!(store.save("no/slashes", &Snapshot::default()).is_err());
    }
}
