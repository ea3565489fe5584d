//! # Canonical Snapshot Module
//!
//! A snapshot is the dependency set of a manifest with formatting removed:
//! one entry per package, sorted by normalized name, each in its
//! normalized spelling. Two manifests that declare the same thing produce
//! byte-identical snapshots, so snapshots are what baselines store and what
//! `hash` fingerprints.
//!
//! Format:
//! ```text
//! [header_len: u32 LE] [SnapshotHeader (postcard)] [Snapshot (postcard)]
//! ```

use crate::manifest::{DependencySet, Manifest};
use crate::parser::parse_requirement;
use crate::primitives::{MAX_SNAPSHOT_ENTRIES, SNAPSHOT_MAGIC, SNAPSHOT_VERSION};
use crate::ReqlintError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// HEADER
// =============================================================================

/// Header for snapshot files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotHeader {
    /// Magic bytes to identify the format.
    pub magic: [u8; 4],

    /// Format version.
    pub version: u8,

    /// Number of entries.
    pub entry_count: u64,

    /// Checksum of the data section.
    pub checksum: u64,
}

impl SnapshotHeader {
    #[must_use]
    pub fn new(entry_count: u64, checksum: u64) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: SNAPSHOT_VERSION,
            entry_count,
            checksum,
        }
    }

    /// Check magic and version.
    ///
    /// Messages stay generic so they do not describe the format to callers
    /// feeding arbitrary bytes.
    pub fn validate(&self) -> Result<(), ReqlintError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(ReqlintError::DeserializationError(
                "Invalid file format".to_string(),
            ));
        }
        if self.version != SNAPSHOT_VERSION {
            return Err(ReqlintError::DeserializationError(
                "Unsupported file version".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// One package in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnapshotEntry {
    /// Normalized package name (sort key).
    pub name: String,

    /// The requirement in normalized spelling, e.g. `torch>=1.10.0`.
    pub requirement: String,

    /// Section label the entry was declared under.
    pub section: Option<String>,
}

/// Deterministic view of a manifest's dependency set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    /// Entries sorted by name, one per package.
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    /// Build a snapshot; for repeated packages the first declaration wins.
    #[must_use]
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut entries: Vec<SnapshotEntry> = Vec::new();
        for entry in manifest.entries() {
            let name = entry.requirement.name.normalized();
            if !seen.insert(name) {
                continue;
            }
            entries.push(SnapshotEntry {
                name: name.to_string(),
                requirement: entry.requirement.to_normalized_string(),
                section: entry.section.map(|s| s.label().to_string()),
            });
        }
        entries.sort();
        Self { entries }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Re-parse the entries into a dependency set.
    pub fn dependency_set(&self) -> Result<DependencySet, ReqlintError> {
        let mut set = DependencySet::new();
        for entry in &self.entries {
            let req = parse_requirement(&entry.requirement)?;
            set.insert(req.name.clone(), req);
        }
        Ok(set)
    }

    /// Order-sensitive rotate-and-XOR checksum.
    ///
    /// Catches accidental corruption only; use `snapshot_crypto_hash` when
    /// tampering matters.
    #[must_use]
    pub fn checksum(&self) -> u64 {
        let mut hash: u64 = 0;
        for entry in &self.entries {
            for byte in entry.name.as_bytes() {
                hash = hash.rotate_left(7) ^ u64::from(*byte);
            }
            hash = hash.rotate_left(13) ^ 0x1f;
            for byte in entry.requirement.as_bytes() {
                hash = hash.rotate_left(11) ^ u64::from(*byte);
            }
            hash = hash.rotate_left(13) ^ 0x1e;
            if let Some(section) = &entry.section {
                for byte in section.as_bytes() {
                    hash = hash.rotate_left(5) ^ u64::from(*byte);
                }
            }
            hash = hash.rotate_left(17) ^ 0x1d;
        }
        hash ^ (self.entries.len() as u64).rotate_left(3)
    }
}

// =============================================================================
// EXPORT / IMPORT
// =============================================================================

/// Serialize a snapshot to the canonical binary format.
pub fn export_snapshot(snapshot: &Snapshot) -> Result<Vec<u8>, ReqlintError> {
    let header = SnapshotHeader::new(snapshot.entries.len() as u64, snapshot.checksum());

    let header_bytes = postcard::to_allocvec(&header)
        .map_err(|e| ReqlintError::SerializationError(format!("Header: {}", e)))?;
    let data_bytes = postcard::to_allocvec(snapshot)
        .map_err(|e| ReqlintError::SerializationError(format!("Data: {}", e)))?;

    let header_len = u32::try_from(header_bytes.len())
        .map_err(|_| ReqlintError::SerializationError("Header too large".to_string()))?;

    let mut result = Vec::with_capacity(4 + header_bytes.len() + data_bytes.len());
    result.extend_from_slice(&header_len.to_le_bytes());
    result.extend_from_slice(&header_bytes);
    result.extend_from_slice(&data_bytes);
    Ok(result)
}

/// Parse canonical bytes back into a snapshot, verifying header and checksum.
pub fn import_snapshot(data: &[u8]) -> Result<Snapshot, ReqlintError> {
    let Some((len_bytes, rest)) = data.split_first_chunk::<4>() else {
        return Err(ReqlintError::DeserializationError(
            "Data too short".to_string(),
        ));
    };
    let header_len = u32::from_le_bytes(*len_bytes) as usize;
    if rest.len() < header_len {
        return Err(ReqlintError::DeserializationError(
            "Data too short for header".to_string(),
        ));
    }
    let (header_bytes, data_bytes) = rest.split_at(header_len);

    let header: SnapshotHeader = postcard::from_bytes(header_bytes)
        .map_err(|e| ReqlintError::DeserializationError(format!("Header: {}", e)))?;
    header.validate()?;

    // Checked before decoding the body.
    if header.entry_count > MAX_SNAPSHOT_ENTRIES {
        return Err(ReqlintError::DeserializationError(format!(
            "Entry count {} exceeds maximum allowed {}",
            header.entry_count, MAX_SNAPSHOT_ENTRIES
        )));
    }

    let snapshot: Snapshot = postcard::from_bytes(data_bytes)
        .map_err(|e| ReqlintError::DeserializationError(format!("Data: {}", e)))?;

    let computed = snapshot.checksum();
    if computed != header.checksum {
        return Err(ReqlintError::DeserializationError(format!(
            "Checksum mismatch: expected {}, got {}",
            header.checksum, computed
        )));
    }
    if snapshot.entries.len() as u64 != header.entry_count {
        return Err(ReqlintError::DeserializationError(
            "Entry count mismatch".to_string(),
        ));
    }

    Ok(snapshot)
}

/// Checksum of a manifest's snapshot.
#[must_use]
pub fn snapshot_checksum(manifest: &Manifest) -> u64 {
    Snapshot::from_manifest(manifest).checksum()
}

// =============================================================================
// CRYPTOGRAPHIC HASH
// =============================================================================

/// BLAKE3 hash of a manifest's canonical export, as 64 hex characters.
#[cfg(feature = "crypto-hash")]
pub fn snapshot_crypto_hash(manifest: &Manifest) -> Result<String, ReqlintError> {
    let data = export_snapshot(&Snapshot::from_manifest(manifest))?;
    Ok(compute_blake3_hash(&data))
}

/// BLAKE3 hash of raw bytes.
#[cfg(feature = "crypto-hash")]
#[must_use]
pub fn compute_blake3_hash(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# Core dependencies
torch>=1.10.0
NumPy >= 1.21.0

# Visualization
matplotlib>=3.4.0
numpy>=1.0
";

    fn manifest(text: &str) -> Manifest {
        Manifest::parse(text).unwrap()
    }

    #[test]
    fn entries_sorted_and_deduplicated() {
        let snapshot = Snapshot::from_manifest(&manifest(SAMPLE));
        let names: Vec<&str> = snapshot.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["matplotlib", "numpy", "torch"]);
        assert_eq!(snapshot.entries[1].requirement, "numpy>=1.21.0");
        assert_eq!(
            snapshot.entries[0].section.as_deref(),
            Some("Visualization")
        );
    }

    #[test]
    fn export_import_preserves_snapshot() {
        let snapshot = Snapshot::from_manifest(&manifest(SAMPLE));
        let bytes = export_snapshot(&snapshot).unwrap();
        assert_eq!(import_snapshot(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn formatting_does_not_change_export() {
        let a = manifest("torch>=1.10.0\nnumpy>=1.21.0\n");
        let b = manifest("\n  numpy >= 1.21.0   # arrays\ntorch>=1.10.0\n");
        assert_eq!(
            export_snapshot(&Snapshot::from_manifest(&a)).unwrap(),
            export_snapshot(&Snapshot::from_manifest(&b)).unwrap()
        );
        assert_eq!(snapshot_checksum(&a), snapshot_checksum(&b));
    }

    #[test]
    fn checksum_is_order_sensitive_within_entries() {
        let a = manifest("ab>=1.0\n");
        let b = manifest("ba>=1.0\n");
        assert_ne!(snapshot_checksum(&a), snapshot_checksum(&b));
    }

    #[test]
    fn rejects_corruption() {
        let snapshot = Snapshot::from_manifest(&manifest(SAMPLE));
        let mut bytes = export_snapshot(&snapshot).unwrap();

        assert!(import_snapshot(&bytes[..2]).is_err());

        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert!(import_snapshot(&bytes).is_err());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = export_snapshot(&Snapshot::default()).unwrap();
        bytes[4] = b'X';
        assert!(matches!(
            import_snapshot(&bytes),
            Err(ReqlintError::DeserializationError(_))
        ));
    }

    #[test]
    fn dependency_set_round_trips_requirements() {
        let m = manifest(SAMPLE);
        let snapshot = Snapshot::from_manifest(&m);
        let set = snapshot.dependency_set().unwrap();
        assert_eq!(set.len(), 3);
        assert!(crate::diff::diff(&m.dependency_set(), &set).is_empty());
    }

    #[test]
    fn respelled_versions_survive_a_round_trip() {
        let m = manifest(
            "torch>=1.10.0-rc1\nnumpy>=V1.21\nlegacy===1.0ALPHA1\nDjango==3.2.*\nscipy>=1.7.0.POST2\n",
        );
        let snapshot = Snapshot::from_manifest(&m);
        assert_eq!(snapshot.entries[4].requirement, "torch>=1.10.0rc1");

        let stored = import_snapshot(&export_snapshot(&snapshot).unwrap()).unwrap();
        let result = crate::diff::diff(&stored.dependency_set().unwrap(), &m.dependency_set());
        assert!(result.changed.is_empty(), "unexpected changes: {:?}", result.changed);
        assert!(result.is_empty());
    }

    #[cfg(feature = "crypto-hash")]
    #[test]
    fn crypto_hash_is_hex() {
        let hash = snapshot_crypto_hash(&manifest(SAMPLE)).unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
