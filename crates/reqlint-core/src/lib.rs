//! # reqlint-core
//!
//! Parsing and validation of Python requirements manifests - THE LOGIC.
//!
//! A manifest is a line-oriented text file: each non-comment line names one
//! package and the minimum version it must meet, `#` lines label sections.
//! This crate parses such files, checks them against that contract, and
//! produces deterministic snapshots of what they declare.
//!
//! ## Architectural Constraints
//!
//! - Pure and deterministic: same bytes in, same result out
//! - No async, no network, no logging (the app layer owns those)
//! - Ordered collections only (`BTreeMap`/`BTreeSet`), so output order is stable
//! - Every input is size-checked against `primitives` before it is parsed

// =============================================================================
// MODULES
// =============================================================================

pub mod coverage;
pub mod diff;
pub mod lint;
pub mod manifest;
pub mod parser;
pub mod primitives;
pub mod snapshot;
pub mod specifier;
pub mod storage;
pub mod types;
pub mod version;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{PackageName, ReqlintError, Requirement, Section, Severity, normalize_name};

// =============================================================================
// RE-EXPORTS: Parsing & Validation
// =============================================================================

pub use coverage::{CoverageReport, ImportResolver, MissingImport, check_coverage, scan_imports};
pub use diff::{Change, ManifestDiff, diff};
pub use lint::{Diagnostic, LintConfig, Linter, Report, Rule};
pub use manifest::{DependencySet, Manifest, ManifestLine};
pub use parser::{Directive, LineKind, parse_line, parse_requirement};
pub use specifier::{Operator, Specifier, SpecifierSet};
pub use version::Version;

// =============================================================================
// RE-EXPORTS: Snapshots & Storage
// =============================================================================

pub use snapshot::{
    Snapshot, SnapshotEntry, SnapshotHeader, export_snapshot, import_snapshot, snapshot_checksum,
};
pub use storage::{BaselineInfo, BaselineStore, Baselines, MemoryBaselines, RedbBaselines};

#[cfg(feature = "crypto-hash")]
pub use snapshot::{compute_blake3_hash, snapshot_crypto_hash};
