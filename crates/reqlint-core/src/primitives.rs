//! # Primitives
//!
//! Hardcoded limits and format constants for reqlint.
//!
//! These values are compiled into the binary and are immutable at runtime.
//! Every parser entry point checks them before allocating.

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum size of a single manifest (1 MiB).
///
/// Real manifests are a few kilobytes; anything larger is rejected.
pub const MAX_MANIFEST_BYTES: usize = 1024 * 1024;

/// Maximum number of lines in a single manifest.
pub const MAX_MANIFEST_LINES: usize = 10_000;

/// Maximum length of a single line, in bytes.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Maximum length of a package name.
pub const MAX_NAME_LENGTH: usize = 256;

/// Maximum number of comma-separated specifiers on one requirement.
pub const MAX_SPECIFIERS: usize = 32;

/// Maximum number of release components in a version (`1.2.3.4...`).
pub const MAX_RELEASE_SEGMENTS: usize = 16;

/// Maximum nesting depth when following `-r` includes.
pub const MAX_INCLUDE_DEPTH: usize = 8;

// =============================================================================
// SNAPSHOT FORMAT
// =============================================================================

/// Magic bytes for the canonical snapshot header.
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"REQS";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the snapshot format.
pub const SNAPSHOT_VERSION: u8 = 1;

/// Maximum number of entries accepted when importing a snapshot.
pub const MAX_SNAPSHOT_ENTRIES: u64 = 100_000;

// =============================================================================
// BASELINES
// =============================================================================

/// Maximum length of a baseline name.
pub const MAX_BASELINE_NAME_LENGTH: usize = 128;
