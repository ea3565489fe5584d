//! # Core Type Definitions
//!
//! This module contains the value types shared by every reqlint module:
//! - Package identity (`PackageName`)
//! - Requirement entries (`Requirement`) and section labels (`Section`)
//! - Diagnostic severity (`Severity`)
//! - Error types (`ReqlintError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Compare by their normalized form, never by how they were spelled
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`

use crate::primitives::MAX_NAME_LENGTH;
use crate::specifier::SpecifierSet;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

// =============================================================================
// PACKAGE NAME
// =============================================================================

/// A distribution name as written in a manifest.
///
/// Two names are the same package when their normalized forms match:
/// lowercase, with every run of `-`, `_` and `.` collapsed into one `-`.
/// `Scikit_Learn`, `scikit-learn` and `scikit.learn` are one package.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageName {
    raw: String,
    normalized: String,
}

impl PackageName {
    /// Parse and validate a package name.
    ///
    /// Valid names are ASCII letters, digits, `.`, `_` and `-`, and must
    /// start and end with a letter or digit.
    pub fn parse(s: &str) -> Result<Self, ReqlintError> {
        if s.is_empty() {
            return Err(ReqlintError::InvalidName("empty package name".to_string()));
        }
        if s.len() > MAX_NAME_LENGTH {
            return Err(ReqlintError::InvalidName(format!(
                "name exceeds {} bytes",
                MAX_NAME_LENGTH
            )));
        }
        if let Some(bad) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        {
            return Err(ReqlintError::InvalidName(format!(
                "unexpected character {:?} in '{}'",
                bad, s
            )));
        }
        let bytes = s.as_bytes();
        let first_ok = bytes.first().is_some_and(u8::is_ascii_alphanumeric);
        let last_ok = bytes.last().is_some_and(u8::is_ascii_alphanumeric);
        if !first_ok || !last_ok {
            return Err(ReqlintError::InvalidName(format!(
                "'{}' must start and end with a letter or digit",
                s
            )));
        }

        Ok(Self {
            raw: s.to_string(),
            normalized: normalize_name(s),
        })
    }

    /// The name exactly as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The normalized name used for comparison.
    #[must_use]
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// True when the name is already spelled in normalized form.
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        self.raw == self.normalized
    }
}

/// Lowercase and collapse separator runs into a single `-`.
#[must_use]
pub fn normalize_name(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_separator = false;
    for c in s.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator {
                out.push('-');
                in_separator = true;
            }
        } else {
            out.push(c.to_ascii_lowercase());
            in_separator = false;
        }
    }
    out
}

impl PartialEq for PackageName {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for PackageName {}

impl PartialOrd for PackageName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized.cmp(&other.normalized)
    }
}

impl Hash for PackageName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for PackageName {
    type Error = ReqlintError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PackageName> for String {
    fn from(name: PackageName) -> Self {
        name.raw
    }
}

// =============================================================================
// SECTION
// =============================================================================

/// A section label taken from a `#` comment line.
///
/// Comment lines group the entries that follow them, e.g.
/// `# Core dependencies` or `# Optional - development`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Section(pub String);

impl Section {
    /// Build a section from the full comment line (leading `#` optional).
    #[must_use]
    pub fn from_comment(line: &str) -> Self {
        let trimmed = line.trim();
        let label = trimmed.trim_start_matches('#').trim();
        Self(label.to_string())
    }

    /// The label text without the leading `#`.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.0
    }

    /// Sections labelled `Optional ...` hold entries a plain install may skip.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.0
            .get(..8)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("optional"))
    }

    /// True for a bare `#` line with no label text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// REQUIREMENT
// =============================================================================

/// One dependency entry: `name[extras]specifiers; marker  # comment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// The distribution name.
    pub name: PackageName,
    /// Optional extras, in the order written.
    pub extras: Vec<String>,
    /// Version constraints; empty means "any version".
    pub specifiers: SpecifierSet,
    /// Environment marker text after `;`, untouched.
    pub marker: Option<String>,
    /// Trailing inline comment text after `#`.
    pub comment: Option<String>,
}

impl Requirement {
    /// Create a requirement with only a name and specifiers.
    #[must_use]
    pub fn new(name: PackageName, specifiers: SpecifierSet) -> Self {
        Self {
            name,
            extras: Vec::new(),
            specifiers,
            marker: None,
            comment: None,
        }
    }

    /// Canonical spelling: normalized name, sorted extras, no comment.
    #[must_use]
    pub fn to_normalized_string(&self) -> String {
        let mut out = self.name.normalized().to_string();
        self.push_tail(&mut out, true);
        out
    }

    fn push_tail(&self, out: &mut String, normalize_extras: bool) {
        if !self.extras.is_empty() {
            let mut extras: Vec<String> = if normalize_extras {
                self.extras.iter().map(|e| normalize_name(e)).collect()
            } else {
                self.extras.clone()
            };
            if normalize_extras {
                extras.sort();
                extras.dedup();
            }
            out.push('[');
            out.push_str(&extras.join(","));
            out.push(']');
        }
        out.push_str(&self.specifiers.to_string());
        if let Some(marker) = &self.marker {
            out.push_str("; ");
            out.push_str(marker);
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = self.name.as_str().to_string();
        self.push_tail(&mut out, false);
        f.write_str(&out)
    }
}

// =============================================================================
// SEVERITY
// =============================================================================

/// Diagnostic severity, ordered `Off < Info < Warning < Error`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Rule disabled.
    Off,
    /// Informational only.
    #[default]
    Info,
    /// Suspicious but installable.
    Warning,
    /// Violates the manifest contract.
    Error,
}

impl Severity {
    /// Lowercase name as used in config files and JSON.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in reqlint.
///
/// - No silent failures
/// - Use `Result<T, ReqlintError>` for fallible operations
/// - The core should never panic; all errors must be recoverable
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReqlintError {
    /// A manifest line could not be parsed.
    #[error("line {line}: {reason}")]
    InvalidLine { line: usize, reason: String },

    /// A package name is malformed.
    #[error("invalid package name: {0}")]
    InvalidName(String),

    /// A version string is malformed.
    #[error("invalid version: {0}")]
    InvalidVersion(String),

    /// A version specifier is malformed.
    #[error("invalid specifier: {0}")]
    InvalidSpecifier(String),

    /// The manifest exceeds the size or line limits.
    #[error("manifest too large: {0}")]
    ManifestTooLarge(String),

    /// A lint rule code is not known.
    #[error("unknown lint rule: {0}")]
    UnknownRule(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),

    /// A named item (baseline, file) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

// =============================================================================
// TESTS
// =============================================================================
