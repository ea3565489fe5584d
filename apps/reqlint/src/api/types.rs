//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use reqlint_core::{
    BaselineInfo, CoverageReport, Diagnostic, Manifest, ManifestDiff, ReqlintError, Severity,
    primitives::MAX_MANIFEST_BYTES,
};
use serde::{Deserialize, Serialize};

/// Python sources per coverage request.
pub const MAX_COVERAGE_SOURCES: usize = 256;

/// Reject manifest text over the size limit before parsing it.
fn parse_content(content: &str) -> Result<Manifest, ReqlintError> {
    if content.len() > MAX_MANIFEST_BYTES {
        return Err(ReqlintError::ManifestTooLarge(format!(
            "{} bytes, maximum is {}",
            content.len(),
            MAX_MANIFEST_BYTES
        )));
    }
    Manifest::parse(content)
}

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// REQUESTS
// =============================================================================

/// A manifest sent as text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestRequest {
    pub content: String,
}

impl ManifestRequest {
    pub fn to_manifest(&self) -> Result<Manifest, ReqlintError> {
        parse_content(&self.content)
    }
}

/// Lint request. `strict` overrides the server's configured mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    pub content: String,
    #[serde(default)]
    pub strict: Option<bool>,
}

impl CheckRequest {
    pub fn to_manifest(&self) -> Result<Manifest, ReqlintError> {
        parse_content(&self.content)
    }
}

/// Two manifests to compare.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffRequest {
    pub old: String,
    pub new: String,
}

impl DiffRequest {
    pub fn to_manifests(&self) -> Result<(Manifest, Manifest), ReqlintError> {
        Ok((parse_content(&self.old)?, parse_content(&self.new)?))
    }
}

/// A manifest and the Python sources that should be covered by it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageRequest {
    pub manifest: String,
    pub sources: Vec<String>,
}

impl CoverageRequest {
    pub fn to_manifest(&self) -> Result<Manifest, ReqlintError> {
        if self.sources.len() > MAX_COVERAGE_SOURCES {
            return Err(ReqlintError::ManifestTooLarge(format!(
                "{} sources, maximum is {}",
                self.sources.len(),
                MAX_COVERAGE_SOURCES
            )));
        }
        parse_content(&self.manifest)
    }
}

// =============================================================================
// PARSE RESPONSE
// =============================================================================

/// One parsed requirement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryJson {
    pub line: usize,
    pub name: String,
    pub normalized: String,
    pub extras: Vec<String>,
    pub specifiers: String,
    pub minimum: Option<String>,
    pub marker: Option<String>,
    pub section: Option<String>,
}

/// A line that could not be parsed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineErrorJson {
    pub line: usize,
    pub reason: String,
}

/// Parse response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseResponse {
    pub success: bool,
    pub entries: Vec<EntryJson>,
    pub invalid_lines: Vec<LineErrorJson>,
    pub error: Option<String>,
}

impl ParseResponse {
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let entries = manifest
            .entries()
            .map(|entry| {
                let req = entry.requirement;
                EntryJson {
                    line: entry.line,
                    name: req.name.as_str().to_string(),
                    normalized: req.name.normalized().to_string(),
                    extras: req.extras.clone(),
                    specifiers: req.specifiers.to_string(),
                    minimum: req.specifiers.minimum().map(|v| v.to_string()),
                    marker: req.marker.clone(),
                    section: entry.section.map(|s| s.label().to_string()),
                }
            })
            .collect();
        let invalid_lines = manifest
            .errors()
            .map(|(line, reason)| LineErrorJson {
                line,
                reason: reason.to_string(),
            })
            .collect();
        Self {
            success: true,
            entries,
            invalid_lines,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            entries: Vec::new(),
            invalid_lines: Vec::new(),
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// CHECK RESPONSE
// =============================================================================

/// Lint response. `clean` is false when any finding is an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    pub success: bool,
    pub clean: bool,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub diagnostics: Vec<Diagnostic>,
    pub error: Option<String>,
}

impl CheckResponse {
    pub fn from_diagnostics(diagnostics: Vec<Diagnostic>) -> Self {
        let count = |sev: Severity| diagnostics.iter().filter(|d| d.severity == sev).count();
        let errors = count(Severity::Error);
        Self {
            success: true,
            clean: errors == 0,
            errors,
            warnings: count(Severity::Warning),
            infos: count(Severity::Info),
            diagnostics,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            clean: false,
            errors: 0,
            warnings: 0,
            infos: 0,
            diagnostics: Vec::new(),
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// DIFF RESPONSE
// =============================================================================

/// Diff response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffResponse {
    pub success: bool,
    pub diff: Option<ManifestDiff>,
    pub error: Option<String>,
}

impl DiffResponse {
    pub fn success(diff: ManifestDiff) -> Self {
        Self {
            success: true,
            diff: Some(diff),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            diff: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// COVERAGE RESPONSE
// =============================================================================

/// Coverage response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageResponse {
    pub success: bool,
    pub report: Option<CoverageReport>,
    pub error: Option<String>,
}

impl CoverageResponse {
    pub fn success(report: CoverageReport) -> Self {
        Self {
            success: true,
            report: Some(report),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            report: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// SNAPSHOT RESPONSE
// =============================================================================

/// Canonical snapshot response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotResponse {
    pub success: bool,
    pub data: Option<String>, // Base64 encoded
    pub checksum: Option<u64>,
    pub blake3: Option<String>,
    pub error: Option<String>,
}

impl SnapshotResponse {
    pub fn success(data: Vec<u8>, checksum: u64, blake3: String) -> Self {
        Self {
            success: true,
            data: Some(base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                &data,
            )),
            checksum: Some(checksum),
            blake3: Some(blake3),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            checksum: None,
            blake3: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// BASELINE RESPONSES
// =============================================================================

/// Stored baselines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineListResponse {
    pub success: bool,
    pub baselines: Vec<BaselineInfo>,
    pub error: Option<String>,
}

impl BaselineListResponse {
    pub fn success(baselines: Vec<BaselineInfo>) -> Self {
        Self {
            success: true,
            baselines,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            baselines: Vec::new(),
            error: Some(msg.into()),
        }
    }
}

/// Result of saving a baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineSaveResponse {
    pub success: bool,
    pub name: String,
    pub revision: Option<u64>,
    pub entries: Option<usize>,
    pub error: Option<String>,
}

impl BaselineSaveResponse {
    pub fn success(name: impl Into<String>, revision: u64, entries: usize) -> Self {
        Self {
            success: true,
            name: name.into(),
            revision: Some(revision),
            entries: Some(entries),
            error: None,
        }
    }

    pub fn error(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            name: name.into(),
            revision: None,
            entries: None,
            error: Some(msg.into()),
        }
    }
}
