//! Unit tests for API types serialization/deserialization.

#![allow(clippy::unwrap_used, clippy::panic)]

use reqlint::api::{
    CheckRequest, CheckResponse, CoverageRequest, DiffRequest, DiffResponse, HealthResponse,
    ManifestRequest, ParseResponse, SnapshotResponse,
};
use reqlint_core::{Diagnostic, Manifest, ReqlintError, Rule, Severity};

// =============================================================================
// HEALTH RESPONSE TESTS
// =============================================================================

#[test]
fn test_health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

#[test]
fn test_health_response_deserialization() {
    let json = r#"{"status":"healthy","version":"1.0.0"}"#;
    let health: HealthResponse = serde_json::from_str(json).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, "1.0.0");
}

// =============================================================================
// REQUEST TESTS
// =============================================================================

#[test]
fn test_check_request_strict_is_optional() {
    let request: CheckRequest = serde_json::from_str(r#"{"content":"torch>=1.10.0\n"}"#).unwrap();
    assert_eq!(request.strict, None);

    let request: CheckRequest =
        serde_json::from_str(r#"{"content":"torch>=1.10.0\n","strict":true}"#).unwrap();
    assert_eq!(request.strict, Some(true));
}

#[test]
fn test_manifest_request_missing_content_rejected() {
    assert!(serde_json::from_str::<ManifestRequest>("{}").is_err());
}

#[test]
fn test_manifest_request_size_limit() {
    let request = ManifestRequest {
        content: "#".repeat(reqlint_core::primitives::MAX_MANIFEST_BYTES + 1),
    };
    assert!(matches!(
        request.to_manifest(),
        Err(ReqlintError::ManifestTooLarge(_))
    ));
}

#[test]
fn test_diff_request_parses_both_sides() {
    let request = DiffRequest {
        old: "torch>=1.10.0\n".to_string(),
        new: "torch>=1.12.0\nnumpy>=1.21.0\n".to_string(),
    };
    let (old, new) = request.to_manifests().unwrap();
    assert_eq!(old.requirement_count(), 1);
    assert_eq!(new.requirement_count(), 2);
}

#[test]
fn test_coverage_request_source_limit() {
    let request = CoverageRequest {
        manifest: String::new(),
        sources: vec![String::new(); 10_000],
    };
    assert!(request.to_manifest().is_err());
}

// =============================================================================
// RESPONSE TESTS
// =============================================================================

#[test]
fn test_parse_response_from_manifest() {
    let manifest = Manifest::parse("# Core\nTorch[cuda]>=1.10.0,<3  # gpu\n").unwrap();
    let response = ParseResponse::from_manifest(&manifest);

    assert!(response.success);
    let entry = &response.entries[0];
    assert_eq!(entry.name, "Torch");
    assert_eq!(entry.normalized, "torch");
    assert_eq!(entry.extras, vec!["cuda".to_string()]);
    assert_eq!(entry.minimum.as_deref(), Some("1.10.0"));
    assert_eq!(entry.section.as_deref(), Some("Core"));
}

#[test]
fn test_check_response_counts() {
    let diagnostic = |rule: Rule, severity: Severity| Diagnostic {
        rule,
        severity,
        line: 1,
        origin: None,
        message: String::new(),
    };
    let response = CheckResponse::from_diagnostics(vec![
        diagnostic(Rule::Unbounded, Severity::Warning),
        diagnostic(Rule::Pinned, Severity::Info),
    ]);
    assert!(response.clean);
    assert_eq!(response.warnings, 1);
    assert_eq!(response.infos, 1);

    let json = serde_json::to_string(&response).unwrap();
    assert!(json.contains("\"rule\":\"unbounded\""));
    assert!(json.contains("\"severity\":\"warning\""));
    assert!(!json.contains("\"origin\""));
}

#[test]
fn test_error_responses() {
    let response = DiffResponse::error("bad");
    assert!(!response.success);
    assert!(response.diff.is_none());
    assert_eq!(response.error.as_deref(), Some("bad"));

    let check = CheckResponse::error("bad");
    assert!(!check.clean);
}

#[test]
fn test_snapshot_response_base64() {
    let response = SnapshotResponse::success(vec![1, 2, 3], 42, "ab".to_string());
    assert_eq!(response.data.as_deref(), Some("AQID"));
    assert_eq!(response.checksum, Some(42));

    let json = serde_json::to_string(&response).unwrap();
    let back: SnapshotResponse = serde_json::from_str(&json).unwrap();
    assert_eq!(back.blake3.as_deref(), Some("ab"));
}
