//! Integration tests for the reqlint HTTP API.
//!
//! Uses axum-test to test the API handlers without starting a real server.

// Auth tests hold a MutexGuard across await to serialize env var changes.
#![allow(clippy::unwrap_used, clippy::panic, clippy::await_holding_lock)]

use axum::http::HeaderValue;
use axum_test::TestServer;
use reqlint::api::{
    AppState, BaselineListResponse, BaselineSaveResponse, CheckResponse, CoverageResponse,
    DiffResponse, HealthResponse, ParseResponse, SnapshotResponse, create_router,
};
use reqlint_core::{Baselines, import_snapshot};
use serde_json::json;
use std::sync::Mutex;

/// Serializes tests that touch `REQLINT_API_KEY`.
static AUTH_TEST_MUTEX: Mutex<()> = Mutex::new(());

const PROJECT_MANIFEST: &str = "\
# Core dependencies
torch>=1.10.0
numpy>=1.21.0

# Visualization
matplotlib>=3.4.0
seaborn>=0.11.0

# Environment (optional, for interactive demos)
pygame>=2.1.0

# Testing
pytest>=6.0
";

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Holds the mutex and clears the key on drop.
struct TestGuard {
    _guard: std::sync::MutexGuard<'static, ()>,
}

impl Drop for TestGuard {
    fn drop(&mut self) {
        // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
        unsafe { std::env::remove_var("REQLINT_API_KEY") };
    }
}

/// Test server over an in-memory baseline store.
fn create_test_server() -> (TestServer, TestGuard) {
    let guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::remove_var("REQLINT_API_KEY") };
    let state = AppState::new(Baselines::in_memory());
    (
        TestServer::new(create_router(state)).unwrap(),
        TestGuard { _guard: guard },
    )
}

// =============================================================================
// HEALTH ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _guard) = create_test_server();

    let response = server.get("/health").await;
    response.assert_status_ok();

    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// PARSE ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_parse_project_manifest() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/parse")
        .json(&json!({ "content": PROJECT_MANIFEST }))
        .await;
    response.assert_status_ok();

    let parsed: ParseResponse = response.json();
    assert!(parsed.success);
    assert_eq!(parsed.entries.len(), 6);
    assert!(parsed.invalid_lines.is_empty());

    let torch = &parsed.entries[0];
    assert_eq!(torch.name, "torch");
    assert_eq!(torch.line, 2);
    assert_eq!(torch.minimum.as_deref(), Some("1.10.0"));
    assert_eq!(torch.section.as_deref(), Some("Core dependencies"));

    let pytest = &parsed.entries[5];
    assert_eq!(pytest.section.as_deref(), Some("Testing"));
}

#[tokio::test]
async fn test_parse_reports_invalid_lines() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/parse")
        .json(&json!({ "content": "torch>=1.10.0\n>=2.0\n" }))
        .await;
    response.assert_status_ok();

    let parsed: ParseResponse = response.json();
    assert_eq!(parsed.entries.len(), 1);
    assert_eq!(parsed.invalid_lines.len(), 1);
    assert_eq!(parsed.invalid_lines[0].line, 2);
}

#[tokio::test]
async fn test_parse_rejects_oversized_manifest() {
    let (server, _guard) = create_test_server();

    let content = "#".repeat(reqlint_core::primitives::MAX_MANIFEST_BYTES + 1);
    let response = server.post("/parse").json(&json!({ "content": content })).await;

    assert_eq!(response.status_code().as_u16(), 400);
    let parsed: ParseResponse = response.json();
    assert!(!parsed.success);
    assert!(parsed.error.is_some());
}

// =============================================================================
// CHECK ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_check_clean_manifest() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/check")
        .json(&json!({ "content": PROJECT_MANIFEST }))
        .await;
    response.assert_status_ok();

    let check: CheckResponse = response.json();
    assert!(check.success);
    assert!(check.clean);
    assert_eq!(check.errors, 0);
    assert_eq!(check.warnings, 0);
}

#[tokio::test]
async fn test_check_duplicate_is_error() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/check")
        .json(&json!({ "content": "numpy>=1.21.0\nNumPy>=1.22\n" }))
        .await;
    response.assert_status_ok();

    let check: CheckResponse = response.json();
    assert!(!check.clean);
    assert_eq!(check.errors, 1);
    assert_eq!(check.diagnostics[0].line, 2);
}

#[tokio::test]
async fn test_check_strict_promotes_warnings() {
    let (server, _guard) = create_test_server();

    let relaxed: CheckResponse = server
        .post("/check")
        .json(&json!({ "content": "pygame\n" }))
        .await
        .json();
    assert!(relaxed.clean);
    assert_eq!(relaxed.warnings, 1);

    let strict: CheckResponse = server
        .post("/check")
        .json(&json!({ "content": "pygame\n", "strict": true }))
        .await
        .json();
    assert!(!strict.clean);
    assert_eq!(strict.errors, 1);
}

// =============================================================================
// DIFF ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_diff_manifests() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/diff")
        .json(&json!({
            "old": "torch>=1.10.0\nnumpy>=1.21.0\n",
            "new": "torch>=1.12.0\npytest>=6.0\n",
        }))
        .await;
    response.assert_status_ok();

    let result: DiffResponse = response.json();
    let diff = result.diff.unwrap();
    assert_eq!(diff.added.len(), 1);
    assert_eq!(diff.removed.len(), 1);
    assert_eq!(diff.changed.len(), 1);
    assert_eq!(diff.changed[0].name, "torch");
}

// =============================================================================
// COVERAGE ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_coverage_finds_undeclared_import() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/coverage")
        .json(&json!({
            "manifest": "torch>=1.10.0\npytest>=6.0\n",
            "sources": ["import torch\nimport os\nfrom sklearn.metrics import f1_score\n"],
        }))
        .await;
    response.assert_status_ok();

    let coverage: CoverageResponse = response.json();
    let report = coverage.report.unwrap();
    assert_eq!(report.undeclared.len(), 1);
    assert_eq!(report.undeclared[0].distribution, "scikit-learn");
    assert_eq!(report.unused, vec!["pytest".to_string()]);
}

// =============================================================================
// SNAPSHOT ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_snapshot_round_trips() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/snapshot")
        .json(&json!({ "content": PROJECT_MANIFEST }))
        .await;
    response.assert_status_ok();

    let snapshot: SnapshotResponse = response.json();
    assert!(snapshot.success);
    assert_eq!(snapshot.blake3.as_deref().map(str::len), Some(64));

    let data = base64::Engine::decode(
        &base64::engine::general_purpose::STANDARD,
        snapshot.data.unwrap(),
    )
    .unwrap();
    let restored = import_snapshot(&data).unwrap();
    assert_eq!(restored.len(), 6);
    assert_eq!(Some(restored.checksum()), snapshot.checksum);
}

// =============================================================================
// BASELINE ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_baseline_save_list_and_diff() {
    let (server, _guard) = create_test_server();

    let saved: BaselineSaveResponse = server
        .post("/baselines/main")
        .json(&json!({ "content": PROJECT_MANIFEST }))
        .await
        .json();
    assert!(saved.success);
    assert_eq!(saved.revision, Some(1));
    assert_eq!(saved.entries, Some(6));

    let resaved: BaselineSaveResponse = server
        .post("/baselines/main")
        .json(&json!({ "content": PROJECT_MANIFEST }))
        .await
        .json();
    assert_eq!(resaved.revision, Some(2));

    let list: BaselineListResponse = server.get("/baselines").await.json();
    assert_eq!(list.baselines.len(), 1);
    assert_eq!(list.baselines[0].name, "main");
    assert_eq!(list.baselines[0].revision, 2);

    let response = server
        .post("/baselines/main/diff")
        .json(&json!({ "content": "torch>=1.10.0\n" }))
        .await;
    response.assert_status_ok();
    let diff = response.json::<DiffResponse>().diff.unwrap();
    assert_eq!(diff.removed.len(), 5);
    assert_eq!(diff.unchanged, 1);
}

#[tokio::test]
async fn test_baseline_diff_ignores_version_spelling() {
    let (server, _guard) = create_test_server();
    let content = "torch>=1.10.0-rc1\nnumpy>=V1.21\nlegacy===1.0ALPHA1\n";

    server
        .post("/baselines/rc")
        .json(&json!({ "content": content }))
        .await
        .assert_status_ok();

    let response = server
        .post("/baselines/rc/diff")
        .json(&json!({ "content": content }))
        .await;
    response.assert_status_ok();
    let diff = response.json::<DiffResponse>().diff.unwrap();
    assert!(diff.changed.is_empty());
    assert_eq!(diff.unchanged, 3);
}

#[tokio::test]
async fn test_baseline_diff_unknown_name() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/baselines/missing/diff")
        .json(&json!({ "content": "torch>=1.10.0\n" }))
        .await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn test_baseline_invalid_name_rejected() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/baselines/bad%20name")
        .json(&json!({ "content": "torch>=1.10.0\n" }))
        .await;
    assert_eq!(response.status_code().as_u16(), 400);
}

// =============================================================================
// ERROR HANDLING TESTS
// =============================================================================

#[tokio::test]
async fn test_404_on_unknown_endpoint() {
    let (server, _guard) = create_test_server();
    server.get("/unknown").await.assert_status_not_found();
}

#[tokio::test]
async fn test_method_not_allowed() {
    let (server, _guard) = create_test_server();
    let response = server.post("/health").await;
    assert_eq!(response.status_code().as_u16(), 405);
}

#[tokio::test]
async fn test_invalid_json_body() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/check")
        .bytes("not valid json".into())
        .content_type("application/json")
        .await;
    assert!(response.status_code().is_client_error());
}

// =============================================================================
// AUTHENTICATION MIDDLEWARE TESTS
// =============================================================================

/// Must be called while holding AUTH_TEST_MUTEX.
fn create_auth_test_server(api_key: &str) -> TestServer {
    // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::set_var("REQLINT_API_KEY", api_key) };
    TestServer::new(create_router(AppState::new(Baselines::in_memory()))).unwrap()
}

fn cleanup_auth_env() {
    // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::remove_var("REQLINT_API_KEY") };
}

#[tokio::test]
async fn test_auth_valid_bearer_token() {
    let _guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let api_key = "test-secret-key-12345";
    let server = create_auth_test_server(api_key);

    let response = server
        .get("/baselines")
        .add_header(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {}", api_key)
                .parse::<HeaderValue>()
                .unwrap(),
        )
        .await;

    cleanup_auth_env();
    response.assert_status_ok();
}

#[tokio::test]
async fn test_auth_valid_raw_token() {
    let _guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let api_key = "test-raw-key-67890";
    let server = create_auth_test_server(api_key);

    let response = server
        .get("/baselines")
        .add_header(
            axum::http::header::AUTHORIZATION,
            api_key.parse::<HeaderValue>().unwrap(),
        )
        .await;

    cleanup_auth_env();
    response.assert_status_ok();
}

#[tokio::test]
async fn test_auth_invalid_token_rejected() {
    let _guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let server = create_auth_test_server("correct-key");

    let response = server
        .post("/check")
        .json(&json!({ "content": "torch>=1.10.0\n" }))
        .add_header(
            axum::http::header::AUTHORIZATION,
            "Bearer wrong-key".parse::<HeaderValue>().unwrap(),
        )
        .await;

    cleanup_auth_env();
    assert_eq!(response.status_code().as_u16(), 401);
}

#[tokio::test]
async fn test_auth_missing_header_rejected() {
    let _guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let server = create_auth_test_server("required-key");

    let response = server.get("/baselines").await;

    cleanup_auth_env();
    assert_eq!(response.status_code().as_u16(), 401);
}

#[tokio::test]
async fn test_auth_bearer_prefix_only_rejected() {
    let _guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let server = create_auth_test_server("actual-key");

    let response = server
        .get("/baselines")
        .add_header(
            axum::http::header::AUTHORIZATION,
            "Bearer ".parse::<HeaderValue>().unwrap(),
        )
        .await;

    cleanup_auth_env();
    assert_eq!(response.status_code().as_u16(), 401);
}

#[tokio::test]
async fn test_auth_health_endpoint_bypasses_auth() {
    let _guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let server = create_auth_test_server("secret-key-for-bypass-test");

    let response = server.get("/health").await;

    cleanup_auth_env();
    response.assert_status_ok();
}
