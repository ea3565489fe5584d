//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.

use super::{
    AppState,
    types::{
        BaselineListResponse, BaselineSaveResponse, CheckRequest, CheckResponse, CoverageRequest,
        CoverageResponse, DiffRequest, DiffResponse, HealthResponse, ManifestRequest,
        ParseResponse, SnapshotResponse,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use reqlint_core::{
    BaselineStore, Linter, ReqlintError, Snapshot, check_coverage, diff, export_snapshot,
    scan_imports, snapshot_crypto_hash,
};
use std::collections::BTreeSet;

/// HTTP status for an error raised while serving a request.
fn status_for(error: &ReqlintError) -> StatusCode {
    match error {
        ReqlintError::NotFound(_) => StatusCode::NOT_FOUND,
        ReqlintError::IoError(_)
        | ReqlintError::SerializationError(_)
        | ReqlintError::DeserializationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// PARSE HANDLER
// =============================================================================

/// Parse a manifest and return its entries.
pub async fn parse_handler(Json(request): Json<ManifestRequest>) -> impl IntoResponse {
    match request.to_manifest() {
        Ok(manifest) => (StatusCode::OK, Json(ParseResponse::from_manifest(&manifest))),
        Err(e) => (
            status_for(&e),
            Json(ParseResponse::error(format!("Parse failed: {}", e))),
        ),
    }
}

// =============================================================================
// CHECK HANDLER
// =============================================================================

/// Lint a manifest.
pub async fn check_handler(
    State(state): State<AppState>,
    Json(request): Json<CheckRequest>,
) -> impl IntoResponse {
    let manifest = match request.to_manifest() {
        Ok(m) => m,
        Err(e) => {
            return (
                status_for(&e),
                Json(CheckResponse::error(format!("Invalid manifest: {}", e))),
            );
        }
    };

    let report = match request.strict {
        Some(strict) if strict != state.linter.config().strict => {
            let mut config = state.linter.config().clone();
            config.strict = strict;
            Linter::new(config).lint(&manifest)
        }
        _ => state.linter.lint(&manifest),
    };

    (
        StatusCode::OK,
        Json(CheckResponse::from_diagnostics(report.diagnostics)),
    )
}

// =============================================================================
// DIFF HANDLERS
// =============================================================================

/// Compare two manifests.
pub async fn diff_handler(Json(request): Json<DiffRequest>) -> impl IntoResponse {
    match request.to_manifests() {
        Ok((old, new)) => (
            StatusCode::OK,
            Json(DiffResponse::success(diff(
                &old.dependency_set(),
                &new.dependency_set(),
            ))),
        ),
        Err(e) => (
            status_for(&e),
            Json(DiffResponse::error(format!("Invalid manifest: {}", e))),
        ),
    }
}

/// Compare a manifest with a stored baseline.
pub async fn baseline_diff_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<ManifestRequest>,
) -> impl IntoResponse {
    let manifest = match request.to_manifest() {
        Ok(m) => m,
        Err(e) => {
            return (
                status_for(&e),
                Json(DiffResponse::error(format!("Invalid manifest: {}", e))),
            );
        }
    };

    let baselines = state.baselines.read().await;
    let old = match baselines.load(&name).and_then(|snapshot| {
        snapshot
            .ok_or_else(|| ReqlintError::NotFound(format!("baseline '{}'", name)))?
            .dependency_set()
    }) {
        Ok(set) => set,
        Err(e) => {
            return (
                status_for(&e),
                Json(DiffResponse::error(format!("Baseline unavailable: {}", e))),
            );
        }
    };

    (
        StatusCode::OK,
        Json(DiffResponse::success(diff(&old, &manifest.dependency_set()))),
    )
}

// =============================================================================
// COVERAGE HANDLER
// =============================================================================

/// Check that imports in the given sources are declared.
pub async fn coverage_handler(
    State(state): State<AppState>,
    Json(request): Json<CoverageRequest>,
) -> impl IntoResponse {
    let manifest = match request.to_manifest() {
        Ok(m) => m,
        Err(e) => {
            return (
                status_for(&e),
                Json(CoverageResponse::error(format!("Invalid request: {}", e))),
            );
        }
    };

    let imports: BTreeSet<String> = request
        .sources
        .iter()
        .flat_map(|source| scan_imports(source))
        .collect();
    let report = check_coverage(&manifest, &imports, &state.resolver);

    (StatusCode::OK, Json(CoverageResponse::success(report)))
}

// =============================================================================
// SNAPSHOT HANDLER
// =============================================================================

/// Canonical snapshot of a manifest, base64 encoded.
pub async fn snapshot_handler(Json(request): Json<ManifestRequest>) -> impl IntoResponse {
    let manifest = match request.to_manifest() {
        Ok(m) => m,
        Err(e) => {
            return (
                status_for(&e),
                Json(SnapshotResponse::error(format!("Invalid manifest: {}", e))),
            );
        }
    };

    let snapshot = Snapshot::from_manifest(&manifest);
    match export_snapshot(&snapshot).and_then(|data| {
        let hash = snapshot_crypto_hash(&manifest)?;
        Ok((data, hash))
    }) {
        Ok((data, hash)) => (
            StatusCode::OK,
            Json(SnapshotResponse::success(data, snapshot.checksum(), hash)),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(SnapshotResponse::error(format!("Export failed: {}", e))),
        ),
    }
}

// =============================================================================
// BASELINE HANDLERS
// =============================================================================

/// List stored baselines.
pub async fn list_baselines_handler(State(state): State<AppState>) -> impl IntoResponse {
    let baselines = state.baselines.read().await;
    match baselines.list() {
        Ok(infos) => (StatusCode::OK, Json(BaselineListResponse::success(infos))),
        Err(e) => (
            status_for(&e),
            Json(BaselineListResponse::error(format!("List failed: {}", e))),
        ),
    }
}

/// Store a manifest as the named baseline.
pub async fn save_baseline_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<ManifestRequest>,
) -> impl IntoResponse {
    let manifest = match request.to_manifest() {
        Ok(m) => m,
        Err(e) => {
            return (
                status_for(&e),
                Json(BaselineSaveResponse::error(
                    name,
                    format!("Invalid manifest: {}", e),
                )),
            );
        }
    };

    let snapshot = Snapshot::from_manifest(&manifest);
    let mut baselines = state.baselines.write().await;
    match baselines.save(&name, &snapshot) {
        Ok(revision) => {
            tracing::info!(name = %name, revision, "Saved baseline");
            (
                StatusCode::OK,
                Json(BaselineSaveResponse::success(name, revision, snapshot.len())),
            )
        }
        Err(e) => (
            status_for(&e),
            Json(BaselineSaveResponse::error(
                name,
                format!("Save failed: {}", e),
            )),
        ),
    }
}
