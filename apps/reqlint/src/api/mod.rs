//! # reqlint HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /parse` - Parse a manifest
//! - `POST /check` - Lint a manifest
//! - `POST /diff` - Compare two manifests
//! - `POST /coverage` - Check that imports are declared
//! - `POST /snapshot` - Canonical snapshot (base64) with checksum and BLAKE3 hash
//! - `GET /baselines` - List stored baselines
//! - `POST /baselines/{name}` - Save a baseline
//! - `POST /baselines/{name}/diff` - Compare a manifest with a baseline
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `REQLINT_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `REQLINT_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `REQLINT_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::get_api_key_from_env;
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
pub use types::{
    BaselineListResponse, BaselineSaveResponse, CheckRequest, CheckResponse, CoverageRequest,
    CoverageResponse, DiffRequest, DiffResponse, EntryJson, HealthResponse, LineErrorJson,
    ManifestRequest, ParseResponse, SnapshotResponse,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use reqlint_core::{Baselines, ImportResolver, Linter, ReqlintError};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    /// Baseline store; writes take the lock exclusively.
    pub baselines: Arc<RwLock<Baselines>>,
    pub linter: Arc<Linter>,
    pub resolver: Arc<ImportResolver>,
}

impl AppState {
    /// State with default lint rules and the built-in import resolver.
    #[must_use]
    pub fn new(baselines: Baselines) -> Self {
        Self::with_config(baselines, Linter::default(), ImportResolver::new())
    }

    #[must_use]
    pub fn with_config(baselines: Baselines, linter: Linter, resolver: ImportResolver) -> Self {
        Self {
            baselines: Arc::new(RwLock::new(baselines)),
            linter: Arc::new(linter),
            resolver: Arc::new(resolver),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from `REQLINT_CORS_ORIGINS`.
///
/// - `*` allows all origins
/// - unset means localhost only
/// - otherwise a comma-separated list of origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("REQLINT_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!("CORS: Allowing ALL origins (REQLINT_CORS_ORIGINS=*)");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in REQLINT_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                cors_for_origins(allowed_origins)
            }
        }
        None => {
            tracing::debug!("CORS: No REQLINT_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();

    cors_for_origins(origins)
}

/// Methods and headers the API accepts, limited to the given origins.
fn cors_for_origins(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing
/// 2. CORS
/// 3. Body limit (2 MiB)
/// 4. Rate limiting (if enabled)
/// 5. Authentication (if configured)
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let has_auth = get_api_key_from_env().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication disabled: all endpoints are public. \
             Set REQLINT_API_KEY to require a key."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/parse", post(handlers::parse_handler))
        .route("/check", post(handlers::check_handler))
        .route("/diff", post(handlers::diff_handler))
        .route("/coverage", post(handlers::coverage_handler))
        .route("/snapshot", post(handlers::snapshot_handler))
        .route("/baselines", get(handlers::list_baselines_handler))
        .route("/baselines/{name}", post(handlers::save_baseline_handler))
        .route(
            "/baselines/{name}/diff",
            post(handlers::baseline_diff_handler),
        );

    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), ReqlintError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ReqlintError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("reqlint HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| ReqlintError::IoError(format!("Server error: {}", e)))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    fn request(path: &str) -> Request<Body> {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn rate_limit_rejects_burst() {
        let router: Router = Router::new()
            .route("/health", get(handlers::health_handler))
            .layer(axum_middleware::from_fn_with_state(
                create_rate_limiter(1),
                middleware::rate_limit_middleware,
            ));

        let first = router.clone().oneshot(request("/health")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = router.oneshot(request("/health")).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/check")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn localhost_cors_answers_preflight() {
        let router: Router = Router::new()
            .route("/check", post(handlers::parse_handler))
            .layer(build_localhost_cors());

        let allowed = router
            .clone()
            .oneshot(preflight("http://localhost:3000"))
            .await
            .unwrap();
        assert_eq!(
            allowed.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("http://localhost:3000"))
        );
        let methods = allowed
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_METHODS)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(methods.contains("POST"));

        let foreign = router.oneshot(preflight("https://example.com")).await.unwrap();
        assert!(
            foreign
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }

    #[tokio::test]
    async fn baselines_start_empty() {
        let state = AppState::new(Baselines::in_memory());
        let response = create_router(state.clone())
            .oneshot(request("/baselines"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!state.baselines.read().await.is_persistent());
    }
}
