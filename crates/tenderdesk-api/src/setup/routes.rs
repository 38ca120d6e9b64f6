//! Route configuration and setup

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post},
    Json, Router,
};
use tenderdesk_infra::request_id_middleware;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

use crate::api_doc::ApiDoc;
use crate::auth::{auth_middleware, AuthState};
use crate::constants::API_PREFIX;
use crate::handlers;
use crate::state::AppState;

/// Room for multipart boundaries and the small text fields next to the file.
/// A body past the limit fails inside the multipart reader, which the handlers
/// report as the matching size rule.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the full application router around shared state.
pub fn build_router(state: Arc<AppState>) -> Router {
    let auth_state = Arc::new(AuthState::new(state.config.master_api_key.clone()));
    if state.config.master_api_key.is_none() {
        tracing::warn!("MASTER_API_KEY not set; every protected route will answer 401");
    }

    let protected_routes = protected_routes(state.clone()).layer(
        axum::middleware::from_fn_with_state(auth_state, auth_middleware),
    );

    let upload = state.upload_config();
    let body_limit = upload
        .max_archive_size_bytes
        .max(upload.max_file_size_bytes)
        + MULTIPART_OVERHEAD_BYTES;

    let http_concurrency_limit = state.config.http_concurrency_limit.max(1);

    public_routes(state)
        .merge(protected_routes)
        .merge(RapiDoc::new("/api/openapi.json").path("/docs"))
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(setup_cors())
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
}

fn setup_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Public routes (no authentication required)
fn public_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .with_state(state)
}

/// Protected routes (require authentication)
fn protected_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            &format!("{}/documents", API_PREFIX),
            post(handlers::documents::upload_document),
        )
        .route(
            &format!("{}/documents/{{id}}", API_PREFIX),
            get(handlers::documents::get_document),
        )
        .route(
            &format!("{}/documents/{{id}}/extract", API_PREFIX),
            post(handlers::extraction::extract_document),
        )
        .route(
            &format!("{}/documents/{{id}}/extractions", API_PREFIX),
            get(handlers::documents::list_extractions),
        )
        .route(
            &format!("{}/extractions/batch", API_PREFIX),
            post(handlers::batch::process_batch),
        )
        .route(
            &format!("{}/providers", API_PREFIX),
            get(handlers::providers::list_providers),
        )
        .with_state(state)
}
