//! Route configuration and setup

use crate::api_doc::openapi_json;
use crate::constants::{DOCS_PATH, IMAGES_PATH, OPENAPI_PATH, PING_PATH, READINESS_PATH, UPLOAD_PATH};
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use ephemera_core::Config;
use ephemera_infra::{request_id_middleware, security_headers_middleware, SecurityHeaders};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Router<()> {
    let image_routes = Router::new()
        .route(UPLOAD_PATH, post(handlers::image_upload::upload_image))
        .route(
            &format!("{}/{{name}}", IMAGES_PATH),
            get(handlers::image_get::get_image),
        );

    let health_routes = Router::new()
        .route(PING_PATH, get(handlers::health::ping))
        .route(READINESS_PATH, get(handlers::health::readiness_check))
        .route(OPENAPI_PATH, get(openapi_json));

    let security_headers = SecurityHeaders {
        hsts: config.is_production(),
    };

    // The docs page loads its own scripts, so it sits outside the strict CSP.
    // Uploads stream to disk, so axum's in-memory default limit does not apply.
    let mut app = image_routes
        .merge(health_routes)
        .layer(axum::middleware::from_fn_with_state(
            security_headers,
            security_headers_middleware,
        ))
        .merge(utoipa_rapidoc::RapiDoc::new(OPENAPI_PATH).path(DOCS_PATH))
        .layer(DefaultBodyLimit::disable());

    if let Some(limit) = config.max_upload_size_bytes {
        tracing::info!(max_upload_size_bytes = limit, "Request body limit enabled");
        app = app.layer(RequestBodyLimitLayer::new(limit));
    }

    // Server-level concurrency limit to protect against resource exhaustion under extreme load
    let http_concurrency_limit = config.http_concurrency_limit.max(1);
    tracing::info!(
        http_concurrency_limit = http_concurrency_limit,
        "HTTP concurrency limit layer enabled"
    );

    app.layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state)
}
