//! OpenAPI documentation.

use axum::Json;
use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use crate::services::upload::UploadResponse;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Ephemera API",
        version = "0.1.0",
        description = "Ephemeral image hosting. Uploaded images carry their expiry in their name and are deleted once it passes."
    ),
    paths(
        handlers::image_upload::upload_image,
        handlers::image_get::get_image,
        handlers::health::ping,
        handlers::health::readiness_check,
    ),
    components(
        schemas(
            UploadResponse,
            handlers::health::PingResponse,
            handlers::health::ReadinessResponse,
            error::ErrorResponse,
        )
    ),
    tags(
        (name = "images", description = "Image upload and retrieval"),
        (name = "health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;

/// Serve the OpenAPI document.
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
