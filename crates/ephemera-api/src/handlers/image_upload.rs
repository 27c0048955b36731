use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};

use crate::constants::IMAGES_PATH;
use crate::error::{ErrorResponse, HttpAppError};
use crate::services::upload::{ImageUploadService, UploadResponse};
use crate::state::AppState;

/// Upload image handler
///
/// Accepts a multipart form with a `file` field (the image) and an `expires_in` field
/// (lifetime in seconds, `1..=TTL_LIMIT`), in either order. The image is admitted only if
/// its leading bytes identify an image format; the client's declared content type is
/// ignored.
///
/// # Errors
/// - `AppError::InvalidInput` - Missing or invalid fields, or the file is not an image
/// - `AppError::PayloadTooLarge` - Body exceeds the configured limit
/// - `AppError::Storage` - The image could not be stored
#[utoipa::path(
    post,
    path = "/upload",
    tag = "images",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Image stored", body = UploadResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_image"))]
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, HttpAppError> {
    let uploaded = ImageUploadService::new(&state).upload(multipart).await?;

    Ok(Json(UploadResponse {
        url: format!("{}/{}", IMAGES_PATH, uploaded.name),
        expires_in: uploaded.expires_in,
    }))
}
