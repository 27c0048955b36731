use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use bytes::Bytes;
use ephemera_core::constants::NOT_FOUND_OR_EXPIRED;
use ephemera_core::object_name::extension_hint;
use ephemera_core::{AppError, ObjectName};
use ephemera_processing::validator::{classify, content_type_for_extension, EMPTY, OCTET_STREAM};
use ephemera_storage::StorageError;
use futures::StreamExt;
use std::sync::Arc;

fn not_found() -> HttpAppError {
    AppError::NotFound(NOT_FOUND_OR_EXPIRED.to_string()).into()
}

/// Serve a stored image.
///
/// An expired image is deleted on the spot. Every miss (expired, absent, invalid name,
/// unreadable) answers the same 404.
#[utoipa::path(
    get,
    path = "/images/{name}",
    tag = "images",
    params(
        ("name" = String, Path, description = "Stored image name as returned in the upload URL")
    ),
    responses(
        (status = 200, description = "Image bytes", content_type = "application/octet-stream"),
        (status = 404, description = "Image not found or expired", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "get_image"))]
pub async fn get_image(
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, HttpAppError> {
    let now = state.clock.now();
    let parsed = ObjectName::parse(&name);

    if let Some(expired) = parsed.as_ref().filter(|parsed| parsed.is_expired(now)) {
        match state.store.delete(&name).await {
            Ok(true) => tracing::info!(
                name = %name,
                expiry = expired.expiry(),
                "Deleted expired image on access"
            ),
            Ok(false) => tracing::debug!(name = %name, "Expired image already removed"),
            Err(StorageError::InvalidKey(_)) => {}
            Err(e) => {
                tracing::warn!(error = %e, name = %name, "Failed to delete expired image");
            }
        }
        return Err(not_found());
    }

    let mut object = match state.store.get(&name).await {
        Ok(object) => object,
        Err(StorageError::NotFound(_)) | Err(StorageError::InvalidKey(_)) => {
            return Err(not_found());
        }
        Err(e) => {
            tracing::warn!(error = %e, name = %name, "Failed to open image");
            return Err(not_found());
        }
    };

    let first_chunk = match object.stream.next().await.transpose() {
        Ok(chunk) => chunk.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, name = %name, "Failed to read image");
            return Err(not_found());
        }
    };

    let content_type = response_content_type(&name, &first_chunk);
    let cache_control = match &parsed {
        Some(parsed) => format!("private, max-age={}", parsed.remaining_secs(now)),
        None => "private, no-cache".to_string(),
    };

    let body_stream = futures::stream::iter([Ok(first_chunk)])
        .chain(object.stream)
        .map(|result| {
            result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
        });

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, object.content_length)
        .header(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        )
        .header(header::CACHE_CONTROL, cache_control)
        .body(Body::from_stream(body_stream))
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to build response");
            HttpAppError::from(AppError::Internal(e.to_string()))
        })?;

    Ok(response)
}

/// Content type from the stored bytes, then from the name's extension.
fn response_content_type(name: &str, first_chunk: &Bytes) -> &'static str {
    match classify(first_chunk) {
        EMPTY | OCTET_STREAM => {
            content_type_for_extension(&extension_hint(name)).unwrap_or(OCTET_STREAM)
        }
        sniffed => sniffed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_prefers_stored_bytes() {
        let png = Bytes::from_static(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR");
        assert_eq!(response_content_type("a__1.jpg", &png), "image/png");
    }

    #[test]
    fn test_content_type_falls_back_to_extension() {
        let unknown = Bytes::from_static(&[0x00, 0x01, 0x02, 0xFE]);
        assert_eq!(response_content_type("a__1.webp", &unknown), "image/webp");
        assert_eq!(response_content_type("a__1", &unknown), OCTET_STREAM);
        assert_eq!(response_content_type("a__1.png", &Bytes::new()), "image/png");
    }
}
