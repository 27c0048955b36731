use serde::Serialize;
use utoipa::ToSchema;

/// An image committed to the store.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub name: String,
    pub expires_in: i64,
}

/// Body returned for a successful upload.
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    /// Path the image can be fetched from until it expires.
    #[schema(example = "/images/3f2a9c0e5b7d4e1f8a6b2c9d0e1f2a3b__1700003600.png")]
    pub url: String,
    /// Lifetime granted, in seconds.
    #[schema(example = 3600)]
    pub expires_in: i64,
}
