//! Route paths.

pub use ephemera_core::constants::IMAGES_PATH;

pub const UPLOAD_PATH: &str = "/upload";
pub const PING_PATH: &str = "/ping";
pub const READINESS_PATH: &str = "/health/ready";
pub const OPENAPI_PATH: &str = "/api/openapi.json";
pub const DOCS_PATH: &str = "/docs";

/// Multipart field carrying the image.
pub const FILE_FIELD: &str = "file";
/// Multipart field carrying the lifetime in seconds.
pub const EXPIRES_IN_FIELD: &str = "expires_in";
