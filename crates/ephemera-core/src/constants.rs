//! Shared constants.

/// Default storage directory, relative to the working directory.
pub const DEFAULT_UPLOAD_DIR: &str = "uploaded_images";

pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;

/// 24 hours.
pub const DEFAULT_TTL_LIMIT_SECS: i64 = 60 * 60 * 24;

/// Number of leading bytes inspected when classifying an upload.
pub const SNIFF_LEN: usize = 2048;

/// Buffer size used when streaming an upload into the store (1 MiB).
pub const WRITE_CHUNK_SIZE: usize = 1 << 20;

/// Public path prefix under which stored objects are served.
pub const IMAGES_PATH: &str = "/images";

/// Client-facing message for every fetch miss, whatever the cause.
pub const NOT_FOUND_OR_EXPIRED: &str = "Image not found or expired";
