//! Image upload pipeline: read form → validate → (spool) → store.

mod service;
mod types;

pub use service::ImageUploadService;
pub use types::{UploadResponse, UploadedImage};
