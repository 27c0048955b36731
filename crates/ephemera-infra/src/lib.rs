//! Ephemera Infrastructure Library
//!
//! This crate provides shared infrastructure components used by the Ephemera service:
//! - Middleware (request ID, security headers)
//! - Telemetry initialization
//! - The background expiry sweeper

pub mod cleanup;
pub mod middleware;
pub mod telemetry;

// Re-export commonly used types
pub use cleanup::{ExpirySweeper, SweepReport};
pub use middleware::{
    request_id_middleware, security_headers_middleware, SecurityHeaders,
};
pub use telemetry::init_telemetry;
