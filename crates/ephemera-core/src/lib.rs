//! Ephemera Core Library
//!
//! This crate provides the pieces shared by every Ephemera component: the object name
//! codec, the clock abstraction, configuration, and the error taxonomy.

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod object_name;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, LogFormat};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use object_name::{decode, encode, ExpiryState, ObjectName};
