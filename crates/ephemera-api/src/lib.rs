//! Ephemera HTTP service.
//!
//! Accepts image uploads with a caller-chosen lifetime, serves them back by name, and
//! forgets them once the lifetime has passed.

pub mod api_doc;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod services;
pub mod setup;
pub mod state;

pub use error::{ErrorResponse, HttpAppError};
pub use setup::{initialize_app, App};
pub use state::AppState;
