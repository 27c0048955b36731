//! Ephemera Storage Library
//!
//! This crate provides the [`ObjectStore`] abstraction and its local filesystem
//! implementation.
//!
//! # Object names
//!
//! The store is a flat namespace. Names are opaque to it; expiry lives in the name and is
//! interpreted by callers. Names must not contain path separators, `..`, or start with a
//! dot, and name validation is centralized in the `keys` module so every operation
//! enforces the same rules.

pub mod factory;
pub mod keys;
pub mod local;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use local::LocalStorage;
pub use traits::{ByteStream, ObjectReader, ObjectStore, StorageError, StorageResult, StoredObject};
