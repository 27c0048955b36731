//! Object name validation shared by storage backends.
//!
//! Names come straight from request paths, so a backend must never let one escape its
//! namespace or collide with the hidden entries it uses for in-progress writes.

use crate::traits::{StorageError, StorageResult};

/// Longest accepted name in bytes. Leaves room for the partial-upload prefix within a
/// 255-byte filesystem name limit.
pub const MAX_NAME_LEN: usize = 200;

/// Reject names that are empty, too long, hidden, or could address anything other than
/// a single entry directly under the store root.
pub fn validate_object_name(name: &str) -> StorageResult<()> {
    if name.is_empty() {
        return Err(StorageError::InvalidKey("name is empty".to_string()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(StorageError::InvalidKey(format!(
            "name exceeds {} bytes",
            MAX_NAME_LEN
        )));
    }
    if name.starts_with('.') {
        return Err(StorageError::InvalidKey(name.to_string()));
    }
    if name.contains(['/', '\\', '\0']) || name.contains("..") {
        return Err(StorageError::InvalidKey(name.to_string()));
    }
    Ok(())
}
