//! Object name codec.
//!
//! A stored object's name is its only metadata: `{token}__{expiry}{extension}` where
//! `token` is 32 lowercase hex characters of randomness, `expiry` is the absolute Unix
//! timestamp (seconds) after which the object is gone, and `extension` is the lowercased
//! extension of the client's original filename (`.png`) or empty.
//!
//! This layout is the on-disk format. The sweeper of any process version decodes the
//! names written by any other, so it must not change.

use std::fmt;

use uuid::Uuid;

/// Separates the token from the expiry.
pub const NAME_DELIMITER: &str = "__";

/// Longest extension carried into a stored name (without the dot).
pub const MAX_EXTENSION_LEN: usize = 16;

/// Build a fresh object name expiring at `expiry`.
///
/// Negative expiries are clamped to zero; they cannot be represented in the name.
pub fn encode(expiry: i64, original_name: &str) -> String {
    ObjectName::generate(expiry, original_name).to_string()
}

/// Extract the expiry embedded in `name`, or `None` when the name does not follow the
/// codec's layout.
pub fn decode(name: &str) -> Option<i64> {
    let (_, rest) = name.split_once(NAME_DELIMITER)?;
    let digits = rest.split('.').next().unwrap_or_default();
    parse_timestamp(digits)
}

/// Lowercased extension (with leading dot) of the last path component of
/// `original_name`, or an empty string.
///
/// Follows the usual suffix rules: `photo.PNG` gives `.png`, `.bashrc` and `photo.` give
/// nothing. Extensions that are not short ASCII alphanumerics are dropped, since they end
/// up in a file name.
pub fn extension_hint(original_name: &str) -> String {
    let file_name = original_name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let dot = match file_name.rfind('.') {
        Some(i) if i > 0 && i + 1 < file_name.len() => i,
        _ => return String::new(),
    };

    let ext = &file_name[dot + 1..];
    if ext.len() > MAX_EXTENSION_LEN || !ext.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return String::new();
    }

    format!(".{}", ext.to_ascii_lowercase())
}

fn parse_timestamp(digits: &str) -> Option<i64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Whether an object may still be served, judged from its name alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryState {
    Live { expiry: i64 },
    Expired { expiry: i64 },
    /// The name carries no decodable expiry.
    Unknown,
}

impl ExpiryState {
    pub fn of(name: &str, now: i64) -> Self {
        match ObjectName::parse(name) {
            Some(parsed) if parsed.is_expired(now) => ExpiryState::Expired {
                expiry: parsed.expiry,
            },
            Some(parsed) => ExpiryState::Live {
                expiry: parsed.expiry,
            },
            None => ExpiryState::Unknown,
        }
    }
}

/// Decoded form of a well-formed object name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectName {
    token: String,
    expiry: i64,
    extension: String,
}

impl ObjectName {
    pub fn generate(expiry: i64, original_name: &str) -> Self {
        Self {
            token: Uuid::new_v4().simple().to_string(),
            expiry: expiry.max(0),
            extension: extension_hint(original_name),
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let (token, rest) = name.split_once(NAME_DELIMITER)?;
        let (digits, extension) = match rest.find('.') {
            Some(i) => rest.split_at(i),
            None => (rest, ""),
        };
        let expiry = parse_timestamp(digits)?;

        Some(Self {
            token: token.to_string(),
            expiry,
            extension: extension.to_string(),
        })
    }

    pub fn expiry(&self) -> i64 {
        self.expiry
    }

    /// Includes the leading dot; empty when the upload had no usable extension.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expiry <= now
    }

    /// Seconds left before expiry, zero once expired.
    pub fn remaining_secs(&self, now: i64) -> i64 {
        (self.expiry - now).max(0)
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}",
            self.token, NAME_DELIMITER, self.expiry, self.extension
        )
    }
}
