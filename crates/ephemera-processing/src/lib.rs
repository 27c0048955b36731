//! Ephemera Processing Library
//!
//! Upload admission: content sniffing and request parameter validation.

pub mod validator;

pub use validator::{
    classify, content_type_for_extension, ensure_image, parse_ttl, validate_ttl,
    ValidationError, MAX_TTL_FIELD_LEN,
};
