//! Upload admission checks.
//!
//! Content type is decided from the leading bytes of the upload alone. The client's
//! declared content type and filename are never consulted.

use ephemera_core::constants::SNIFF_LEN;

/// Validation errors for upload requests
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Uploaded file is not an image (detected {detected})")]
    NotAnImage { detected: &'static str },

    #[error("expires_in must be between 1 and {limit} seconds (got {requested})")]
    TtlOutOfRange { requested: i64, limit: i64 },

    #[error("expires_in must be an integer number of seconds")]
    InvalidTtl,

    #[error("expires_in must be at most {max} bytes (got {len})")]
    TtlFieldTooLong { len: usize, max: usize },

    #[error("Missing multipart field: {0}")]
    MissingField(&'static str),
}

/// Longest `expires_in` value accepted, in bytes. Any valid lifetime fits in far less.
pub const MAX_TTL_FIELD_LEN: usize = 32;

pub const EMPTY: &str = "application/x-empty";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Detect the content type of data from its first bytes.
///
/// Only the first [`SNIFF_LEN`] bytes are inspected.
pub fn classify(prefix: &[u8]) -> &'static str {
    let data = &prefix[..prefix.len().min(SNIFF_LEN)];
    if data.is_empty() {
        return EMPTY;
    }

    if let Some(mime) = classify_binary(data) {
        return mime;
    }

    classify_text(data).unwrap_or(OCTET_STREAM)
}

/// Classify `prefix` and reject anything that is not an image.
pub fn ensure_image(prefix: &[u8]) -> Result<&'static str, ValidationError> {
    let detected = classify(prefix);
    if detected.starts_with("image/") {
        Ok(detected)
    } else {
        Err(ValidationError::NotAnImage { detected })
    }
}

/// Check a lifetime in seconds against `1..=limit`.
pub fn validate_ttl(expires_in: i64, limit: i64) -> Result<i64, ValidationError> {
    if (1..=limit).contains(&expires_in) {
        Ok(expires_in)
    } else {
        Err(ValidationError::TtlOutOfRange {
            requested: expires_in,
            limit,
        })
    }
}

/// Parse a textual `expires_in` form value and validate it.
pub fn parse_ttl(raw: &str, limit: i64) -> Result<i64, ValidationError> {
    if raw.len() > MAX_TTL_FIELD_LEN {
        return Err(ValidationError::TtlFieldTooLong {
            len: raw.len(),
            max: MAX_TTL_FIELD_LEN,
        });
    }
    let expires_in = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| ValidationError::InvalidTtl)?;
    validate_ttl(expires_in, limit)
}

/// Content type implied by a stored name's extension (with or without the leading dot).
pub fn content_type_for_extension(extension: &str) -> Option<&'static str> {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" | "jpe" | "jfif" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "ico" => "image/x-icon",
        "cur" => "image/x-win-bitmap",
        "avif" => "image/avif",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "jxl" => "image/jxl",
        "psd" => "image/vnd.adobe.photoshop",
        "qoi" => "image/qoi",
        "svg" => "image/svg+xml",
        _ => return None,
    };
    Some(mime)
}

fn classify_binary(data: &[u8]) -> Option<&'static str> {
    // Images
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some("image/png");
    }
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if data.len() >= 12 && data.starts_with(b"RIFF") {
        match &data[8..12] {
            b"WEBP" => return Some("image/webp"),
            b"WAVE" => return Some("audio/wav"),
            b"AVI " => return Some("video/x-msvideo"),
            _ => {}
        }
    }
    if data.starts_with(b"II*\0") || data.starts_with(b"MM\0*") {
        return Some("image/tiff");
    }
    if data.starts_with(&[0xFF, 0x0A])
        || data.starts_with(b"\0\0\0\x0cJXL \r\n\x87\n")
    {
        return Some("image/jxl");
    }
    if data.starts_with(b"8BPS") {
        return Some("image/vnd.adobe.photoshop");
    }
    if data.starts_with(b"qoif") {
        return Some("image/qoi");
    }
    if data.len() >= 14 && data.starts_with(b"BM") && data[6..10] == [0, 0, 0, 0] {
        return Some("image/bmp");
    }
    if data.len() >= 12 && &data[4..8] == b"ftyp" {
        return Some(classify_iso_bmff(&data[8..12]));
    }
    if data.len() >= 6 && data[0..2] == [0, 0] && data[4..6] != [0, 0] {
        match &data[2..4] {
            [1, 0] => return Some("image/x-icon"),
            [2, 0] => return Some("image/x-win-bitmap"),
            _ => {}
        }
    }

    // Documents and archives
    if data.starts_with(b"%PDF-") {
        return Some("application/pdf");
    }
    if data.starts_with(b"PK\x03\x04") || data.starts_with(b"PK\x05\x06") {
        return Some("application/zip");
    }
    if data.starts_with(&[0x1F, 0x8B]) {
        return Some("application/gzip");
    }
    if data.starts_with(&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C]) {
        return Some("application/x-7z-compressed");
    }
    if data.starts_with(b"Rar!\x1a\x07") {
        return Some("application/vnd.rar");
    }

    // Audio and video
    if data.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return Some(if contains(data, b"webm") {
            "video/webm"
        } else {
            "video/x-matroska"
        });
    }
    if data.starts_with(b"OggS") {
        return Some("audio/ogg");
    }
    if data.starts_with(b"fLaC") {
        return Some("audio/flac");
    }
    if data.starts_with(b"ID3") || (data.len() >= 2 && data[0] == 0xFF && data[1] & 0xE0 == 0xE0)
    {
        return Some("audio/mpeg");
    }

    // Executables
    if data.starts_with(b"\x7fELF") {
        return Some("application/x-elf");
    }
    if data.starts_with(b"MZ") {
        return Some("application/x-msdownload");
    }

    None
}

/// ISO base media file: the major brand decides between still images and movies.
fn classify_iso_bmff(brand: &[u8]) -> &'static str {
    match brand {
        b"avif" | b"avis" => "image/avif",
        b"heic" | b"heix" | b"hevc" | b"hevx" | b"heim" | b"heis" => "image/heic",
        b"mif1" | b"msf1" => "image/heif",
        b"qt  " => "video/quicktime",
        _ => "video/mp4",
    }
}

fn classify_text(data: &[u8]) -> Option<&'static str> {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    if !is_text(data) {
        return None;
    }

    let trimmed = trim_ascii_start(data);
    if trimmed.first() == Some(&b'<') {
        return Some(classify_markup(trimmed));
    }
    if matches!(trimmed.first(), Some(b'{') | Some(b'[')) {
        return Some("application/json");
    }
    Some("text/plain")
}

/// Walk past the XML prolog, comments and doctype to find the root element.
fn classify_markup(mut rest: &[u8]) -> &'static str {
    let mut saw_prolog = false;
    loop {
        rest = trim_ascii_start(rest);
        if rest.starts_with(b"<?") {
            saw_prolog = true;
            match skip_past(rest, b"?>") {
                Some(after) => rest = after,
                None => break,
            }
        } else if rest.starts_with(b"<!--") {
            match skip_past(rest, b"-->") {
                Some(after) => rest = after,
                None => break,
            }
        } else if starts_with_ignore_case(rest, b"<!doctype") {
            let doctype = trim_ascii_start(&rest[b"<!doctype".len()..]);
            if starts_with_ignore_case(doctype, b"html") {
                return "text/html";
            }
            match skip_past(rest, b">") {
                Some(after) => rest = after,
                None => break,
            }
        } else {
            if is_element(rest, b"svg") {
                return "image/svg+xml";
            }
            if is_element(rest, b"html") || is_element(rest, b"head") || is_element(rest, b"body")
            {
                return "text/html";
            }
            break;
        }
    }

    if saw_prolog {
        "application/xml"
    } else {
        "text/plain"
    }
}

fn is_element(data: &[u8], tag: &[u8]) -> bool {
    let Some(after_lt) = data.strip_prefix(b"<") else {
        return false;
    };
    if !starts_with_ignore_case(after_lt, tag) {
        return false;
    }
    matches!(
        after_lt.get(tag.len()),
        None | Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') | Some(b'>') | Some(b'/')
    )
}

/// UTF-8 without control characters other than common whitespace. A multi-byte
/// sequence cut off by the end of the prefix still counts as text.
fn is_text(data: &[u8]) -> bool {
    let valid = match std::str::from_utf8(data) {
        Ok(s) => s,
        Err(e) if e.error_len().is_none() => {
            // Only the trailing sequence is incomplete.
            match std::str::from_utf8(&data[..e.valid_up_to()]) {
                Ok(s) => s,
                Err(_) => return false,
            }
        }
        Err(_) => return false,
    };

    valid
        .chars()
        .all(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r' | '\x0c' | '\x1b'))
}

fn trim_ascii_start(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    &data[start..]
}

fn skip_past<'a>(data: &'a [u8], needle: &[u8]) -> Option<&'a [u8]> {
    data.windows(needle.len())
        .position(|w| w == needle)
        .map(|i| &data[i + needle.len()..])
}

fn contains(data: &[u8], needle: &[u8]) -> bool {
    data.windows(needle.len()).any(|w| w == needle)
}

fn starts_with_ignore_case(data: &[u8], prefix: &[u8]) -> bool {
    data.len() >= prefix.len() && data[..prefix.len()].eq_ignore_ascii_case(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

    #[test]
    fn test_classify_images() {
        assert_eq!(classify(PNG), "image/png");
        assert_eq!(classify(JPEG), "image/jpeg");
        assert_eq!(classify(b"GIF89a\x01\0\x01\0"), "image/gif");
        assert_eq!(classify(b"RIFF\x24\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(classify(b"II*\0\x08\0\0\0"), "image/tiff");
        assert_eq!(classify(b"MM\0*\0\0\0\x08"), "image/tiff");
        assert_eq!(classify(b"\0\0\0\x1cftypavif\0\0\0\0"), "image/avif");
        assert_eq!(classify(b"\0\0\0\x18ftypheic\0\0\0\0"), "image/heic");
        assert_eq!(classify(b"8BPS\0\x01"), "image/vnd.adobe.photoshop");
        assert_eq!(classify(b"qoif\0\0\0\x01"), "image/qoi");
        assert_eq!(classify(&[0, 0, 1, 0, 1, 0, 16, 16]), "image/x-icon");
        assert_eq!(
            classify(b"BM\x36\0\0\0\0\0\0\0\x36\0\0\0\x28\0"),
            "image/bmp"
        );
    }

    #[test]
    fn test_classify_svg() {
        assert_eq!(
            classify(b"<svg xmlns=\"http://www.w3.org/2000/svg\"></svg>"),
            "image/svg+xml"
        );
        assert_eq!(
            classify(
                b"\xEF\xBB\xBF<?xml version=\"1.0\"?>\n<!-- drawn by hand -->\n\
                  <!DOCTYPE svg PUBLIC \"-//W3C//DTD SVG 1.1//EN\" \"x.dtd\">\n<svg>"
            ),
            "image/svg+xml"
        );
        assert_eq!(classify(b"<svgfoo/>"), "text/plain");
    }

    #[test]
    fn test_classify_non_images() {
        assert_eq!(classify(b"%PDF-1.4\n"), "application/pdf");
        assert_eq!(classify(b"PK\x03\x04\x14\0"), "application/zip");
        assert_eq!(classify(&[0x1F, 0x8B, 0x08, 0x00]), "application/gzip");
        assert_eq!(classify(b"\x7fELF\x02\x01\x01"), "application/x-elf");
        assert_eq!(classify(b"MZ\x90\0\x03\0"), "application/x-msdownload");
        assert_eq!(classify(b"RIFF\x24\0\0\0WAVEfmt "), "audio/wav");
        assert_eq!(classify(b"ID3\x03\0\0\0"), "audio/mpeg");
        assert_eq!(classify(b"\0\0\0\x18ftypisom\0\0\x02\0"), "video/mp4");
        assert_eq!(classify(b"<!DOCTYPE html><html></html>"), "text/html");
        assert_eq!(classify(b"<?xml version=\"1.0\"?><feed/>"), "application/xml");
        assert_eq!(classify(b"  {\"a\": 1}"), "application/json");
        assert_eq!(classify(b"hello world\n"), "text/plain");
    }

    #[test]
    fn test_classify_empty_and_unknown() {
        assert_eq!(classify(b""), EMPTY);
        assert_eq!(classify(&[0x00, 0x01, 0x02, 0x03, 0xFE]), OCTET_STREAM);
    }

    #[test]
    fn test_classify_ignores_bytes_past_sniff_len() {
        let mut data = vec![b'a'; SNIFF_LEN];
        data.push(0x00);
        assert_eq!(classify(&data), "text/plain");
    }

    #[test]
    fn test_text_cut_inside_multibyte_char() {
        let data = "caf\u{e9}".as_bytes();
        assert_eq!(classify(&data[..data.len() - 1]), "text/plain");
    }

    #[test]
    fn test_ensure_image() {
        assert_eq!(ensure_image(PNG), Ok("image/png"));
        assert_eq!(
            ensure_image(b"just some text"),
            Err(ValidationError::NotAnImage {
                detected: "text/plain"
            })
        );
        assert_eq!(
            ensure_image(b""),
            Err(ValidationError::NotAnImage { detected: EMPTY })
        );
    }

    #[test]
    fn test_validate_ttl_bounds() {
        assert_eq!(validate_ttl(1, 60), Ok(1));
        assert_eq!(validate_ttl(60, 60), Ok(60));
        assert!(matches!(
            validate_ttl(0, 60),
            Err(ValidationError::TtlOutOfRange { requested: 0, limit: 60 })
        ));
        assert!(validate_ttl(61, 60).is_err());
        assert!(validate_ttl(-5, 60).is_err());
    }

    #[test]
    fn test_parse_ttl() {
        assert_eq!(parse_ttl(" 30 ", 60), Ok(30));
        assert_eq!(parse_ttl("soon", 60), Err(ValidationError::InvalidTtl));
        assert_eq!(parse_ttl("1.5", 60), Err(ValidationError::InvalidTtl));
        assert_eq!(
            parse_ttl(&"9".repeat(40), 60),
            Err(ValidationError::TtlFieldTooLong { len: 40, max: 32 })
        );
        assert!(matches!(
            parse_ttl("3600", 60),
            Err(ValidationError::TtlOutOfRange { .. })
        ));
    }

    #[test]
    fn test_content_type_for_extension() {
        assert_eq!(content_type_for_extension(".PNG"), Some("image/png"));
        assert_eq!(content_type_for_extension("jpeg"), Some("image/jpeg"));
        assert_eq!(content_type_for_extension(".exe"), None);
        assert_eq!(content_type_for_extension(""), None);
    }
}
