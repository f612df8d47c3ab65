//! Helpers for coercing free-form model replies into the
//! `{"path": ..., "content_b64": ...}` payload.

use std::path::Path;

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde_json::{Map, Value};

/// Payload key holding the relative output path.
pub const PATH_KEY: &str = "path";

/// Payload key holding the Base64 file content.
pub const CONTENT_KEY: &str = "content_b64";

/// Extensions the model is never asked to produce; an empty placeholder is
/// written instead.
pub const BINARY_EXTENSIONS: [&str; 6] = ["ico", "png", "jpg", "jpeg", "gif", "pdf"];

/// Standard alphabet, tolerant of sloppy trailing bits.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Take the span from the first `{` to the last `}` after dropping code
/// fence markers. Empty when no such span exists.
pub fn extract_json_candidate(text: &str) -> String {
    let unfenced = text.trim().replace("```json", "").replace("```", "");

    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if end > start => unfenced[start..=end].to_owned(),
        _ => String::new(),
    }
}

/// Parse `candidate` as a JSON object. Anything else (including valid JSON
/// of another type) is rejected.
pub fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    if !candidate.trim_start().starts_with('{') {
        return None;
    }
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Drop embedded whitespace (models wrap long lines) and restore `=`
/// padding to a multiple of four.
pub fn repair_base64(encoded: &str) -> String {
    let mut cleaned: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let remainder = cleaned.len() % 4;
    if remainder != 0 {
        cleaned.extend(std::iter::repeat_n('=', 4 - remainder));
    }
    cleaned
}

/// Repair and decode Base64 content into raw bytes.
pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    LENIENT.decode(repair_base64(encoded))
}

/// Decode Base64 content as text, replacing invalid UTF-8 sequences with
/// U+FFFD instead of failing.
pub fn decode_text(encoded: &str) -> Result<String, base64::DecodeError> {
    let bytes = decode_base64(encoded)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Whether `path` has one of [`BINARY_EXTENSIONS`] (case-insensitive).
pub fn is_binary_path(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            BINARY_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}
