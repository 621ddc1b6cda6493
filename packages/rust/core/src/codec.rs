//! Transport decoding for command output and ability bodies.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use factlearn_shared::{LearnError, Result};

/// Decode standard base64 into UTF-8 text. Line breaks and other ASCII
/// whitespace are ignored, so wrapped output (`base64`, `certutil`) decodes.
pub fn decode_text(encoded: &str) -> Result<String> {
    let compact: String = encoded.split_ascii_whitespace().collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| LearnError::decode(format!("invalid base64: {e}")))?;
    String::from_utf8(bytes).map_err(|e| LearnError::decode(format!("not UTF-8 text: {e}")))
}

/// Encode text the way agents ship command output.
pub fn encode_text(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}
