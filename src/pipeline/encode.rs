//! Base64 data-URI encoding for images crossing the wire.
//!
//! Reference images go out as `data:image/png;base64,<payload>` inside the
//! user message; generated images come back in the same form. The backend
//! labels every outgoing image `image/png` whatever the file's real format,
//! matching what the image models accept.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static RE_DATA_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:image/[^;]+;base64,(.+)$").unwrap());

/// Encode raw image bytes as a PNG data URI.
pub fn to_png_data_url(bytes: &[u8]) -> String {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded reference image → {} bytes base64", b64.len());
    format!("data:image/png;base64,{b64}")
}

/// Decode an `data:image/<subtype>;base64,<payload>` URI.
///
/// Errors are shape-error messages suitable for
/// [`crate::error::RequestError::Shape`].
pub fn decode_data_url(url: &str) -> Result<Vec<u8>, String> {
    let caps = RE_DATA_URL.captures(url).ok_or_else(|| {
        let head: String = url.chars().take(50).collect();
        format!("Image URL is not a valid base64 data URL: {head}...")
    })?;

    STANDARD
        .decode(caps[1].trim())
        .map_err(|e| format!("Invalid base64 image payload: {e}"))
}
