//! ASCII armor for key material.
//!
//! ```text
//! -----BEGIN GEODROP PUBLIC KEY-----
//! <base64, 64 characters per line>
//! -----END GEODROP PUBLIC KEY-----
//! ```

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{GeoDropError, GeoDropResult};

const LINE_WIDTH: usize = 64;

/// Armor `bytes` under `label`.
pub fn encode(label: &str, bytes: &[u8]) -> String {
    let body = STANDARD.encode(bytes);
    let mut out = format!("-----BEGIN {}-----\n", label);
    for chunk in body.as_bytes().chunks(LINE_WIDTH) {
        // base64 output is ASCII
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
    out.push_str(&format!("-----END {}-----\n", label));
    out
}

/// Extract the bytes armored under `label`; text around the block is ignored.
pub fn decode(label: &str, text: &str) -> GeoDropResult<Vec<u8>> {
    let begin = format!("-----BEGIN {}-----", label);
    let end = format!("-----END {}-----", label);

    let mut lines = text.lines().map(str::trim);
    if !lines.any(|line| line == begin) {
        return Err(GeoDropError::InvalidKey(format!("missing '{}'", begin)));
    }

    let mut body = String::new();
    let mut closed = false;
    for line in lines {
        if line == end {
            closed = true;
            break;
        }
        body.push_str(line);
    }
    if !closed {
        return Err(GeoDropError::InvalidKey(format!("missing '{}'", end)));
    }

    STANDARD
        .decode(body.as_bytes())
        .map_err(|e| GeoDropError::InvalidKey(format!("bad base64: {}", e)))
}
