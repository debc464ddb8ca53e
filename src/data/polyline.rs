//! Encoded polyline decoding
//!
//! Strava route maps use Google's encoded polyline format at five decimals of
//! precision. Decoding is done by the `polyline` crate; this module checks the
//! input's framing first so malformed maps are reported with a byte position
//! instead of being partially decoded.

use geo::LineString;
use thiserror::Error;

/// Decimal places carried by Strava polylines
pub const PRECISION: u32 = 5;

/// Offset added to every 5-bit chunk so it lands on a printable character
const CHAR_OFFSET: u8 = b'?';

/// Highest character a chunk can produce (`?` + 63)
const MAX_CHAR: u8 = b'~';

/// Chunk bit signalling that the value continues in the next character
const CONTINUATION_BIT: u8 = 0x20;

/// Chunks needed for the largest delta between two valid coordinates
const MAX_CHUNKS: usize = 6;

/// Errors that can occur when decoding an encoded polyline
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolylineError {
    /// A character outside the encoding alphabet was found
    #[error("Invalid character {ch:?} at byte {index}")]
    InvalidCharacter { ch: char, index: usize },

    /// The input ended in the middle of a value
    #[error("Truncated value at byte {index}")]
    Truncated { index: usize },

    /// A latitude was decoded without a matching longitude
    #[error("Dangling latitude without longitude at byte {index}")]
    OddResidue { index: usize },

    /// A single value is longer than any valid coordinate delta
    #[error("Value starting at byte {index} is too long")]
    Overflow { index: usize },

    /// The decoder rejected the input
    #[error("Invalid polyline: {0}")]
    Malformed(String),
}

/// Decodes a Strava polyline into a line of `(longitude, latitude)` coordinates.
///
/// The line follows the `geo` axis order (`x` is longitude), which is also the
/// GeoJSON order.
pub fn decode(encoded: &str) -> Result<LineString<f64>, PolylineError> {
    check_framing(encoded.as_bytes())?;

    polyline::decode_polyline(encoded, PRECISION)
        .map_err(|e| PolylineError::Malformed(e.to_string()))
}

/// Walks the chunk boundaries without decoding any values
///
/// Values must come in latitude/longitude pairs, every value must be
/// terminated, and no value may be longer than [`MAX_CHUNKS`].
fn check_framing(bytes: &[u8]) -> Result<(), PolylineError> {
    let mut values = 0usize;
    let mut value_start = 0usize;
    let mut last_pair_start = 0usize;
    let mut chunks = 0usize;

    for (index, &byte) in bytes.iter().enumerate() {
        if !(CHAR_OFFSET..=MAX_CHAR).contains(&byte) {
            return Err(PolylineError::InvalidCharacter {
                ch: byte as char,
                index,
            });
        }

        if chunks == 0 {
            value_start = index;
            if values % 2 == 0 {
                last_pair_start = index;
            }
        }
        chunks += 1;
        if chunks > MAX_CHUNKS {
            return Err(PolylineError::Overflow { index: value_start });
        }

        if (byte - CHAR_OFFSET) & CONTINUATION_BIT == 0 {
            values += 1;
            chunks = 0;
        }
    }

    if chunks > 0 {
        return Err(PolylineError::Truncated { index: value_start });
    }
    if values % 2 == 1 {
        return Err(PolylineError::OddResidue {
            index: last_pair_start,
        });
    }

    Ok(())
}
