//! Raw pixel codec.
//!
//! Condition bitmaps are plain RGBA buffers: 4 bytes per pixel, row-major, no
//! header. Decoding only validates the length and wraps the bytes.

use image::RgbaImage;

use super::error::CacheError;

/// Fixed pixel layout of every decoded and persisted bitmap.
pub const BYTES_PER_PIXEL: usize = 4;

/// Number of bytes a `width x height` buffer must hold.
pub fn expected_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(BYTES_PER_PIXEL)
}

/// Decode `raw` into a `width x height` image.
pub fn decode(raw: Vec<u8>, width: u32, height: u32) -> Result<RgbaImage, CacheError> {
    let actual = raw.len();
    let mismatch = |expected| CacheError::SizeMismatch {
        width,
        height,
        expected,
        actual,
    };
    let expected = expected_len(width, height).ok_or_else(|| mismatch(usize::MAX))?;
    if actual != expected {
        return Err(mismatch(expected));
    }
    RgbaImage::from_raw(width, height, raw).ok_or_else(|| mismatch(expected))
}

/// Serialize `image` back into a flat buffer in the same layout `decode` reads.
pub fn to_raw_bytes(image: &RgbaImage) -> Vec<u8> {
    image.as_raw().clone()
}

/// Cache cost of `image` in kilobytes, rounded up.
pub fn size_kb(image: &RgbaImage) -> u64 {
    (image.as_raw().len() as u64).div_ceil(1024)
}
