//! Error types for the bitmap cache.

use std::path::PathBuf;

/// Errors from decoding, caching and persisting condition bitmaps.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Pixel buffer holds {actual} bytes but {width}x{height} needs {expected}")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("No bitmap storage directory configured")]
    NoStorage,
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
