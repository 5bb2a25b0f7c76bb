//! Condition bitmaps: raw RGBA codec, on-disk storage and the LRU cache.
//!
//! - `codec`: decode raw 4-bytes-per-pixel buffers and serialize them back
//! - `storage`: `Condition_*` files holding raw pixel bytes
//! - `cache`: `BitmapCache`, bounded by a kilobyte budget with LRU eviction

pub mod cache;
pub mod codec;
pub mod error;
pub mod storage;

pub use cache::{BitmapCache, CacheStats, Image, default_budget_kb, to_raw_bytes};
pub use codec::BYTES_PER_PIXEL;
pub use error::CacheError;
pub use storage::{BitmapStorage, FILE_PREFIX};
