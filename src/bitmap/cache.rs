//! Memory-budgeted cache of decoded condition bitmaps.
//!
//! Entries are kept in an `lru::LruCache` and charged by their pixel size in
//! kilobytes. Both `get` and inserts count as an access. After each insert the
//! least recently used entries are evicted until the total fits the budget.
//! An entry larger than the whole budget is still accepted: it evicts every
//! other entry and stays alone in the cache until something newer pushes it out.
//!
//! The map and its size accounting sit behind one `Mutex`; decoding and file
//! I/O happen outside of it.

use image::RgbaImage;
use lru::LruCache;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use sysinfo::System;
use tracing::{debug, info, warn};

use super::codec;
use super::error::CacheError;
use super::storage::BitmapStorage;
use crate::config::CacheConfig;

/// Shared handle to a decoded bitmap.
pub type Image = Arc<RgbaImage>;

/// Budget used when the available memory cannot be determined.
const FALLBACK_BUDGET_KB: u64 = 64 * 1024;

/// Half of the currently available system memory, in kilobytes.
pub fn default_budget_kb() -> u64 {
    let mut sys = System::new();
    sys.refresh_memory();
    let available_kb = sys.available_memory() / 1024;
    if available_kb == 0 {
        FALLBACK_BUDGET_KB
    } else {
        available_kb / 2
    }
}

/// Counters and sizes reported by [`BitmapCache::stats`].
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub size_kb: u64,
    pub budget_kb: u64,
    pub hits: u64,
    pub misses: u64,
    pub decodes: u64,
    pub evictions: u64,
}

struct Entry {
    image: Image,
    size_kb: u64,
}

struct State {
    lru: LruCache<String, Entry>,
    size_kb: u64,
    budget_kb: u64,
    hits: u64,
    misses: u64,
    decodes: u64,
    evictions: u64,
}

impl State {
    /// Insert `image` under `key` unless the key is already present, in which
    /// case the cached image wins.
    fn insert(&mut self, key: &str, image: RgbaImage) -> Image {
        if let Some(existing) = self.lru.get(key) {
            return Arc::clone(&existing.image);
        }

        let size_kb = codec::size_kb(&image);
        let image = Arc::new(image);
        self.lru.put(
            key.to_string(),
            Entry {
                image: Arc::clone(&image),
                size_kb,
            },
        );
        self.size_kb += size_kb;

        if size_kb > self.budget_kb {
            warn!(
                target: "autoclick::bitmap",
                %key, size_kb, budget_kb = self.budget_kb,
                "Bitmap exceeds the whole cache budget; keeping it alone"
            );
        }
        self.trim();
        image
    }

    /// Evict least recently used entries until the total fits the budget,
    /// always keeping the most recent entry.
    fn trim(&mut self) {
        while self.size_kb > self.budget_kb && self.lru.len() > 1 {
            let Some((key, entry)) = self.lru.pop_lru() else {
                break;
            };
            self.size_kb -= entry.size_kb;
            self.evictions += 1;
            debug!(
                target: "autoclick::bitmap",
                %key,
                freed_kb = entry.size_kb,
                size_kb = self.size_kb,
                budget_kb = self.budget_kb,
                "Evicted bitmap"
            );
        }
    }
}

/// Cache of decoded bitmaps keyed by identifier, optionally backed by a
/// [`BitmapStorage`] directory.
pub struct BitmapCache {
    state: Mutex<State>,
    storage: Option<BitmapStorage>,
}

impl BitmapCache {
    /// In-memory cache holding at most `budget_kb` kilobytes.
    pub fn new(budget_kb: u64) -> Self {
        Self {
            state: Mutex::new(State {
                lru: LruCache::unbounded(),
                size_kb: 0,
                budget_kb,
                hits: 0,
                misses: 0,
                decodes: 0,
                evictions: 0,
            }),
            storage: None,
        }
    }

    /// Cache that can also load and save bitmaps in `storage`.
    pub fn with_storage(budget_kb: u64, storage: BitmapStorage) -> Self {
        Self {
            storage: Some(storage),
            ..Self::new(budget_kb)
        }
    }

    /// Build a cache from configuration, defaulting the budget to
    /// [`default_budget_kb`].
    pub fn from_config(cfg: &CacheConfig) -> Self {
        let budget_kb = cfg.budget_kb.unwrap_or_else(default_budget_kb);
        info!(
            target: "autoclick::bitmap",
            budget_kb,
            storage = ?cfg.storage_dir,
            "Bitmap cache configured"
        );
        match &cfg.storage_dir {
            Some(dir) => Self::with_storage(budget_kb, BitmapStorage::new(dir)),
            None => Self::new(budget_kb),
        }
    }

    pub fn storage(&self) -> Option<&BitmapStorage> {
        self.storage.as_ref()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Change the budget, evicting immediately if the cache no longer fits.
    pub fn configure(&self, budget_kb: u64) {
        let mut state = self.lock();
        state.budget_kb = budget_kb;
        state.trim();
    }

    pub fn budget_kb(&self) -> u64 {
        self.lock().budget_kb
    }

    /// Aggregate size of all entries in kilobytes.
    pub fn size_kb(&self) -> u64 {
        self.lock().size_kb
    }

    pub fn len(&self) -> usize {
        self.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().lru.is_empty()
    }

    /// Whether `key` is cached. Does not count as an access.
    pub fn contains(&self, key: &str) -> bool {
        self.lock().lru.contains(key)
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            entries: state.lru.len(),
            size_kb: state.size_kb,
            budget_kb: state.budget_kb,
            hits: state.hits,
            misses: state.misses,
            decodes: state.decodes,
            evictions: state.evictions,
        }
    }

    /// Cached image for `key`, marking it as most recently used.
    pub fn get(&self, key: &str) -> Option<Image> {
        let mut state = self.lock();
        let hit = state.lru.get(key).map(|e| Arc::clone(&e.image));
        match hit {
            Some(image) => {
                state.hits += 1;
                Some(image)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Cached image for `key`, or decode `raw` as a `width x height` RGBA
    /// buffer and cache it.
    pub fn load_or_decode(
        &self,
        key: &str,
        raw: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Image, CacheError> {
        if let Some(image) = self.get(key) {
            return Ok(image);
        }
        let decoded = codec::decode(raw.to_vec(), width, height)?;
        let mut state = self.lock();
        state.decodes += 1;
        Ok(state.insert(key, decoded))
    }

    /// Cached image for `key`, or read `name` from storage and cache it.
    ///
    /// Returns `Ok(None)` when the file does not exist; callers treat the
    /// condition as unmatched.
    pub async fn load_from_storage(
        &self,
        key: &str,
        name: &str,
        width: u32,
        height: u32,
    ) -> Result<Option<Image>, CacheError> {
        if let Some(image) = self.get(key) {
            return Ok(Some(image));
        }
        let storage = self.storage.as_ref().ok_or(CacheError::NoStorage)?;
        let Some(raw) = storage.read(name).await? else {
            return Ok(None);
        };
        let decoded = codec::decode(raw, width, height)?;
        let mut state = self.lock();
        state.decodes += 1;
        Ok(Some(state.insert(key, decoded)))
    }

    /// Persist `image` to storage and cache it under the returned file name.
    pub async fn save(&self, image: RgbaImage) -> Result<String, CacheError> {
        let storage = self.storage.as_ref().ok_or(CacheError::NoStorage)?;
        let name = storage.write(image.as_raw()).await?;
        self.lock().insert(&name, image);
        Ok(name)
    }

    /// Delete persisted bitmaps and drop them from the cache.
    pub async fn delete<S: AsRef<str>>(&self, names: &[S]) -> Result<usize, CacheError> {
        let storage = self.storage.as_ref().ok_or(CacheError::NoStorage)?;
        {
            let mut state = self.lock();
            for name in names {
                if let Some(entry) = state.lru.pop(name.as_ref()) {
                    state.size_kb -= entry.size_kb;
                }
            }
        }
        storage.delete(names).await
    }

    /// Evict every entry.
    pub fn release_all(&self) {
        let mut state = self.lock();
        let released = state.lru.len();
        state.lru.clear();
        state.size_kb = 0;
        info!(target: "autoclick::bitmap", released, "Released bitmap cache");
    }
}

/// Serialize a decoded image back to raw bytes for persistence.
pub fn to_raw_bytes(image: &RgbaImage) -> Vec<u8> {
    codec::to_raw_bytes(image)
}
