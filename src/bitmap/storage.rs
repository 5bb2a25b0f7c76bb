//! Directory of persisted condition bitmaps.
//!
//! Each file holds the raw pixel bytes of one bitmap, written in a single
//! contiguous write. File names are `Condition_` followed by a name-based UUID of
//! the pixel content, so saving the same pixels twice reuses the same file.
//! All I/O goes through `tokio::fs` and never blocks the async workers.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::CacheError;

/// Prefix of every bitmap file name.
pub const FILE_PREFIX: &str = "Condition_";

#[derive(Debug, Clone)]
pub struct BitmapStorage {
    root: PathBuf,
}

impl BitmapStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of the file called `name`.
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// File name under which `raw` is stored.
    pub fn name_for(raw: &[u8]) -> String {
        format!("{FILE_PREFIX}{}", Uuid::new_v5(&Uuid::NAMESPACE_OID, raw).simple())
    }

    /// Read the raw bytes of `name`. A missing file yields `Ok(None)`.
    pub async fn read(&self, name: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.path_of(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!(target: "autoclick::bitmap", path = %path.display(), len = bytes.len(), "Loaded bitmap file");
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(
                    target: "autoclick::bitmap",
                    path = %path.display(),
                    "Invalid path, bitmap file can't be found"
                );
                Ok(None)
            }
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    /// Persist `raw` and return its file name. Existing files are left untouched.
    pub async fn write(&self, raw: &[u8]) -> Result<String, CacheError> {
        let name = Self::name_for(raw);
        let path = self.path_of(&name);

        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|source| CacheError::Io {
                path: path.clone(),
                source,
            })?;
        if exists {
            debug!(target: "autoclick::bitmap", path = %path.display(), "Bitmap already saved");
            return Ok(name);
        }

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| CacheError::Io {
                path: self.root.clone(),
                source,
            })?;
        tokio::fs::write(&path, raw)
            .await
            .map_err(|source| CacheError::Io {
                path: path.clone(),
                source,
            })?;
        debug!(target: "autoclick::bitmap", path = %path.display(), len = raw.len(), "Saved bitmap");
        Ok(name)
    }

    /// Delete the given files, skipping the ones that do not exist.
    /// Returns how many files were removed.
    pub async fn delete<S: AsRef<str>>(&self, names: &[S]) -> Result<usize, CacheError> {
        let mut removed = 0;
        for name in names {
            let path = self.path_of(name.as_ref());
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(target: "autoclick::bitmap", path = %path.display(), "Deleted bitmap");
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(target: "autoclick::bitmap", path = %path.display(), "Bitmap already gone");
                }
                Err(source) => return Err(CacheError::Io { path, source }),
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_content_addressed() {
        let a = BitmapStorage::name_for(&[1, 2, 3, 4]);
        let b = BitmapStorage::name_for(&[1, 2, 3, 4]);
        let c = BitmapStorage::name_for(&[4, 3, 2, 1]);
        assert!(a.starts_with(FILE_PREFIX));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn write_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = BitmapStorage::new(dir.path().join("conditions"));
        let raw = vec![9u8; 64];

        let name = storage.write(&raw).await.unwrap();
        assert_eq!(std::fs::read(storage.path_of(&name)).unwrap(), raw);
        assert_eq!(storage.write(&raw).await.unwrap(), name);
        assert_eq!(storage.read(&name).await.unwrap(), Some(raw));

        assert_eq!(storage.delete(&[name.as_str(), "Condition_missing"]).await.unwrap(), 1);
        assert_eq!(storage.read(&name).await.unwrap(), None);
    }
}
