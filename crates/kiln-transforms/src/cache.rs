//! Image optimization cache.
//!
//! Entries are keyed by a SHA-256 digest of the encoder kind, its parameters
//! and the input bytes, so a changed source or a changed quality setting
//! misses. Values are deterministic, which makes concurrent writers to one
//! key harmless.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::RwLock;

use sha2::{Digest, Sha256};

use crate::output::write_atomic;

/// Cache key for one encoded output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(kind: &str, params: &str, input: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(kind.as_bytes());
        hasher.update([0]);
        hasher.update(params.as_bytes());
        hasher.update([0]);
        hasher.update(input);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage for optimized image bytes.
pub trait ImageCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<Vec<u8>>;

    fn put(&self, key: &CacheKey, value: &[u8]) -> std::io::Result<()>;

    /// Drop every entry.
    fn clear(&self) -> std::io::Result<()>;
}

/// Cache persisted as one file per key.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<user cache dir>/kiln/images`, or the temp dir when there is none.
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("kiln")
            .join("images")
    }
}

impl ImageCache for DiskCache {
    fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        std::fs::read(self.dir.join(key.as_str())).ok()
    }

    fn put(&self, key: &CacheKey, value: &[u8]) -> std::io::Result<()> {
        write_atomic(&self.dir.join(key.as_str()), value).map_err(std::io::Error::other)
    }

    fn clear(&self) -> std::io::Result<()> {
        match std::fs::remove_dir_all(&self.dir) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// In-process cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<CacheKey, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ImageCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn put(&self, key: &CacheKey, value: &[u8]) -> std::io::Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        entries.insert(key.clone(), value.to_vec());
        Ok(())
    }

    fn clear(&self) -> std::io::Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn keys_depend_on_params_and_input() {
        let a = CacheKey::new("jpeg", "q=80", b"pixels");
        assert_eq!(a, CacheKey::new("jpeg", "q=80", b"pixels"));
        assert_ne!(a, CacheKey::new("jpeg", "q=50", b"pixels"));
        assert_ne!(a, CacheKey::new("jpeg", "q=80", b"other"));
        assert_ne!(a, CacheKey::new("avif", "q=80", b"pixels"));
    }

    #[test]
    fn disk_cache_round_trips_and_clears() {
        let temp = tempdir().unwrap();
        let cache = DiskCache::new(temp.path().join("cache"));
        let key = CacheKey::new("png", "o=5", b"data");

        assert!(cache.get(&key).is_none());
        cache.put(&key, b"optimized").unwrap();
        assert_eq!(cache.get(&key).unwrap(), b"optimized");

        cache.clear().unwrap();
        assert!(cache.get(&key).is_none());
        cache.clear().unwrap();
    }

    #[test]
    fn memory_cache_clears() {
        let cache = MemoryCache::new();
        cache.put(&CacheKey::new("a", "", b""), b"1").unwrap();
        assert_eq!(cache.len(), 1);

        cache.clear().unwrap();
        assert!(cache.is_empty());
    }
}
