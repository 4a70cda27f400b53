//! Bounded in-memory cache of remote asset metadata.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use super::RemoteAsset;

/// LRU cache keyed by asset name.
///
/// Holds metadata only; the remote service is always authoritative.
pub struct AssetCache {
    entries: Mutex<LruCache<String, RemoteAsset>>,
}

impl AssetCache {
    /// Create a cache holding at most `capacity` assets (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, name: &str) -> Option<RemoteAsset> {
        self.lock().get(name).cloned()
    }

    pub fn insert(&self, asset: RemoteAsset) {
        self.lock().put(asset.name.clone(), asset);
    }

    pub fn remove(&self, name: &str) -> Option<RemoteAsset> {
        self.lock().pop(name)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, RemoteAsset>> {
        // A panic while holding the lock cannot leave the cache inconsistent.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
