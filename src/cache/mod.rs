mod fetch;
mod store;

pub use fetch::{DefaultFetcher, Fetcher};
pub use store::{BlobStore, STORE_NAME, STORE_VERSION};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::Result;

/// A resolved cache entry: the persisted blob plus its on-disk location.
///
/// The path feeds tools that want a file (media probing); the bytes feed
/// in-memory decoders (image, glTF).
#[derive(Clone, Debug)]
pub struct CachedBlob {
    pub path: PathBuf,
    pub bytes: Arc<Vec<u8>>,
}

/// Durable content cache mapping source URLs to local blobs.
///
/// `resolve` serves hits straight from the store with no network access and
/// fetches misses through the configured [`Fetcher`], persisting the blob
/// before returning it. A failed fetch persists nothing.
///
/// Concurrent resolves of the same cold key are serialized through a per-key
/// guard, so at most one fetch per key is ever in flight; the callers that
/// lose the race observe the winner's persisted entry as a plain hit.
pub struct ContentCache {
    store: BlobStore,
    fetcher: Box<dyn Fetcher>,
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ContentCache {
    pub fn new(store: BlobStore, fetcher: Box<dyn Fetcher>) -> Self {
        Self {
            store,
            fetcher,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Turn a source URL into a locally addressable blob.
    pub fn resolve(&self, url: &str) -> Result<CachedBlob> {
        let guard = self.key_guard(url);
        let _held = lock_recovering(&guard);

        if let Some((path, bytes)) = self.store.get(url)? {
            log::debug!("[cache hit] {url}");
            return Ok(CachedBlob {
                path,
                bytes: Arc::new(bytes),
            });
        }

        log::info!("[cache miss] fetching {url}");
        let bytes = self.fetcher.fetch(url)?;
        let path = self.store.put(url, &bytes)?;
        Ok(CachedBlob {
            path,
            bytes: Arc::new(bytes),
        })
    }

    fn key_guard(&self, url: &str) -> Arc<Mutex<()>> {
        let mut map = lock_recovering(&self.in_flight);
        map.entry(url.to_string()).or_default().clone()
    }
}

// A poisoned guard means a fetch panicked while holding it; the store itself
// stays consistent (temp-file writes), so resolving can continue.
fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
