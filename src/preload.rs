//! Cache warm-up: scan a raw experience configuration for every asset URL
//! and resolve each one before the experience starts, so first render never
//! waits on the network.

use crate::cache::ContentCache;
use crate::descriptor::scan_asset_urls;

#[derive(Debug, Clone, Copy)]
pub struct PreloadProgress<'a> {
    pub url: &'a str,
    pub completed: usize,
    pub total: usize,
    pub ok: bool,
}

#[derive(Debug, Default)]
pub struct PreloadReport {
    pub total: usize,
    pub loaded: usize,
    /// (url, reason) per failed resolve.
    pub failed: Vec<(String, String)>,
}

/// Resolve every asset URL found in `raw` through the cache. A failed
/// resolve is reported and skipped so the rest keep loading; the host
/// decides whether a missing asset is fatal.
pub fn preload(
    cache: &ContentCache,
    raw: &serde_json::Value,
    mut progress: impl FnMut(PreloadProgress<'_>),
) -> PreloadReport {
    let urls = scan_asset_urls(raw);
    let mut report = PreloadReport {
        total: urls.len(),
        ..PreloadReport::default()
    };

    for url in &urls {
        let ok = match cache.resolve(url) {
            Ok(_) => {
                report.loaded += 1;
                true
            }
            Err(err) => {
                log::warn!("failed to preload '{url}': {err}");
                report.failed.push((url.clone(), err.to_string()));
                false
            }
        };
        progress(PreloadProgress {
            url,
            completed: report.loaded + report.failed.len(),
            total: report.total,
            ok,
        });
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{BlobStore, Fetcher};
    use crate::error::{Error, Result};

    struct FlakyFetcher;

    impl Fetcher for FlakyFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            if url.ends_with(".bad") {
                Err(Error::fetch(format!("no route to '{url}'")))
            } else {
                Ok(vec![1, 2, 3])
            }
        }
    }

    #[test]
    fn failures_are_isolated_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path().join("store")).unwrap();
        let cache = ContentCache::new(store, Box::new(FlakyFetcher));

        let raw = serde_json::json!({
            "a": { "src": "ok1.png" },
            "b": { "src": "broken.bad" },
            "c": { "icon": "ok2.png" }
        });

        let mut seen = 0;
        let report = preload(&cache, &raw, |_| seen += 1);
        assert_eq!(report.total, 3);
        assert_eq!(report.loaded, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "broken.bad");
        assert_eq!(seen, 3);
    }
}
