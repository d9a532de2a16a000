// Preloader: read an experience config, warm the content cache with every
// asset it references, and print a summary.

use anyhow::{Context, Result};

use arscene::cache::{BlobStore, ContentCache, DefaultFetcher};
use arscene::descriptor::ExperienceConfig;
use arscene::preload::preload;

fn main() -> Result<()> {
    arscene::init_logging();

    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .context("usage: arscene <config.json> [store-dir]")?;
    let store_dir = args.next().unwrap_or_else(|| "asset-store".to_string());

    let (config, raw) = ExperienceConfig::load_from_path(&config_path)?;
    let modes = &config.info.tracking_modes;
    let track_count = modes
        .image
        .iter()
        .chain(modes.slot.iter())
        .map(|mode| mode.tracks.len())
        .sum::<usize>();
    log::info!("config has {track_count} track(s)");

    let store = BlobStore::open(&store_dir)?;
    let cache = ContentCache::new(store, Box::new(DefaultFetcher::new()));

    let report = preload(&cache, &raw, |progress| {
        let name = progress.url.rsplit('/').next().unwrap_or(progress.url);
        log::info!(
            "downloaded {}/{}: {name}",
            progress.completed,
            progress.total
        );
    });

    log::info!(
        "preload complete: {}/{} assets cached in '{store_dir}'",
        report.loaded,
        report.total
    );
    for (url, reason) in &report.failed {
        log::warn!("missing: {url} ({reason})");
    }

    Ok(())
}
