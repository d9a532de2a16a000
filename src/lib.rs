pub mod cache;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod interact;
pub mod pipeline;
pub mod preload;
pub mod scene;
pub mod slot;
pub mod switcher;

pub use cache::{BlobStore, CachedBlob, ContentCache, DefaultFetcher, Fetcher};
pub use descriptor::{
    AssetDescriptor, AssetKind, ExperienceConfig, InteractionSpec, SceneDescriptor,
};
pub use engine::{AnchorId, Engine, Event};
pub use error::{Error, Result};
pub use interact::RayHit;
pub use pipeline::{AssetPipeline, LiveAsset, MediaProbe, MediaState, VideoInfo};
pub use preload::{preload, PreloadProgress, PreloadReport};
pub use slot::Reward;
pub use switcher::SwitchState;

pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}
