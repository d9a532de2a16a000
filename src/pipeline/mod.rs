// pipeline/mod.rs
// Type-dispatched asset instantiation: descriptor in, positioned live scene
// object out. Split in two phases so scene switches can run the expensive
// half off-thread:
//
//   prepare: cache resolve + decode/probe/parse; pure data out, Send.
//   realize: graph and mixer-registry mutation; owning thread only.

pub mod media;
pub mod model;

pub use media::{
    media_handle, FfprobeMediaProbe, MediaHandle, MediaProbe, MediaState, VideoInfo,
};
pub use model::PreparedModel;

use std::sync::Arc;

use glam::{Quat, Vec3};
use hecs::Entity;

use crate::cache::{CachedBlob, ContentCache};
use crate::descriptor::{AssetDescriptor, AssetKind};
use crate::error::{Error, Result};
use crate::scene::graph::{
    HitProxy, Interaction, Media, MixerRef, Name, SceneGraph, Surface, SurfaceSource,
    TransformComponent, Visible,
};
use crate::scene::mixer::{Mixer, MixerId, MixerRegistry};
use crate::scene::{ActionState, Transform};

/// Margin applied to hit-test proxies so near-miss taps still land.
const HIT_PROXY_MARGIN: f32 = 1.5;
/// Proxy offset in front of the asset's local origin.
const HIT_PROXY_OFFSET: f32 = 0.01;
const HIT_PROXY_MIN_SIZE: f32 = 0.5;

/// Decoded payload plus the descriptor that produced it. Everything in here
/// is plain data and safe to ship between threads.
pub struct PreparedAsset {
    pub descriptor: AssetDescriptor,
    pub payload: PreparedPayload,
}

pub enum PreparedPayload {
    Image {
        width: u32,
        height: u32,
        blob: CachedBlob,
    },
    Video {
        info: VideoInfo,
        blob: CachedBlob,
    },
    Model(PreparedModel),
    Audio {
        blob: CachedBlob,
    },
}

/// The instantiated, attached runtime object: one root entity plus the
/// capability handles the lifecycle code needs to control it. Owned
/// exclusively by the switcher (or the engine, for one-off extras) that
/// attached it.
#[derive(Debug)]
pub struct LiveAsset {
    pub id: String,
    pub kind: AssetKind,
    pub root: Entity,
    pub mixer: Option<MixerId>,
    pub video: Option<MediaHandle>,
    pub audio: Option<MediaHandle>,
}

#[derive(Clone)]
pub struct AssetPipeline {
    cache: Arc<ContentCache>,
    probe: Arc<dyn MediaProbe>,
}

impl AssetPipeline {
    pub fn new(cache: Arc<ContentCache>, probe: Arc<dyn MediaProbe>) -> Self {
        Self { cache, probe }
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    /// Resolve and decode one descriptor. Returns `Ok(None)` for a kind the
    /// pipeline does not recognize (logged, non-fatal); every other failure
    /// is an error scoped to this one asset.
    pub fn prepare(&self, descriptor: &AssetDescriptor) -> Result<Option<PreparedAsset>> {
        match self.prepare_payload(descriptor) {
            Ok(payload) => Ok(Some(PreparedAsset {
                descriptor: descriptor.clone(),
                payload,
            })),
            Err(Error::UnknownAssetType(id)) => {
                log::warn!("unknown asset type for '{id}', skipping");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn prepare_payload(&self, descriptor: &AssetDescriptor) -> Result<PreparedPayload> {
        if matches!(descriptor.kind, AssetKind::Other) {
            return Err(Error::UnknownAssetType(descriptor.id.clone()));
        }

        let blob = self.cache.resolve(&descriptor.src)?;
        match descriptor.kind {
            AssetKind::Image => {
                let decoded = image::load_from_memory(&blob.bytes).map_err(|err| {
                    Error::asset_load(format!(
                        "failed to decode image '{}': {err}",
                        descriptor.id
                    ))
                })?;
                Ok(PreparedPayload::Image {
                    width: decoded.width(),
                    height: decoded.height(),
                    blob,
                })
            }
            AssetKind::Video => {
                let info = self.probe.probe_video(&blob.path)?;
                Ok(PreparedPayload::Video { info, blob })
            }
            AssetKind::Model3D => Ok(PreparedPayload::Model(model::parse_model(
                &descriptor.id,
                &blob.bytes,
            )?)),
            AssetKind::Audio => Ok(PreparedPayload::Audio { blob }),
            AssetKind::Other => Err(Error::UnknownAssetType(descriptor.id.clone())),
        }
    }

    /// Realize a prepared asset: spawn its entities, apply the descriptor
    /// transform and naming, attach capability components and, for clickable
    /// assets, the interaction metadata plus hit proxy.
    pub fn realize(
        graph: &mut SceneGraph,
        registry: &mut MixerRegistry,
        prepared: PreparedAsset,
    ) -> LiveAsset {
        let PreparedAsset {
            descriptor,
            payload,
        } = prepared;

        // Planar kinds size their surface directly; only models scale the
        // node itself.
        let node_scale = if matches!(descriptor.kind, AssetKind::Model3D) {
            Vec3::from(descriptor.scale)
        } else {
            Vec3::ONE
        };
        let transform =
            Transform::from_descriptor(descriptor.position, descriptor.rotation, node_scale);
        let root = graph.world.spawn((
            Name::new(descriptor.id.clone()),
            TransformComponent(transform),
            Visible(true),
        ));

        let mut live = LiveAsset {
            id: descriptor.id.clone(),
            kind: descriptor.kind,
            root,
            mixer: None,
            video: None,
            audio: None,
        };
        let mut footprint = (HIT_PROXY_MIN_SIZE, HIT_PROXY_MIN_SIZE);

        match payload {
            PreparedPayload::Image { width, height, blob } => {
                let (w, h) = planar_size(descriptor.scale[0], width, height);
                footprint = (w, h);
                let _ = graph.world.insert_one(
                    root,
                    Surface {
                        width: w,
                        height: h,
                        opacity: descriptor.opacity,
                        source: SurfaceSource::Image(blob),
                    },
                );
            }
            PreparedPayload::Video { info, blob } => {
                let (w, h) = planar_size(descriptor.scale[0], info.width, info.height);
                footprint = (w, h);
                let handle = media_handle(MediaState::video());
                let _ = graph.world.insert(
                    root,
                    (
                        Surface {
                            width: w,
                            height: h,
                            opacity: descriptor.opacity,
                            source: SurfaceSource::Video(blob),
                        },
                        Media(handle.clone()),
                    ),
                );
                live.video = Some(handle);
            }
            PreparedPayload::Model(prepared_model) => {
                footprint = (
                    descriptor.scale[0].abs().max(HIT_PROXY_MIN_SIZE),
                    descriptor.scale[1].abs().max(HIT_PROXY_MIN_SIZE),
                );
                if let Some(clip) = model::realize_model(graph, root, &prepared_model) {
                    let mut action = ActionState::new();
                    action.playing = autoplay_enabled(&descriptor);
                    let mixer_id = registry.register(Mixer {
                        clip,
                        action,
                        root,
                    });
                    let _ = graph.world.insert_one(root, MixerRef(mixer_id));
                    live.mixer = Some(mixer_id);
                }
            }
            PreparedPayload::Audio { blob: _ } => {
                let handle = media_handle(MediaState::audio());
                let _ = graph.world.insert_one(root, Media(handle.clone()));
                live.audio = Some(handle);
            }
        }

        if let Some(action) = descriptor.action {
            let proxy = graph.world.spawn((
                Name::new(format!("{}:hit", live.id)),
                TransformComponent(Transform::from_trs(
                    Vec3::new(0.0, 0.0, HIT_PROXY_OFFSET),
                    Quat::IDENTITY,
                    Vec3::ONE,
                )),
                Visible(true),
                HitProxy {
                    width: footprint.0 * HIT_PROXY_MARGIN,
                    height: footprint.1 * HIT_PROXY_MARGIN,
                },
            ));
            graph.attach(root, proxy);
            let _ = graph.world.insert_one(root, Interaction(action));
        }

        live
    }

    /// Prepare and realize in one blocking call.
    pub fn instantiate(
        &self,
        graph: &mut SceneGraph,
        registry: &mut MixerRegistry,
        descriptor: &AssetDescriptor,
    ) -> Result<Option<LiveAsset>> {
        let Some(prepared) = self.prepare(descriptor)? else {
            return Ok(None);
        };
        Ok(Some(Self::realize(graph, registry, prepared)))
    }
}

// Width comes from the descriptor; height always follows the source pixels,
// overriding any configured height.
fn planar_size(width_ref: f32, intrinsic_w: u32, intrinsic_h: u32) -> (f32, f32) {
    if intrinsic_w == 0 || intrinsic_h == 0 {
        return (width_ref, width_ref);
    }
    let aspect = intrinsic_w as f32 / intrinsic_h as f32;
    (width_ref, width_ref / aspect)
}

fn autoplay_enabled(descriptor: &AssetDescriptor) -> bool {
    let windowed = descriptor
        .action
        .as_ref()
        .and_then(|a| a.click.as_ref())
        .map(|click| click.asset_animation && click.has_timing())
        .unwrap_or(false);
    descriptor.autoplay && !windowed
}
