//! The runtime facade: owns the scene graph, the mixer registry, the shared
//! content cache and every anchor's scene context, and exposes the surface
//! the host wires its collaborators to (tracking callbacks, ray hits,
//! per-frame update).

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

use hecs::Entity;

use crate::cache::ContentCache;
use crate::descriptor::{AssetDescriptor, SceneDescriptor};
use crate::error::{Error, Result};
use crate::interact::{execute_animation_click, resolve_click, RayHit};
use crate::pipeline::media::lock_media;
use crate::pipeline::{AssetPipeline, FfprobeMediaProbe, LiveAsset, MediaProbe};
use crate::scene::graph::SceneGraph;
use crate::scene::mixer::MixerRegistry;
use crate::slot::{Reward, SlotGame};
use crate::switcher::{AnchorScene, Completion, LoadResult, SwitchStart, SwitchState};

pub use crate::switcher::AnchorId;

/// Lifecycle notifications surfaced from `update`.
#[derive(Debug)]
pub enum Event {
    /// A scene switch settled: every instantiation attempt completed.
    SceneSettled { anchor: AnchorId, scene_id: String },
    /// One asset failed to load; its siblings are unaffected.
    AssetFailed {
        anchor: AnchorId,
        asset_id: String,
        reason: String,
    },
    /// A one-shot animation finished (boundary check or fallback deadline).
    ActionFinished { entity: Entity },
    /// A slot spin finished; carries the reward that drove it.
    SlotResult { entity: Entity, reward: Reward },
}

pub struct Engine {
    graph: SceneGraph,
    registry: MixerRegistry,
    pipeline: AssetPipeline,
    anchors: Vec<AnchorScene>,
    slot: SlotGame,
    extras: Vec<LiveAsset>,
    queued_events: Vec<Event>,
    load_tx: Sender<LoadResult>,
    load_rx: Receiver<LoadResult>,
}

impl Engine {
    /// Engine with the default (ffprobe) media probe.
    pub fn new(cache: Arc<ContentCache>) -> Self {
        Self::with_probe(cache, Arc::new(FfprobeMediaProbe))
    }

    pub fn with_probe(cache: Arc<ContentCache>, probe: Arc<dyn MediaProbe>) -> Self {
        let (load_tx, load_rx) = channel();
        Self {
            graph: SceneGraph::new(),
            registry: MixerRegistry::new(),
            pipeline: AssetPipeline::new(cache, probe),
            anchors: Vec::new(),
            slot: SlotGame::new(),
            extras: Vec::new(),
            queued_events: Vec::new(),
            load_tx,
            load_rx,
        }
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    pub fn mixers(&self) -> &MixerRegistry {
        &self.registry
    }

    pub fn slot(&self) -> &SlotGame {
        &self.slot
    }

    pub fn slot_mut(&mut self) -> &mut SlotGame {
        &mut self.slot
    }

    /// Create the scene-graph counterpart of a tracking anchor. The
    /// collaborator drives the returned root's transform and reports
    /// found/lost through `target_found`/`target_lost`.
    pub fn add_anchor(&mut self) -> AnchorId {
        let id = AnchorId(self.anchors.len());
        let root = self.graph.spawn_anchor(format!("anchor-{}", id.0));
        self.anchors.push(AnchorScene::new(id, root));
        id
    }

    pub fn anchor_root(&self, anchor: AnchorId) -> Result<Entity> {
        Ok(self.anchor(anchor)?.root)
    }

    pub fn set_scenes(&mut self, anchor: AnchorId, scenes: Vec<SceneDescriptor>) -> Result<()> {
        self.anchor_mut(anchor)?.set_scenes(scenes);
        Ok(())
    }

    pub fn current_scene(&self, anchor: AnchorId) -> Result<Option<String>> {
        Ok(self.anchor(anchor)?.current_scene().map(str::to_owned))
    }

    /// True when the anchor has no instantiation attempts outstanding.
    pub fn is_settled(&self, anchor: AnchorId) -> Result<bool> {
        Ok(self.anchor(anchor)?.is_settled())
    }

    pub fn live_assets(&self, anchor: AnchorId) -> Result<&[LiveAsset]> {
        Ok(self.anchor(anchor)?.live())
    }

    /// Switch an anchor to a named scene. Teardown of the previous set
    /// happens before this returns; the new set attaches as loads complete
    /// during subsequent `update` calls. Switching to the scene already
    /// current is a no-op.
    pub fn switch_scene(&mut self, anchor: AnchorId, scene_id: &str) -> Result<()> {
        let index = self.anchor_index(anchor)?;
        let outcome = self.anchors[index].switch_scene(
            scene_id,
            &mut self.graph,
            &mut self.registry,
            &self.pipeline,
            &self.load_tx,
        );
        // Teardown happens even when the switch then fails; any spin whose
        // mixer it destroyed must unlock the slot either way.
        for mixer in self.anchors[index].take_removed_mixers() {
            self.slot.cancel_mixer(mixer);
        }
        if matches!(outcome?, SwitchStart::Settled) {
            self.queued_events.push(Event::SceneSettled {
                anchor,
                scene_id: scene_id.to_string(),
            });
        }
        Ok(())
    }

    /// Cycle forward through the anchor's scene list.
    pub fn next_scene(&mut self, anchor: AnchorId) -> Result<()> {
        self.step_scene(anchor, 1)
    }

    /// Cycle backward through the anchor's scene list.
    pub fn prev_scene(&mut self, anchor: AnchorId) -> Result<()> {
        self.step_scene(anchor, -1)
    }

    fn step_scene(&mut self, anchor: AnchorId, step: isize) -> Result<()> {
        let target = self
            .anchor(anchor)?
            .relative_scene(step)
            .ok_or_else(|| Error::SceneNotFound("(no scenes configured)".into()))?;
        self.switch_scene(anchor, &target)
    }

    /// One-off instantiation outside any anchor's scene set (overlay
    /// mascots and similar extras). The engine keeps ownership; destroy
    /// through `destroy_asset`.
    pub fn create_asset(
        &mut self,
        descriptor: &AssetDescriptor,
        parent: Option<Entity>,
    ) -> Result<Option<Entity>> {
        let Some(live) =
            self.pipeline
                .instantiate(&mut self.graph, &mut self.registry, descriptor)?
        else {
            return Ok(None);
        };
        if let Some(parent) = parent {
            self.graph.attach(parent, live.root);
        }
        let root = live.root;
        self.extras.push(live);
        Ok(Some(root))
    }

    /// Destroy an asset created through `create_asset`.
    pub fn destroy_asset(&mut self, root: Entity) {
        let Some(index) = self.extras.iter().position(|live| live.root == root) else {
            return;
        };
        let live = self.extras.swap_remove(index);
        for handle in live.video.iter().chain(live.audio.iter()) {
            lock_media(handle).pause();
        }
        if let Some(mixer) = live.mixer {
            self.registry.unregister(mixer);
            self.slot.cancel_mixer(mixer);
        }
        self.graph.despawn_subtree(live.root);
    }

    /// The tracked target reappeared: resume playback of the attached set.
    pub fn target_found(&mut self, anchor: AnchorId) -> Result<()> {
        log::info!("target {:?} found", anchor);
        self.anchor(anchor)?.set_media_playing(true);
        Ok(())
    }

    /// The tracked target was lost: pause playback of the attached set.
    pub fn target_lost(&mut self, anchor: AnchorId) -> Result<()> {
        log::info!("target {:?} lost", anchor);
        self.anchor(anchor)?.set_media_playing(false);
        Ok(())
    }

    /// Route a pointer event's ordered ray hits to the interaction it
    /// resolves to, if any.
    pub fn handle_click(&mut self, hits: &[RayHit]) {
        let Some((entity, click)) = resolve_click(&self.graph, hits) else {
            return;
        };
        if click.kind.as_deref() == Some("slot_game") {
            self.slot
                .handle_click(&self.graph, &mut self.registry, entity, &click);
        } else {
            execute_animation_click(&self.graph, &mut self.registry, entity, &click);
        }
    }

    /// Per-frame step, called before the host renders the frame: drain
    /// completed loads (attach current-generation results, discard stale
    /// ones), advance every registered mixer, and report lifecycle events.
    pub fn update(&mut self, dt: f32) -> Vec<Event> {
        let mut events = std::mem::take(&mut self.queued_events);

        while let Ok(result) = self.load_rx.try_recv() {
            let Ok(index) = self.anchor_index(result.anchor) else {
                continue;
            };
            let anchor = result.anchor;
            let asset_id = result.asset_id.clone();
            let outcome =
                self.anchors[index].complete_load(result, &mut self.graph, &mut self.registry);
            if let Completion::Failed(err) = &outcome.completion {
                events.push(Event::AssetFailed {
                    anchor,
                    asset_id,
                    reason: err.to_string(),
                });
            }
            if outcome.settled {
                if let SwitchState::Active { scene } = self.anchors[index].state() {
                    events.push(Event::SceneSettled {
                        anchor,
                        scene_id: scene.clone(),
                    });
                }
            }
        }

        for (mixer, root) in self.registry.tick_all(dt, &mut self.graph) {
            if let Some(reward) = self.slot.on_action_finished(mixer) {
                events.push(Event::SlotResult {
                    entity: root,
                    reward,
                });
            } else {
                events.push(Event::ActionFinished { entity: root });
            }
        }

        events
    }

    fn anchor(&self, anchor: AnchorId) -> Result<&AnchorScene> {
        self.anchors
            .get(anchor.0)
            .ok_or_else(|| Error::config(format!("unknown anchor {:?}", anchor)))
    }

    fn anchor_mut(&mut self, anchor: AnchorId) -> Result<&mut AnchorScene> {
        self.anchors
            .get_mut(anchor.0)
            .ok_or_else(|| Error::config(format!("unknown anchor {:?}", anchor)))
    }

    fn anchor_index(&self, anchor: AnchorId) -> Result<usize> {
        if anchor.0 < self.anchors.len() {
            Ok(anchor.0)
        } else {
            Err(Error::config(format!("unknown anchor {:?}", anchor)))
        }
    }
}
