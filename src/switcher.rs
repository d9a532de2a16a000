//! Per-anchor scene ownership: the state machine that tears one asset set
//! down and brings the next one up, without ever letting two scenes coexist
//! under one anchor.

use std::sync::mpsc::Sender;
use std::thread;

use hecs::Entity;

use crate::descriptor::SceneDescriptor;
use crate::error::{Error, Result};
use crate::pipeline::media::lock_media;
use crate::pipeline::{AssetPipeline, LiveAsset, PreparedAsset};
use crate::scene::graph::SceneGraph;
use crate::scene::mixer::{MixerId, MixerRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnchorId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchState {
    Empty,
    Loading { target: String },
    Active { scene: String },
}

/// Completion of one off-thread prepare, stamped with the generation of the
/// switch that launched it. Results whose generation no longer matches the
/// anchor's are discarded at drain time instead of attached.
pub(crate) struct LoadResult {
    pub anchor: AnchorId,
    pub generation: u64,
    pub asset_id: String,
    pub outcome: Result<Option<PreparedAsset>>,
}

pub(crate) enum Completion {
    Stale,
    Attached,
    Skipped,
    Failed(Error),
}

pub(crate) struct DrainOutcome {
    pub completion: Completion,
    /// True when this completion settled the switch (all attempts done).
    pub settled: bool,
}

/// How a switch request started.
pub(crate) enum SwitchStart {
    /// Requested scene is already current; nothing happened.
    NoOp,
    /// Settled synchronously (the target scene has no assets).
    Settled,
    /// Loads launched; the switch settles through `complete_load`.
    Loading,
}

/// One tracked target's scene context: its anchor root, scene list, and the
/// live asset set it exclusively owns.
pub struct AnchorScene {
    pub id: AnchorId,
    pub root: Entity,
    scenes: Vec<SceneDescriptor>,
    current: Option<String>,
    state: SwitchState,
    generation: u64,
    pending: usize,
    live: Vec<LiveAsset>,
    /// Mixers destroyed by teardown, buffered until the engine collects them
    /// (the slot game must learn about destroyed spins even when the switch
    /// itself fails afterwards).
    removed_mixers: Vec<MixerId>,
}

impl AnchorScene {
    pub fn new(id: AnchorId, root: Entity) -> Self {
        Self {
            id,
            root,
            scenes: Vec::new(),
            current: None,
            state: SwitchState::Empty,
            generation: 0,
            pending: 0,
            live: Vec::new(),
            removed_mixers: Vec::new(),
        }
    }

    pub fn set_scenes(&mut self, scenes: Vec<SceneDescriptor>) {
        self.scenes = scenes;
    }

    pub fn current_scene(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn state(&self) -> &SwitchState {
        &self.state
    }

    /// True when no instantiation attempts are outstanding.
    pub fn is_settled(&self) -> bool {
        self.pending == 0
    }

    pub fn live(&self) -> &[LiveAsset] {
        &self.live
    }

    /// Begin a switch. Teardown of the previous set happens synchronously
    /// here; the new set's instantiations are all launched together and
    /// attached as they complete, through `complete_load`.
    pub(crate) fn switch_scene(
        &mut self,
        scene_id: &str,
        graph: &mut SceneGraph,
        registry: &mut MixerRegistry,
        pipeline: &AssetPipeline,
        sender: &Sender<LoadResult>,
    ) -> Result<SwitchStart> {
        if self.current.as_deref() == Some(scene_id) {
            log::debug!("anchor {:?} already shows scene '{scene_id}'", self.id);
            return Ok(SwitchStart::NoOp);
        }

        log::info!("anchor {:?}: switching to scene '{scene_id}'", self.id);
        self.teardown(graph, registry);

        let Some(scene) = self
            .scenes
            .iter()
            .find(|s| s.scene_id == scene_id)
            .cloned()
        else {
            log::error!("scene '{scene_id}' not found");
            return Err(Error::SceneNotFound(scene_id.to_string()));
        };

        self.state = SwitchState::Loading {
            target: scene_id.to_string(),
        };
        self.pending = scene.assets.len();
        if scene.assets.is_empty() {
            self.current = Some(scene_id.to_string());
            self.state = SwitchState::Active {
                scene: scene_id.to_string(),
            };
            return Ok(SwitchStart::Settled);
        }

        for descriptor in scene.assets {
            let pipeline = pipeline.clone();
            let sender = sender.clone();
            let anchor = self.id;
            let generation = self.generation;
            let asset_id = descriptor.id.clone();
            thread::spawn(move || {
                let outcome = pipeline.prepare(&descriptor);
                let _ = sender.send(LoadResult {
                    anchor,
                    generation,
                    asset_id,
                    outcome,
                });
            });
        }

        Ok(SwitchStart::Loading)
    }

    /// Destroy the whole live set: media paused, mixers deregistered,
    /// subtrees despawned. Bumping the generation here is what invalidates
    /// any still-in-flight load from the torn-down switch.
    pub(crate) fn teardown(&mut self, graph: &mut SceneGraph, registry: &mut MixerRegistry) {
        for live in self.live.drain(..) {
            for handle in live.video.iter().chain(live.audio.iter()) {
                lock_media(handle).pause();
            }
            if let Some(mixer) = live.mixer {
                if registry.unregister(mixer) {
                    self.removed_mixers.push(mixer);
                }
            }
            graph.despawn_subtree(live.root);
        }
        self.current = None;
        self.state = SwitchState::Empty;
        self.generation = self.generation.wrapping_add(1);
        self.pending = 0;
    }

    /// Drain the mixers destroyed since the last collection.
    pub(crate) fn take_removed_mixers(&mut self) -> Vec<MixerId> {
        std::mem::take(&mut self.removed_mixers)
    }

    /// Handle one drained completion: attach it, skip it, or discard it as
    /// stale. A failed instantiation never aborts its siblings.
    pub(crate) fn complete_load(
        &mut self,
        result: LoadResult,
        graph: &mut SceneGraph,
        registry: &mut MixerRegistry,
    ) -> DrainOutcome {
        if result.generation != self.generation {
            log::debug!(
                "anchor {:?}: discarding stale load for '{}'",
                self.id,
                result.asset_id
            );
            return DrainOutcome {
                completion: Completion::Stale,
                settled: false,
            };
        }

        self.pending = self.pending.saturating_sub(1);
        let completion = match result.outcome {
            Ok(Some(prepared)) => {
                let live = AssetPipeline::realize(graph, registry, prepared);
                graph.attach(self.root, live.root);
                for handle in live.video.iter().chain(live.audio.iter()) {
                    lock_media(handle).play();
                }
                self.live.push(live);
                Completion::Attached
            }
            Ok(None) => Completion::Skipped,
            Err(err) => {
                log::warn!(
                    "anchor {:?}: asset '{}' failed to load: {err}",
                    self.id,
                    result.asset_id
                );
                Completion::Failed(err)
            }
        };

        let mut settled = false;
        if self.pending == 0 {
            if let SwitchState::Loading { target } = &self.state {
                let target = target.clone();
                log::info!(
                    "anchor {:?}: scene '{target}' settled with {} assets",
                    self.id,
                    self.live.len()
                );
                self.current = Some(target.clone());
                self.state = SwitchState::Active { scene: target };
                settled = true;
            }
        }

        DrainOutcome {
            completion,
            settled,
        }
    }

    /// Scene id `step` places away from the current one, cycling through the
    /// configured list. With nothing current, a forward step lands on the
    /// first scene and a backward step on the last.
    pub(crate) fn relative_scene(&self, step: isize) -> Option<String> {
        if self.scenes.is_empty() {
            return None;
        }
        let len = self.scenes.len() as isize;
        let index = self
            .current
            .as_ref()
            .and_then(|current| self.scenes.iter().position(|s| &s.scene_id == current))
            .map(|i| i as isize);
        let next = match index {
            Some(i) => (i + step).rem_euclid(len),
            None if step >= 0 => 0,
            None => len - 1,
        };
        Some(self.scenes[next as usize].scene_id.clone())
    }

    /// Toggle playback of every attached video/audio handle. Driven by the
    /// tracking collaborator's found/lost callbacks; never switches scenes.
    pub(crate) fn set_media_playing(&self, playing: bool) {
        for live in &self.live {
            for handle in live.video.iter().chain(live.audio.iter()) {
                let mut state = lock_media(handle);
                if playing {
                    state.play();
                } else {
                    state.pause();
                }
            }
        }
    }
}
