use std::collections::HashMap;
use std::time::Instant;

use hecs::Entity;

use crate::scene::animation::{ActionState, AnimationClip, TransformUpdate};
use crate::scene::graph::{SceneGraph, TransformComponent};

/// One model's animation clock: the clip plus its playable action.
pub struct Mixer {
    pub clip: AnimationClip,
    pub action: ActionState,
    /// Root entity of the asset this mixer animates.
    pub root: Entity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MixerId(u64);

/// The one piece of shared mutable animation state: every live mixer,
/// advanced once per frame by `tick_all`. Whoever registers a mixer owns the
/// obligation to unregister it exactly once when its asset is destroyed;
/// anything left registered keeps consuming per-frame work forever.
#[derive(Default)]
pub struct MixerRegistry {
    mixers: HashMap<MixerId, Mixer>,
    next: u64,
}

impl MixerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, mixer: Mixer) -> MixerId {
        let id = MixerId(self.next);
        self.next += 1;
        self.mixers.insert(id, mixer);
        id
    }

    /// Returns false when the id was already removed.
    pub fn unregister(&mut self, id: MixerId) -> bool {
        self.mixers.remove(&id).is_some()
    }

    pub fn get(&self, id: MixerId) -> Option<&Mixer> {
        self.mixers.get(&id)
    }

    pub fn get_mut(&mut self, id: MixerId) -> Option<&mut Mixer> {
        self.mixers.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.mixers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mixers.is_empty()
    }

    /// Advance every registered action by `dt` seconds and write the sampled
    /// poses into the graph. Returns the mixers whose one-shot playback
    /// finished during this tick, paired with their asset root.
    pub fn tick_all(&mut self, dt: f32, graph: &mut SceneGraph) -> Vec<(MixerId, Entity)> {
        let now = Instant::now();
        let mut updates: HashMap<Entity, TransformUpdate> = HashMap::new();
        let mut finished = Vec::new();

        for (id, mixer) in self.mixers.iter_mut() {
            let was_playing = mixer.action.playing;
            let done = mixer.action.advance(dt, mixer.clip.duration, now);
            if was_playing {
                mixer.clip.sample(mixer.action.time, &mut updates);
            }
            if done {
                finished.push((*id, mixer.root));
            }
        }

        for (entity, update) in updates {
            if let Ok(mut transform) = graph.world.get::<&mut TransformComponent>(entity) {
                if let Some(translation) = update.translation {
                    transform.0.translation = translation;
                }
                if let Some(rotation) = update.rotation {
                    transform.0.rotation = rotation;
                }
                if let Some(scale) = update.scale {
                    transform.0.scale = scale;
                }
            }
        }

        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::animation::{
        AnimationChannel, AnimationInterpolation, AnimationOutput, AnimationSampler,
        TransformProperty,
    };
    use crate::scene::graph::Name;
    use crate::scene::Transform;
    use glam::Vec3;

    fn translation_clip(entity: Entity) -> AnimationClip {
        let mut clip = AnimationClip::new("move");
        clip.add_channel(AnimationChannel {
            sampler: AnimationSampler {
                times: vec![0.0, 2.0],
                output: AnimationOutput::Vec3(vec![Vec3::ZERO, Vec3::splat(2.0)]),
                interpolation: AnimationInterpolation::Linear,
            },
            entity,
            property: TransformProperty::Translation,
        });
        clip
    }

    #[test]
    fn tick_applies_sampled_pose_to_target_entity() {
        let mut graph = SceneGraph::new();
        let target = graph
            .world
            .spawn((Name::new("node"), TransformComponent(Transform::IDENTITY)));
        let mut registry = MixerRegistry::new();
        registry.register(Mixer {
            clip: translation_clip(target),
            action: ActionState::new(),
            root: target,
        });

        let finished = registry.tick_all(1.0, &mut graph);
        assert!(finished.is_empty());

        let transform = graph.world.get::<&TransformComponent>(target).unwrap();
        assert!((transform.0.translation - Vec3::splat(1.0)).length() < 1e-6);
    }

    #[test]
    fn unregister_is_exactly_once() {
        let mut graph = SceneGraph::new();
        let target = graph.world.spawn((TransformComponent(Transform::IDENTITY),));
        let mut registry = MixerRegistry::new();
        let id = registry.register(Mixer {
            clip: translation_clip(target),
            action: ActionState::new(),
            root: target,
        });

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn finished_one_shot_reports_its_root() {
        let mut graph = SceneGraph::new();
        let target = graph.world.spawn((TransformComponent(Transform::IDENTITY),));
        let mut registry = MixerRegistry::new();
        let mut action = ActionState::new();
        action.looping = false;
        let id = registry.register(Mixer {
            clip: translation_clip(target),
            action,
            root: target,
        });

        let finished = registry.tick_all(5.0, &mut graph);
        assert_eq!(finished, vec![(id, target)]);
    }
}
