// pipeline/model.rs
// Structured 3D asset handling: parse a glTF payload, mirror its node
// hierarchy into the scene graph and convert the first embedded animation
// into a playable clip.

use glam::{Quat, Vec3};
use gltf::animation::util::ReadOutputs;
use hecs::Entity;

use crate::error::{Error, Result};
use crate::scene::animation::{
    AnimationChannel, AnimationClip, AnimationInterpolation, AnimationOutput, AnimationSampler,
    TransformProperty,
};
use crate::scene::graph::{Name, SceneGraph, TransformComponent, Visible};
use crate::scene::Transform;

/// Parsed model payload. Produced off-thread; realized on the owning thread.
pub struct PreparedModel {
    pub document: gltf::Document,
    pub buffers: Vec<gltf::buffer::Data>,
}

pub(crate) fn parse_model(id: &str, bytes: &[u8]) -> Result<PreparedModel> {
    let (document, buffers, _images) = gltf::import_slice(bytes)
        .map_err(|err| Error::asset_load(format!("failed to parse model '{id}': {err}")))?;
    Ok(PreparedModel { document, buffers })
}

/// Spawn the model's node hierarchy under `root` and return the first
/// embedded animation clip, bound to the spawned entities, if any.
pub(crate) fn realize_model(
    graph: &mut SceneGraph,
    root: Entity,
    prepared: &PreparedModel,
) -> Option<AnimationClip> {
    let document = &prepared.document;

    let mut node_entities: Vec<Option<Entity>> = vec![None; document.nodes().len()];
    for node in document.nodes() {
        let (t, r, s) = node.transform().decomposed();
        let transform = Transform::from_trs(Vec3::from(t), Quat::from_array(r), Vec3::from(s));
        let entity = graph.world.spawn((
            Name::new(node.name().unwrap_or("")),
            TransformComponent(transform),
            Visible(true),
        ));
        node_entities[node.index()] = Some(entity);
    }

    let mut has_parent = vec![false; document.nodes().len()];
    for node in document.nodes() {
        let Some(parent_entity) = node_entities[node.index()] else {
            continue;
        };
        for child in node.children() {
            has_parent[child.index()] = true;
            if let Some(child_entity) = node_entities[child.index()] {
                graph.attach(parent_entity, child_entity);
            }
        }
    }
    for node in document.nodes() {
        if !has_parent[node.index()] {
            if let Some(entity) = node_entities[node.index()] {
                graph.attach(root, entity);
            }
        }
    }

    build_first_clip(prepared, &node_entities)
}

fn build_first_clip(
    prepared: &PreparedModel,
    node_entities: &[Option<Entity>],
) -> Option<AnimationClip> {
    let animation = prepared.document.animations().next()?;
    let mut clip = AnimationClip::new(animation.name().unwrap_or("clip"));
    let mut warned_cubic = false;

    for channel in animation.channels() {
        let Some(entity) = node_entities
            .get(channel.target().node().index())
            .copied()
            .flatten()
        else {
            continue;
        };

        let reader = channel.reader(|buffer| Some(&prepared.buffers[buffer.index()].0));
        let Some(inputs) = reader.read_inputs() else {
            continue;
        };
        let times: Vec<f32> = inputs.collect();

        let cubic = matches!(
            channel.sampler().interpolation(),
            gltf::animation::Interpolation::CubicSpline
        );
        if cubic && !warned_cubic {
            log::warn!(
                "clip '{}' uses cubic-spline interpolation; sampling linearly",
                clip.name
            );
            warned_cubic = true;
        }
        let interpolation = match channel.sampler().interpolation() {
            gltf::animation::Interpolation::Step => AnimationInterpolation::Step,
            _ => AnimationInterpolation::Linear,
        };

        let Some(outputs) = reader.read_outputs() else {
            continue;
        };
        let (property, output) = match outputs {
            ReadOutputs::Translations(iter) => (
                TransformProperty::Translation,
                AnimationOutput::Vec3(keyframe_values(iter.map(Vec3::from).collect(), cubic)),
            ),
            ReadOutputs::Rotations(rotations) => (
                TransformProperty::Rotation,
                AnimationOutput::Quat(keyframe_values(
                    rotations.into_f32().map(Quat::from_array).collect(),
                    cubic,
                )),
            ),
            ReadOutputs::Scales(iter) => (
                TransformProperty::Scale,
                AnimationOutput::Vec3(keyframe_values(iter.map(Vec3::from).collect(), cubic)),
            ),
            ReadOutputs::MorphTargetWeights(_) => continue,
        };

        clip.add_channel(AnimationChannel {
            sampler: AnimationSampler {
                times,
                output,
                interpolation,
            },
            entity,
            property,
        });
    }

    if clip.channels.is_empty() {
        None
    } else {
        Some(clip)
    }
}

// Cubic-spline outputs carry (in-tangent, value, out-tangent) triples per
// keyframe; only the values participate in linear sampling.
fn keyframe_values<T>(values: Vec<T>, cubic: bool) -> Vec<T> {
    if cubic {
        values.into_iter().skip(1).step_by(3).collect()
    } else {
        values
    }
}
