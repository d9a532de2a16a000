//! Click routing: the rendering collaborator turns a pointer event into an
//! ordered list of ray hits; this module finds the interaction carrier and
//! drives the configured animation action.

use std::time::Instant;

use hecs::Entity;

use crate::descriptor::ClickSpec;
use crate::scene::graph::{Interaction, MixerRef, SceneGraph};
use crate::scene::mixer::MixerRegistry;
use crate::scene::PlaybackWindow;

/// One ray intersection, as reported by the rendering collaborator.
/// Lists are ordered nearest-first.
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub entity: Entity,
    pub distance: f32,
}

/// Find the action a click resolves to: for each hit in order, skip it when
/// its subtree is hidden, then walk the ownership chain up to the first
/// ancestor carrying click metadata. The first carrier wins and stops the
/// scan, which gives click-through past hits with no interaction data. No
/// carrier anywhere makes the event a no-op.
pub(crate) fn resolve_click(
    graph: &SceneGraph,
    hits: &[RayHit],
) -> Option<(Entity, ClickSpec)> {
    for hit in hits {
        if !graph.subtree_visible(hit.entity) {
            continue;
        }
        for ancestor in graph.ancestors(hit.entity) {
            let Ok(interaction) = graph.world.get::<&Interaction>(ancestor) else {
                continue;
            };
            if let Some(click) = interaction.0.click.clone() {
                log::debug!(
                    "click resolved to '{}'",
                    graph.name(ancestor).unwrap_or_default()
                );
                return Some((ancestor, click));
            }
        }
    }
    None
}

/// Execute a (non-slot) animation click on `entity`.
///
/// Without a configured window the click toggles: stop when running, reset
/// and play from zero when not. With a window the click cancels a running
/// action, otherwise starts windowed playback from `start_time`; the end of
/// the window is enforced by both the advance boundary check and the
/// fallback deadline inside the action.
pub(crate) fn execute_animation_click(
    graph: &SceneGraph,
    registry: &mut MixerRegistry,
    entity: Entity,
    click: &ClickSpec,
) {
    if !click.asset_animation {
        return;
    }
    let Ok(mixer_ref) = graph.world.get::<&MixerRef>(entity) else {
        log::debug!("clicked asset has no bound animation");
        return;
    };
    let mixer_id = mixer_ref.0;
    drop(mixer_ref);
    let Some(mixer) = registry.get_mut(mixer_id) else {
        return;
    };

    if !click.has_timing() {
        if mixer.action.is_running() {
            log::debug!("stopping animation on click");
            mixer.action.stop();
        } else {
            log::debug!("playing animation on click");
            mixer.action.play_from_start();
        }
        return;
    }

    if mixer.action.is_running() {
        // A click during windowed playback cancels it.
        mixer.action.stop();
        return;
    }

    let duration = mixer.clip.duration;
    let start = click.start_time.unwrap_or(0.0).clamp(0.0, duration);
    let end = click.end_time.unwrap_or(duration).clamp(start, duration);
    mixer.action.play_window(
        PlaybackWindow {
            start,
            end,
            looping: click.looping,
        },
        Instant::now(),
    );
}
