//! Slot-game variant of the interaction executor: the same windowed-playback
//! primitive, driven by reward tiers the host prefetches from its backend.

use std::collections::VecDeque;
use std::time::Instant;

use hecs::Entity;

use crate::descriptor::ClickSpec;
use crate::scene::graph::{MixerRef, SceneGraph};
use crate::scene::mixer::{MixerId, MixerRegistry};
use crate::scene::PlaybackWindow;

/// One outcome drawn from the host's reward backend. The runtime only needs
/// the tier to pick a playback window; any backend payload rides along
/// untouched and comes back in the result event.
#[derive(Debug, Clone)]
pub struct Reward {
    pub tier: String,
    pub data: serde_json::Value,
}

impl Reward {
    pub fn new(tier: impl Into<String>) -> Self {
        Self {
            tier: tier.into(),
            data: serde_json::Value::Null,
        }
    }
}

/// Spin state: a queue of prefetched rewards and an explicit in-progress
/// flag. The flag is checked at the top of the click handler, so a click
/// received while a spin is running is ignored outright, not queued.
#[derive(Default)]
pub struct SlotGame {
    playing: bool,
    rewards: VecDeque<Reward>,
    pending: Option<(MixerId, Reward)>,
}

impl SlotGame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand the runtime a prefetched reward. The host keeps this queue warm
    /// from its backend; spins consume it front-to-back.
    pub fn queue_reward(&mut self, reward: Reward) {
        self.rewards.push_back(reward);
    }

    pub fn rewards_ready(&self) -> bool {
        !self.rewards.is_empty()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub(crate) fn handle_click(
        &mut self,
        graph: &SceneGraph,
        registry: &mut MixerRegistry,
        entity: Entity,
        click: &ClickSpec,
    ) {
        if self.playing {
            log::debug!("slot spin in progress, ignoring click");
            return;
        }

        let Some(map) = &click.animation_map else {
            log::error!("slot click has no animation map");
            return;
        };
        let Some(tier) = self.rewards.front().map(|r| r.tier.clone()) else {
            log::warn!("no rewards queued, ignoring slot click");
            return;
        };
        let Some(window) = map.get(&tier) else {
            log::error!("no animation mapping for tier '{tier}'");
            return;
        };

        let Ok(mixer_ref) = graph.world.get::<&MixerRef>(entity) else {
            log::error!("slot asset has no bound animation");
            return;
        };
        let mixer_id = mixer_ref.0;
        drop(mixer_ref);
        let Some(mixer) = registry.get_mut(mixer_id) else {
            return;
        };

        let reward = match self.rewards.pop_front() {
            Some(reward) => reward,
            None => return,
        };
        log::info!(
            "slot spin: tier '{}', window {}..{}",
            tier,
            window.start_time,
            window.end_time
        );

        let duration = mixer.clip.duration;
        let start = window.start_time.clamp(0.0, duration);
        let end = window.end_time.clamp(start, duration);
        mixer.action.play_window(
            PlaybackWindow {
                start,
                end,
                looping: false,
            },
            Instant::now(),
        );

        self.playing = true;
        self.pending = Some((mixer_id, reward));
    }

    /// Called for every finished one-shot action; returns the reward when it
    /// was this slot's spin, clearing the in-progress flag.
    pub(crate) fn on_action_finished(&mut self, mixer: MixerId) -> Option<Reward> {
        match self.pending.take() {
            Some((pending_mixer, reward)) if pending_mixer == mixer => {
                self.playing = false;
                Some(reward)
            }
            other => {
                self.pending = other;
                None
            }
        }
    }

    /// The spin's mixer was destroyed (scene teardown) before it finished;
    /// drop the pending spin so the game does not stay locked.
    pub(crate) fn cancel_mixer(&mut self, mixer: MixerId) {
        if matches!(self.pending, Some((pending, _)) if pending == mixer) {
            log::debug!("slot spin cancelled by asset teardown");
            self.pending = None;
            self.playing = false;
        }
    }
}
